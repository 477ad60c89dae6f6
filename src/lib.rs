//! 基于消息队列的异步任务分发引擎
//!
//! 生产者把命名的任务调用序列化到broker上；消费者拉取投递、解码
//! 并路由给注册的执行器，在受监督的工作池里并发执行。投递语义是
//! 至少一次：成功单条确认，任何消息级失败都拒绝且不重新入队。

pub use dispatch_core::{
    init_logging, ConsumeOptions, DefaultCodec, Delivery, DeliveryStream, DispatchConfig,
    DispatchError, DispatchResult, Executor, LogFormat, LoggingConfig, MessageCodec,
    MessageTransport, Publishing, TaskParam, WireMessage, MESSAGE_UUID_HEADER,
};
pub use dispatch_engine::{
    ExecutorRegistry, ParallelExecutor, ParamPool, PoolStats, PooledParam, TaskConsumer,
    TaskConsumerBuilder, TaskGroup, TaskPanic, TaskProducer, WorkerPool, DEFAULT_EXCHANGE,
};
pub use dispatch_infrastructure::{InMemoryTransport, RabbitMqTransport};
