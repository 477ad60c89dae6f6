pub mod consumer;
pub mod group;
pub mod parallel;
pub mod param_pool;
pub mod pool;
pub mod producer;
pub mod registry;

pub use consumer::{TaskConsumer, TaskConsumerBuilder};
pub use group::TaskGroup;
pub use parallel::ParallelExecutor;
pub use param_pool::{ParamPool, PoolStats, PooledParam};
pub use pool::{TaskPanic, WorkerPool};
pub use producer::{TaskProducer, DEFAULT_EXCHANGE};
pub use registry::ExecutorRegistry;
