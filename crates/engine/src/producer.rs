//! 任务生产者
//!
//! 校验并序列化任务描述符，装入携带新生成消息标识的信封，
//! 通过固定exchange和调用方给定的routing key发布。投递提示
//! （mandatory/immediate）固定关闭：无法投递的消息由broker
//! 静默丢弃而不是退回。

use std::sync::Arc;

use tokio_util::task::TaskTracker;
use uuid::Uuid;

use dispatch_core::{
    DefaultCodec, DispatchConfig, DispatchResult, MessageCodec, MessageTransport, TaskParam,
    WireMessage,
};

use crate::param_pool::{ParamPool, PooledParam};

/// 生产者默认使用的exchange
pub const DEFAULT_EXCHANGE: &str = "dispatch.async";

/// 任务生产者
pub struct TaskProducer {
    exchange: String,
    codec: Arc<dyn MessageCodec>,
    params: Arc<ParamPool>,
    /// 在途发布计数，close时排空
    in_flight: TaskTracker,
}

impl TaskProducer {
    pub fn new() -> Self {
        Self {
            exchange: DEFAULT_EXCHANGE.to_string(),
            codec: Arc::new(DefaultCodec::new()),
            params: Arc::new(ParamPool::new(128)),
            in_flight: TaskTracker::new(),
        }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new().with_exchange(config.exchange.clone())
    }

    pub fn with_exchange<S: Into<String>>(mut self, exchange: S) -> Self {
        self.exchange = exchange.into();
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn MessageCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// 从对象池取一个空白描述符
    pub fn get_param(&self) -> PooledParam {
        self.params.get_pooled()
    }

    /// 发布一个任务描述符
    ///
    /// 只有本地的校验/序列化/传输调用失败会同步返回错误，
    /// 没有broker侧的投递确认。
    pub async fn publish(
        &self,
        transport: &dyn MessageTransport,
        routing_key: &str,
        param: &TaskParam,
    ) -> DispatchResult<()> {
        let _in_flight = self.in_flight.token();

        param.validate()?;
        let payload = param.encode()?;
        let message = WireMessage::new(Uuid::new_v4().to_string(), payload);
        let publishing = self.codec.encode(&message)?;

        transport
            .publish(&self.exchange, routing_key, false, false, publishing)
            .await
    }

    /// 阻塞到所有在途的publish调用完成
    ///
    /// 尽力而为的排空，不保证broker侧已落盘。
    pub async fn close(&self) {
        self.in_flight.close();
        self.in_flight.wait().await;
    }
}

impl Default for TaskProducer {
    fn default() -> Self {
        Self::new()
    }
}
