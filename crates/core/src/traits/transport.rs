//! 传输层接口定义
//!
//! 引擎只依赖三个传输操作：发布、打开消费流、关闭。具体的连接和
//! 通道生命周期由实现方（RabbitMQ、内存队列等）自己管理。

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::models::Publishing;
use crate::DispatchResult;

/// 打开消费流的参数
#[derive(Debug, Clone, Default)]
pub struct ConsumeOptions {
    /// 是否自动应答（引擎固定使用手动应答）
    pub auto_ack: bool,
    /// 是否具有排他性
    pub exclusive: bool,
    /// 为true时同一连接发送的消息不会投递给同一连接的消费者
    pub no_local: bool,
    /// 是否非阻塞
    pub no_wait: bool,
    /// 额外属性
    pub args: HashMap<String, String>,
}

/// 一条已投递、待应答的消息
#[async_trait]
pub trait Delivery: Send + Sync {
    fn payload(&self) -> &[u8];

    fn headers(&self) -> &HashMap<String, String>;

    /// 确认本条消息，multiple为true时批量确认当前通道所有未应答消息
    async fn ack(&self, multiple: bool) -> DispatchResult<()>;

    /// 否定应答。requeue为true时消息重新排队给其他消费者
    async fn nack(&self, multiple: bool, requeue: bool) -> DispatchResult<()>;

    /// 拒绝本条消息。requeue为false或服务器无法重新排队时消息被丢弃
    async fn reject(&self, requeue: bool) -> DispatchResult<()>;
}

/// 消费流：产生 `Err` 或结束都会让消费者回到重新订阅
pub type DeliveryStream = BoxStream<'static, DispatchResult<Box<dyn Delivery>>>;

/// 消息传输契约
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// 发布一条消息
    ///
    /// `mandatory`/`immediate` 为投递提示：无法路由或无消费者时是否
    /// 退回给发送方。引擎固定传false，无法投递的消息由broker静默丢弃。
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        mandatory: bool,
        immediate: bool,
        message: Publishing,
    ) -> DispatchResult<()>;

    /// 为指定队列打开消费流
    async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
        options: ConsumeOptions,
    ) -> DispatchResult<DeliveryStream>;

    /// 关闭传输连接
    async fn close(&self) -> DispatchResult<()>;
}
