//! 任务消费者
//!
//! 一个监督循环驱动每个队列订阅：打开消费流，把收到的每条投递
//! 提交到工作池处理（收取和处理解耦，循环不会阻塞在单条消息上），
//! 流断开后回到重新订阅。外层取消令牌一旦触发，循环不再重订阅。
//!
//! 订阅循环和消息处理运行在两个独立的可取消作用域里，关停时先
//! 停订阅循环、再排空在途消息，两者互不等待对方的生命周期。
//!
//! 每条消息的处理结果是二元的：成功则单条确认，任何失败（解码、
//! 校验、未注册、执行器报错）都拒绝且不重新入队——畸形或无法路由
//! 的消息如果重新入队会在broker和消费者之间永远循环。

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use dispatch_core::{
    ConsumeOptions, DefaultCodec, Delivery, DispatchConfig, DispatchResult, Executor,
    MessageCodec, MessageTransport,
};

use crate::param_pool::{ParamPool, PoolStats};
use crate::pool::WorkerPool;
use crate::registry::ExecutorRegistry;

/// 任务消费者构建器
///
/// 执行器在构建阶段注册，`build` 之后注册表被冻结。
pub struct TaskConsumerBuilder {
    registry: ExecutorRegistry,
    codec: Arc<dyn MessageCodec>,
    param_pool_size: usize,
    resubscribe_delay: Duration,
    parent: CancellationToken,
}

impl TaskConsumerBuilder {
    pub fn new() -> Self {
        Self {
            registry: ExecutorRegistry::new(),
            codec: Arc::new(DefaultCodec::new()),
            param_pool_size: 128,
            resubscribe_delay: Duration::from_secs(1),
            parent: CancellationToken::new(),
        }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new()
            .param_pool_size(config.param_pool_size)
            .resubscribe_delay(Duration::from_millis(config.resubscribe_delay_ms))
    }

    /// 绑定到外部根取消令牌
    pub fn parent_token(mut self, parent: CancellationToken) -> Self {
        self.parent = parent;
        self
    }

    pub fn codec(mut self, codec: Arc<dyn MessageCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn param_pool_size(mut self, size: usize) -> Self {
        self.param_pool_size = size;
        self
    }

    /// 消费流断开后重新订阅前的等待时间，零表示立即重试
    pub fn resubscribe_delay(mut self, delay: Duration) -> Self {
        self.resubscribe_delay = delay;
        self
    }

    /// 注册一个执行器，标识重复时立即失败
    pub fn register_executor(mut self, executor: Box<dyn Executor>) -> DispatchResult<Self> {
        self.registry.register(executor)?;
        Ok(self)
    }

    /// 使用预先构建的注册表
    pub fn registry(mut self, registry: ExecutorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn build(self) -> TaskConsumer {
        TaskConsumer {
            registry: Arc::new(self.registry),
            codec: self.codec,
            params: Arc::new(ParamPool::new(self.param_pool_size)),
            subscription: WorkerPool::new(&self.parent),
            workers: WorkerPool::new(&self.parent),
            resubscribe_delay: self.resubscribe_delay,
        }
    }
}

impl Default for TaskConsumerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 任务消费者
pub struct TaskConsumer {
    registry: Arc<ExecutorRegistry>,
    codec: Arc<dyn MessageCodec>,
    params: Arc<ParamPool>,
    /// 订阅循环作用域
    subscription: WorkerPool,
    /// 消息处理作用域，与订阅循环独立取消
    workers: WorkerPool,
    resubscribe_delay: Duration,
}

impl TaskConsumer {
    pub fn builder() -> TaskConsumerBuilder {
        TaskConsumerBuilder::new()
    }

    /// 为指定队列启动订阅循环，立即返回
    pub fn subscribe(&self, transport: Arc<dyn MessageTransport>, queue: impl Into<String>) {
        let queue = queue.into();
        let registry = self.registry.clone();
        let codec = self.codec.clone();
        let params = self.params.clone();
        let workers = self.workers.clone();
        let delay = self.resubscribe_delay;

        self.subscription.spawn(move |ctx| async move {
            // 用来区分多个消费者
            let consumer_tag = format!("consumer.{queue}");
            loop {
                if ctx.is_cancelled() {
                    return;
                }
                let stream = match transport
                    .consume(&queue, &consumer_tag, ConsumeOptions::default())
                    .await
                {
                    Ok(stream) => stream,
                    Err(e) => {
                        error!("打开队列 {} 的消费流失败: {}", queue, e);
                        if !wait_before_resubscribe(&ctx, delay).await {
                            return;
                        }
                        continue;
                    }
                };
                info!("开始消费队列: {}", queue);

                let mut stream = stream;
                loop {
                    tokio::select! {
                        _ = ctx.cancelled() => return,
                        item = stream.next() => match item {
                            Some(Ok(delivery)) => {
                                let registry = registry.clone();
                                let codec = codec.clone();
                                let params = params.clone();
                                workers.spawn(move |worker_ctx| async move {
                                    if let Err(e) =
                                        handle(worker_ctx, registry, codec, params, delivery).await
                                    {
                                        error!("处理消息失败: {}", e);
                                    }
                                });
                            }
                            Some(Err(e)) => {
                                error!("消费流错误: {}", e);
                                break;
                            }
                            None => {
                                warn!("队列 {} 的消费流已关闭", queue);
                                break;
                            }
                        }
                    }
                }

                if !wait_before_resubscribe(&ctx, delay).await {
                    return;
                }
            }
        });
    }

    /// 关停：先停订阅循环，再排空在途的消息处理
    pub async fn shutdown(&self) {
        self.subscription.stop().await;
        self.workers.wait().await;
    }

    pub fn param_pool_stats(&self) -> PoolStats {
        self.params.stats()
    }
}

/// 重订阅前的可取消等待，返回false表示外层已取消
async fn wait_before_resubscribe(ctx: &CancellationToken, delay: Duration) -> bool {
    if delay.is_zero() {
        return !ctx.is_cancelled();
    }
    tokio::select! {
        _ = ctx.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// 处理单条投递
///
/// 返回的错误只会来自ack/reject本身的失败，消息级失败在这里
/// 终结：拒绝且不重新入队，然后正常返回。
async fn handle(
    ctx: CancellationToken,
    registry: Arc<ExecutorRegistry>,
    codec: Arc<dyn MessageCodec>,
    params: Arc<ParamPool>,
    delivery: Box<dyn Delivery>,
) -> DispatchResult<()> {
    let message = match codec.decode(delivery.payload(), delivery.headers()) {
        Ok(message) => message,
        Err(e) => {
            error!("解码投递消息失败: {}", e);
            // requeue为false或服务器无法重新排队时，消息被丢弃
            return delivery.reject(false).await;
        }
    };
    debug!("consume uuid {} body {} bytes", message.uuid, message.payload.len());

    // param守卫在函数返回时自动归还对象池，无论成败
    let mut param = params.get_pooled();
    if let Err(e) = param.decode_from(&message.payload) {
        error!("解析任务描述符失败: {}", e);
        return delivery.reject(false).await;
    }
    if let Err(e) = param.validate() {
        error!("任务描述符校验失败: {}", e);
        return delivery.reject(false).await;
    }

    match registry.run(ctx, &param).await {
        Ok(()) => {
            // 手动确认当前条目，不做批量确认
            delivery.ack(false).await
        }
        Err(e) => {
            error!("任务 {} 执行失败: {}", param.name, e);
            delivery.reject(false).await
        }
    }
}
