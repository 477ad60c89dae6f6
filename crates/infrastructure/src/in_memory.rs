//! 内存消息传输
//!
//! 使用tokio channel实现的传输层，适用于嵌入式部署和测试。
//! 按routing key路由到同名队列（与AMQP默认exchange的语义一致），
//! 并用原子计数器记录每次ack/nack/reject调用，测试可以据此断言
//! 引擎的应答决策。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::debug;

use dispatch_core::{
    ConsumeOptions, Delivery, DeliveryStream, DispatchError, DispatchResult, MessageTransport,
    Publishing,
};

#[derive(Default)]
struct TransportCounters {
    published: AtomicUsize,
    acked: AtomicUsize,
    nacked: AtomicUsize,
    rejected: AtomicUsize,
}

struct StoredMessage {
    payload: Vec<u8>,
    headers: HashMap<String, String>,
}

struct QueueChannel {
    sender: mpsc::UnboundedSender<StoredMessage>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<StoredMessage>>>,
}

/// 内存消息传输实现
pub struct InMemoryTransport {
    queues: RwLock<HashMap<String, QueueChannel>>,
    counters: Arc<TransportCounters>,
    closed: AtomicBool,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            counters: Arc::new(TransportCounters::default()),
            closed: AtomicBool::new(false),
        }
    }

    async fn ensure_queue(&self, queue: &str) {
        {
            let queues = self.queues.read().await;
            if queues.contains_key(queue) {
                return;
            }
        }
        let mut queues = self.queues.write().await;
        queues.entry(queue.to_string()).or_insert_with(|| {
            debug!("创建内存队列: {}", queue);
            let (sender, receiver) = mpsc::unbounded_channel();
            QueueChannel {
                sender,
                receiver: Arc::new(Mutex::new(receiver)),
            }
        });
    }

    pub fn published_count(&self) -> usize {
        self.counters.published.load(Ordering::SeqCst)
    }

    pub fn ack_count(&self) -> usize {
        self.counters.acked.load(Ordering::SeqCst)
    }

    pub fn nack_count(&self) -> usize {
        self.counters.nacked.load(Ordering::SeqCst)
    }

    pub fn reject_count(&self) -> usize {
        self.counters.rejected.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageTransport for InMemoryTransport {
    async fn publish(
        &self,
        _exchange: &str,
        routing_key: &str,
        _mandatory: bool,
        _immediate: bool,
        message: Publishing,
    ) -> DispatchResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DispatchError::message_queue("传输已关闭"));
        }
        self.ensure_queue(routing_key).await;

        let queues = self.queues.read().await;
        let channel = queues
            .get(routing_key)
            .ok_or_else(|| DispatchError::message_queue(format!("队列 {routing_key} 不存在")))?;
        channel
            .sender
            .send(StoredMessage {
                payload: message.payload,
                headers: message.headers,
            })
            .map_err(|e| DispatchError::MessageQueue(format!("投递到内存队列失败: {e}")))?;

        self.counters.published.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        _consumer_tag: &str,
        _options: ConsumeOptions,
    ) -> DispatchResult<DeliveryStream> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DispatchError::message_queue("传输已关闭"));
        }
        self.ensure_queue(queue).await;

        let receiver = {
            let queues = self.queues.read().await;
            let channel = queues
                .get(queue)
                .ok_or_else(|| DispatchError::message_queue(format!("队列 {queue} 不存在")))?;
            channel.receiver.clone()
        };

        let counters = self.counters.clone();
        let stream = futures::stream::unfold(receiver, move |receiver| {
            let counters = counters.clone();
            async move {
                let message = receiver.lock().await.recv().await?;
                let delivery: Box<dyn Delivery> = Box::new(InMemoryDelivery {
                    payload: message.payload,
                    headers: message.headers,
                    counters,
                });
                Some((Ok(delivery), receiver))
            }
        });
        Ok(stream.boxed())
    }

    async fn close(&self) -> DispatchResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        // 丢弃发送端，消费流在读完剩余消息后结束
        let mut queues = self.queues.write().await;
        queues.clear();
        Ok(())
    }
}

struct InMemoryDelivery {
    payload: Vec<u8>,
    headers: HashMap<String, String>,
    counters: Arc<TransportCounters>,
}

#[async_trait]
impl Delivery for InMemoryDelivery {
    fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    async fn ack(&self, _multiple: bool) -> DispatchResult<()> {
        self.counters.acked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn nack(&self, _multiple: bool, _requeue: bool) -> DispatchResult<()> {
        self.counters.nacked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn reject(&self, _requeue: bool) -> DispatchResult<()> {
        self.counters.rejected.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publishing(payload: &[u8]) -> Publishing {
        Publishing {
            payload: payload.to_vec(),
            headers: HashMap::new(),
            persistent: true,
        }
    }

    #[tokio::test]
    async fn test_publish_then_consume() {
        let transport = InMemoryTransport::new();
        transport
            .publish("", "demo.queue", false, false, publishing(b"one"))
            .await
            .unwrap();
        transport
            .publish("", "demo.queue", false, false, publishing(b"two"))
            .await
            .unwrap();
        assert_eq!(transport.published_count(), 2);

        let mut stream = transport
            .consume("demo.queue", "consumer.demo.queue", ConsumeOptions::default())
            .await
            .unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.payload(), b"one");
        first.ack(false).await.unwrap();

        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.payload(), b"two");
        second.reject(false).await.unwrap();

        assert_eq!(transport.ack_count(), 1);
        assert_eq!(transport.reject_count(), 1);
        assert_eq!(transport.nack_count(), 0);
    }

    #[tokio::test]
    async fn test_publish_after_close_fails() {
        let transport = InMemoryTransport::new();
        transport.close().await.unwrap();

        let err = transport
            .publish("", "demo.queue", false, false, publishing(b"late"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::MessageQueue(_)));
    }

    #[tokio::test]
    async fn test_close_ends_consume_stream() {
        let transport = InMemoryTransport::new();
        let mut stream = transport
            .consume("demo.queue", "consumer.demo.queue", ConsumeOptions::default())
            .await
            .unwrap();

        transport.close().await.unwrap();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_headers_pass_through() {
        let transport = InMemoryTransport::new();
        let mut message = publishing(b"body");
        message
            .headers
            .insert("trace".to_string(), "abc".to_string());
        transport
            .publish("", "demo.queue", false, false, message)
            .await
            .unwrap();

        let mut stream = transport
            .consume("demo.queue", "consumer.demo.queue", ConsumeOptions::default())
            .await
            .unwrap();
        let delivery = stream.next().await.unwrap().unwrap();
        assert_eq!(delivery.headers().get("trace"), Some(&"abc".to_string()));
    }
}
