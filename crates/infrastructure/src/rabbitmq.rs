use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    message::Delivery as LapinDelivery,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
        BasicRejectOptions, QueueDeclareOptions,
    },
    types::{AMQPValue, FieldTable},
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use dispatch_core::{
    ConsumeOptions, Delivery, DeliveryStream, DispatchConfig, DispatchError, DispatchResult,
    MessageTransport, Publishing,
};

/// RabbitMQ传输实现
pub struct RabbitMqTransport {
    connection: Connection,
    channel: Arc<Mutex<Channel>>,
}

impl RabbitMqTransport {
    /// 连接RabbitMQ并打开通道
    pub async fn connect(url: &str) -> DispatchResult<Self> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| DispatchError::MessageQueue(format!("连接RabbitMQ失败: {e}")))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| DispatchError::MessageQueue(format!("创建通道失败: {e}")))?;

        info!("成功连接到RabbitMQ: {}", url);

        Ok(Self {
            connection,
            channel: Arc::new(Mutex::new(channel)),
        })
    }

    pub async fn with_config(config: &DispatchConfig) -> DispatchResult<Self> {
        config.validate()?;
        Self::connect(&config.url).await
    }

    /// 获取连接状态
    pub fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }

    /// 声明队列，消费侧固定使用持久化、非排他、不自动删除的参数
    async fn declare_queue(&self, channel: &Channel, queue: &str) -> DispatchResult<()> {
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    nowait: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| DispatchError::MessageQueue(format!("声明队列 {queue} 失败: {e}")))?;

        debug!("队列 {} 声明成功", queue);
        Ok(())
    }
}

#[async_trait]
impl MessageTransport for RabbitMqTransport {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        mandatory: bool,
        immediate: bool,
        message: Publishing,
    ) -> DispatchResult<()> {
        let channel = self.channel.lock().await;

        let mut headers = FieldTable::default();
        for (key, value) in &message.headers {
            headers.insert(
                key.clone().into(),
                AMQPValue::LongString(value.clone().into()),
            );
        }
        let mut properties = BasicProperties::default().with_headers(headers);
        if message.persistent {
            // 2 = persistent
            properties = properties.with_delivery_mode(2);
        }

        let confirm = channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions {
                    mandatory,
                    immediate,
                },
                &message.payload,
                properties,
            )
            .await
            .map_err(|e| {
                DispatchError::MessageQueue(format!("发布消息到 {exchange}/{routing_key} 失败: {e}"))
            })?;

        confirm
            .await
            .map_err(|e| DispatchError::MessageQueue(format!("消息发布确认失败: {e}")))?;

        debug!("消息已发布: exchange={}, routing_key={}", exchange, routing_key);
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
        options: ConsumeOptions,
    ) -> DispatchResult<DeliveryStream> {
        let channel = self.channel.lock().await;
        self.declare_queue(&channel, queue).await?;

        let consumer = channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions {
                    no_ack: options.auto_ack,
                    exclusive: options.exclusive,
                    no_local: options.no_local,
                    nowait: options.no_wait,
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| DispatchError::MessageQueue(format!("创建消费者失败: {e}")))?;

        debug!("为队列 {} 创建消费者: {}", queue, consumer_tag);

        let stream = consumer.map(|result| match result {
            Ok(delivery) => Ok(Box::new(RabbitMqDelivery::new(delivery)) as Box<dyn Delivery>),
            Err(e) => Err(DispatchError::MessageQueue(format!("接收投递失败: {e}"))),
        });
        Ok(stream.boxed())
    }

    async fn close(&self) -> DispatchResult<()> {
        self.connection
            .close(200, "正常关闭")
            .await
            .map_err(|e| DispatchError::MessageQueue(format!("关闭连接失败: {e}")))?;

        info!("RabbitMQ连接已关闭");
        Ok(())
    }
}

/// 包装lapin投递的应答句柄和负载
struct RabbitMqDelivery {
    payload: Vec<u8>,
    headers: HashMap<String, String>,
    acker: lapin::acker::Acker,
}

impl RabbitMqDelivery {
    fn new(delivery: LapinDelivery) -> Self {
        let headers = convert_headers(delivery.properties.headers());
        Self {
            payload: delivery.data,
            headers,
            acker: delivery.acker,
        }
    }
}

/// AMQP header表转字符串映射，非字符串值跳过并告警
fn convert_headers(headers: &Option<FieldTable>) -> HashMap<String, String> {
    let mut converted = HashMap::new();
    if let Some(table) = headers {
        for (key, value) in table.inner() {
            match value {
                AMQPValue::LongString(s) => {
                    converted.insert(key.to_string(), s.to_string());
                }
                AMQPValue::ShortString(s) => {
                    converted.insert(key.to_string(), s.to_string());
                }
                other => {
                    warn!("跳过非字符串header {}: {:?}", key, other);
                }
            }
        }
    }
    converted
}

#[async_trait]
impl Delivery for RabbitMqDelivery {
    fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    async fn ack(&self, multiple: bool) -> DispatchResult<()> {
        self.acker
            .ack(BasicAckOptions { multiple })
            .await
            .map(|_| ())
            .map_err(|e| DispatchError::MessageQueue(format!("确认消息失败: {e}")))
    }

    async fn nack(&self, multiple: bool, requeue: bool) -> DispatchResult<()> {
        self.acker
            .nack(BasicNackOptions { multiple, requeue })
            .await
            .map(|_| ())
            .map_err(|e| DispatchError::MessageQueue(format!("否定应答失败: {e}")))
    }

    async fn reject(&self, requeue: bool) -> DispatchResult<()> {
        self.acker
            .reject(BasicRejectOptions { requeue })
            .await
            .map(|_| ())
            .map_err(|e| DispatchError::MessageQueue(format!("拒绝消息失败: {e}")))
    }
}
