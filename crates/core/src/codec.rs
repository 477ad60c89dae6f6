use std::collections::HashMap;

use crate::models::{Publishing, WireMessage, MESSAGE_UUID_HEADER};
use crate::DispatchResult;

/// 消息编解码器：在信封和传输层消息体之间转换
///
/// 生产者用 `encode` 把信封装配成待发布消息，消费者用 `decode`
/// 从投递的负载和header还原信封。
pub trait MessageCodec: Send + Sync {
    fn encode(&self, message: &WireMessage) -> DispatchResult<Publishing>;
    fn decode(
        &self,
        payload: &[u8],
        headers: &HashMap<String, String>,
    ) -> DispatchResult<WireMessage>;
}

/// 默认编解码实现
///
/// 消息标识写入固定header键，其余header原样透传为元数据。
#[derive(Debug, Clone, Default)]
pub struct DefaultCodec {
    /// 覆盖默认的uuid header键
    pub uuid_header: Option<String>,
    /// 关闭持久化投递模式
    pub not_persistent: bool,
}

impl DefaultCodec {
    pub fn new() -> Self {
        Self::default()
    }

    fn uuid_header_key(&self) -> &str {
        self.uuid_header.as_deref().unwrap_or(MESSAGE_UUID_HEADER)
    }
}

impl MessageCodec for DefaultCodec {
    fn encode(&self, message: &WireMessage) -> DispatchResult<Publishing> {
        let mut headers = HashMap::with_capacity(message.metadata.len() + 1);
        for (key, value) in &message.metadata {
            headers.insert(key.clone(), value.clone());
        }
        headers.insert(self.uuid_header_key().to_string(), message.uuid.clone());

        Ok(Publishing {
            payload: message.payload.clone(),
            headers,
            persistent: !self.not_persistent,
        })
    }

    fn decode(
        &self,
        payload: &[u8],
        headers: &HashMap<String, String>,
    ) -> DispatchResult<WireMessage> {
        // header缺失时uuid为空串，不视为错误
        let uuid = headers
            .get(self.uuid_header_key())
            .cloned()
            .unwrap_or_default();

        let mut message = WireMessage::new(uuid, payload.to_vec());
        for (key, value) in headers {
            if key == self.uuid_header_key() {
                continue;
            }
            message.metadata.insert(key.clone(), value.clone());
        }
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_sets_uuid_header() {
        let codec = DefaultCodec::new();
        let message = WireMessage::new("uuid-1", b"payload".to_vec()).with_metadata("k", "v");

        let publishing = codec.encode(&message).unwrap();
        assert_eq!(publishing.payload, b"payload");
        assert_eq!(
            publishing.headers.get(MESSAGE_UUID_HEADER),
            Some(&"uuid-1".to_string())
        );
        assert_eq!(publishing.headers.get("k"), Some(&"v".to_string()));
        assert!(publishing.persistent);
    }

    #[test]
    fn test_decode_round_trip() {
        let codec = DefaultCodec::new();
        let message = WireMessage::new("uuid-2", b"body".to_vec()).with_metadata("trace", "abc");

        let publishing = codec.encode(&message).unwrap();
        let decoded = codec
            .decode(&publishing.payload, &publishing.headers)
            .unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_decode_missing_uuid_header() {
        let codec = DefaultCodec::new();
        let decoded = codec.decode(b"body", &HashMap::new()).unwrap();
        assert!(decoded.uuid.is_empty());
        assert_eq!(decoded.payload, b"body");
    }

    #[test]
    fn test_custom_uuid_header() {
        let codec = DefaultCodec {
            uuid_header: Some("x-msg-id".to_string()),
            not_persistent: true,
        };
        let message = WireMessage::new("uuid-3", Vec::new());

        let publishing = codec.encode(&message).unwrap();
        assert_eq!(
            publishing.headers.get("x-msg-id"),
            Some(&"uuid-3".to_string())
        );
        assert!(!publishing.persistent);

        let decoded = codec
            .decode(&publishing.payload, &publishing.headers)
            .unwrap();
        assert_eq!(decoded.uuid, "uuid-3");
        assert!(decoded.metadata.is_empty());
    }
}
