use std::collections::HashMap;

/// 携带消息唯一标识的固定header键
pub const MESSAGE_UUID_HEADER: &str = "_message_uuid";

/// 传输中立的消息信封：负载 + 关联ID + 透传元数据
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WireMessage {
    pub uuid: String,
    pub metadata: HashMap<String, String>,
    pub payload: Vec<u8>,
}

impl WireMessage {
    pub fn new<S: Into<String>>(uuid: S, payload: Vec<u8>) -> Self {
        Self {
            uuid: uuid.into(),
            metadata: HashMap::new(),
            payload,
        }
    }

    pub fn with_metadata<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// 实际交给传输层发布的消息体
#[derive(Debug, Clone, PartialEq)]
pub struct Publishing {
    pub payload: Vec<u8>,
    pub headers: HashMap<String, String>,
    /// 映射为AMQP delivery mode 2
    pub persistent: bool,
}

impl Default for Publishing {
    fn default() -> Self {
        Self {
            payload: Vec::new(),
            headers: HashMap::new(),
            persistent: true,
        }
    }
}
