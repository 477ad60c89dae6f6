use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{DispatchError, DispatchResult};

/// 任务描述符
///
/// 生产者构造并序列化的命名工作单元，消费者反序列化后交给
/// 对应的执行器消费。`name` 是执行器注册表的唯一键；`data`
/// 是不透明的字节负载，仅由执行器自己解释。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskParam {
    /// 任务类型标识，必填
    pub name: String,
    /// 自由格式的元数据，顺序无关
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// 不透明的字节负载
    #[serde(default)]
    pub data: Vec<u8>,
}

impl TaskParam {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            metadata: HashMap::new(),
            data: Vec::new(),
        }
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    pub fn with_metadata<S: Into<String>>(mut self, key: S, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// 结构校验：必填字段齐全
    pub fn validate(&self) -> DispatchResult<()> {
        if self.name.is_empty() {
            return Err(DispatchError::validation_error("任务名称不能为空"));
        }
        Ok(())
    }

    /// 从字节负载反序列化到当前实例（池化实例复用路径）
    pub fn decode_from(&mut self, payload: &[u8]) -> DispatchResult<()> {
        *self = serde_json::from_slice(payload)?;
        Ok(())
    }

    pub fn encode(&self) -> DispatchResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// 清空所有字段，归还对象池前调用
    pub fn reset(&mut self) {
        self.name.clear();
        self.metadata.clear();
        self.data.clear();
    }
}
