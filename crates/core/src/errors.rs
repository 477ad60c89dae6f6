use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("消息队列错误: {0}")]
    MessageQueue(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("数据验证失败: {0}")]
    Validation(String),
    #[error("执行器未注册: {name}")]
    ExecutorNotRegistered { name: String },
    #[error("执行器重复注册: {name}")]
    DuplicateExecutor { name: String },
    #[error("任务执行错误: {0}")]
    TaskExecution(String),
    #[error("任务发生panic: {0}")]
    TaskPanicked(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type DispatchResult<T> = Result<T, DispatchError>;

impl DispatchError {
    pub fn message_queue<S: Into<String>>(msg: S) -> Self {
        Self::MessageQueue(msg.into())
    }
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        Self::Serialization(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }
    pub fn executor_not_registered<S: Into<String>>(name: S) -> Self {
        Self::ExecutorNotRegistered { name: name.into() }
    }
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DispatchError::Configuration(_) | DispatchError::DuplicateExecutor { .. }
        )
    }
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::MessageQueue(_))
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        DispatchError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for DispatchError {
    fn from(err: anyhow::Error) -> Self {
        DispatchError::Internal(err.to_string())
    }
}
