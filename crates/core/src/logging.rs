use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::{DispatchError, DispatchResult};

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

/// 初始化全局tracing订阅器
///
/// 重复初始化返回配置错误而不是panic，便于在测试中容忍多次调用。
pub fn init_logging(config: &LoggingConfig) -> DispatchResult<()> {
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| DispatchError::Configuration(format!("无效的日志级别 {}: {e}", config.level)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    result.map_err(|e| DispatchError::Configuration(format!("初始化日志失败: {e}")))
}
