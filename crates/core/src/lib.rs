pub mod codec;
pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod traits;

pub use codec::{DefaultCodec, MessageCodec};
pub use config::DispatchConfig;
pub use errors::{DispatchError, DispatchResult};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use models::{Publishing, TaskParam, WireMessage, MESSAGE_UUID_HEADER};
pub use traits::{ConsumeOptions, Delivery, DeliveryStream, Executor, MessageTransport};
