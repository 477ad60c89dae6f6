pub mod executor;
pub mod transport;

pub use executor::Executor;
pub use transport::{ConsumeOptions, Delivery, DeliveryStream, MessageTransport};
