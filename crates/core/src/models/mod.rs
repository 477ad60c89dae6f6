pub mod envelope;
pub mod param;

pub use envelope::{Publishing, WireMessage, MESSAGE_UUID_HEADER};
pub use param::TaskParam;
