pub mod in_memory;
pub mod rabbitmq;

pub use in_memory::InMemoryTransport;
pub use rabbitmq::RabbitMqTransport;
