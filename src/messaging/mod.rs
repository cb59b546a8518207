pub mod consumer;
pub mod kafka;
pub mod producer;

use futures_util::future::BoxFuture;
use std::time::Duration;

use crate::domain::AuditPayload;

pub use consumer::{AuditConsumer, AuditHandler, LoggingHandler};
pub use kafka::KafkaBus;
pub use producer::{EventProducer, ProducerSettings};

// ============================================================================
// Messaging - audit events out to the bus, and back in for the consumer
// ============================================================================

/// Fire-and-forget audit sink used by the engines.
///
/// `emit` never fails and never waits for delivery.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, payload: AuditPayload);
}

/// Resolves once the bus acknowledges (or rejects) a single message.
pub type DeliveryAck = BoxFuture<'static, Result<(), BusError>>;

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("producer queue is full")]
    QueueFull,

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("delivery acknowledgement dropped")]
    Canceled,

    #[error(transparent)]
    Kafka(#[from] rdkafka::error::KafkaError),
}

/// Minimal producer surface the `EventProducer` needs from a bus client.
pub trait BusClient: Send + Sync + 'static {
    /// Hand a message to the client without waiting for delivery.
    fn enqueue(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<DeliveryAck, BusError>;

    /// Block until queued messages are delivered or `timeout` passes.
    fn flush(&self, timeout: Duration) -> Result<(), BusError>;
}
