use rdkafka::config::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::time::Duration;

use super::{BusClient, BusError, DeliveryAck};
use crate::config::KafkaArgs;

/// `BusClient` over an rdkafka `FutureProducer`.
pub struct KafkaBus {
    producer: FutureProducer,
}

impl KafkaBus {
    pub fn new(args: &KafkaArgs) -> Result<Self, BusError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &args.brokers)
            .set("message.timeout.ms", args.message_timeout_ms.to_string())
            .create()?;

        tracing::info!(brokers = %args.brokers, topic = %args.topic, "Kafka producer created");
        Ok(Self { producer })
    }
}

impl BusClient for KafkaBus {
    fn enqueue(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<DeliveryAck, BusError> {
        let record = FutureRecord::<str, [u8]>::to(topic).key(key).payload(payload.as_slice());

        match self.producer.send_result(record) {
            Ok(delivery) => Ok(Box::pin(async move {
                match delivery.await {
                    Ok(Ok(_)) => Ok(()),
                    Ok(Err((e, _))) => Err(BusError::Delivery(e.to_string())),
                    Err(_) => Err(BusError::Canceled),
                }
            })),
            Err((KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull), _)) => Err(BusError::QueueFull),
            Err((e, _)) => Err(BusError::Kafka(e)),
        }
    }

    fn flush(&self, timeout: Duration) -> Result<(), BusError> {
        self.producer.flush(Timeout::After(timeout))?;
        Ok(())
    }
}
