use anyhow::Context;
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::Message;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};

use crate::config::ConsumerConfig;
use crate::domain::{AuditEvent, AuditEventType};
use crate::lifecycle::Listener;
use crate::metrics::Metrics;

// ============================================================================
// Audit Consumer
// ============================================================================
//
// Reads the audit topic and hands each decoded event to an `AuditHandler`.
// Offsets are stored only after a message was handled; bad messages are
// logged and skipped. Stored offsets are auto-committed in the background
// and committed synchronously on shutdown.
//
// ============================================================================

const SESSION_TIMEOUT_MS: &str = "7000";
const AUTO_COMMIT_INTERVAL_MS: &str = "5000";

pub trait AuditHandler: Send + Sync {
    fn handle(&self, event: &AuditEvent) -> anyhow::Result<()>;
}

/// Logs every event it receives.
pub struct LoggingHandler;

impl AuditHandler for LoggingHandler {
    fn handle(&self, event: &AuditEvent) -> anyhow::Result<()> {
        tracing::info!(
            event_type = event.event_type.as_str(),
            service = %event.service,
            sku_id = %event.payload.sku(),
            timestamp = %event.timestamp,
            "Audit event"
        );
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("message has no payload")]
    Empty,

    #[error("undecodable audit message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("handler failed: {0:#}")]
    Handler(anyhow::Error),
}

/// Decode and handle one message payload.
pub fn process_message(
    payload: Option<&[u8]>,
    handler: &dyn AuditHandler,
    metrics: &Metrics,
) -> Result<AuditEventType, ProcessError> {
    let bytes = payload.ok_or(ProcessError::Empty)?;

    let event = AuditEvent::decode(bytes).inspect_err(|_| metrics.record_decode_failure())?;
    handler.handle(&event).map_err(ProcessError::Handler)?;

    metrics.record_consumed(event.event_type.as_str());
    Ok(event.event_type)
}

pub struct AuditConsumer {
    consumer: StreamConsumer,
    handler: Box<dyn AuditHandler>,
    metrics: Arc<Metrics>,
    shutdown_timeout: Duration,
    stop: Notify,
    stopped: watch::Sender<bool>,
}

impl AuditConsumer {
    pub fn new(
        config: &ConsumerConfig,
        handler: impl AuditHandler + 'static,
        metrics: Arc<Metrics>,
    ) -> anyhow::Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.consumer_group)
            .set("session.timeout.ms", SESSION_TIMEOUT_MS)
            .set("enable.auto.offset.store", "false")
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", AUTO_COMMIT_INTERVAL_MS)
            .set("auto.offset.reset", "earliest")
            .create()
            .context("failed to create audit consumer")?;

        consumer
            .subscribe(&[config.topic.as_str()])
            .with_context(|| format!("failed to subscribe to {}", config.topic))?;

        tracing::info!(
            brokers = %config.brokers,
            topic = %config.topic,
            group = %config.consumer_group,
            "Audit consumer subscribed"
        );

        let (stopped, _) = watch::channel(false);
        Ok(Self {
            consumer,
            handler: Box::new(handler),
            metrics,
            shutdown_timeout: Duration::from_secs(config.shutdown_secs),
            stop: Notify::new(),
            stopped,
        })
    }

    fn commit(&self) {
        match self.consumer.commit_consumer_state(CommitMode::Sync) {
            Ok(()) => tracing::info!("Committed consumer offsets"),
            Err(KafkaError::ConsumerCommit(RDKafkaErrorCode::NoOffset)) => {
                tracing::debug!("No new offsets to commit")
            }
            Err(e) => tracing::warn!(error = %e, "Final offset commit failed"),
        }
    }
}

#[async_trait(?Send)]
impl Listener for AuditConsumer {
    fn name(&self) -> &str {
        "audit-consumer"
    }

    fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    async fn serve(&self) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                _ = self.stop.notified() => break,
                received = self.consumer.recv() => {
                    let message = match received {
                        Ok(message) => message,
                        Err(e) => {
                            tracing::warn!(error = %e, "Kafka receive error");
                            continue;
                        }
                    };

                    match process_message(message.payload(), self.handler.as_ref(), &self.metrics) {
                        Ok(_) => {
                            if let Err(e) = self.consumer.store_offset_from_message(&message) {
                                tracing::warn!(error = %e, offset = message.offset(), "Failed to store offset");
                            }
                        }
                        Err(e) => tracing::warn!(
                            partition = message.partition(),
                            offset = message.offset(),
                            error = %e,
                            "Skipping audit message"
                        ),
                    }
                }
            }
        }

        self.commit();
        self.stopped.send_replace(true);
        Ok(())
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        self.stop.notify_one();

        let mut stopped = self.stopped.subscribe();
        stopped
            .wait_for(|done| *done)
            .await
            .context("audit consumer dropped before stopping")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<AuditEventType>>,
    }

    impl AuditHandler for Recorder {
        fn handle(&self, event: &AuditEvent) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push(event.event_type);
            Ok(())
        }
    }

    struct Failing;

    impl AuditHandler for Failing {
        fn handle(&self, _event: &AuditEvent) -> anyhow::Result<()> {
            anyhow::bail!("sink unavailable")
        }
    }

    const SKU_CREATED: &str = r#"{
        "type": "sku_created",
        "service": "stock",
        "timestamp": "2024-05-01T10:00:00Z",
        "payload": {"sku": 1001, "count": 10, "price": 12}
    }"#;

    #[test]
    fn test_valid_message_is_handled_and_counted() {
        let metrics = Metrics::new().unwrap();
        let handler = Recorder::default();

        let event_type = process_message(Some(SKU_CREATED.as_bytes()), &handler, &metrics).unwrap();

        assert_eq!(event_type, AuditEventType::SkuCreated);
        assert_eq!(*handler.seen.lock().unwrap(), vec![AuditEventType::SkuCreated]);
        assert_eq!(metrics.audit_events_consumed.with_label_values(&["sku_created"]).get(), 1);
    }

    #[test]
    fn test_garbage_is_a_decode_failure_not_a_panic() {
        let metrics = Metrics::new().unwrap();
        let handler = Recorder::default();

        let err = process_message(Some(b"not json"), &handler, &metrics).unwrap_err();

        assert!(matches!(err, ProcessError::Decode(_)));
        assert!(handler.seen.lock().unwrap().is_empty());
        assert_eq!(metrics.audit_decode_failures.get(), 1);
    }

    #[test]
    fn test_empty_and_handler_failures_are_reported() {
        let metrics = Metrics::new().unwrap();

        assert!(matches!(
            process_message(None, &LoggingHandler, &metrics),
            Err(ProcessError::Empty)
        ));
        assert!(matches!(
            process_message(Some(SKU_CREATED.as_bytes()), &Failing, &metrics),
            Err(ProcessError::Handler(_))
        ));
        assert_eq!(metrics.audit_events_consumed.with_label_values(&["sku_created"]).get(), 0);
    }
}
