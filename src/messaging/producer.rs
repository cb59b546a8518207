use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};

use super::{BusClient, EventEmitter};
use crate::domain::{AuditEvent, AuditPayload};
use crate::metrics::Metrics;

// ============================================================================
// Event Producer - bounded fire-and-forget audit publishing
// ============================================================================
//
// emit():
//   1. wrap the payload in the envelope and serialize it
//   2. take an in-flight permit; none left means the event is dropped
//   3. hand the bytes to the bus client
//   4. spawn a watcher holding the permit until the ack arrives or the
//      producer is closed
//
// close() flushes once, then releases every watcher still waiting.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct ProducerSettings {
    pub service: String,
    pub topic: String,
    pub max_in_flight: usize,
    pub flush_timeout: Duration,
}

pub struct EventProducer<C: BusClient> {
    client: Arc<C>,
    settings: ProducerSettings,
    in_flight: Arc<Semaphore>,
    cancel: watch::Sender<bool>,
    closed: AtomicBool,
    metrics: Arc<Metrics>,
}

impl<C: BusClient> EventProducer<C> {
    pub fn new(client: C, settings: ProducerSettings, metrics: Arc<Metrics>) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            client: Arc::new(client),
            in_flight: Arc::new(Semaphore::new(settings.max_in_flight)),
            settings,
            cancel,
            closed: AtomicBool::new(false),
            metrics,
        }
    }

    /// Flush pending messages within the configured timeout and stop all
    /// delivery watchers. Only the first call does anything.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            tracing::warn!("Event producer already closed");
            return;
        }

        let client = self.client.clone();
        let timeout = self.settings.flush_timeout;
        tracing::info!(timeout_ms = timeout.as_millis() as u64, "Flushing audit events");

        match tokio::task::spawn_blocking(move || client.flush(timeout)).await {
            Ok(Ok(())) => tracing::info!("Audit events flushed"),
            Ok(Err(e)) => tracing::error!(error = %e, "Audit flush failed"),
            Err(e) => tracing::error!(error = %e, "Audit flush task panicked"),
        }

        self.cancel.send_replace(true);
    }

    /// Events handed to the bus and not yet acknowledged.
    pub fn in_flight(&self) -> usize {
        self.settings.max_in_flight - self.in_flight.available_permits()
    }
}

impl<C: BusClient> EventEmitter for EventProducer<C> {
    fn emit(&self, payload: AuditPayload) {
        let event = AuditEvent::new(self.settings.service.as_str(), payload);
        let event_type = event.event_type.as_str();

        if self.closed.load(Ordering::Acquire) {
            tracing::error!(event_type, "Audit event emitted after producer close, dropping");
            self.metrics.record_dropped("closed");
            return;
        }

        let bytes = match event.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(event_type, error = %e, "Failed to serialize audit event");
                self.metrics.record_dropped("serialization");
                return;
            }
        };

        let Ok(permit) = self.in_flight.clone().try_acquire_owned() else {
            tracing::warn!(
                event_type,
                max_in_flight = self.settings.max_in_flight,
                "Audit backlog full, dropping event"
            );
            self.metrics.record_dropped("backpressure");
            return;
        };

        let key = event.partition_key();
        let ack = match self.client.enqueue(&self.settings.topic, &key, bytes) {
            Ok(ack) => ack,
            Err(e) => {
                tracing::error!(event_type, key = %key, error = %e, "Failed to enqueue audit event");
                self.metrics.record_dropped("enqueue");
                return;
            }
        };

        self.metrics.record_emitted(event_type);
        let tracked = self.metrics.track_in_flight();

        let mut cancel = self.cancel.subscribe();
        let metrics = self.metrics.clone();
        let topic = self.settings.topic.clone();

        tokio::spawn(async move {
            // Released together even if the task is dropped unfinished.
            let _in_flight = (permit, tracked);

            tokio::select! {
                biased;
                delivered = ack => match delivered {
                    Ok(()) => {
                        tracing::debug!(event_type, key = %key, topic = %topic, "Audit event delivered");
                        metrics.record_delivery("delivered");
                    }
                    Err(e) => {
                        tracing::error!(event_type, key = %key, error = %e, "Audit event delivery failed");
                        metrics.record_delivery("failed");
                    }
                },
                _ = cancel.wait_for(|closed| *closed) => {
                    tracing::warn!(event_type, key = %key, "Stopped waiting for audit delivery");
                    metrics.record_delivery("canceled");
                }
            }
        });
    }
}
