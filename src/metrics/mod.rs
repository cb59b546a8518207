mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::time::Duration;

pub use server::metrics_listener;

// ============================================================================
// Metrics Module - Prometheus metrics for both services and the consumer
// ============================================================================
//
// Covers:
// - Request latency and failures per transport (grpc / http) and path
// - Audit event emission, backpressure drops and delivery outcomes
// - Audit events seen by the consumer
//
// Scraped via the metrics listener at /metrics
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Request Metrics
    pub request_duration: HistogramVec,
    pub failed_requests: IntCounterVec,

    // Audit Producer Metrics
    pub audit_events_emitted: IntCounterVec,
    pub audit_events_dropped: IntCounterVec,
    pub audit_deliveries: IntCounterVec,
    pub audit_in_flight: IntGauge,

    // Audit Consumer Metrics
    pub audit_events_consumed: IntCounterVec,
    pub audit_decode_failures: IntCounter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let request_duration = HistogramVec::new(
            HistogramOpts::new("request_duration_seconds", "Request handling duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["transport", "path"],
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        let failed_requests = IntCounterVec::new(
            Opts::new("failed_requests_total", "Requests that ended in an error"),
            &["transport", "path"],
        )?;
        registry.register(Box::new(failed_requests.clone()))?;

        let audit_events_emitted = IntCounterVec::new(
            Opts::new("audit_events_emitted_total", "Audit events handed to the bus"),
            &["event_type"],
        )?;
        registry.register(Box::new(audit_events_emitted.clone()))?;

        let audit_events_dropped = IntCounterVec::new(
            Opts::new("audit_events_dropped_total", "Audit events dropped before hand-off"),
            &["reason"],
        )?;
        registry.register(Box::new(audit_events_dropped.clone()))?;

        let audit_deliveries = IntCounterVec::new(
            Opts::new("audit_deliveries_total", "Audit delivery outcomes"),
            &["outcome"],
        )?;
        registry.register(Box::new(audit_deliveries.clone()))?;

        let audit_in_flight = IntGauge::new(
            "audit_events_in_flight",
            "Audit events awaiting delivery acknowledgement",
        )?;
        registry.register(Box::new(audit_in_flight.clone()))?;

        let audit_events_consumed = IntCounterVec::new(
            Opts::new("audit_events_consumed_total", "Audit events handled by the consumer"),
            &["event_type"],
        )?;
        registry.register(Box::new(audit_events_consumed.clone()))?;

        let audit_decode_failures = IntCounter::new(
            "audit_decode_failures_total",
            "Audit messages the consumer could not decode",
        )?;
        registry.register(Box::new(audit_decode_failures.clone()))?;

        Ok(Self {
            registry,
            request_duration,
            failed_requests,
            audit_events_emitted,
            audit_events_dropped,
            audit_deliveries,
            audit_in_flight,
            audit_events_consumed,
            audit_decode_failures,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record one finished request.
    pub fn record_request(&self, transport: &str, path: &str, elapsed: Duration, failed: bool) {
        self.request_duration
            .with_label_values(&[transport, path])
            .observe(elapsed.as_secs_f64());
        if failed {
            self.failed_requests.with_label_values(&[transport, path]).inc();
        }
    }

    pub fn record_emitted(&self, event_type: &str) {
        self.audit_events_emitted.with_label_values(&[event_type]).inc();
    }

    /// Count one undelivered audit event until the guard is dropped.
    pub fn track_in_flight(&self) -> InFlightGuard {
        self.audit_in_flight.inc();
        InFlightGuard(self.audit_in_flight.clone())
    }

    pub fn record_dropped(&self, reason: &str) {
        self.audit_events_dropped.with_label_values(&[reason]).inc();
    }

    /// Outcome of a delivery watcher: `delivered`, `failed` or `canceled`.
    pub fn record_delivery(&self, outcome: &str) {
        self.audit_deliveries.with_label_values(&[outcome]).inc();
    }

    pub fn record_consumed(&self, event_type: &str) {
        self.audit_events_consumed.with_label_values(&[event_type]).inc();
    }

    pub fn record_decode_failure(&self) {
        self.audit_decode_failures.inc();
    }

    /// Text exposition of everything registered.
    pub fn render(&self) -> anyhow::Result<Vec<u8>> {
        use prometheus::Encoder;

        let mut buffer = Vec::new();
        prometheus::TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

/// Decrements `audit_events_in_flight` when dropped, however the holder ends.
pub struct InFlightGuard(IntGauge);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_value(metrics: &Metrics, name: &str) -> Option<f64> {
        metrics
            .registry()
            .gather()
            .iter()
            .find(|m| m.name() == name)
            .and_then(|m| m.metric.first().and_then(|s| s.counter.value))
    }

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_decode_failure();
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_record_request_counts_failures_only() {
        let metrics = Metrics::new().unwrap();
        metrics.record_request("http", "/cart/list", Duration::from_millis(3), false);
        metrics.record_request("http", "/cart/list", Duration::from_millis(4), true);

        let gathered = metrics.registry().gather();
        let duration = gathered.iter().find(|m| m.name() == "request_duration_seconds").unwrap();
        assert_eq!(duration.metric[0].histogram.sample_count, Some(2));
        assert_eq!(counter_value(&metrics, "failed_requests_total"), Some(1.0));
    }

    #[test]
    fn test_in_flight_follows_guards() {
        let metrics = Metrics::new().unwrap();
        let first = metrics.track_in_flight();
        let _second = metrics.track_in_flight();
        assert_eq!(metrics.audit_in_flight.get(), 2);

        drop(first);
        metrics.record_delivery("delivered");

        assert_eq!(metrics.audit_in_flight.get(), 1);
        assert_eq!(counter_value(&metrics, "audit_deliveries_total"), Some(1.0));
    }

    #[test]
    fn test_render_contains_registered_names() {
        let metrics = Metrics::new().unwrap();
        metrics.record_dropped("backpressure");

        let text = String::from_utf8(metrics.render().unwrap()).unwrap();
        assert!(text.contains("audit_events_dropped_total{reason=\"backpressure\"} 1"));
    }
}
