//! Prometheus metrics for the event pipeline
//!
//! Answers "where did my events go": every tracked event is counted by
//! type, every drop by reason, and every delivery attempt by path and
//! outcome.

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use trailmark_core::domain::{DeliveryError, EventType};

/// Why an event never reached the queue (or left it unsent)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// Over the sliding-window budget
    RateLimited,
    /// Evicted as the oldest entry of a full queue
    QueueOverflow,
    /// Tracking not permitted and not buffering
    ConsentBlocked,
    /// Evicted as the oldest entry of a full consent buffer
    ConsentBufferOverflow,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::RateLimited => "rate_limited",
            DropReason::QueueOverflow => "queue_overflow",
            DropReason::ConsentBlocked => "consent_blocked",
            DropReason::ConsentBufferOverflow => "consent_buffer_overflow",
        }
    }
}

/// Label for a delivery outcome
pub fn delivery_status(result: &Result<(), DeliveryError>) -> &'static str {
    match result {
        Ok(()) => "success",
        Err(DeliveryError::Client { .. }) => "client_error",
        Err(DeliveryError::Server { .. }) => "server_error",
        Err(DeliveryError::Network(_)) => "network_error",
        Err(DeliveryError::Timeout(_)) => "timeout",
        Err(DeliveryError::Serialization(_)) => "serialization_error",
        Err(DeliveryError::BeaconUnavailable) => "beacon_unavailable",
        Err(DeliveryError::BeaconRejected) => "beacon_rejected",
    }
}

/// Pipeline metrics registry
pub struct PipelineMetrics {
    registry: Registry,
    /// Counter: events handed to `track` by event type
    pub events_tracked_total: IntCounterVec,
    /// Counter: events dropped by reason
    pub events_dropped_total: IntCounterVec,
    /// Counter: delivery attempts by (path, status)
    pub deliveries_total: IntCounterVec,
    /// Gauge: events currently queued
    pub queue_depth: IntGauge,
}

impl PipelineMetrics {
    /// Creates a registry with every metric registered.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new_custom(Some("trailmark".to_string()), None)?;

        let events_tracked_total = IntCounterVec::new(
            Opts::new("events_tracked_total", "Events passed to track"),
            &["event_type"],
        )?;
        registry.register(Box::new(events_tracked_total.clone()))?;

        let events_dropped_total = IntCounterVec::new(
            Opts::new("events_dropped_total", "Events dropped before delivery"),
            &["reason"],
        )?;
        registry.register(Box::new(events_dropped_total.clone()))?;

        let deliveries_total = IntCounterVec::new(
            Opts::new("deliveries_total", "Delivery attempts by path and outcome"),
            &["path", "status"],
        )?;
        registry.register(Box::new(deliveries_total.clone()))?;

        let queue_depth = IntGauge::new("queue_depth", "Events waiting in the queue")?;
        registry.register(Box::new(queue_depth.clone()))?;

        Ok(Self {
            registry,
            events_tracked_total,
            events_dropped_total,
            deliveries_total,
            queue_depth,
        })
    }

    // ========================================================================
    // Recording helpers
    // ========================================================================

    pub fn record_tracked(&self, event_type: EventType) {
        self.events_tracked_total
            .with_label_values(&[event_type.as_str()])
            .inc();
    }

    pub fn record_dropped(&self, reason: DropReason) {
        self.events_dropped_total
            .with_label_values(&[reason.as_str()])
            .inc();
    }

    /// Record a delivery outcome for `path` (`events`, `beacon`, `identify`)
    pub fn record_delivery(&self, path: &str, result: &Result<(), DeliveryError>) {
        self.deliveries_total
            .with_label_values(&[path, delivery_status(result)])
            .inc();
    }

    pub fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.set(depth as i64);
    }

    /// Current drop count for `reason`
    pub fn dropped(&self, reason: DropReason) -> u64 {
        self.events_dropped_total
            .with_label_values(&[reason.as_str()])
            .get()
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Encode all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
