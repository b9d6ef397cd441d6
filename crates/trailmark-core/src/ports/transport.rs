//! Transport ports
//!
//! ## Design Notes
//!
//! - `send_events` / `send_identify` are asynchronous and own retry and
//!   timeout policy.
//! - `send_beacon` is synchronous: it is called while the page is being
//!   torn down and can only hand the payload to the platform.

use serde::Serialize;

use crate::domain::{DeliveryError, IdentifyPayload, TrackingEvent};

/// Event ingestion path under the API base
pub const EVENTS_PATH: &str = "/api/public/track/event";

/// Identify path under the API base
pub const IDENTIFY_PATH: &str = "/api/public/track/identify";

/// Body of the event ingestion endpoint
#[derive(Debug, Serialize)]
pub struct EventBatch<'a> {
    pub events: &'a [TrackingEvent],
}

/// Outbound delivery of events and identify calls
#[async_trait::async_trait]
pub trait IEventTransport: Send + Sync {
    /// Delivers a batch of events, retrying transient failures
    async fn send_events(&self, events: &[TrackingEvent]) -> Result<(), DeliveryError>;

    /// Delivers an identify payload, retrying transient failures
    async fn send_identify(&self, payload: &IdentifyPayload) -> Result<(), DeliveryError>;

    /// Best-effort synchronous delivery used during page teardown
    fn send_beacon(&self, events: &[TrackingEvent]) -> Result<(), DeliveryError>;
}

/// Platform fire-and-forget mechanism (`navigator.sendBeacon` shaped)
pub trait IBeaconSender: Send + Sync {
    /// Hands `body` to the platform for delivery to `url`.
    ///
    /// Returns false if the platform refused to queue it.
    fn send(&self, url: &str, body: String) -> bool;
}
