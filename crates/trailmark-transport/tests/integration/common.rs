//! Shared helpers for transport integration tests

use std::time::Duration;

use chrono::Utc;
use trailmark_core::domain::{
    DeviceInfo, EventType, IdentifyPayload, Properties, SessionId, TrackingEvent, VisitorId,
};
use trailmark_transport::http::{HttpTransport, RetryPolicy};
use wiremock::MockServer;

/// Policy with short delays so retry tests run quickly
pub fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        timeout: Duration::from_millis(500),
        max_retries,
        retry_delay: Duration::from_millis(10),
    }
}

/// Transport pointing at the mock server
pub fn transport_for(server: &MockServer, max_retries: u32) -> HttpTransport {
    HttpTransport::new(server.uri(), fast_policy(max_retries))
}

pub fn sample_event(name: &str) -> TrackingEvent {
    TrackingEvent {
        workspace_id: "ws-test".to_string(),
        visitor_id: VisitorId::generate(),
        session_id: SessionId::new(),
        event_type: EventType::Custom,
        event_name: name.to_string(),
        url: "https://shop.example.com/".to_string(),
        referrer: None,
        properties: Properties::new(),
        device_info: DeviceInfo::default(),
        utm_params: None,
        timestamp: Utc::now(),
        sdk_version: "0.1.0".to_string(),
    }
}

pub fn sample_identify(email: &str) -> IdentifyPayload {
    IdentifyPayload {
        workspace_id: "ws-test".to_string(),
        visitor_id: VisitorId::generate(),
        email: email.to_string(),
        properties: Properties::new(),
    }
}
