//! Test doubles shared by the pipeline unit tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use trailmark_core::domain::{
    DeliveryError, DeviceInfo, EventType, IdentifyPayload, Properties, SessionId, TrackingEvent,
    VisitorId,
};
use trailmark_core::ports::IEventTransport;

/// Records every delivery; can be told to fail or to take time
#[derive(Default)]
pub struct RecordingTransport {
    pub batches: Mutex<Vec<Vec<TrackingEvent>>>,
    pub beacons: Mutex<Vec<Vec<TrackingEvent>>>,
    pub identifies: Mutex<Vec<IdentifyPayload>>,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
    pub delay: Mutex<Option<Duration>>,
}

impl RecordingTransport {
    pub fn failing() -> Self {
        let transport = Self::default();
        transport.fail.store(true, Ordering::SeqCst);
        transport
    }

    pub fn with_delay(delay: Duration) -> Self {
        let transport = Self::default();
        *transport.delay.lock().unwrap() = Some(delay);
        transport
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent_names(&self) -> Vec<Vec<String>> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .map(|b| b.iter().map(|e| e.event_name.clone()).collect())
            .collect()
    }

    fn outcome(&self) -> Result<(), DeliveryError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(DeliveryError::Server { status: 503 })
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl IEventTransport for RecordingTransport {
    async fn send_events(&self, events: &[TrackingEvent]) -> Result<(), DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.batches.lock().unwrap().push(events.to_vec());
        self.outcome()
    }

    async fn send_identify(&self, payload: &IdentifyPayload) -> Result<(), DeliveryError> {
        self.identifies.lock().unwrap().push(payload.clone());
        self.outcome()
    }

    fn send_beacon(&self, events: &[TrackingEvent]) -> Result<(), DeliveryError> {
        self.beacons.lock().unwrap().push(events.to_vec());
        if self.fail.load(Ordering::SeqCst) {
            Err(DeliveryError::BeaconRejected)
        } else {
            Ok(())
        }
    }
}

pub fn event(name: &str) -> TrackingEvent {
    TrackingEvent {
        workspace_id: "ws-test".into(),
        visitor_id: VisitorId::generate(),
        session_id: SessionId::new(),
        event_type: EventType::Custom,
        event_name: name.to_string(),
        url: "https://example.com/".into(),
        referrer: None,
        properties: Properties::new(),
        device_info: DeviceInfo::default(),
        utm_params: None,
        timestamp: Utc::now(),
        sdk_version: "test".into(),
    }
}
