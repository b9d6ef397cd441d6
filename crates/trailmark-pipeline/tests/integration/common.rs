//! Shared helpers for pipeline integration tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use trailmark_core::config::TrackerConfigBuilder;
use trailmark_core::domain::{DeliveryError, IdentifyPayload, TrackingEvent};
use trailmark_core::ports::IEventTransport;
use trailmark_pipeline::{Tracker, TrackerBuilder};

/// In-memory transport that records batches and can be told to fail
#[derive(Default)]
pub struct RecordingTransport {
    pub batches: Mutex<Vec<Vec<TrackingEvent>>>,
    pub beacons: Mutex<Vec<Vec<TrackingEvent>>>,
    pub identifies: Mutex<Vec<IdentifyPayload>>,
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl RecordingTransport {
    pub fn sent_names(&self) -> Vec<Vec<String>> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .map(|batch| batch.iter().map(|e| e.event_name.clone()).collect())
            .collect()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn outcome(&self) -> Result<(), DeliveryError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(DeliveryError::Server { status: 500 })
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl IEventTransport for RecordingTransport {
    async fn send_events(&self, events: &[TrackingEvent]) -> Result<(), DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
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

/// Config with no plugins, no automatic page view and a large batch
pub fn quiet_config() -> TrackerConfigBuilder {
    TrackerConfigBuilder::new("ws-integration")
        .auto_page_view(false)
        .plugins(Vec::new())
        .batch_size(100)
}

/// Tracker over a recording transport, timer off
pub fn tracker_with(
    builder: TrackerConfigBuilder,
    transport: Arc<RecordingTransport>,
) -> Arc<Tracker> {
    TrackerBuilder::new(builder.build())
        .transport(transport)
        .start_timer(false)
        .build()
        .expect("tracker builds")
}

/// Lets spawned flush tasks run on the current-thread runtime
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
