//! Consent gating across tracker, queue and storage

use std::sync::Arc;

use trailmark_core::domain::{ConsentCategory, ConsentState, EventType, Properties, StoredConsent};
use trailmark_core::ports::{IKeyValueStore, PageSignal};
use trailmark_pipeline::{DropReason, FlushOutcome, PushOutcome, TrackOutcome, TrackerBuilder};
use trailmark_plugins::SignalBus;
use trailmark_storage::MemoryStore;

use crate::common::{quiet_config, settle, tracker_with, RecordingTransport};

fn analytics(granted: bool) -> ConsentState {
    ConsentState {
        analytics: Some(granted),
        ..Default::default()
    }
}

#[test]
fn test_wait_for_consent_blocks_despite_default_grant() {
    let tracker = tracker_with(
        quiet_config().wait_for_consent(true),
        Arc::new(RecordingTransport::default()),
    );

    assert_eq!(tracker.get_consent_state().analytics, Some(true));
    assert!(!tracker.can_track());
    assert_eq!(
        tracker.track(EventType::Custom, "early", Properties::new()),
        TrackOutcome::Buffered
    );

    tracker.revoke_consent(&[ConsentCategory::Marketing]);
    assert!(tracker.can_track());
    assert_eq!(tracker.get_consent_state().analytics, Some(true));
    assert_eq!(tracker.queue_len(), 1);
}

#[test]
fn test_buffer_caps_at_100_while_waiting() {
    let tracker = tracker_with(
        quiet_config().wait_for_consent(true).rate_limit(1000, 60_000),
        Arc::new(RecordingTransport::default()),
    );
    for i in 0..130 {
        tracker.track(EventType::Custom, &format!("event-{i}"), Properties::new());
    }

    tracker.consent(analytics(true));

    let queued = tracker.queued_events();
    assert_eq!(queued.len(), 100);
    assert_eq!(queued[0].event_name, "event-30");
    assert_eq!(
        tracker
            .metrics()
            .unwrap()
            .dropped(DropReason::ConsentBufferOverflow),
        30
    );
}

#[test]
fn test_consent_persists_across_trackers() {
    let store = Arc::new(MemoryStore::new());
    let build = || {
        TrackerBuilder::new(quiet_config().default_consent(analytics(false)).build())
            .persistent_store(store.clone())
            .transport(Arc::new(RecordingTransport::default()))
            .start_timer(false)
            .build()
            .unwrap()
    };

    let first = build();
    assert!(!first.can_track());
    first.grant_consent(&analytics(true));
    drop(first);

    let second = build();
    assert!(second.can_track());
    assert!(second.has_explicit_consent());
}

#[test]
fn test_stale_consent_version_falls_back_to_defaults() {
    let store = Arc::new(MemoryStore::new());
    let mut stale = StoredConsent::new(ConsentState::all_granted());
    stale.version += 1;
    store
        .set("trailmark_consent", &serde_json::to_string(&stale).unwrap())
        .unwrap();

    let tracker = TrackerBuilder::new(quiet_config().default_consent(analytics(false)).build())
        .persistent_store(store)
        .transport(Arc::new(RecordingTransport::default()))
        .start_timer(false)
        .build()
        .unwrap();

    assert_eq!(tracker.get_consent_state(), analytics(false));
    assert!(!tracker.can_track());
}

#[test]
fn test_delete_data_restores_default_consent() {
    let tracker = tracker_with(
        quiet_config().default_consent(analytics(false)),
        Arc::new(RecordingTransport::default()),
    );
    tracker.grant_consent(&analytics(true));
    tracker.track(EventType::Custom, "queued", Properties::new());

    tracker.delete_data();

    assert!(!tracker.can_track());
    assert!(!tracker.has_explicit_consent());
    assert_eq!(tracker.queue_len(), 0);
}

#[tokio::test]
async fn test_events_queued_before_revoke_are_never_sent() {
    let transport = Arc::new(RecordingTransport::default());
    let bus = Arc::new(SignalBus::new());
    let tracker = TrackerBuilder::new(quiet_config().build())
        .events(bus.clone())
        .transport(transport.clone())
        .start_timer(false)
        .build()
        .unwrap();

    assert_eq!(
        tracker.track(EventType::Custom, "before-revoke", Properties::new()),
        TrackOutcome::Queued(PushOutcome::Queued)
    );
    tracker.revoke_consent(&[ConsentCategory::Analytics]);

    assert_eq!(tracker.flush().await, FlushOutcome::Empty);
    bus.dispatch(&PageSignal::PageHide);
    bus.dispatch(&PageSignal::BeforeUnload);
    tracker.destroy().await;
    settle().await;

    assert!(transport.batches.lock().unwrap().is_empty());
    assert!(transport.beacons.lock().unwrap().is_empty());
    assert_eq!(
        tracker.metrics().unwrap().dropped(DropReason::ConsentBlocked),
        1
    );
}

#[tokio::test]
async fn test_restored_queue_is_withheld_without_consent() {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(RecordingTransport::default());

    let first = TrackerBuilder::new(quiet_config().build())
        .persistent_store(store.clone())
        .transport(transport.clone())
        .start_timer(false)
        .build()
        .unwrap();
    first.track(EventType::Custom, "left-behind", Properties::new());
    drop(first);

    let second = TrackerBuilder::new(quiet_config().default_consent(analytics(false)).build())
        .persistent_store(store)
        .transport(transport.clone())
        .start_timer(false)
        .build()
        .unwrap();
    assert_eq!(second.queue_len(), 1);

    assert_eq!(second.flush().await, FlushOutcome::Withheld { dropped: 1 });
    assert_eq!(second.queue_len(), 0);
    assert!(transport.batches.lock().unwrap().is_empty());
}
