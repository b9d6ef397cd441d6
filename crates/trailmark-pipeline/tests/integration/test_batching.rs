//! Batch threshold, overflow, rate limit and failure requeue

use std::sync::atomic::Ordering;
use std::sync::Arc;

use trailmark_core::domain::{EventType, Properties};
use trailmark_pipeline::{DropReason, FlushOutcome, PushOutcome, TrackOutcome, TrackerBuilder};
use trailmark_storage::MemoryStore;

use crate::common::{quiet_config, settle, tracker_with, RecordingTransport};

#[tokio::test]
async fn test_batch_of_five_is_sent_in_push_order() {
    let transport = Arc::new(RecordingTransport::default());
    let tracker = tracker_with(quiet_config().batch_size(5), transport.clone());

    for i in 0..5 {
        tracker.track(EventType::Custom, &format!("event-{i}"), Properties::new());
    }
    settle().await;

    assert_eq!(
        transport.sent_names(),
        vec![vec!["event-0", "event-1", "event-2", "event-3", "event-4"]]
    );
    assert_eq!(tracker.queue_len(), 0);
}

#[tokio::test]
async fn test_below_threshold_waits_for_manual_flush() {
    let transport = Arc::new(RecordingTransport::default());
    let tracker = tracker_with(quiet_config().batch_size(5), transport.clone());

    for i in 0..4 {
        tracker.track(EventType::Custom, &format!("event-{i}"), Properties::new());
    }
    settle().await;
    assert_eq!(transport.calls.load(Ordering::SeqCst), 0);

    assert_eq!(tracker.flush().await, FlushOutcome::Sent { count: 4 });
}

#[test]
fn test_overflow_keeps_most_recent() {
    let transport = Arc::new(RecordingTransport::default());
    let tracker = tracker_with(
        quiet_config().max_queue_size(10).batch_size(10).rate_limit(1000, 60_000),
        transport,
    );

    for i in 0..25 {
        tracker.track(EventType::Custom, &format!("event-{i}"), Properties::new());
    }

    let names: Vec<String> = tracker
        .queued_events()
        .into_iter()
        .map(|e| e.event_name)
        .collect();
    assert_eq!(names.len(), 10);
    assert_eq!(names.first().map(String::as_str), Some("event-15"));
    assert_eq!(names.last().map(String::as_str), Some("event-24"));
    assert_eq!(
        tracker.metrics().unwrap().dropped(DropReason::QueueOverflow),
        15
    );
}

#[test]
fn test_rate_limit_retains_exactly_100_of_105() {
    let transport = Arc::new(RecordingTransport::default());
    let tracker = tracker_with(quiet_config().batch_size(1000).max_queue_size(1000), transport);

    let outcomes: Vec<TrackOutcome> = (0..105)
        .map(|i| tracker.track(EventType::Custom, &format!("event-{i}"), Properties::new()))
        .collect();

    let limited = outcomes
        .iter()
        .filter(|o| **o == TrackOutcome::Queued(PushOutcome::RateLimited))
        .count();
    assert_eq!(limited, 5);
    assert_eq!(tracker.queue_len(), 100);
    assert_eq!(tracker.metrics().unwrap().dropped(DropReason::RateLimited), 5);
}

#[tokio::test]
async fn test_failed_flush_keeps_every_event() {
    let transport = Arc::new(RecordingTransport::default());
    transport.set_failing(true);
    let tracker = tracker_with(quiet_config(), transport.clone());

    for i in 0..7 {
        tracker.track(EventType::Custom, &format!("event-{i}"), Properties::new());
    }
    let outcome = tracker.flush().await;

    assert!(matches!(outcome, FlushOutcome::Requeued { count: 7, .. }));
    assert_eq!(tracker.queue_len(), 7);

    transport.set_failing(false);
    assert_eq!(tracker.flush().await, FlushOutcome::Sent { count: 7 });
    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_pending_batch_survives_reload() {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(RecordingTransport::default());
    let first = TrackerBuilder::new(quiet_config().build())
        .persistent_store(store.clone())
        .transport(transport.clone())
        .start_timer(false)
        .build()
        .unwrap();
    first.track(EventType::Custom, "before-reload", Properties::new());
    let visitor = first.visitor_id();
    drop(first);

    let second = TrackerBuilder::new(quiet_config().build())
        .persistent_store(store)
        .transport(transport.clone())
        .start_timer(false)
        .build()
        .unwrap();
    assert_eq!(second.visitor_id(), visitor);
    assert_eq!(second.queue_len(), 1);
    assert_eq!(second.flush().await, FlushOutcome::Sent { count: 1 });
    assert_eq!(transport.sent_names(), vec![vec!["before-reload"]]);
}

#[tokio::test(start_paused = true)]
async fn test_timer_flushes_on_interval() {
    let transport = Arc::new(RecordingTransport::default());
    let tracker = TrackerBuilder::new(quiet_config().flush_interval_ms(2_000).build())
        .transport(transport.clone())
        .build()
        .unwrap();

    tracker.track(EventType::Custom, "tick", Properties::new());
    tokio::time::sleep(std::time::Duration::from_millis(2_100)).await;

    assert_eq!(transport.sent_names(), vec![vec!["tick"]]);
    tracker.destroy().await;
}
