//! Event Queue
//!
//! In-memory batch buffer mirrored into storage after every mutation, so a
//! reload resumes a pending batch.
//!
//! ## Flow
//!
//! - `push`: sliding-window rate limit, then FIFO eviction when full, then
//!   append. Reaching `batch_size` spawns a flush.
//! - `flush`: single-flight. Slices the whole queue, persists an empty
//!   snapshot, sends. A failed batch goes back to the front.
//! - `flush_sync`: same slice over the beacon path, for page teardown.
//!
//! A flush requested while another is in flight is dropped; the next
//! threshold or timer tick picks up whatever is left.
//!
//! An optional delivery gate is asked before every send. While it is closed
//! the queue is discarded instead of sent.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trailmark_core::config::TrackerConfig;
use trailmark_core::domain::{DeliveryError, TrackingEvent};
use trailmark_core::ports::{IEventTransport, IPageEvents, PageSignal, SignalKind};
use trailmark_plugins::Subscriptions;
use trailmark_storage::{keys, SafeStorage};

use crate::metrics::{DropReason, PipelineMetrics};
use crate::rate_limit::SlidingWindowLimiter;

/// Queue tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueOptions {
    pub batch_size: usize,
    pub max_queue_size: usize,
    pub flush_interval: Duration,
    pub rate_limit_max: usize,
    pub rate_limit_window: Duration,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self::from(&TrackerConfig::default())
    }
}

impl From<&TrackerConfig> for QueueOptions {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            max_queue_size: config.queue.max_queue_size,
            flush_interval: Duration::from_millis(config.flush_interval_ms),
            rate_limit_max: config.queue.rate_limit.max_events,
            rate_limit_window: Duration::from_millis(config.queue.rate_limit.window_ms),
        }
    }
}

/// Result of [`EventQueue::push`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queued after dropping the oldest entry of a full queue
    QueuedWithEviction,
    /// Dropped before entering the queue
    RateLimited,
}

/// Asked before every send; false discards the queue
pub type DeliveryGate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Result of [`EventQueue::flush`]
#[derive(Debug, Clone, PartialEq)]
pub enum FlushOutcome {
    /// Nothing queued
    Empty,
    /// Another flush holds the in-flight flag
    InFlight,
    /// The delivery gate was closed; queued events were dropped unsent
    Withheld { dropped: usize },
    Sent { count: usize },
    /// Delivery failed; the batch is back at the front of the queue
    Requeued { count: usize, error: DeliveryError },
}

struct QueueState {
    events: VecDeque<TrackingEvent>,
    limiter: SlidingWindowLimiter,
}

struct QueueShared {
    options: QueueOptions,
    transport: Arc<dyn IEventTransport>,
    storage: SafeStorage,
    metrics: Option<Arc<PipelineMetrics>>,
    state: Mutex<QueueState>,
    flushing: AtomicBool,
    timer: Mutex<Option<CancellationToken>>,
    unload_hooks: Mutex<Option<Subscriptions>>,
    gate: Mutex<Option<DeliveryGate>>,
}

/// Clears the in-flight flag when the flush ends, however it ends
struct FlushGuard<'a>(&'a AtomicBool);

impl<'a> FlushGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Persistent batching queue. Clones share the same queue.
#[derive(Clone)]
pub struct EventQueue {
    shared: Arc<QueueShared>,
}

impl EventQueue {
    /// Creates the queue and restores any persisted snapshot
    pub fn new(
        options: QueueOptions,
        transport: Arc<dyn IEventTransport>,
        storage: SafeStorage,
        metrics: Option<Arc<PipelineMetrics>>,
    ) -> Self {
        let mut events: VecDeque<TrackingEvent> = storage
            .get_json::<Vec<TrackingEvent>>(keys::EVENT_QUEUE)
            .map(VecDeque::from)
            .unwrap_or_default();
        if !events.is_empty() {
            info!(count = events.len(), "Restored persisted event queue");
        }
        while events.len() > options.max_queue_size {
            events.pop_front();
        }
        if let Some(metrics) = &metrics {
            metrics.set_queue_depth(events.len());
        }

        let limiter = SlidingWindowLimiter::new(options.rate_limit_max, options.rate_limit_window);
        Self {
            shared: Arc::new(QueueShared {
                options,
                transport,
                storage,
                metrics,
                state: Mutex::new(QueueState { events, limiter }),
                flushing: AtomicBool::new(false),
                timer: Mutex::new(None),
                unload_hooks: Mutex::new(None),
                gate: Mutex::new(None),
            }),
        }
    }

    fn from_shared(shared: Arc<QueueShared>) -> Self {
        Self { shared }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn metrics(&self) -> Option<&PipelineMetrics> {
        self.shared.metrics.as_deref()
    }

    /// Installs the gate asked before every send
    pub fn set_gate(&self, gate: DeliveryGate) {
        *self.shared.gate.lock().unwrap_or_else(|e| e.into_inner()) = Some(gate);
    }

    /// Drops the whole queue when the gate is closed.
    ///
    /// Returns the number dropped, or None when delivery may go ahead.
    fn withhold(&self) -> Option<usize> {
        let gate = self
            .shared
            .gate
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()?;
        if gate() {
            return None;
        }

        let dropped = self.clear();
        if dropped > 0 {
            info!(dropped, "Delivery gate closed, queued events discarded");
            if let Some(metrics) = self.metrics() {
                for _ in 0..dropped {
                    metrics.record_dropped(DropReason::ConsentBlocked);
                }
            }
        }
        Some(dropped)
    }

    /// Mirrors the queue into storage; failure means tab-lifetime only
    fn persist(&self, events: &VecDeque<TrackingEvent>) {
        if !self.shared.storage.set_json(keys::EVENT_QUEUE, events) {
            debug!(count = events.len(), "Queue snapshot not persisted");
        }
        if let Some(metrics) = self.metrics() {
            metrics.set_queue_depth(events.len());
        }
    }

    // ========================================================================
    // Push
    // ========================================================================

    /// Adds an event. May spawn a flush on the current runtime.
    pub fn push(&self, event: TrackingEvent) -> PushOutcome {
        let (outcome, len) = {
            let mut state = self.state();
            if !state.limiter.try_acquire(Instant::now()) {
                drop(state);
                warn!(event = %event.event_name, "Rate limit exceeded, event dropped");
                if let Some(metrics) = self.metrics() {
                    metrics.record_dropped(DropReason::RateLimited);
                }
                return PushOutcome::RateLimited;
            }

            let evicted = if state.events.len() >= self.shared.options.max_queue_size {
                state.events.pop_front()
            } else {
                None
            };
            state.events.push_back(event);
            self.persist(&state.events);

            if let Some(dropped) = evicted {
                warn!(event = %dropped.event_name, "Queue full, oldest event dropped");
                if let Some(metrics) = self.metrics() {
                    metrics.record_dropped(DropReason::QueueOverflow);
                }
                (PushOutcome::QueuedWithEviction, state.events.len())
            } else {
                (PushOutcome::Queued, state.events.len())
            }
        };

        if len >= self.shared.options.batch_size {
            self.spawn_flush();
        }
        outcome
    }

    fn spawn_flush(&self) {
        match Handle::try_current() {
            Ok(handle) => {
                let queue = self.clone();
                handle.spawn(async move {
                    queue.flush().await;
                });
            }
            Err(_) => debug!("No async runtime, batch flush deferred"),
        }
    }

    // ========================================================================
    // Flush
    // ========================================================================

    /// Sends everything queued in one batch
    pub async fn flush(&self) -> FlushOutcome {
        let Some(_guard) = FlushGuard::acquire(&self.shared.flushing) else {
            debug!("Flush already in flight");
            return FlushOutcome::InFlight;
        };

        if let Some(dropped) = self.withhold() {
            return match dropped {
                0 => FlushOutcome::Empty,
                dropped => FlushOutcome::Withheld { dropped },
            };
        }
        let Some(batch) = self.take_batch() else {
            return FlushOutcome::Empty;
        };
        let count = batch.len();
        debug!(count, "Flushing events");

        let result = self.shared.transport.send_events(&batch).await;
        if let Some(metrics) = self.metrics() {
            metrics.record_delivery("events", &result);
        }

        match result {
            Ok(()) => {
                info!(count, "Events delivered");
                FlushOutcome::Sent { count }
            }
            Err(error) => {
                warn!(count, error = %error, "Delivery failed, batch requeued");
                self.requeue(batch);
                FlushOutcome::Requeued { count, error }
            }
        }
    }

    /// Sends everything queued through the beacon path.
    ///
    /// Returns false if the batch had to be requeued.
    pub fn flush_sync(&self) -> bool {
        if self.withhold().is_some() {
            return true;
        }
        let Some(batch) = self.take_batch() else {
            return true;
        };
        let count = batch.len();

        let result = self.shared.transport.send_beacon(&batch);
        if let Some(metrics) = self.metrics() {
            metrics.record_delivery("beacon", &result);
        }

        match result {
            Ok(()) => {
                debug!(count, "Events handed to beacon");
                true
            }
            Err(error) => {
                warn!(count, error = %error, "Beacon failed, batch requeued");
                self.requeue(batch);
                false
            }
        }
    }

    /// Slices the whole queue and persists the now-empty snapshot
    fn take_batch(&self) -> Option<Vec<TrackingEvent>> {
        let mut state = self.state();
        if state.events.is_empty() {
            return None;
        }
        let batch: Vec<TrackingEvent> = state.events.drain(..).collect();
        self.persist(&state.events);
        Some(batch)
    }

    /// Puts a failed batch back in front of anything pushed meanwhile
    fn requeue(&self, batch: Vec<TrackingEvent>) {
        let mut state = self.state();
        for event in batch.into_iter().rev() {
            state.events.push_front(event);
        }

        let mut overflow = 0;
        while state.events.len() > self.shared.options.max_queue_size {
            state.events.pop_front();
            overflow += 1;
        }
        if overflow > 0 {
            warn!(overflow, "Queue full after requeue, oldest events dropped");
            if let Some(metrics) = self.metrics() {
                for _ in 0..overflow {
                    metrics.record_dropped(DropReason::QueueOverflow);
                }
            }
        }
        self.persist(&state.events);
    }

    // ========================================================================
    // Timer and unload hooks
    // ========================================================================

    /// Starts the auto-flush timer on the current runtime.
    ///
    /// Returns false when there is no runtime to run it on.
    pub fn start(&self) -> bool {
        let Ok(handle) = Handle::try_current() else {
            warn!("No async runtime, auto-flush timer disabled");
            return false;
        };

        let mut timer = self.shared.timer.lock().unwrap_or_else(|e| e.into_inner());
        if timer.is_some() {
            return true;
        }

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let weak: Weak<QueueShared> = Arc::downgrade(&self.shared);
        let period = self.shared.options.flush_interval;

        handle.spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick fires immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        let Some(shared) = weak.upgrade() else { break };
                        EventQueue::from_shared(shared).flush().await;
                    }
                }
            }
            debug!("Auto-flush timer stopped");
        });

        debug!(interval_ms = period.as_millis() as u64, "Auto-flush timer started");
        *timer = Some(token);
        true
    }

    /// Flushes through the beacon on `beforeunload`, `visibilitychange`
    /// to hidden, and `pagehide`
    pub fn attach_unload_hooks(&self, events: Arc<dyn IPageEvents>) {
        let mut subscriptions = Subscriptions::new(events);
        for kind in [
            SignalKind::BeforeUnload,
            SignalKind::VisibilityChange,
            SignalKind::PageHide,
        ] {
            let weak = Arc::downgrade(&self.shared);
            subscriptions.listen(kind, move |signal| {
                if matches!(signal, PageSignal::VisibilityChange { hidden: false }) {
                    return;
                }
                if let Some(shared) = weak.upgrade() {
                    EventQueue::from_shared(shared).flush_sync();
                }
            });
        }
        // Replacing drops (and detaches) any previous set
        *self
            .shared
            .unload_hooks
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(subscriptions);
    }

    /// Stops the timer and detaches unload hooks. Does not flush.
    pub fn destroy(&self) {
        if let Some(token) = self
            .shared
            .timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            token.cancel();
        }
        let hooks = self
            .shared
            .unload_hooks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        drop(hooks);
        debug!("Event queue stopped");
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Drops every queued event and the persisted snapshot. Returns how
    /// many were dropped.
    pub fn clear(&self) -> usize {
        let mut state = self.state();
        let count = state.events.len();
        state.events.clear();
        self.shared.storage.remove(keys::EVENT_QUEUE);
        if let Some(metrics) = self.metrics() {
            metrics.set_queue_depth(0);
        }
        debug!(count, "Event queue cleared");
        count
    }

    pub fn len(&self) -> usize {
        self.state().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().events.is_empty()
    }

    /// Copy of the queued events, oldest first
    pub fn snapshot(&self) -> Vec<TrackingEvent> {
        self.state().events.iter().cloned().collect()
    }

    pub fn options(&self) -> &QueueOptions {
        &self.shared.options
    }

    /// Whether the auto-flush timer is running
    pub fn is_running(&self) -> bool {
        self.shared
            .timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{event, RecordingTransport};
    use trailmark_plugins::SignalBus;
    use trailmark_storage::MemoryStore;

    fn options(batch_size: usize, max_queue_size: usize) -> QueueOptions {
        QueueOptions {
            batch_size,
            max_queue_size,
            ..QueueOptions::default()
        }
    }

    fn queue_with(
        options: QueueOptions,
        transport: Arc<RecordingTransport>,
    ) -> (EventQueue, SafeStorage) {
        let storage = SafeStorage::new(Arc::new(MemoryStore::new()));
        let queue = EventQueue::new(options, transport, storage.clone(), None);
        (queue, storage)
    }

    fn names(queue: &EventQueue) -> Vec<String> {
        queue.snapshot().into_iter().map(|e| e.event_name).collect()
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let metrics = Arc::new(PipelineMetrics::new().unwrap());
        let queue = EventQueue::new(
            options(100, 3),
            Arc::new(RecordingTransport::default()),
            SafeStorage::new(Arc::new(MemoryStore::new())),
            Some(metrics.clone()),
        );

        let outcomes: Vec<PushOutcome> = (0..5)
            .map(|i| queue.push(event(&format!("event-{i}"))))
            .collect();

        assert_eq!(outcomes[2], PushOutcome::Queued);
        assert_eq!(outcomes[3], PushOutcome::QueuedWithEviction);
        assert_eq!(names(&queue), vec!["event-2", "event-3", "event-4"]);
        assert_eq!(metrics.dropped(DropReason::QueueOverflow), 2);
        assert_eq!(metrics.queue_depth.get(), 3);
    }

    #[test]
    fn test_rate_limit_drops_before_queueing() {
        let (queue, storage) =
            queue_with(options(1000, 1000), Arc::new(RecordingTransport::default()));

        let limited = (0..105)
            .map(|i| queue.push(event(&format!("event-{i}"))))
            .filter(|o| *o == PushOutcome::RateLimited)
            .count();

        assert_eq!(limited, 5);
        assert_eq!(queue.len(), 100);
        let persisted: Vec<TrackingEvent> = storage.get_json(keys::EVENT_QUEUE).unwrap();
        assert_eq!(persisted.len(), 100);
        assert_eq!(persisted[99].event_name, "event-99");
    }

    #[test]
    fn test_snapshot_restored_on_construction() {
        let transport = Arc::new(RecordingTransport::default());
        let (queue, storage) = queue_with(options(100, 100), transport.clone());
        queue.push(event("a"));
        queue.push(event("b"));

        let restored = EventQueue::new(options(100, 100), transport, storage, None);
        assert_eq!(names(&restored), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_flush_sends_in_order_and_empties() {
        let transport = Arc::new(RecordingTransport::default());
        let (queue, storage) = queue_with(options(100, 100), transport.clone());
        for i in 0..3 {
            queue.push(event(&format!("event-{i}")));
        }

        assert_eq!(queue.flush().await, FlushOutcome::Sent { count: 3 });
        assert_eq!(transport.sent_names(), vec![vec!["event-0", "event-1", "event-2"]]);
        assert!(queue.is_empty());
        let persisted: Vec<TrackingEvent> = storage.get_json(keys::EVENT_QUEUE).unwrap();
        assert!(persisted.is_empty());

        assert_eq!(queue.flush().await, FlushOutcome::Empty);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_flush_sends_once() {
        let transport = Arc::new(RecordingTransport::with_delay(Duration::from_millis(50)));
        let (queue, _) = queue_with(options(100, 100), transport.clone());
        queue.push(event("only"));

        let (first, second) = tokio::join!(queue.flush(), queue.flush());

        assert_eq!(first, FlushOutcome::Sent { count: 1 });
        assert_eq!(second, FlushOutcome::InFlight);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_flush_requeues_ahead_of_new_events() {
        let transport = Arc::new(RecordingTransport::with_delay(Duration::from_millis(50)));
        transport.set_failing(true);
        let (queue, storage) = queue_with(options(100, 100), transport.clone());
        for i in 0..3 {
            queue.push(event(&format!("event-{i}")));
        }

        let late = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            queue.push(event("late"));
        };
        let (outcome, _) = tokio::join!(queue.flush(), late);

        assert!(matches!(outcome, FlushOutcome::Requeued { count: 3, .. }));
        assert_eq!(names(&queue), vec!["event-0", "event-1", "event-2", "late"]);
        let persisted: Vec<TrackingEvent> = storage.get_json(keys::EVENT_QUEUE).unwrap();
        assert_eq!(persisted.len(), 4);
    }

    #[tokio::test]
    async fn test_requeue_respects_max_size() {
        let transport = Arc::new(RecordingTransport::failing());
        let (queue, _) = queue_with(options(100, 3), transport);
        for i in 0..3 {
            queue.push(event(&format!("event-{i}")));
        }
        let batch = queue.take_batch().unwrap();
        queue.push(event("new"));
        queue.requeue(batch);

        assert_eq!(names(&queue), vec!["event-1", "event-2", "new"]);
    }

    #[tokio::test]
    async fn test_batch_threshold_spawns_flush() {
        let transport = Arc::new(RecordingTransport::default());
        let (queue, _) = queue_with(options(2, 100), transport.clone());
        queue.push(event("a"));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        queue.push(event("b"));

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(transport.sent_names(), vec![vec!["a", "b"]]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_flush_sync_uses_beacon_and_requeues_on_failure() {
        let transport = Arc::new(RecordingTransport::default());
        let (queue, _) = queue_with(options(100, 100), transport.clone());
        assert!(queue.flush_sync());
        assert!(transport.beacons.lock().unwrap().is_empty());

        queue.push(event("a"));
        assert!(queue.flush_sync());
        assert!(queue.is_empty());

        transport.set_failing(true);
        queue.push(event("b"));
        assert!(!queue.flush_sync());
        assert_eq!(names(&queue), vec!["b"]);
        assert_eq!(transport.beacons.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_unload_hooks_flush_and_detach() {
        let transport = Arc::new(RecordingTransport::default());
        let (queue, _) = queue_with(options(100, 100), transport.clone());
        let bus = Arc::new(SignalBus::new());
        queue.attach_unload_hooks(bus.clone());
        assert_eq!(bus.listener_count(), 3);

        queue.push(event("a"));
        bus.dispatch(&PageSignal::VisibilityChange { hidden: false });
        assert_eq!(queue.len(), 1);
        bus.dispatch(&PageSignal::VisibilityChange { hidden: true });
        assert!(queue.is_empty());

        queue.push(event("b"));
        bus.dispatch(&PageSignal::PageHide);
        queue.push(event("c"));
        bus.dispatch(&PageSignal::BeforeUnload);
        assert_eq!(transport.beacons.lock().unwrap().len(), 3);

        queue.destroy();
        assert_eq!(bus.listener_count(), 0);
        queue.push(event("d"));
        bus.dispatch(&PageSignal::BeforeUnload);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_flushes_until_destroyed() {
        let transport = Arc::new(RecordingTransport::default());
        let (queue, _) = queue_with(
            QueueOptions {
                flush_interval: Duration::from_secs(5),
                ..options(100, 100)
            },
            transport.clone(),
        );
        assert!(queue.start());
        assert!(queue.is_running());

        queue.push(event("a"));
        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);

        queue.destroy();
        assert!(!queue.is_running());
        queue.push(event("b"));
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_start_without_runtime() {
        let (queue, _) = queue_with(options(10, 100), Arc::new(RecordingTransport::default()));
        assert!(!queue.start());
    }

    #[test]
    fn test_clear_removes_snapshot() {
        let (queue, storage) =
            queue_with(options(100, 100), Arc::new(RecordingTransport::default()));
        queue.push(event("a"));
        assert_eq!(queue.clear(), 1);
        assert!(queue.is_empty());
        assert_eq!(storage.get(keys::EVENT_QUEUE), None);
    }

    #[tokio::test]
    async fn test_closed_gate_discards_instead_of_sending() {
        let transport = Arc::new(RecordingTransport::default());
        let metrics = Arc::new(PipelineMetrics::new().unwrap());
        let storage = SafeStorage::new(Arc::new(MemoryStore::new()));
        let queue = EventQueue::new(
            options(100, 100),
            transport.clone(),
            storage.clone(),
            Some(metrics.clone()),
        );
        let open = Arc::new(AtomicBool::new(false));
        let flag = open.clone();
        queue.set_gate(Arc::new(move || flag.load(Ordering::SeqCst)));

        queue.push(event("a"));
        queue.push(event("b"));
        assert_eq!(queue.flush().await, FlushOutcome::Withheld { dropped: 2 });
        assert_eq!(queue.flush().await, FlushOutcome::Empty);

        queue.push(event("c"));
        assert!(queue.flush_sync());

        assert!(queue.is_empty());
        assert_eq!(storage.get(keys::EVENT_QUEUE), None);
        assert!(transport.batches.lock().unwrap().is_empty());
        assert!(transport.beacons.lock().unwrap().is_empty());
        assert_eq!(metrics.dropped(DropReason::ConsentBlocked), 3);

        open.store(true, Ordering::SeqCst);
        queue.push(event("d"));
        assert_eq!(queue.flush().await, FlushOutcome::Sent { count: 1 });
    }
}
