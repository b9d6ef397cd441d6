//! Scroll depth observer
//!
//! Scroll signals are debounced (150ms) on the tokio runtime; without a
//! runtime each signal is processed immediately. Depth is
//! `scroll_top / (document_height - viewport_height)`. Pages that do not
//! scroll are skipped. Each milestone fires once per page life and the
//! running maximum is kept independently of milestone firing.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::json;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use trailmark_core::domain::{EventType, PluginName};
use trailmark_core::ports::{PageSignal, ScrollMetrics, SignalKind};

use crate::plugin::{Plugin, PluginContext, Subscriptions, TrackerHandle};
use crate::util::props;

/// Quiet period before a scroll position is evaluated
pub const SCROLL_DEBOUNCE: Duration = Duration::from_millis(150);

/// Depth milestones, in percent
pub const MILESTONES: [u8; 4] = [25, 50, 75, 100];

#[derive(Default)]
struct ScrollState {
    fired: Vec<u8>,
    max_depth: f64,
    pending: Option<JoinHandle<()>>,
}

pub struct ScrollPlugin {
    state: Arc<Mutex<ScrollState>>,
    subscriptions: Option<Subscriptions>,
}

impl ScrollPlugin {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScrollState::default())),
            subscriptions: None,
        }
    }

    /// Deepest scroll position seen so far, in percent
    pub fn max_depth(&self) -> f64 {
        lock(&self.state).max_depth
    }
}

impl Default for ScrollPlugin {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(state: &Mutex<ScrollState>) -> MutexGuard<'_, ScrollState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Percentage scrolled, or `None` when the page cannot scroll
fn depth_percent(metrics: &ScrollMetrics) -> Option<f64> {
    let scrollable = metrics.document_height - metrics.viewport_height;
    if scrollable <= 0.0 {
        return None;
    }
    Some((metrics.scroll_top * 100.0 / scrollable).clamp(0.0, 100.0))
}

fn process(state: &Mutex<ScrollState>, tracker: &dyn TrackerHandle, metrics: &ScrollMetrics) {
    let Some(depth) = depth_percent(metrics) else {
        return;
    };

    let (reached, max_depth) = {
        let mut state = lock(state);
        if depth > state.max_depth {
            state.max_depth = depth;
        }
        let reached: Vec<u8> = MILESTONES
            .iter()
            .copied()
            .filter(|m| f64::from(*m) <= depth && !state.fired.contains(m))
            .collect();
        state.fired.extend(&reached);
        (reached, state.max_depth)
    };

    for milestone in reached {
        tracker.track(
            EventType::ScrollDepth,
            &format!("Scroll {}%", milestone),
            props(json!({
                "depth": milestone,
                "max_depth": max_depth.round(),
            })),
        );
    }
}

impl Plugin for ScrollPlugin {
    fn name(&self) -> PluginName {
        PluginName::Scroll
    }

    fn init(&mut self, ctx: PluginContext) -> anyhow::Result<()> {
        let mut subscriptions = Subscriptions::new(Arc::clone(&ctx.events));
        let state = Arc::clone(&self.state);
        let tracker = Arc::clone(&ctx.tracker);

        subscriptions.listen(SignalKind::Scroll, move |signal| {
            let PageSignal::Scroll(metrics) = signal else {
                return;
            };
            let metrics = *metrics;

            match Handle::try_current() {
                Ok(handle) => {
                    let task_state = Arc::clone(&state);
                    let task_tracker = Arc::clone(&tracker);
                    let task = handle.spawn(async move {
                        tokio::time::sleep(SCROLL_DEBOUNCE).await;
                        process(&task_state, task_tracker.as_ref(), &metrics);
                    });
                    if let Some(previous) = lock(&state).pending.replace(task) {
                        previous.abort();
                    }
                }
                Err(_) => process(&state, tracker.as_ref(), &metrics),
            }
        });

        self.subscriptions = Some(subscriptions);
        Ok(())
    }

    fn destroy(&mut self) {
        if let Some(mut subscriptions) = self.subscriptions.take() {
            subscriptions.clear();
        }
        if let Some(pending) = lock(&self.state).pending.take() {
            pending.abort();
        }
    }
}
