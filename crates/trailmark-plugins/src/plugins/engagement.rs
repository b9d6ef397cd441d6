//! Engagement observer
//!
//! The first qualifying interaction (mouse move, key, touch, scroll)
//! emits `engagement`. Active time accrues between interactions, capped
//! at the inactivity window per gap, so an idle tab stops counting after
//! 30 seconds. On hide or unload `time_on_page` reports active and
//! visible time; hidden time is never counted.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;
use trailmark_core::domain::{EventType, PluginName};
use trailmark_core::ports::{PageSignal, SignalKind};

use crate::plugin::{Plugin, PluginContext, Subscriptions, TrackerHandle};
use crate::util::props;

/// Inactivity window after which a visitor counts as idle
pub const INACTIVITY_WINDOW: Duration = Duration::from_secs(30);

struct EngagementState {
    engaged: bool,
    hidden: bool,
    active: Duration,
    visible: Duration,
    visible_since: Instant,
    last_interaction: Option<Instant>,
}

impl EngagementState {
    fn new(now: Instant) -> Self {
        Self {
            engaged: false,
            hidden: false,
            active: Duration::ZERO,
            visible: Duration::ZERO,
            visible_since: now,
            last_interaction: None,
        }
    }

    /// Credits the gap since the last interaction, capped at the window
    fn accrue(&mut self, now: Instant) {
        if let Some(last) = self.last_interaction {
            self.active += now.saturating_duration_since(last).min(INACTIVITY_WINDOW);
        }
    }

    /// Returns true on the first interaction of the page life
    fn interact(&mut self, now: Instant) -> bool {
        if self.hidden {
            return false;
        }
        self.accrue(now);
        self.last_interaction = Some(now);
        !std::mem::replace(&mut self.engaged, true)
    }

    /// Closes the visible period; returns (active, visible) if not already hidden
    fn hide(&mut self, now: Instant) -> Option<(Duration, Duration)> {
        if self.hidden {
            return None;
        }
        self.accrue(now);
        self.visible += now.saturating_duration_since(self.visible_since);
        self.last_interaction = None;
        self.hidden = true;
        Some((self.active, self.visible))
    }

    fn show(&mut self, now: Instant) {
        if self.hidden {
            self.hidden = false;
            self.visible_since = now;
        }
    }
}

pub struct EngagementPlugin {
    state: Arc<Mutex<EngagementState>>,
    subscriptions: Option<Subscriptions>,
}

impl EngagementPlugin {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(EngagementState::new(Instant::now()))),
            subscriptions: None,
        }
    }
}

impl Default for EngagementPlugin {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(state: &Mutex<EngagementState>) -> MutexGuard<'_, EngagementState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

fn report(state: &Mutex<EngagementState>, tracker: &dyn TrackerHandle) {
    let (totals, engaged) = {
        let mut state = lock(state);
        (state.hide(Instant::now()), state.engaged)
    };
    let Some((active, visible)) = totals else {
        return;
    };
    tracker.track(
        EventType::TimeOnPage,
        "Time on page",
        props(json!({
            "active_seconds": active.as_secs(),
            "visible_seconds": visible.as_secs(),
            "engaged": engaged,
        })),
    );
}

impl Plugin for EngagementPlugin {
    fn name(&self) -> PluginName {
        PluginName::Engagement
    }

    fn init(&mut self, ctx: PluginContext) -> anyhow::Result<()> {
        *lock(&self.state) = EngagementState::new(Instant::now());
        let mut subscriptions = Subscriptions::new(Arc::clone(&ctx.events));

        for kind in [
            SignalKind::MouseMove,
            SignalKind::KeyDown,
            SignalKind::TouchStart,
            SignalKind::Scroll,
        ] {
            let (state, tracker) = (Arc::clone(&self.state), Arc::clone(&ctx.tracker));
            subscriptions.listen(kind, move |_| {
                let first = lock(&state).interact(Instant::now());
                if first {
                    tracker.track(EventType::Engagement, "engaged", props(json!({})));
                }
            });
        }

        let (state, tracker) = (Arc::clone(&self.state), Arc::clone(&ctx.tracker));
        subscriptions.listen(SignalKind::VisibilityChange, move |signal| {
            let PageSignal::VisibilityChange { hidden } = signal else {
                return;
            };
            if *hidden {
                report(&state, tracker.as_ref());
            } else {
                lock(&state).show(Instant::now());
            }
        });

        for kind in [SignalKind::BeforeUnload, SignalKind::PageHide] {
            let (state, tracker) = (Arc::clone(&self.state), Arc::clone(&ctx.tracker));
            subscriptions.listen(kind, move |_| report(&state, tracker.as_ref()));
        }

        self.subscriptions = Some(subscriptions);
        Ok(())
    }

    fn destroy(&mut self) {
        if let Some(mut subscriptions) = self.subscriptions.take() {
            subscriptions.clear();
        }
    }
}
