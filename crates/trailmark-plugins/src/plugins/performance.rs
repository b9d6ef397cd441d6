//! Performance observer
//!
//! Reports navigation timing once the page has loaded, plus Web Vitals
//! where the host supports the matching performance observer:
//!
//! - FID: first entry reported immediately
//! - LCP: latest entry wins, reported on hide/unload
//! - CLS: shifts without recent input accumulate, reported on hide/unload

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::json;
use tracing::debug;
use trailmark_core::domain::{EventType, PluginName};
use trailmark_core::ports::{
    IPageContext, NavigationTiming, PageSignal, SignalKind, VitalEntry, VitalKind,
};

use crate::plugin::{Plugin, PluginContext, Subscriptions, TrackerHandle};
use crate::util::props;

#[derive(Default)]
struct VitalsState {
    timing_reported: bool,
    supported: HashSet<VitalKind>,
    fid_reported: bool,
    lcp: Option<f64>,
    cls: Option<f64>,
    final_reported: bool,
}

pub struct PerformancePlugin {
    state: Arc<Mutex<VitalsState>>,
    subscriptions: Option<Subscriptions>,
}

impl PerformancePlugin {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(VitalsState::default())),
            subscriptions: None,
        }
    }
}

impl Default for PerformancePlugin {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(state: &Mutex<VitalsState>) -> MutexGuard<'_, VitalsState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

fn track_vital(tracker: &dyn TrackerHandle, metric: &str, value: f64) {
    tracker.track(
        EventType::Performance,
        metric,
        props(json!({ "metric": metric, "value": value })),
    );
}

fn report_timing(state: &Mutex<VitalsState>, tracker: &dyn TrackerHandle, page: &dyn IPageContext) {
    let Some(NavigationTiming {
        dns_ms,
        tcp_ms,
        ttfb_ms,
        response_ms,
        dom_interactive_ms,
        dom_content_loaded_ms,
        load_ms,
    }) = page.navigation_timing()
    else {
        debug!("Navigation timing unavailable");
        return;
    };
    {
        let mut state = lock(state);
        if state.timing_reported {
            return;
        }
        state.timing_reported = true;
    }
    tracker.track(
        EventType::Performance,
        "Page Load Performance",
        props(json!({
            "dns": dns_ms,
            "tcp": tcp_ms,
            "ttfb": ttfb_ms,
            "response": response_ms,
            "dom_interactive": dom_interactive_ms,
            "dom_content_loaded": dom_content_loaded_ms,
            "load": load_ms,
        })),
    );
}

fn observe(state: &Mutex<VitalsState>, tracker: &dyn TrackerHandle, entry: &VitalEntry) {
    let mut guard = lock(state);
    if !guard.supported.contains(&entry.kind) {
        return;
    }
    match entry.kind {
        VitalKind::FirstInputDelay => {
            if guard.fid_reported {
                return;
            }
            guard.fid_reported = true;
            drop(guard);
            track_vital(tracker, "FID", entry.value);
        }
        VitalKind::LargestContentfulPaint => guard.lcp = Some(entry.value),
        VitalKind::CumulativeLayoutShift => {
            if !entry.had_recent_input {
                guard.cls = Some(guard.cls.unwrap_or(0.0) + entry.value);
            }
        }
    }
}

fn report_final(state: &Mutex<VitalsState>, tracker: &dyn TrackerHandle) {
    let (lcp, cls) = {
        let mut state = lock(state);
        if state.final_reported {
            return;
        }
        state.final_reported = true;
        (state.lcp, state.cls)
    };
    if let Some(lcp) = lcp {
        track_vital(tracker, "LCP", lcp);
    }
    if let Some(cls) = cls {
        track_vital(tracker, "CLS", cls);
    }
}

impl Plugin for PerformancePlugin {
    fn name(&self) -> PluginName {
        PluginName::Performance
    }

    fn init(&mut self, ctx: PluginContext) -> anyhow::Result<()> {
        {
            let mut state = lock(&self.state);
            *state = VitalsState::default();
            for kind in [
                VitalKind::LargestContentfulPaint,
                VitalKind::FirstInputDelay,
                VitalKind::CumulativeLayoutShift,
            ] {
                if ctx.page.supports_vital(kind) {
                    state.supported.insert(kind);
                } else {
                    debug!(?kind, "Performance observer not supported");
                }
            }
        }

        let mut subscriptions = Subscriptions::new(Arc::clone(&ctx.events));

        // Already loaded: report now, otherwise wait for the load event
        if ctx.page.navigation_timing().is_some() {
            report_timing(&self.state, ctx.tracker.as_ref(), ctx.page.as_ref());
        } else {
            let (state, tracker, page) = (
                Arc::clone(&self.state),
                Arc::clone(&ctx.tracker),
                Arc::clone(&ctx.page),
            );
            subscriptions.listen(SignalKind::Load, move |_| {
                report_timing(&state, tracker.as_ref(), page.as_ref());
            });
        }

        let (state, tracker) = (Arc::clone(&self.state), Arc::clone(&ctx.tracker));
        subscriptions.listen(SignalKind::Vital, move |signal| {
            if let PageSignal::Vital(entry) = signal {
                observe(&state, tracker.as_ref(), entry);
            }
        });

        let (state, tracker) = (Arc::clone(&self.state), Arc::clone(&ctx.tracker));
        subscriptions.listen(SignalKind::VisibilityChange, move |signal| {
            if matches!(signal, PageSignal::VisibilityChange { hidden: true }) {
                report_final(&state, tracker.as_ref());
            }
        });

        for kind in [SignalKind::BeforeUnload, SignalKind::PageHide] {
            let (state, tracker) = (Arc::clone(&self.state), Arc::clone(&ctx.tracker));
            subscriptions.listen(kind, move |_| report_final(&state, tracker.as_ref()));
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
