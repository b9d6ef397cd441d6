//! Exit intent observer
//!
//! Fires once per page life when the mouse leaves across the top edge.
//! Touch devices have no such gesture, so the plugin stays inert there.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::json;
use tracing::debug;
use trailmark_core::domain::{EventType, PluginName};
use trailmark_core::ports::{PageSignal, SignalKind};

use crate::plugin::{Plugin, PluginContext, Subscriptions};
use crate::util::props;

pub struct ExitIntentPlugin {
    fired: Arc<AtomicBool>,
    subscriptions: Option<Subscriptions>,
}

impl ExitIntentPlugin {
    pub fn new() -> Self {
        Self {
            fired: Arc::new(AtomicBool::new(false)),
            subscriptions: None,
        }
    }
}

impl Default for ExitIntentPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for ExitIntentPlugin {
    fn name(&self) -> PluginName {
        PluginName::ExitIntent
    }

    fn init(&mut self, ctx: PluginContext) -> anyhow::Result<()> {
        if ctx.page.is_touch_device() {
            debug!("Touch device, exit intent disabled");
            return Ok(());
        }

        let mut subscriptions = Subscriptions::new(Arc::clone(&ctx.events));
        let tracker = Arc::clone(&ctx.tracker);
        let page = Arc::clone(&ctx.page);
        let fired = Arc::clone(&self.fired);

        subscriptions.listen(SignalKind::MouseLeave, move |signal| {
            let PageSignal::MouseLeave { client_y } = signal else {
                return;
            };
            if *client_y > 0.0 || fired.swap(true, Ordering::SeqCst) {
                return;
            }
            tracker.track(
                EventType::ExitIntent,
                "Exit intent",
                props(json!({ "path": page.path() })),
            );
        });

        self.subscriptions = Some(subscriptions);
        Ok(())
    }

    fn destroy(&mut self) {
        if let Some(mut subscriptions) = self.subscriptions.take() {
            subscriptions.clear();
        }
    }
}
