//! Error observer
//!
//! Reports uncaught errors and unhandled promise rejections, with message,
//! stack and reason text truncated before emission.

use std::sync::Arc;

use serde_json::json;
use trailmark_core::domain::{EventType, PluginName};
use trailmark_core::ports::{PageSignal, SignalKind};

use crate::plugin::{Plugin, PluginContext, Subscriptions};
use crate::util::{props, truncate_chars};

pub const MAX_MESSAGE_LEN: usize = 500;
pub const MAX_STACK_LEN: usize = 1000;
pub const MAX_REASON_LEN: usize = 500;

pub struct ErrorsPlugin {
    subscriptions: Option<Subscriptions>,
}

impl ErrorsPlugin {
    pub fn new() -> Self {
        Self {
            subscriptions: None,
        }
    }
}

impl Default for ErrorsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for ErrorsPlugin {
    fn name(&self) -> PluginName {
        PluginName::Errors
    }

    fn init(&mut self, ctx: PluginContext) -> anyhow::Result<()> {
        let mut subscriptions = Subscriptions::new(Arc::clone(&ctx.events));

        let tracker = Arc::clone(&ctx.tracker);
        subscriptions.listen(SignalKind::Error, move |signal| {
            let PageSignal::Error(info) = signal else {
                return;
            };
            tracker.track(
                EventType::Error,
                "JavaScript Error",
                props(json!({
                    "message": truncate_chars(&info.message, MAX_MESSAGE_LEN),
                    "source": info.source,
                    "line": info.line,
                    "column": info.column,
                    "stack": info.stack.as_deref().map(|s| truncate_chars(s, MAX_STACK_LEN)),
                })),
            );
        });

        let tracker = Arc::clone(&ctx.tracker);
        subscriptions.listen(SignalKind::UnhandledRejection, move |signal| {
            let PageSignal::UnhandledRejection { reason } = signal else {
                return;
            };
            tracker.track(
                EventType::Error,
                "Unhandled Promise Rejection",
                props(json!({ "reason": truncate_chars(reason, MAX_REASON_LEN) })),
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
