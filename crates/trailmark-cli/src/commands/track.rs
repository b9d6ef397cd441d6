//! Track command - queue an event from the command line
//!
//! The event goes through the same consent gate and rate limiter as in a
//! page. It is delivered when the queue reaches its batch size, or at
//! once with `--flush`.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use tracing::info;
use trailmark_core::domain::EventType;
use trailmark_pipeline::{PushOutcome, TrackOutcome};

use crate::host;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct TrackCommand {
    /// Event name
    pub name: String,

    /// Event type (custom, page_view, button_click, ...)
    #[arg(long = "type", default_value = "custom")]
    pub event_type: EventType,

    /// Event property as key=value (repeatable)
    #[arg(long = "prop", value_name = "KEY=VALUE")]
    pub props: Vec<String>,

    /// Page URL to report with the event
    #[arg(long)]
    pub url: Option<String>,

    /// Deliver the queue right after tracking
    #[arg(long)]
    pub flush: bool,
}

impl TrackCommand {
    pub async fn execute(&self, format: OutputFormat, config: Option<&Path>) -> Result<()> {
        let formatter = get_formatter(format);
        let properties = host::parse_properties(&self.props)?;
        let tracker = host::open(config, self.url.as_deref())?;

        let outcome = if self.event_type == EventType::PageView {
            tracker.page(Some(&self.name), Some(properties))
        } else {
            tracker.track(self.event_type, &self.name, properties)
        };
        info!(event = %self.name, ?outcome, "Tracked from CLI");

        let flushed = if self.flush || tracker.queue_len() >= tracker.config().batch_size {
            Some(host::drain(&tracker).await)
        } else {
            None
        };

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "event": self.name,
                "type": self.event_type.as_str(),
                "outcome": describe(outcome),
                "queued": tracker.queue_len(),
                "flush": flushed.as_ref().map(super::flush::outcome_json),
            }));
            return Ok(());
        }

        match outcome {
            TrackOutcome::Queued(PushOutcome::RateLimited) => {
                formatter.warn(&format!("'{}' dropped by the rate limiter", self.name))
            }
            TrackOutcome::Queued(PushOutcome::QueuedWithEviction) => {
                formatter.success(&format!("Queued '{}'", self.name));
                formatter.warn("Queue was full, the oldest event was dropped");
            }
            TrackOutcome::Queued(PushOutcome::Queued) => {
                formatter.success(&format!("Queued '{}'", self.name))
            }
            TrackOutcome::Buffered => formatter.warn(&format!(
                "'{}' was not stored: tracking waits for consent (see `trailmark consent`)",
                self.name
            )),
            TrackOutcome::Blocked => formatter.warn(&format!(
                "'{}' dropped: analytics consent is not granted",
                self.name
            )),
            TrackOutcome::NotInitialized => {
                formatter.error("Tracker is not initialized");
            }
        }
        if let Some(flushed) = flushed {
            super::flush::report(formatter.as_ref(), &flushed);
        }
        formatter.field("Queued events", &tracker.queue_len().to_string());
        Ok(())
    }
}

/// Stable name of a track outcome for JSON output
pub fn describe(outcome: TrackOutcome) -> &'static str {
    match outcome {
        TrackOutcome::Queued(PushOutcome::Queued) => "queued",
        TrackOutcome::Queued(PushOutcome::QueuedWithEviction) => "queued_with_eviction",
        TrackOutcome::Queued(PushOutcome::RateLimited) => "rate_limited",
        TrackOutcome::Buffered => "buffered",
        TrackOutcome::Blocked => "blocked",
        TrackOutcome::NotInitialized => "not_initialized",
    }
}
