//! Flush command - deliver every queued event

use std::path::Path;

use anyhow::Result;
use clap::Args;
use serde_json::{json, Value};
use tracing::info;
use trailmark_pipeline::FlushOutcome;

use crate::host;
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct FlushCommand {}

impl FlushCommand {
    pub async fn execute(&self, format: OutputFormat, config: Option<&Path>) -> Result<()> {
        let formatter = get_formatter(format);
        let tracker = host::open(config, None)?;

        let before = tracker.queue_len();
        let outcome = host::drain(&tracker).await;
        info!(before, ?outcome, "Flush finished");

        if format.is_json() {
            let mut value = outcome_json(&outcome);
            value["remaining"] = json!(tracker.queue_len());
            formatter.print_json(&value);
        } else {
            report(formatter.as_ref(), &outcome);
            formatter.field("Remaining", &tracker.queue_len().to_string());
        }
        Ok(())
    }
}

/// Prints a flush outcome in human form
pub fn report(formatter: &dyn OutputFormatter, outcome: &FlushOutcome) {
    match outcome {
        FlushOutcome::Empty => formatter.success("Queue is empty, nothing to send"),
        FlushOutcome::InFlight => formatter.warn("Another flush is still running"),
        FlushOutcome::Withheld { dropped } => formatter.warn(&format!(
            "Analytics consent is not granted, {} queued event(s) discarded",
            dropped
        )),
        FlushOutcome::Sent { count } => {
            formatter.success(&format!("Delivered {} event(s)", count))
        }
        FlushOutcome::Requeued { count, error } => formatter.error(&format!(
            "Delivery of {} event(s) failed, kept for the next flush: {}",
            count, error
        )),
    }
}

pub fn outcome_json(outcome: &FlushOutcome) -> Value {
    match outcome {
        FlushOutcome::Empty => json!({"status": "empty", "sent": 0}),
        FlushOutcome::InFlight => json!({"status": "in_flight", "sent": 0}),
        FlushOutcome::Withheld { dropped } => {
            json!({"status": "withheld", "sent": 0, "dropped": dropped})
        }
        FlushOutcome::Sent { count } => json!({"status": "sent", "sent": count}),
        FlushOutcome::Requeued { count, error } => json!({
            "status": "requeued",
            "sent": 0,
            "requeued": count,
            "error": error.to_string(),
        }),
    }
}
