//! Queue command - inspect or clear the persisted event queue

use std::path::Path;

use anyhow::Result;
use clap::Subcommand;
use serde_json::json;
use tracing::info;

use crate::host;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum QueueCommand {
    /// List queued events
    Show {
        /// Include each event's properties
        #[arg(long)]
        full: bool,
    },
    /// Drop every queued event without sending it
    Clear,
}

impl QueueCommand {
    pub async fn execute(&self, format: OutputFormat, config: Option<&Path>) -> Result<()> {
        match self {
            QueueCommand::Show { full } => self.execute_show(*full, format, config),
            QueueCommand::Clear => self.execute_clear(format, config),
        }
    }

    fn execute_show(&self, full: bool, format: OutputFormat, config: Option<&Path>) -> Result<()> {
        let formatter = get_formatter(format);
        let tracker = host::open(config, None)?;
        let events = tracker.queued_events();

        if format.is_json() {
            formatter.print_json(&json!({
                "count": events.len(),
                "events": events,
            }));
            return Ok(());
        }

        if events.is_empty() {
            formatter.success("Queue is empty");
            return Ok(());
        }

        formatter.success(&format!("{} queued event(s)", events.len()));
        for event in &events {
            formatter.info(&format!(
                "{}  {:<16} {}",
                event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                event.event_type.as_str(),
                event.event_name
            ));
            if full && !event.properties.is_empty() {
                let properties = serde_json::Value::Object(event.properties.clone());
                formatter.info(&format!("    {}", properties));
            }
        }
        Ok(())
    }

    fn execute_clear(&self, format: OutputFormat, config: Option<&Path>) -> Result<()> {
        let formatter = get_formatter(format);
        let tracker = host::open(config, None)?;

        let dropped = tracker.queue_len();
        tracker.clear_queue();
        info!(dropped, "Queue cleared");

        if format.is_json() {
            formatter.print_json(&json!({"success": true, "dropped": dropped}));
        } else {
            formatter.success(&format!("Dropped {} queued event(s)", dropped));
        }
        Ok(())
    }
}
