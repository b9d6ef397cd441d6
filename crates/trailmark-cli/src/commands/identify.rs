//! Identify command - associate the visitor with an email

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use crate::host;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct IdentifyCommand {
    /// Email address of the visitor
    pub email: String,

    /// Trait as key=value (repeatable), e.g. first_name=Ada
    #[arg(long = "trait", value_name = "KEY=VALUE")]
    pub traits: Vec<String>,
}

impl IdentifyCommand {
    pub async fn execute(&self, format: OutputFormat, config: Option<&Path>) -> Result<()> {
        let formatter = get_formatter(format);
        let traits = host::parse_properties(&self.traits)?;
        let tracker = host::open(config, None)?;

        tracker
            .identify(&self.email, traits)
            .await
            .with_context(|| format!("Identify failed for {}", self.email.trim()))?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "email": self.email.trim(),
                "visitor_id": tracker.visitor_id().to_string(),
            }));
        } else {
            formatter.success(&format!("Identified {}", self.email.trim()));
            formatter.field("Visitor", &tracker.visitor_id().to_string());
        }
        Ok(())
    }
}
