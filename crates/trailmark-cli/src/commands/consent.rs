//! Consent command - show or change the stored consent choice
//!
//! Changes go through the tracker, so they are persisted under the
//! configured consent key exactly as a page would persist them.

use std::path::Path;

use anyhow::Result;
use clap::Subcommand;
use serde_json::json;
use tracing::info;
use trailmark_core::domain::{ConsentCategory, ConsentState};
use trailmark_pipeline::Tracker;

use crate::host;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConsentCommand {
    /// Display current consent
    Show,
    /// Grant one or more categories (analytics, marketing, personalization)
    Grant {
        #[arg(required = true)]
        categories: Vec<ConsentCategory>,
    },
    /// Revoke one or more categories
    Revoke {
        #[arg(required = true)]
        categories: Vec<ConsentCategory>,
    },
    /// Forget the stored choice and return to the configured default
    Reset,
}

impl ConsentCommand {
    pub async fn execute(&self, format: OutputFormat, config: Option<&Path>) -> Result<()> {
        let tracker = host::open(config, None)?;

        match self {
            ConsentCommand::Show => {}
            ConsentCommand::Grant { categories } => {
                tracker.grant_consent(&granting(categories));
                info!(?categories, "Consent granted");
            }
            ConsentCommand::Revoke { categories } => {
                tracker.revoke_consent(categories);
                info!(?categories, "Consent revoked");
            }
            ConsentCommand::Reset => {
                tracker.reset_consent();
                info!("Consent reset");
            }
        }

        print_state(&tracker, format);
        Ok(())
    }
}

/// Partial state with every listed category set to true
fn granting(categories: &[ConsentCategory]) -> ConsentState {
    let mut partial = ConsentState::default();
    for category in categories {
        partial.set(*category, Some(true));
    }
    partial
}

fn show(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "granted",
        Some(false) => "denied",
        None => "unspecified",
    }
}

fn print_state(tracker: &Tracker, format: OutputFormat) {
    let formatter = get_formatter(format);
    let state = tracker.get_consent_state();

    if format.is_json() {
        formatter.print_json(&json!({
            "state": state,
            "explicit": tracker.has_explicit_consent(),
            "can_track": tracker.can_track(),
        }));
        return;
    }

    formatter.success("Consent");
    for category in [
        ConsentCategory::Analytics,
        ConsentCategory::Marketing,
        ConsentCategory::Personalization,
    ] {
        formatter.field(&category.to_string(), show(state.get(category)));
    }
    formatter.field(
        "Source",
        if tracker.has_explicit_consent() {
            "user choice"
        } else {
            "configured default"
        },
    );
    formatter.field("Tracking", if tracker.can_track() { "allowed" } else { "blocked" });
}
