//! Config command - view and manage the tracker configuration
//!
//! Provides the `trailmark config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Sets individual values via dot-notation keys
//! 3. Validates the configuration file and reports every error

use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use serde_json::json;
use tracing::info;
use trailmark_core::config::TrackerConfig;
use trailmark_core::domain::PluginName;

use crate::host;
use crate::output::{get_formatter, OutputFormat};

/// Keys accepted by `config set`, with a short description
const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("workspace_id", "Workspace identifier (required)"),
    ("api_endpoint", "Ingestion API base, or 'none' for the default"),
    ("debug", "true|false"),
    ("plugins", "Comma-separated plugin names"),
    ("session_timeout_ms", "Inactivity before a new session"),
    ("batch_size", "Queue length that triggers delivery"),
    ("flush_interval_ms", "Auto-flush period"),
    ("cookie_domain", "Visitor cookie domain, or 'none'"),
    ("use_cookies", "true|false"),
    ("cookieless_mode", "true|false"),
    ("consent.wait_for_consent", "true|false"),
    ("consent.anonymous_mode", "true|false"),
    ("consent.storage_key", "Storage key for the consent choice"),
    ("queue.max_queue_size", "Hard cap on queued events"),
    ("queue.rate_limit.max_events", "Events allowed per window"),
    ("queue.rate_limit.window_ms", "Rate limit window"),
    ("transport.timeout_ms", "Per-request timeout"),
    ("transport.max_retries", "Attempts for a retryable failure"),
    ("transport.retry_delay_ms", "Base retry delay"),
];

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "queue.max_queue_size")
        key: String,
        /// New value
        value: String,
    },
    /// Validate the configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, format: OutputFormat, config: Option<&Path>) -> Result<()> {
        let config_path = config
            .map(Path::to_path_buf)
            .unwrap_or_else(TrackerConfig::default_path);
        match self {
            ConfigCommand::Show => self.execute_show(&config_path, config.is_some(), format),
            ConfigCommand::Set { key, value } => {
                self.execute_set(&config_path, key, value, format)
            }
            ConfigCommand::Validate => self.execute_validate(&config_path, format),
        }
    }

    fn execute_show(&self, config_path: &Path, explicit: bool, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = host::load_config(explicit.then_some(config_path))?;

        info!(config_path = %config_path.display(), "Showing configuration");

        if format.is_json() {
            let value =
                serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&value);
        } else {
            formatter.success(&format!("Configuration ({})", config_path.display()));
            formatter.info("");

            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;
            for line in yaml.lines() {
                formatter.info(line);
            }
        }
        Ok(())
    }

    fn execute_set(
        &self,
        config_path: &Path,
        key: &str,
        value: &str,
        format: OutputFormat,
    ) -> Result<()> {
        let formatter = get_formatter(format);
        let mut config = TrackerConfig::load_or_default(config_path);

        info!(key = %key, value = %value, "Setting configuration value");

        if let Err(e) = apply_config_value(&mut config, key, value) {
            if format.is_json() {
                formatter.print_json(&json!({
                    "success": false,
                    "key": key,
                    "value": value,
                    "error": e.to_string(),
                }));
            } else {
                formatter.error(&format!("Failed to set '{}': {}", key, e));
                formatter.info("");
                formatter.info("Supported keys:");
                for (name, description) in SUPPORTED_KEYS {
                    formatter.info(&format!("  {:<30} - {}", name, description));
                }
            }
            return Ok(());
        }

        // workspace_id may still be unset while the file is being filled in
        let errors: Vec<String> = config
            .validate()
            .iter()
            .filter(|e| e.field != "workspace_id")
            .map(ToString::to_string)
            .collect();
        if !errors.is_empty() {
            if format.is_json() {
                formatter.print_json(&json!({
                    "success": false,
                    "key": key,
                    "value": value,
                    "errors": errors,
                }));
            } else {
                formatter.error(&format!("Invalid value for '{}': {}", key, errors.join("; ")));
            }
            return Ok(());
        }

        save_config(&config, config_path)?;

        if format.is_json() {
            formatter.print_json(&json!({
                "success": true,
                "key": key,
                "value": value,
                "config_path": config_path.display().to_string(),
            }));
        } else {
            formatter.success(&format!("Set {} = {}", key, value));
            formatter.info(&format!("Saved to {}", config_path.display()));
        }
        Ok(())
    }

    fn execute_validate(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        let config = match TrackerConfig::load(config_path) {
            Ok(config) => config,
            Err(e) => {
                let message = if config_path.exists() {
                    format!("Failed to parse configuration: {}", e)
                } else {
                    "Configuration file not found".to_string()
                };
                if format.is_json() {
                    formatter.print_json(&json!({
                        "valid": false,
                        "config_path": config_path.display().to_string(),
                        "errors": [message],
                    }));
                } else {
                    formatter.error(&message);
                    formatter.info(&format!("File: {}", config_path.display()));
                    formatter.info("Run 'trailmark config set workspace_id <id>' to create one.");
                }
                return Ok(());
            }
        };

        info!(config_path = %config_path.display(), "Validating configuration");
        let errors = config.validate();

        if format.is_json() {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&json!({
                "valid": errors.is_empty(),
                "config_path": config_path.display().to_string(),
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", config_path.display()));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            formatter.info(&format!("File: {}", config_path.display()));
            formatter.info("");
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }
        Ok(())
    }
}

fn save_config(config: &TrackerConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
    }
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write configuration file {}", path.display()))
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse::<T>()
        .with_context(|| format!("Invalid value '{}' for {}", value, key))
}

/// `none` or an empty value clears an optional setting
fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(value.to_string())
    }
}

/// Apply a dot-notation key/value pair to a [`TrackerConfig`]
fn apply_config_value(config: &mut TrackerConfig, key: &str, value: &str) -> Result<()> {
    match key {
        "workspace_id" => config.workspace_id = value.trim().to_string(),
        "api_endpoint" => config.api_endpoint = optional(value),
        "debug" => config.debug = parse(key, value)?,
        "plugins" => {
            config.plugins = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse::<PluginName>(key, s))
                .collect::<Result<_>>()?;
        }
        "session_timeout_ms" => config.session_timeout_ms = parse(key, value)?,
        "batch_size" => config.batch_size = parse(key, value)?,
        "flush_interval_ms" => config.flush_interval_ms = parse(key, value)?,
        "cookie_domain" => config.cookie_domain = optional(value),
        "use_cookies" => config.use_cookies = parse(key, value)?,
        "cookieless_mode" => config.cookieless_mode = parse(key, value)?,

        "consent.wait_for_consent" => config.consent.wait_for_consent = parse(key, value)?,
        "consent.anonymous_mode" => config.consent.anonymous_mode = parse(key, value)?,
        "consent.storage_key" => config.consent.storage_key = value.trim().to_string(),

        "queue.max_queue_size" => config.queue.max_queue_size = parse(key, value)?,
        "queue.rate_limit.max_events" => config.queue.rate_limit.max_events = parse(key, value)?,
        "queue.rate_limit.window_ms" => config.queue.rate_limit.window_ms = parse(key, value)?,

        "transport.timeout_ms" => config.transport.timeout_ms = parse(key, value)?,
        "transport.max_retries" => config.transport.max_retries = parse(key, value)?,
        "transport.retry_delay_ms" => config.transport.retry_delay_ms = parse(key, value)?,

        _ => bail!("Unknown configuration key: '{}'", key),
    }
    Ok(())
}
