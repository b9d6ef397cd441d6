//! Configuration module for Trailmark.
//!
//! Provides the typed [`TrackerConfig`] accepted at tracker construction,
//! with loading from YAML/JSON files, validation, defaults, and a builder
//! for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::{ConfigError, ConsentState, PluginName};

/// Production ingestion host, used when the page is not a local dev host.
pub const DEFAULT_API_ENDPOINT: &str = "https://api.trailmark.io";

/// Ingestion host used while developing against a local backend.
pub const LOCAL_API_ENDPOINT: &str = "http://localhost:3000";

/// Hosts treated as local development.
const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1", "0.0.0.0"];

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Top-level configuration for a tracker instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Workspace/project identifier. Required.
    pub workspace_id: String,
    /// Ingestion API base. `None` selects by environment heuristic.
    pub api_endpoint: Option<String>,
    /// Enables SDK log output.
    pub debug: bool,
    /// Emit a page view on load and on History API navigation.
    pub auto_page_view: bool,
    /// Plugins to load, from the closed [`PluginName`] set.
    pub plugins: Vec<PluginName>,
    /// Inactivity after which the session ID is regenerated.
    pub session_timeout_ms: u64,
    /// Queue length that triggers a flush.
    pub batch_size: usize,
    /// Auto-flush timer period.
    pub flush_interval_ms: u64,
    pub consent: ConsentConfig,
    /// Domain attribute for the visitor cookie.
    pub cookie_domain: Option<String>,
    /// Persist the visitor ID in a cookie instead of storage.
    pub use_cookies: bool,
    /// Keep identifiers in session storage only.
    pub cookieless_mode: bool,
    pub queue: QueueConfig,
    pub transport: TransportConfig,
}

/// Consent sub-configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsentConfig {
    /// State used before the user expresses any choice.
    pub default_state: ConsentState,
    /// Block (and buffer) tracking until the user makes an explicit choice.
    pub wait_for_consent: bool,
    /// Storage key for persisted consent.
    pub storage_key: String,
    /// Withhold persistent identity until explicit consent.
    pub anonymous_mode: bool,
}

/// Event queue tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Hard cap on queued events; the oldest are evicted first.
    pub max_queue_size: usize,
    pub rate_limit: RateLimitConfig,
}

/// Sliding-window limit on `push`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_events: usize,
    pub window_ms: u64,
}

/// Outbound delivery tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Per-attempt timeout.
    pub timeout_ms: u64,
    /// Total attempts for a retryable failure.
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `retry_delay_ms * n`.
    pub retry_delay_ms: u64,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            workspace_id: String::new(),
            api_endpoint: None,
            debug: false,
            auto_page_view: true,
            plugins: PluginName::defaults(),
            session_timeout_ms: 30 * 60 * 1000,
            batch_size: 10,
            flush_interval_ms: 5000,
            consent: ConsentConfig::default(),
            cookie_domain: None,
            use_cookies: false,
            cookieless_mode: false,
            queue: QueueConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            default_state: ConsentState {
                analytics: Some(true),
                marketing: Some(false),
                personalization: Some(false),
            },
            wait_for_consent: false,
            storage_key: "trailmark_consent".to_string(),
            anonymous_mode: false,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 1000,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_events: 100,
            window_ms: 60_000,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl TrackerConfig {
    /// Load configuration from a YAML or JSON file (chosen by extension).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path.extension().is_some_and(|e| e == "json");
        if is_json {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    /// Try to load from `path`; fall back to [`TrackerConfig::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/trailmark/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("trailmark")
            .join("config.yaml")
    }

    /// Fails only when the workspace identifier is missing.
    pub fn require_workspace(&self) -> Result<(), ConfigError> {
        if self.workspace_id.trim().is_empty() {
            Err(ConfigError::MissingWorkspaceId)
        } else {
            Ok(())
        }
    }

    /// Resolve the ingestion base URL for a page served from `page_host`.
    ///
    /// An explicit `api_endpoint` always wins. Trailing slashes are trimmed.
    pub fn resolve_api_endpoint(&self, page_host: Option<&str>) -> String {
        if let Some(endpoint) = self.api_endpoint.as_deref().filter(|e| !e.trim().is_empty()) {
            return endpoint.trim().trim_end_matches('/').to_string();
        }
        match page_host {
            Some(host) if LOCAL_HOSTS.contains(&host) => LOCAL_API_ENDPOINT.to_string(),
            _ => DEFAULT_API_ENDPOINT.to_string(),
        }
    }

    /// Replace out-of-range numeric values with their defaults.
    ///
    /// Returns the normalized config and the fields that were replaced.
    pub fn normalized(mut self) -> (Self, Vec<String>) {
        let defaults = TrackerConfig::default();
        let mut replaced = Vec::new();

        if self.batch_size == 0 {
            self.batch_size = defaults.batch_size;
            replaced.push("batch_size".to_string());
        }
        if self.flush_interval_ms == 0 {
            self.flush_interval_ms = defaults.flush_interval_ms;
            replaced.push("flush_interval_ms".to_string());
        }
        if self.session_timeout_ms == 0 {
            self.session_timeout_ms = defaults.session_timeout_ms;
            replaced.push("session_timeout_ms".to_string());
        }
        if self.queue.max_queue_size == 0 {
            self.queue.max_queue_size = defaults.queue.max_queue_size;
            replaced.push("queue.max_queue_size".to_string());
        }
        if self.queue.rate_limit.max_events == 0 {
            self.queue.rate_limit.max_events = defaults.queue.rate_limit.max_events;
            replaced.push("queue.rate_limit.max_events".to_string());
        }
        if self.queue.rate_limit.window_ms == 0 {
            self.queue.rate_limit.window_ms = defaults.queue.rate_limit.window_ms;
            replaced.push("queue.rate_limit.window_ms".to_string());
        }
        if self.transport.timeout_ms == 0 {
            self.transport.timeout_ms = defaults.transport.timeout_ms;
            replaced.push("transport.timeout_ms".to_string());
        }
        if self.transport.max_retries == 0 {
            self.transport.max_retries = defaults.transport.max_retries;
            replaced.push("transport.max_retries".to_string());
        }
        if self.consent.storage_key.trim().is_empty() {
            self.consent.storage_key = defaults.consent.storage_key;
            replaced.push("consent.storage_key".to_string());
        }

        (self, replaced)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"queue.max_queue_size"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError {
            field: field.into(),
            message: "must be greater than 0".into(),
        });
    }
}

impl TrackerConfig {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.workspace_id.trim().is_empty() {
            errors.push(ValidationError {
                field: "workspace_id".into(),
                message: "is required".into(),
            });
        }

        if let Some(endpoint) = &self.api_endpoint {
            if Url::parse(endpoint).is_err() {
                errors.push(ValidationError {
                    field: "api_endpoint".into(),
                    message: format!("not a valid URL: {endpoint}"),
                });
            }
        }

        positive(&mut errors, "session_timeout_ms", self.session_timeout_ms);
        positive(&mut errors, "batch_size", self.batch_size as u64);
        positive(&mut errors, "flush_interval_ms", self.flush_interval_ms);
        positive(&mut errors, "queue.max_queue_size", self.queue.max_queue_size as u64);
        positive(
            &mut errors,
            "queue.rate_limit.max_events",
            self.queue.rate_limit.max_events as u64,
        );
        positive(&mut errors, "queue.rate_limit.window_ms", self.queue.rate_limit.window_ms);
        positive(&mut errors, "transport.timeout_ms", self.transport.timeout_ms);
        positive(&mut errors, "transport.max_retries", self.transport.max_retries as u64);

        if self.batch_size > self.queue.max_queue_size && self.queue.max_queue_size > 0 {
            errors.push(ValidationError {
                field: "batch_size".into(),
                message: format!(
                    "batch_size ({}) must not exceed queue.max_queue_size ({})",
                    self.batch_size, self.queue.max_queue_size
                ),
            });
        }

        if self.consent.storage_key.trim().is_empty() {
            errors.push(ValidationError {
                field: "consent.storage_key".into(),
                message: "must not be empty".into(),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`TrackerConfig`] programmatically.
///
/// # Example
///
/// ```rust
/// use trailmark_core::config::TrackerConfigBuilder;
///
/// let config = TrackerConfigBuilder::new("ws_123")
///     .batch_size(20)
///     .debug(true)
///     .build();
/// assert_eq!(config.batch_size, 20);
/// ```
#[derive(Debug, Clone)]
pub struct TrackerConfigBuilder {
    config: TrackerConfig,
}

impl TrackerConfigBuilder {
    /// Create a new builder for `workspace_id` with default values.
    pub fn new(workspace_id: impl Into<String>) -> Self {
        Self {
            config: TrackerConfig {
                workspace_id: workspace_id.into(),
                ..TrackerConfig::default()
            },
        }
    }

    pub fn api_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.api_endpoint = Some(endpoint.into());
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    pub fn auto_page_view(mut self, enabled: bool) -> Self {
        self.config.auto_page_view = enabled;
        self
    }

    pub fn plugins(mut self, plugins: Vec<PluginName>) -> Self {
        self.config.plugins = plugins;
        self
    }

    pub fn session_timeout_ms(mut self, ms: u64) -> Self {
        self.config.session_timeout_ms = ms;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn flush_interval_ms(mut self, ms: u64) -> Self {
        self.config.flush_interval_ms = ms;
        self
    }

    // --- consent ---

    pub fn default_consent(mut self, state: ConsentState) -> Self {
        self.config.consent.default_state = state;
        self
    }

    pub fn wait_for_consent(mut self, wait: bool) -> Self {
        self.config.consent.wait_for_consent = wait;
        self
    }

    pub fn consent_storage_key(mut self, key: impl Into<String>) -> Self {
        self.config.consent.storage_key = key.into();
        self
    }

    pub fn anonymous_mode(mut self, enabled: bool) -> Self {
        self.config.consent.anonymous_mode = enabled;
        self
    }

    // --- identity storage ---

    pub fn cookie_domain(mut self, domain: impl Into<String>) -> Self {
        self.config.cookie_domain = Some(domain.into());
        self
    }

    pub fn use_cookies(mut self, enabled: bool) -> Self {
        self.config.use_cookies = enabled;
        self
    }

    pub fn cookieless_mode(mut self, enabled: bool) -> Self {
        self.config.cookieless_mode = enabled;
        self
    }

    // --- queue / transport ---

    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.config.queue.max_queue_size = size;
        self
    }

    pub fn rate_limit(mut self, max_events: usize, window_ms: u64) -> Self {
        self.config.queue.rate_limit = RateLimitConfig {
            max_events,
            window_ms,
        };
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.transport.timeout_ms = ms;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.transport.max_retries = retries;
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.transport.retry_delay_ms = ms;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`TrackerConfig`].
    pub fn build(self) -> TrackerConfig {
        self.config
    }

    /// Build and validate in one step.
    pub fn build_validated(self) -> Result<TrackerConfig, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}
