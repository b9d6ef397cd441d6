//! Headless host wiring
//!
//! The CLI runs the SDK without a page: no plugins, no auto page view,
//! no auto-flush timer. Persistent and session storage share one
//! [`FileStore`], so ids, consent and the queue survive between runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use tracing::debug;
use trailmark_core::config::TrackerConfig;
use trailmark_core::domain::Properties;
use trailmark_core::ports::IKeyValueStore;
use trailmark_pipeline::{FlushOutcome, Tracker};
use trailmark_plugins::StaticPageContext;
use trailmark_storage::FileStore;

/// Page URL reported when `--url` is not given
pub const DEFAULT_PAGE_URL: &str = "about:blank";

/// Loads the configuration from `--config`, or the default path if present
pub fn load_config(path: Option<&Path>) -> Result<TrackerConfig> {
    match path {
        Some(path) => TrackerConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(TrackerConfig::load_or_default(&TrackerConfig::default_path())),
    }
}

/// Where the CLI keeps SDK state
pub fn store_path() -> Result<PathBuf> {
    FileStore::default_path()
        .or_else(|| dirs::home_dir().map(|h| h.join(".trailmark").join("store.json")))
        .ok_or_else(|| anyhow!("Could not determine a data directory for the event store"))
}

/// Builds a tracker over the file store at `store`
pub fn build_tracker(
    config: TrackerConfig,
    store: &Path,
    url: Option<&str>,
) -> Result<Arc<Tracker>> {
    if config.workspace_id.trim().is_empty() {
        bail!(
            "workspace_id is not configured (set it in {} or pass --config)",
            TrackerConfig::default_path().display()
        );
    }

    let mut config = config;
    config.auto_page_view = false;
    config.plugins = Vec::new();

    let store: Arc<dyn IKeyValueStore> = Arc::new(
        FileStore::open_or_reset(store)
            .with_context(|| format!("Failed to open event store at {}", store.display()))?,
    );
    let page = Arc::new(StaticPageContext::new(url.unwrap_or(DEFAULT_PAGE_URL)));

    let tracker = Tracker::builder(config)
        .persistent_store(Arc::clone(&store))
        .session_store(store)
        .page(page)
        .start_timer(false)
        .build()
        .context("Failed to start tracker")?;

    debug!(visitor_id = %tracker.visitor_id(), "Headless tracker ready");
    Ok(tracker)
}

/// Loads configuration and opens the tracker in one step
pub fn open(config_path: Option<&Path>, url: Option<&str>) -> Result<Arc<Tracker>> {
    let config = load_config(config_path)?;
    build_tracker(config, &store_path()?, url)
}

/// Flushes until no other flush holds the queue.
///
/// A flush spawned by a batch-threshold push may already be running;
/// this waits it out and then sends whatever is left.
pub async fn drain(tracker: &Tracker) -> FlushOutcome {
    loop {
        match tracker.flush().await {
            FlushOutcome::InFlight => tokio::time::sleep(Duration::from_millis(10)).await,
            outcome => return outcome,
        }
    }
}

/// Parses repeated `key=value` arguments into an event property map.
///
/// Values that parse as JSON (numbers, booleans, quoted strings, objects)
/// keep their type; anything else is taken as a plain string.
pub fn parse_properties(pairs: &[String]) -> Result<Properties> {
    let mut properties = Properties::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected key=value, got '{}'", pair))?;
        let key = key.trim();
        if key.is_empty() {
            bail!("Property key must not be empty in '{}'", pair);
        }
        let value = serde_json::from_str::<Value>(value)
            .unwrap_or_else(|_| Value::String(value.to_string()));
        properties.insert(key.to_string(), value);
    }
    Ok(properties)
}
