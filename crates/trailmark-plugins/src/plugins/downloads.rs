//! Download observer
//!
//! Link clicks whose URL ends in a known file extension are reported as
//! downloads, once per URL per page life.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde_json::json;
use tracing::debug;
use trailmark_core::domain::{EventType, PluginName};
use trailmark_core::ports::{PageSignal, SignalKind};
use url::Url;

use crate::plugin::{Plugin, PluginContext, Subscriptions};
use crate::util::props;

/// Extensions treated as downloads
pub const DOWNLOAD_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "csv", "txt", "rtf", "zip", "rar", "7z",
    "tar", "gz", "dmg", "exe", "msi", "pkg", "deb", "rpm", "apk", "iso", "mp3", "mp4", "wav",
    "avi", "mov", "mkv", "epub",
];

/// Last path segment of `url`, without query or fragment
fn file_name(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    path.rsplit('/').next().unwrap_or_default().to_string()
}

/// Lowercase file extension of `url`, or `"unknown"` when there is none
pub fn get_file_extension(url: &str) -> String {
    let name = file_name(url);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_ascii_lowercase(),
        _ => "unknown".to_string(),
    }
}

/// Returns true if `url` points at a file with a download extension
pub fn is_download_url(url: &str) -> bool {
    let ext = get_file_extension(url);
    DOWNLOAD_EXTENSIONS.contains(&ext.as_str())
}

pub struct DownloadsPlugin {
    seen: Arc<Mutex<HashSet<String>>>,
    subscriptions: Option<Subscriptions>,
}

impl DownloadsPlugin {
    pub fn new() -> Self {
        Self {
            seen: Arc::new(Mutex::new(HashSet::new())),
            subscriptions: None,
        }
    }
}

impl Default for DownloadsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for DownloadsPlugin {
    fn name(&self) -> PluginName {
        PluginName::Downloads
    }

    fn init(&mut self, ctx: PluginContext) -> anyhow::Result<()> {
        let mut subscriptions = Subscriptions::new(Arc::clone(&ctx.events));
        let tracker = Arc::clone(&ctx.tracker);
        let seen = Arc::clone(&self.seen);

        subscriptions.listen(SignalKind::Click, move |signal| {
            let PageSignal::Click(element) = signal else {
                return;
            };
            let Some(href) = element.href.as_deref() else {
                return;
            };
            if !is_download_url(href) {
                return;
            }

            let first = seen
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(href.to_string());
            if !first {
                debug!(url = href, "Repeat download click ignored");
                return;
            }

            let name = file_name(href);
            tracker.track(
                EventType::Download,
                &format!("Download: {}", name),
                props(json!({
                    "url": href,
                    "file_name": name,
                    "file_extension": get_file_extension(href),
                })),
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
