//! Page view observer
//!
//! Emits a page view on load and again on every History API navigation
//! that changes the URL. History interception goes through the injected
//! [`IHistoryAdapter`](trailmark_core::ports::IHistoryAdapter), which is
//! uninstalled on destroy.

use std::sync::{Arc, Mutex};

use serde_json::json;
use tracing::debug;
use trailmark_core::domain::{EventType, PluginName};
use trailmark_core::ports::{IHistoryAdapter, IPageContext, NavigationKind};
use url::Url;

use crate::plugin::{Plugin, PluginContext, TrackerHandle};
use crate::util::props;

pub struct PageViewPlugin {
    history: Option<Arc<dyn IHistoryAdapter>>,
}

impl PageViewPlugin {
    pub fn new() -> Self {
        Self { history: None }
    }
}

impl Default for PageViewPlugin {
    fn default() -> Self {
        Self::new()
    }
}

fn path_of(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| "/".to_string())
}

fn track_page(
    tracker: &dyn TrackerHandle,
    page: &dyn IPageContext,
    url: &str,
    navigation: Option<NavigationKind>,
) {
    let title = page.title();
    let path = path_of(url);
    let name = if title.trim().is_empty() {
        path.clone()
    } else {
        title.clone()
    };

    let mut properties = props(json!({
        "path": path,
        "title": title,
        "url": url,
    }));
    if let Some(kind) = navigation {
        let kind = match kind {
            NavigationKind::Push => "push",
            NavigationKind::Replace => "replace",
            NavigationKind::Pop => "pop",
        };
        properties.insert("navigation".to_string(), json!(kind));
    }

    tracker.track(EventType::PageView, &name, properties);
}

impl Plugin for PageViewPlugin {
    fn name(&self) -> PluginName {
        PluginName::PageView
    }

    fn init(&mut self, ctx: PluginContext) -> anyhow::Result<()> {
        let initial_url = ctx.page.url();

        if let Some(history) = &ctx.history {
            let last_url = Arc::new(Mutex::new(initial_url.clone()));
            let tracker = Arc::clone(&ctx.tracker);
            let page = Arc::clone(&ctx.page);

            history.install(Arc::new(move |kind: NavigationKind, url: &str| {
                {
                    let mut last = last_url.lock().unwrap_or_else(|e| e.into_inner());
                    if *last == url {
                        return;
                    }
                    *last = url.to_string();
                }
                debug!(url, "Navigation detected");
                track_page(tracker.as_ref(), page.as_ref(), url, Some(kind));
            }))?;
            self.history = Some(Arc::clone(history));
        }

        track_page(ctx.tracker.as_ref(), ctx.page.as_ref(), &initial_url, None);
        Ok(())
    }

    fn destroy(&mut self) {
        if let Some(history) = self.history.take() {
            history.uninstall();
        }
    }
}
