//! Click observer
//!
//! An element is trackable when it is a button, link or input, or when it
//! opts in through the `data-track` attribute or the `track-click` class.

use std::sync::Arc;

use serde_json::json;
use trailmark_core::domain::{EventType, PluginName};
use trailmark_core::ports::{ElementInfo, PageSignal, SignalKind};

use crate::plugin::{Plugin, PluginContext, Subscriptions};
use crate::util::{props, truncate_chars};

/// Opt-in attribute
pub const TRACK_ATTRIBUTE: &str = "data-track";

/// Attribute overriding the event name
pub const TRACK_NAME_ATTRIBUTE: &str = "data-track-name";

/// Opt-in class
pub const TRACK_CLASS: &str = "track-click";

const MAX_TEXT_LEN: usize = 100;

const TRACKABLE_TAGS: [&str; 3] = ["button", "a", "input"];

/// Returns true if clicks on `element` should be tracked
pub fn is_trackable(element: &ElementInfo) -> bool {
    TRACKABLE_TAGS.contains(&element.tag.to_ascii_lowercase().as_str())
        || element.has_attribute(TRACK_ATTRIBUTE)
        || element.has_class(TRACK_CLASS)
}

fn element_text(element: &ElementInfo) -> Option<String> {
    element
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| truncate_chars(t, MAX_TEXT_LEN))
}

fn event_name(element: &ElementInfo, text: Option<&str>) -> String {
    if let Some(name) = element
        .attributes
        .get(TRACK_NAME_ATTRIBUTE)
        .filter(|n| !n.trim().is_empty())
    {
        return name.trim().to_string();
    }
    match (text, &element.id) {
        (Some(text), _) => text.to_string(),
        (None, Some(id)) => format!("{}#{}", element.tag, id),
        (None, None) => element.tag.clone(),
    }
}

pub struct ClicksPlugin {
    subscriptions: Option<Subscriptions>,
}

impl ClicksPlugin {
    pub fn new() -> Self {
        Self {
            subscriptions: None,
        }
    }
}

impl Default for ClicksPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for ClicksPlugin {
    fn name(&self) -> PluginName {
        PluginName::Clicks
    }

    fn init(&mut self, ctx: PluginContext) -> anyhow::Result<()> {
        let mut subscriptions = Subscriptions::new(Arc::clone(&ctx.events));
        let tracker = Arc::clone(&ctx.tracker);

        subscriptions.listen(SignalKind::Click, move |signal| {
            let PageSignal::Click(element) = signal else {
                return;
            };
            if !is_trackable(element) {
                return;
            }

            let text = element_text(element);
            let name = event_name(element, text.as_deref());
            let properties = props(json!({
                "element_tag": element.tag.to_ascii_lowercase(),
                "element_id": element.id,
                "element_classes": element.classes,
                "element_text": text,
                "href": element.href,
            }));
            tracker.track(EventType::ButtonClick, &name, properties);
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
