//! Test doubles shared by the plugin unit tests

use std::sync::{Arc, Mutex};

use trailmark_core::domain::{EventType, Properties};

use crate::host::{ScriptedHistory, SignalBus, StaticPageContext};
use crate::plugin::{PluginContext, TrackerHandle};

#[derive(Debug, Clone, PartialEq)]
pub struct Tracked {
    pub event_type: EventType,
    pub name: String,
    pub properties: Properties,
}

/// Records every call instead of sending anything
#[derive(Default)]
pub struct RecordingTracker {
    pub tracked: Mutex<Vec<Tracked>>,
    pub identified: Mutex<Vec<(String, Properties)>>,
}

impl RecordingTracker {
    pub fn events(&self) -> Vec<Tracked> {
        self.tracked.lock().unwrap().clone()
    }

    pub fn of_type(&self, event_type: EventType) -> Vec<Tracked> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }
}

impl TrackerHandle for RecordingTracker {
    fn track(&self, event_type: EventType, name: &str, properties: Properties) {
        self.tracked.lock().unwrap().push(Tracked {
            event_type,
            name: name.to_string(),
            properties,
        });
    }

    fn identify(&self, email: &str, traits: Properties) {
        self.identified
            .lock()
            .unwrap()
            .push((email.to_string(), traits));
    }
}

/// A wired-up page: bus, page facts, history and a recording tracker
pub struct Harness {
    pub tracker: Arc<RecordingTracker>,
    pub bus: Arc<SignalBus>,
    pub page: Arc<StaticPageContext>,
    pub history: Arc<ScriptedHistory>,
}

impl Harness {
    pub fn new(url: &str) -> Self {
        let page = Arc::new(StaticPageContext::new(url));
        Self {
            tracker: Arc::new(RecordingTracker::default()),
            bus: Arc::new(SignalBus::new()),
            history: Arc::new(ScriptedHistory::with_page(page.clone())),
            page,
        }
    }

    pub fn context(&self) -> PluginContext {
        PluginContext {
            tracker: self.tracker.clone(),
            events: self.bus.clone(),
            page: self.page.clone(),
            history: Some(self.history.clone()),
        }
    }
}
