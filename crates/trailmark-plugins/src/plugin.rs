//! Plugin capability interface
//!
//! ## Design Notes
//!
//! - Plugins are independent structs composed by the tracker; they share
//!   nothing but the [`PluginContext`] they receive in `init`.
//! - Every listener goes through [`Subscriptions`], so `destroy` can
//!   detach exactly what `init` attached.
//! - `init` reports failure through `anyhow::Result`; the loader logs it
//!   and moves on to the next plugin.

use std::sync::Arc;

use trailmark_core::domain::{EventType, PluginName, Properties};
use trailmark_core::ports::{
    IHistoryAdapter, IPageContext, IPageEvents, ListenerId, PageSignal, SignalKind,
};

/// What a plugin may ask of the tracker
///
/// Implemented by the tracker's weak handle; calls after the tracker is
/// gone are silently ignored.
pub trait TrackerHandle: Send + Sync {
    /// Builds, gates and queues an event
    fn track(&self, event_type: EventType, name: &str, properties: Properties);

    /// Sends an identify call in the background
    fn identify(&self, email: &str, traits: Properties);
}

/// Everything a plugin receives at `init`
#[derive(Clone)]
pub struct PluginContext {
    pub tracker: Arc<dyn TrackerHandle>,
    pub events: Arc<dyn IPageEvents>,
    pub page: Arc<dyn IPageContext>,
    /// History interception, when the host supports it
    pub history: Option<Arc<dyn IHistoryAdapter>>,
}

/// An independent, restartable observer
pub trait Plugin: Send {
    /// Registry name
    fn name(&self) -> PluginName;

    /// Attaches listeners and performs one-time side effects
    fn init(&mut self, ctx: PluginContext) -> anyhow::Result<()>;

    /// Detaches every listener and clears timers. Safe to call twice.
    fn destroy(&mut self);
}

// ============================================================================
// Subscriptions
// ============================================================================

/// Listener bookkeeping for one plugin
pub struct Subscriptions {
    events: Arc<dyn IPageEvents>,
    ids: Vec<ListenerId>,
}

impl Subscriptions {
    pub fn new(events: Arc<dyn IPageEvents>) -> Self {
        Self {
            events,
            ids: Vec::new(),
        }
    }

    /// Registers `listener` for `kind` and remembers the handle
    pub fn listen<F>(&mut self, kind: SignalKind, listener: F)
    where
        F: Fn(&PageSignal) + Send + Sync + 'static,
    {
        let id = self.events.add_listener(kind, Arc::new(listener));
        self.ids.push(id);
    }

    /// Number of live listeners
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Detaches everything registered so far
    pub fn clear(&mut self) {
        for id in self.ids.drain(..) {
            self.events.remove_listener(id);
        }
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        self.clear();
    }
}
