//! Tracker - the orchestrator
//!
//! Owns the configuration and wires consent, identity, the queue, the
//! transport and the plugins together. The embedding application owns the
//! `Arc<Tracker>` returned by [`TrackerBuilder::build`] and passes it
//! around; there is no global instance.
//!
//! ## Initialization order
//!
//! 1. Configuration check (missing workspace id is the only fatal error)
//! 2. Consent Manager (loads stored consent)
//! 3. Identity Manager (anonymous mode reads consent's explicit flag)
//! 4. Event Queue (restores the persisted snapshot, unload hooks, timer)
//! 5. Plugins (they call back into `track` immediately)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde_json::json;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};
use trailmark_core::config::TrackerConfig;
use trailmark_core::domain::{
    ConsentCategory, ConsentState, EventType, IdentifyPayload, PluginName, Properties, SessionId,
    TrackingEvent, VisitorId,
};
use trailmark_core::ports::{
    IBeaconSender, ICookieJar, IEventTransport, IHistoryAdapter, IKeyValueStore, IPageContext,
    IPageEvents,
};
use trailmark_plugins::{
    destroy_plugins, load_plugins, Plugin, PluginContext, ScriptedHistory, SignalBus,
    StaticPageContext, TrackerHandle,
};
use trailmark_storage::{keys, MemoryCookieJar, MemoryStore, SafeCookies, SafeStorage};
use trailmark_transport::http::RetryPolicy;
use trailmark_transport::{BackgroundBeacon, HttpTransport};

use crate::consent::{ConsentListenerId, ConsentManager};
use crate::envelope::EnvelopeBuilder;
use crate::error::TrackerError;
use crate::identity::{IdentityManager, IdentityMode, IdentityOptions, IdentityStores};
use crate::logging;
use crate::metrics::{DropReason, PipelineMetrics};
use crate::queue::{EventQueue, FlushOutcome, PushOutcome, QueueOptions};

/// What `track` did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// Handed to the queue (which may still rate-limit it)
    Queued(PushOutcome),
    /// Held until consent is decided
    Buffered,
    /// Dropped because consent is withheld
    Blocked,
    /// Ignored because the tracker is not initialized
    NotInitialized,
}

// ============================================================================
// Builder
// ============================================================================

/// Collects configuration and host ports, then builds a [`Tracker`]
///
/// Every port has an in-process default, which makes a bare builder
/// usable headless and in tests.
pub struct TrackerBuilder {
    config: TrackerConfig,
    persistent: Option<Arc<dyn IKeyValueStore>>,
    session: Option<Arc<dyn IKeyValueStore>>,
    cookies: Option<Arc<dyn ICookieJar>>,
    page: Option<Arc<dyn IPageContext>>,
    events: Option<Arc<dyn IPageEvents>>,
    history: Option<Arc<dyn IHistoryAdapter>>,
    transport: Option<Arc<dyn IEventTransport>>,
    beacon: Option<Arc<dyn IBeaconSender>>,
    start_timer: bool,
}

impl TrackerBuilder {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            persistent: None,
            session: None,
            cookies: None,
            page: None,
            events: None,
            history: None,
            transport: None,
            beacon: None,
            start_timer: true,
        }
    }

    /// localStorage-shaped store
    pub fn persistent_store(mut self, store: Arc<dyn IKeyValueStore>) -> Self {
        self.persistent = Some(store);
        self
    }

    /// sessionStorage-shaped store
    pub fn session_store(mut self, store: Arc<dyn IKeyValueStore>) -> Self {
        self.session = Some(store);
        self
    }

    pub fn cookies(mut self, jar: Arc<dyn ICookieJar>) -> Self {
        self.cookies = Some(jar);
        self
    }

    pub fn page(mut self, page: Arc<dyn IPageContext>) -> Self {
        self.page = Some(page);
        self
    }

    pub fn events(mut self, events: Arc<dyn IPageEvents>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn history(mut self, history: Arc<dyn IHistoryAdapter>) -> Self {
        self.history = Some(history);
        self
    }

    /// Replaces the HTTP transport entirely
    pub fn transport(mut self, transport: Arc<dyn IEventTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Beacon used by the default HTTP transport
    pub fn beacon(mut self, beacon: Arc<dyn IBeaconSender>) -> Self {
        self.beacon = Some(beacon);
        self
    }

    /// Whether to start the auto-flush timer (default true)
    pub fn start_timer(mut self, start: bool) -> Self {
        self.start_timer = start;
        self
    }

    /// Runs the initialization sequence.
    ///
    /// Fails only when the workspace id is missing.
    pub fn build(self) -> Result<Arc<Tracker>, TrackerError> {
        self.config.require_workspace()?;

        let (config, replaced) = self.config.normalized();
        if config.debug {
            logging::init(true);
        }
        for field in &replaced {
            warn!(field = %field, "Invalid configuration value replaced by default");
        }

        let metrics = match PipelineMetrics::new() {
            Ok(metrics) => Some(Arc::new(metrics)),
            Err(e) => {
                warn!(error = %e, "Metrics registry unavailable");
                None
            }
        };

        // Host ports
        let (page, history): (Arc<dyn IPageContext>, Option<Arc<dyn IHistoryAdapter>>) =
            match self.page {
                Some(page) => (page, self.history),
                None => {
                    let page = Arc::new(StaticPageContext::new("about:blank"));
                    let history = self.history.unwrap_or_else(|| {
                        Arc::new(ScriptedHistory::with_page(page.clone()))
                            as Arc<dyn IHistoryAdapter>
                    });
                    (page as Arc<dyn IPageContext>, Some(history))
                }
            };
        let events = self
            .events
            .unwrap_or_else(|| Arc::new(SignalBus::new()) as Arc<dyn IPageEvents>);
        let stores = IdentityStores {
            persistent: SafeStorage::new(
                self.persistent
                    .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn IKeyValueStore>),
            ),
            session: SafeStorage::new(
                self.session
                    .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn IKeyValueStore>),
            ),
            cookies: SafeCookies::new(
                self.cookies
                    .unwrap_or_else(|| Arc::new(MemoryCookieJar::new()) as Arc<dyn ICookieJar>),
            ),
        };
        let transport: Arc<dyn IEventTransport> = match self.transport {
            Some(transport) => transport,
            None => {
                let endpoint = config.resolve_api_endpoint(page.host().as_deref());
                debug!(endpoint = %endpoint, "Using HTTP transport");
                let beacon = self
                    .beacon
                    .unwrap_or_else(|| Arc::new(BackgroundBeacon::new()) as Arc<dyn IBeaconSender>);
                Arc::new(
                    HttpTransport::new(endpoint, RetryPolicy::from(&config.transport))
                        .with_beacon(beacon),
                )
            }
        };

        // Consent before identity: anonymous mode depends on it
        let consent = Arc::new(ConsentManager::new(
            config.consent.clone(),
            stores.persistent.clone(),
        ));
        let identity = Arc::new(IdentityManager::new(
            stores.clone(),
            IdentityOptions::from(&config),
            Arc::clone(&consent),
        ));

        let queue = EventQueue::new(
            QueueOptions::from(&config),
            Arc::clone(&transport),
            stores.persistent.clone(),
            metrics.clone(),
        );
        let gate = Arc::clone(&consent);
        queue.set_gate(Arc::new(move || gate.can_track()));
        queue.attach_unload_hooks(Arc::clone(&events));
        if self.start_timer {
            queue.start();
        }

        let tracker = Arc::new(Tracker {
            envelope: EnvelopeBuilder::new(config.workspace_id.clone(), Arc::clone(&page)),
            config,
            page,
            events,
            history,
            stores,
            consent,
            identity,
            queue,
            transport,
            metrics,
            plugins: Mutex::new(Vec::new()),
            initialized: AtomicBool::new(false),
            consent_listener: Mutex::new(None),
        });

        let weak = Arc::downgrade(&tracker);
        let listener = tracker.consent.on_change(Arc::new(
            move |_: &ConsentState, _: &ConsentState| -> anyhow::Result<()> {
                if let Some(tracker) = weak.upgrade() {
                    tracker.on_consent_change();
                }
                Ok(())
            },
        ));
        *tracker.lock_listener() = Some(listener);

        tracker.initialized.store(true, Ordering::SeqCst);
        tracker.init_plugins();

        info!(
            workspace_id = %tracker.config.workspace_id,
            visitor_id = %tracker.identity.visitor_id(),
            mode = tracker.identity.mode().as_str(),
            "Tracker initialized"
        );
        Ok(tracker)
    }
}

// ============================================================================
// Tracker
// ============================================================================

/// The public event-emission API
pub struct Tracker {
    config: TrackerConfig,
    envelope: EnvelopeBuilder,
    page: Arc<dyn IPageContext>,
    events: Arc<dyn IPageEvents>,
    history: Option<Arc<dyn IHistoryAdapter>>,
    stores: IdentityStores,
    consent: Arc<ConsentManager>,
    identity: Arc<IdentityManager>,
    queue: EventQueue,
    transport: Arc<dyn IEventTransport>,
    metrics: Option<Arc<PipelineMetrics>>,
    plugins: Mutex<Vec<Box<dyn Plugin>>>,
    initialized: AtomicBool,
    consent_listener: Mutex<Option<ConsentListenerId>>,
}

impl Tracker {
    /// Shorthand for [`TrackerBuilder::new`]
    pub fn builder(config: TrackerConfig) -> TrackerBuilder {
        TrackerBuilder::new(config)
    }

    fn lock_plugins(&self) -> MutexGuard<'_, Vec<Box<dyn Plugin>>> {
        self.plugins.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_listener(&self) -> MutexGuard<'_, Option<ConsentListenerId>> {
        self.consent_listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn init_plugins(self: &Arc<Self>) {
        let mut names: Vec<PluginName> = Vec::with_capacity(self.config.plugins.len() + 1);
        if self.config.auto_page_view {
            names.push(PluginName::PageView);
        }
        names.extend(
            self.config
                .plugins
                .iter()
                .copied()
                .filter(|name| self.config.auto_page_view || *name != PluginName::PageView),
        );

        let ctx = PluginContext {
            tracker: Arc::new(WeakTracker(Arc::downgrade(self))),
            events: Arc::clone(&self.events),
            page: Arc::clone(&self.page),
            history: self.history.clone(),
        };
        let loaded = load_plugins(&names, &ctx);
        debug!(requested = names.len(), loaded = loaded.len(), "Plugins loaded");
        self.lock_plugins().extend(loaded);
    }

    // ========================================================================
    // Event emission
    // ========================================================================

    /// Builds an event and runs it through the consent gate into the queue
    pub fn track(&self, event_type: EventType, name: &str, properties: Properties) -> TrackOutcome {
        if !self.is_initialized() {
            warn!(event = name, "Tracker not initialized, event ignored");
            return TrackOutcome::NotInitialized;
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_tracked(event_type);
        }

        let event = self.envelope.build(
            self.identity.visitor_id(),
            self.identity.session_id(),
            event_type,
            name,
            properties,
        );

        if self.consent.can_track() {
            let outcome = self.queue.push(event);
            debug!(event_type = %event_type, event = name, ?outcome, "Event tracked");
            return TrackOutcome::Queued(outcome);
        }

        if self.consent.is_waiting() {
            if self.consent.buffer_event(event) {
                self.record_dropped(DropReason::ConsentBufferOverflow);
            }
            debug!(event = name, "Event buffered until consent is given");
            TrackOutcome::Buffered
        } else {
            self.record_dropped(DropReason::ConsentBlocked);
            debug!(event = name, "Consent withheld, event dropped");
            TrackOutcome::Blocked
        }
    }

    /// Tracks a page view for the current path
    pub fn page(&self, name: Option<&str>, properties: Option<Properties>) -> TrackOutcome {
        let path = self.page.path();
        let title = self.page.title();
        let mut properties = properties.unwrap_or_default();
        properties.insert("path".to_string(), json!(path));
        if !title.is_empty() {
            properties
                .entry("title".to_string())
                .or_insert_with(|| json!(&title));
        }

        let name = match name {
            Some(name) => name.to_string(),
            None if !title.is_empty() => title,
            None => path,
        };
        self.track(EventType::PageView, &name, properties)
    }

    /// Sends an identify call straight to the transport.
    ///
    /// Bypasses the consent gate and the queue. Failures are logged and
    /// returned; nothing is retried beyond the transport's own policy.
    pub async fn identify(&self, email: &str, traits: Properties) -> Result<(), TrackerError> {
        if !self.is_initialized() {
            warn!("Tracker not initialized, identify ignored");
            return Err(TrackerError::NotInitialized);
        }
        let email = email.trim();
        if email.is_empty() {
            warn!("Identify called without an email");
            return Err(TrackerError::InvalidEmail);
        }

        let payload = IdentifyPayload {
            workspace_id: self.config.workspace_id.clone(),
            visitor_id: self.identity.visitor_id(),
            email: email.to_string(),
            properties: traits,
        };
        let result = self.transport.send_identify(&payload).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_delivery("identify", &result);
        }

        match result {
            Ok(()) => {
                info!(visitor_id = %payload.visitor_id, "Visitor identified");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Identify failed");
                Err(e.into())
            }
        }
    }

    fn record_dropped(&self, reason: DropReason) {
        if let Some(metrics) = &self.metrics {
            metrics.record_dropped(reason);
        }
    }

    // ========================================================================
    // Consent
    // ========================================================================

    /// Replaces the consent state
    pub fn consent(&self, state: ConsentState) {
        self.consent.update(state);
    }

    pub fn grant_consent(&self, partial: &ConsentState) {
        self.consent.grant(partial);
    }

    pub fn revoke_consent(&self, categories: &[ConsentCategory]) {
        self.consent.revoke(categories);
    }

    /// Back to the configured default; the stored choice is removed
    pub fn reset_consent(&self) {
        self.consent.reset();
    }

    pub fn get_consent_state(&self) -> ConsentState {
        self.consent.state()
    }

    pub fn has_explicit_consent(&self) -> bool {
        self.consent.has_explicit_consent()
    }

    pub fn can_track(&self) -> bool {
        self.consent.can_track()
    }

    /// Releases or discards buffered events after a consent transition
    fn on_consent_change(&self) {
        if self.consent.can_track() {
            let visitor_id = if self.identity.mode() == IdentityMode::Anonymous {
                self.identity.upgrade_after_consent()
            } else {
                self.identity.visitor_id()
            };

            let buffered = self.consent.flush_buffer();
            if buffered.is_empty() {
                return;
            }
            info!(count = buffered.len(), "Releasing events buffered for consent");
            for mut event in buffered {
                event.retag_visitor(visitor_id.clone());
                self.queue.push(event);
            }
        } else {
            // Whatever was queued under the previous consent must not leave
            let cleared = self.queue.clear();
            if cleared > 0 {
                info!(count = cleared, "Tracking no longer allowed, queued events discarded");
                for _ in 0..cleared {
                    self.record_dropped(DropReason::ConsentBlocked);
                }
            }
            if self.consent.is_waiting() {
                return;
            }
            let discarded = self.consent.flush_buffer();
            if !discarded.is_empty() {
                info!(count = discarded.len(), "Consent denied, buffered events discarded");
                for _ in &discarded {
                    self.record_dropped(DropReason::ConsentBlocked);
                }
            }
        }
    }

    // ========================================================================
    // Queue control
    // ========================================================================

    pub async fn flush(&self) -> FlushOutcome {
        self.queue.flush().await
    }

    /// Beacon flush for page teardown
    pub fn flush_sync(&self) -> bool {
        self.queue.flush_sync()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queued_events(&self) -> Vec<TrackingEvent> {
        self.queue.snapshot()
    }

    pub fn clear_queue(&self) {
        self.queue.clear();
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// New identity and an empty queue (logout)
    pub fn reset(&self) {
        let (visitor_id, _) = self.identity.reset();
        self.queue.clear();
        info!(visitor_id = %visitor_id, "Tracker reset");
    }

    /// Erases everything the SDK stored, then starts over with fresh ids
    pub fn delete_data(&self) {
        self.consent.reset();
        self.consent.flush_buffer();
        self.queue.clear();

        let purged = self.stores.persistent.purge_prefix(keys::PREFIX)
            + self.stores.session.purge_prefix(keys::PREFIX);
        self.identity.clear_all();
        let (visitor_id, _) = self.identity.reset();
        info!(purged, visitor_id = %visitor_id, "Stored data deleted");
    }

    /// Flushes, destroys plugins, stops the queue and marks the tracker
    /// uninitialized. Calling it twice is a no-op.
    ///
    /// The final flush is skipped, and the queue discarded, when tracking is
    /// not allowed.
    pub async fn destroy(&self) {
        if !self.is_initialized() {
            return;
        }

        if self.consent.can_track() {
            let outcome = self.queue.flush().await;
            debug!(?outcome, "Final flush");
        } else {
            let dropped = self.queue.clear();
            for _ in 0..dropped {
                self.record_dropped(DropReason::ConsentBlocked);
            }
            debug!(dropped, "Final flush skipped, tracking not allowed");
        }

        let mut plugins = std::mem::take(&mut *self.lock_plugins());
        destroy_plugins(&mut plugins);
        self.queue.destroy();
        self.initialized.store(false, Ordering::SeqCst);

        if let Some(id) = self.lock_listener().take() {
            self.consent.remove_listener(id);
        }
        info!("Tracker destroyed");
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn visitor_id(&self) -> VisitorId {
        self.identity.visitor_id()
    }

    pub fn session_id(&self) -> SessionId {
        self.identity.session_id()
    }

    pub fn identity_mode(&self) -> IdentityMode {
        self.identity.mode()
    }

    /// Names of the plugins that loaded successfully
    pub fn plugin_names(&self) -> Vec<PluginName> {
        self.lock_plugins().iter().map(|p| p.name()).collect()
    }

    pub fn metrics(&self) -> Option<Arc<PipelineMetrics>> {
        self.metrics.clone()
    }
}

// ============================================================================
// Plugin handle
// ============================================================================

/// Plugin-facing handle that never keeps the tracker alive
struct WeakTracker(Weak<Tracker>);

impl TrackerHandle for WeakTracker {
    fn track(&self, event_type: EventType, name: &str, properties: Properties) {
        if let Some(tracker) = self.0.upgrade() {
            tracker.track(event_type, name, properties);
        }
    }

    fn identify(&self, email: &str, traits: Properties) {
        let Some(tracker) = self.0.upgrade() else {
            return;
        };
        let Ok(handle) = Handle::try_current() else {
            warn!("No async runtime, identify from plugin dropped");
            return;
        };
        let email = email.to_string();
        handle.spawn(async move {
            // Already logged inside identify
            let _ = tracker.identify(&email, traits).await;
        });
    }
}
