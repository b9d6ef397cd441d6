//! In-process implementations of the page ports
//!
//! Used by headless hosts (the CLI) and tests. A wasm host would provide
//! its own implementations backed by the real DOM.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tracing::debug;
use trailmark_core::ports::{
    FormInfo, IHistoryAdapter, IPageContext, IPageEvents, ListenerId, NavigationKind,
    NavigationListener, NavigationTiming, PageSignal, SignalKind, SignalListener, VitalKind,
};
use trailmark_core::SDK_VERSION;

// ============================================================================
// SignalBus
// ============================================================================

/// Synchronous signal dispatcher implementing [`IPageEvents`]
///
/// Listeners run in registration order. The listener table is not locked
/// while a listener runs, so a listener may add or remove listeners.
#[derive(Default)]
pub struct SignalBus {
    next_id: AtomicU64,
    listeners: Mutex<BTreeMap<u64, (SignalKind, SignalListener)>>,
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `signal` to every listener registered for its kind
    pub fn dispatch(&self, signal: &PageSignal) {
        let kind = signal.kind();
        let targets: Vec<SignalListener> = self
            .lock()
            .values()
            .filter(|(k, _)| *k == kind)
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in targets {
            listener(signal);
        }
    }

    /// Total live listeners
    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    /// Live listeners for one kind
    pub fn listeners_for(&self, kind: SignalKind) -> usize {
        self.lock().values().filter(|(k, _)| *k == kind).count()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<u64, (SignalKind, SignalListener)>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl IPageEvents for SignalBus {
    fn add_listener(&self, kind: SignalKind, listener: SignalListener) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.lock().insert(id, (kind, listener));
        ListenerId(id)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.lock().remove(&id.0).is_some()
    }
}

// ============================================================================
// StaticPageContext
// ============================================================================

#[derive(Debug, Clone)]
struct PageFacts {
    url: String,
    referrer: Option<String>,
    title: String,
    user_agent: String,
    screen_resolution: String,
    language: String,
    timezone: String,
    touch: bool,
    forms: Vec<FormInfo>,
    navigation_timing: Option<NavigationTiming>,
    vitals: HashSet<VitalKind>,
}

/// Settable [`IPageContext`]
#[derive(Debug)]
pub struct StaticPageContext {
    facts: RwLock<PageFacts>,
}

impl StaticPageContext {
    /// A desktop page at `url` with no forms, timing or vitals
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            facts: RwLock::new(PageFacts {
                url: url.into(),
                referrer: None,
                title: String::new(),
                user_agent: format!("trailmark-native/{}", SDK_VERSION),
                screen_resolution: "0x0".to_string(),
                language: "en-US".to_string(),
                timezone: "UTC".to_string(),
                touch: false,
                forms: Vec::new(),
                navigation_timing: None,
                vitals: HashSet::new(),
            }),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, PageFacts> {
        self.facts.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, PageFacts> {
        self.facts.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_url(&self, url: impl Into<String>) {
        self.write().url = url.into();
    }

    pub fn set_referrer(&self, referrer: Option<String>) {
        self.write().referrer = referrer;
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.write().title = title.into();
    }

    pub fn set_user_agent(&self, user_agent: impl Into<String>) {
        self.write().user_agent = user_agent.into();
    }

    pub fn set_screen_resolution(&self, resolution: impl Into<String>) {
        self.write().screen_resolution = resolution.into();
    }

    pub fn set_language(&self, language: impl Into<String>) {
        self.write().language = language.into();
    }

    pub fn set_timezone(&self, timezone: impl Into<String>) {
        self.write().timezone = timezone.into();
    }

    pub fn set_touch_device(&self, touch: bool) {
        self.write().touch = touch;
    }

    pub fn set_forms(&self, forms: Vec<FormInfo>) {
        self.write().forms = forms;
    }

    pub fn set_navigation_timing(&self, timing: Option<NavigationTiming>) {
        self.write().navigation_timing = timing;
    }

    pub fn support_vital(&self, kind: VitalKind) {
        self.write().vitals.insert(kind);
    }
}

impl IPageContext for StaticPageContext {
    fn url(&self) -> String {
        self.read().url.clone()
    }

    fn referrer(&self) -> Option<String> {
        self.read().referrer.clone()
    }

    fn title(&self) -> String {
        self.read().title.clone()
    }

    fn user_agent(&self) -> String {
        self.read().user_agent.clone()
    }

    fn screen_resolution(&self) -> String {
        self.read().screen_resolution.clone()
    }

    fn language(&self) -> String {
        self.read().language.clone()
    }

    fn timezone(&self) -> String {
        self.read().timezone.clone()
    }

    fn is_touch_device(&self) -> bool {
        self.read().touch
    }

    fn forms(&self) -> Vec<FormInfo> {
        self.read().forms.clone()
    }

    fn navigation_timing(&self) -> Option<NavigationTiming> {
        self.read().navigation_timing
    }

    fn supports_vital(&self, kind: VitalKind) -> bool {
        self.read().vitals.contains(&kind)
    }
}

// ============================================================================
// ScriptedHistory
// ============================================================================

/// [`IHistoryAdapter`] driven by explicit `navigate` calls
#[derive(Default)]
pub struct ScriptedHistory {
    listener: Mutex<Option<NavigationListener>>,
    page: Option<Arc<StaticPageContext>>,
}

impl ScriptedHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps `page`'s URL in step with navigations
    pub fn with_page(page: Arc<StaticPageContext>) -> Self {
        Self {
            listener: Mutex::new(None),
            page: Some(page),
        }
    }

    /// Simulates pushState / replaceState / popstate to `url`
    pub fn navigate(&self, kind: NavigationKind, url: &str) {
        if let Some(page) = &self.page {
            page.set_url(url);
        }
        let listener = self.lock().clone();
        if let Some(listener) = listener {
            listener(kind, url);
        }
    }

    /// True while a listener is installed
    pub fn is_installed(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<NavigationListener>> {
        self.listener.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl IHistoryAdapter for ScriptedHistory {
    fn install(&self, listener: NavigationListener) -> anyhow::Result<()> {
        let mut slot = self.lock();
        if slot.is_some() {
            anyhow::bail!("History interception already installed");
        }
        *slot = Some(listener);
        debug!("History interception installed");
        Ok(())
    }

    fn uninstall(&self) {
        if self.lock().take().is_some() {
            debug!("History interception removed");
        }
    }
}
