//! Page ports: read-only page facts, DOM signal subscription, and
//! History API interception.
//!
//! ## Design Notes
//!
//! - Signals are plain data. The host translates DOM events into
//!   [`PageSignal`] values and dispatches them; observers never see DOM
//!   objects.
//! - Every `add_listener` returns a [`ListenerId`] that must be handed back
//!   to `remove_listener` on teardown.
//! - The history adapter owns its own install/uninstall symmetry: after
//!   `uninstall` the original History methods are back in place.

use std::collections::HashMap;
use std::sync::Arc;

use url::Url;

// ============================================================================
// Signal payloads
// ============================================================================

/// Snapshot of a clicked element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementInfo {
    /// Lowercase tag name (`button`, `a`, `div`, ...)
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    /// Visible text content
    pub text: Option<String>,
    /// Resolved `href`, for links
    pub href: Option<String>,
    pub attributes: HashMap<String, String>,
}

impl ElementInfo {
    /// Returns true if the element carries `attribute`
    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.contains_key(attribute)
    }

    /// Returns true if the element has class `class`
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// Document scroll position
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub viewport_height: f64,
    pub document_height: f64,
}

/// One input inside a form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormField {
    /// `name` attribute
    pub name: String,
    /// `type` attribute (`text`, `email`, ...)
    pub field_type: String,
    /// Current value; only populated on submit
    pub value: Option<String>,
}

/// Snapshot of a form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormInfo {
    /// Stable identifier for the form within the page life
    pub id: String,
    pub name: Option<String>,
    pub action: Option<String>,
    pub fields: Vec<FormField>,
}

/// Uncaught script error
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    pub message: String,
    pub source: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub stack: Option<String>,
}

/// Navigation timing milestones, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NavigationTiming {
    pub dns_ms: f64,
    pub tcp_ms: f64,
    pub ttfb_ms: f64,
    pub response_ms: f64,
    pub dom_interactive_ms: f64,
    pub dom_content_loaded_ms: f64,
    pub load_ms: f64,
}

/// Web Vitals observed through performance observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VitalKind {
    LargestContentfulPaint,
    FirstInputDelay,
    CumulativeLayoutShift,
}

/// One performance observer entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VitalEntry {
    pub kind: VitalKind,
    pub value: f64,
    /// Layout shifts caused by recent input are excluded from CLS
    pub had_recent_input: bool,
}

// ============================================================================
// PageSignal
// ============================================================================

/// A DOM/browser signal delivered by the host
#[derive(Debug, Clone, PartialEq)]
pub enum PageSignal {
    Click(ElementInfo),
    Scroll(ScrollMetrics),
    MouseMove,
    KeyDown,
    TouchStart,
    /// Mouse left the document
    MouseLeave {
        client_y: f64,
    },
    VisibilityChange {
        hidden: bool,
    },
    BeforeUnload,
    PageHide,
    /// A form was inserted into the DOM after load
    FormAdded(FormInfo),
    /// Focus or input on a form field
    FormInteraction {
        form_id: String,
        field_name: String,
    },
    FormSubmit(FormInfo),
    Error(ErrorInfo),
    UnhandledRejection {
        reason: String,
    },
    /// Window `load` fired
    Load,
    Vital(VitalEntry),
}

/// Discriminant of a [`PageSignal`], used to subscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Click,
    Scroll,
    MouseMove,
    KeyDown,
    TouchStart,
    MouseLeave,
    VisibilityChange,
    BeforeUnload,
    PageHide,
    FormAdded,
    FormInteraction,
    FormSubmit,
    Error,
    UnhandledRejection,
    Load,
    Vital,
}

impl PageSignal {
    /// The kind this signal is dispatched under
    pub fn kind(&self) -> SignalKind {
        match self {
            PageSignal::Click(_) => SignalKind::Click,
            PageSignal::Scroll(_) => SignalKind::Scroll,
            PageSignal::MouseMove => SignalKind::MouseMove,
            PageSignal::KeyDown => SignalKind::KeyDown,
            PageSignal::TouchStart => SignalKind::TouchStart,
            PageSignal::MouseLeave { .. } => SignalKind::MouseLeave,
            PageSignal::VisibilityChange { .. } => SignalKind::VisibilityChange,
            PageSignal::BeforeUnload => SignalKind::BeforeUnload,
            PageSignal::PageHide => SignalKind::PageHide,
            PageSignal::FormAdded(_) => SignalKind::FormAdded,
            PageSignal::FormInteraction { .. } => SignalKind::FormInteraction,
            PageSignal::FormSubmit(_) => SignalKind::FormSubmit,
            PageSignal::Error(_) => SignalKind::Error,
            PageSignal::UnhandledRejection { .. } => SignalKind::UnhandledRejection,
            PageSignal::Load => SignalKind::Load,
            PageSignal::Vital(_) => SignalKind::Vital,
        }
    }
}

// ============================================================================
// Ports
// ============================================================================

/// Read-only facts about the current page and device
pub trait IPageContext: Send + Sync {
    /// Full current URL
    fn url(&self) -> String;
    fn referrer(&self) -> Option<String>;
    fn title(&self) -> String;
    fn user_agent(&self) -> String;
    /// `"{width}x{height}"`
    fn screen_resolution(&self) -> String;
    fn language(&self) -> String;
    /// IANA timezone name
    fn timezone(&self) -> String;
    /// Touch-primary device (exit intent is meaningless there)
    fn is_touch_device(&self) -> bool;
    /// Forms present in the document right now
    fn forms(&self) -> Vec<FormInfo>;
    /// Navigation timing, once the load event has completed
    fn navigation_timing(&self) -> Option<NavigationTiming>;
    /// Whether a performance observer for `kind` is supported
    fn supports_vital(&self, kind: VitalKind) -> bool;

    /// Path component of the current URL
    fn path(&self) -> String {
        Url::parse(&self.url())
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| "/".to_string())
    }

    /// Host component of the current URL
    fn host(&self) -> Option<String> {
        Url::parse(&self.url())
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }
}

/// Callback invoked for each dispatched signal
pub type SignalListener = Arc<dyn Fn(&PageSignal) + Send + Sync>;

/// Handle returned by [`IPageEvents::add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Subscription to DOM/browser signals
pub trait IPageEvents: Send + Sync {
    /// Registers `listener` for signals of `kind`
    fn add_listener(&self, kind: SignalKind, listener: SignalListener) -> ListenerId;

    /// Detaches a listener; returns false if it was not registered
    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// How the History API changed the URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    Push,
    Replace,
    Pop,
}

/// Callback invoked with the navigation kind and the new URL
pub type NavigationListener = Arc<dyn Fn(NavigationKind, &str) + Send + Sync>;

/// History API interception
pub trait IHistoryAdapter: Send + Sync {
    /// Wraps pushState/replaceState and listens for popstate
    fn install(&self, listener: NavigationListener) -> anyhow::Result<()>;

    /// Restores the original History methods and drops the listener
    fn uninstall(&self);
}
