//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the pipeline depends on; the host environment
//! provides the implementations.
//!
//! ## Ports Overview
//!
//! - [`IKeyValueStore`] - persistent / session key-value storage
//! - [`ICookieJar`] - first-party cookies
//! - [`IEventTransport`] - outbound delivery of batches and identify calls
//! - [`IBeaconSender`] - fire-and-forget delivery during page teardown
//! - [`IPageContext`] - read-only facts about the current page and device
//! - [`IPageEvents`] - subscription to DOM/browser signals
//! - [`IHistoryAdapter`] - History API navigation interception

pub mod page;
pub mod storage;
pub mod transport;

pub use page::{
    ElementInfo, ErrorInfo, FormField, FormInfo, IHistoryAdapter, IPageContext, IPageEvents,
    ListenerId, NavigationKind, NavigationListener, NavigationTiming, PageSignal, ScrollMetrics,
    SignalKind, SignalListener, VitalEntry, VitalKind,
};
pub use storage::{CookieOptions, ICookieJar, IKeyValueStore, SameSite};
pub use transport::{EventBatch, IBeaconSender, IEventTransport, EVENTS_PATH, IDENTIFY_PATH};
