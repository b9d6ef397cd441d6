//! Trailmark Core - Domain types and port definitions
//!
//! This crate contains the hexagonal core of the Trailmark SDK:
//! - **Domain types** - `TrackingEvent`, `EventType`, `ConsentState`, `IdentifyPayload`,
//!   and the `VisitorId` / `SessionId` newtypes
//! - **Configuration** - `TrackerConfig` with defaults, validation and a builder
//! - **Port definitions** - Traits implemented by the host environment:
//!   `IKeyValueStore`, `ICookieJar`, `IEventTransport`, `IBeaconSender`,
//!   `IPageContext`, `IPageEvents`, `IHistoryAdapter`
//!
//! # Architecture
//!
//! The browser is never touched directly. Everything the pipeline needs
//! from the page (storage, cookies, DOM signals, History API, beacon) is
//! reached through a port, so the same pipeline runs under a wasm host,
//! a native shell or a test harness.

pub mod config;
pub mod domain;
pub mod ports;

/// SDK version string stamped on every event.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
