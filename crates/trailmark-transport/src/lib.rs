//! Trailmark Transport - Outbound delivery
//!
//! Provides:
//! - `HttpTransport`: JSON POST with per-attempt timeout and linear
//!   backoff retry on 5xx/network failures; 4xx fails immediately
//! - `BackgroundBeacon`: fire-and-forget POST for native hosts, the
//!   stand-in for `navigator.sendBeacon`

pub mod beacon;
pub mod http;

pub use beacon::BackgroundBeacon;
pub use http::HttpTransport;
