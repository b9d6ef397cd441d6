//! Domain entities
//!
//! - Newtypes for visitor / session identifiers
//! - Tracking events and identify payloads
//! - Consent state and its persisted form
//! - Plugin identifiers
//! - Domain-specific error types

pub mod consent;
pub mod errors;
pub mod event;
pub mod newtypes;
pub mod plugin;

pub use consent::{ConsentCategory, ConsentState, StoredConsent, CONSENT_SCHEMA_VERSION};
pub use errors::{ConfigError, DeliveryError, DomainError};
pub use event::{DeviceInfo, EventType, IdentifyPayload, Properties, TrackingEvent, UtmParams};
pub use newtypes::{SessionId, VisitorId};
pub use plugin::PluginName;
