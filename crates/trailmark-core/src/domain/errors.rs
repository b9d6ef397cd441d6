//! Domain error types
//!
//! Validation failures, the single fatal configuration error, and the
//! outcomes a delivery attempt can fail with.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Unknown event type name
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// Unknown consent category name
    #[error("Unknown consent category: {0}")]
    UnknownConsentCategory(String),

    /// Unknown plugin name
    #[error("Unknown plugin: {0}")]
    UnknownPlugin(String),
}

/// Configuration errors
///
/// `MissingWorkspaceId` is the only error the tracker ever raises to its
/// caller; every other failure is logged and absorbed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The workspace identifier is missing or blank
    #[error("workspace_id is required")]
    MissingWorkspaceId,

    /// The configuration file could not be read
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file could not be parsed
    #[error("Failed to parse config file: {0}")]
    Parse(String),
}

/// Why a delivery attempt failed
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The backend rejected the payload (4xx); never retried
    #[error("Client error: HTTP {status}")]
    Client {
        /// HTTP status code
        status: u16,
    },

    /// The backend failed (5xx); retried
    #[error("Server error: HTTP {status}")]
    Server {
        /// HTTP status code
        status: u16,
    },

    /// Connection-level failure; retried
    #[error("Network error: {0}")]
    Network(String),

    /// The request was aborted by the timeout; retried
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The payload could not be encoded
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// No beacon mechanism is available in this environment
    #[error("Beacon delivery unavailable")]
    BeaconUnavailable,

    /// The beacon mechanism refused the payload
    #[error("Beacon rejected the payload")]
    BeaconRejected,
}

impl DeliveryError {
    /// Returns true for failures worth retrying (5xx, network, timeout)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DeliveryError::Server { .. } | DeliveryError::Network(_) | DeliveryError::Timeout(_)
        )
    }
}
