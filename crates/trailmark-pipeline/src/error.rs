//! Tracker error type

use thiserror::Error;
use trailmark_core::domain::{ConfigError, DeliveryError};

/// Errors surfaced by the [`Tracker`](crate::Tracker) API
///
/// Only `Config` is raised at construction. The others are returned from
/// `identify`, which callers may ignore; they have already been logged.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Fatal configuration problem (missing workspace id)
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The tracker has not been initialized or was destroyed
    #[error("Tracker is not initialized")]
    NotInitialized,

    /// `identify` was called with a blank email
    #[error("Email must not be empty")]
    InvalidEmail,

    /// Delivery failed after retries
    #[error("Delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}
