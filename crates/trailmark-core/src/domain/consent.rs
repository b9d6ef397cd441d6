//! Consent state
//!
//! Each category is tri-state: `None` means the user has not said
//! anything, which is distinct from an explicit `Some(false)`. A category
//! is granted only when it is explicitly `Some(true)`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Schema version written next to persisted consent.
///
/// A stored blob with any other version is discarded on load.
pub const CONSENT_SCHEMA_VERSION: u32 = 1;

/// A consent category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentCategory {
    Analytics,
    Marketing,
    Personalization,
}

impl fmt::Display for ConsentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConsentCategory::Analytics => "analytics",
            ConsentCategory::Marketing => "marketing",
            ConsentCategory::Personalization => "personalization",
        };
        f.write_str(s)
    }
}

impl FromStr for ConsentCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "analytics" => Ok(ConsentCategory::Analytics),
            "marketing" => Ok(ConsentCategory::Marketing),
            "personalization" => Ok(ConsentCategory::Personalization),
            other => Err(DomainError::UnknownConsentCategory(other.to_string())),
        }
    }
}

/// Current consent for each category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personalization: Option<bool>,
}

impl ConsentState {
    /// State with every category explicitly granted
    pub fn all_granted() -> Self {
        Self {
            analytics: Some(true),
            marketing: Some(true),
            personalization: Some(true),
        }
    }

    /// State with every category explicitly denied
    pub fn all_denied() -> Self {
        Self {
            analytics: Some(false),
            marketing: Some(false),
            personalization: Some(false),
        }
    }

    /// Raw value of a category
    pub fn get(&self, category: ConsentCategory) -> Option<bool> {
        match category {
            ConsentCategory::Analytics => self.analytics,
            ConsentCategory::Marketing => self.marketing,
            ConsentCategory::Personalization => self.personalization,
        }
    }

    /// Sets a category
    pub fn set(&mut self, category: ConsentCategory, value: Option<bool>) {
        match category {
            ConsentCategory::Analytics => self.analytics = value,
            ConsentCategory::Marketing => self.marketing = value,
            ConsentCategory::Personalization => self.personalization = value,
        }
    }

    /// True only when the category is explicitly granted
    pub fn is_granted(&self, category: ConsentCategory) -> bool {
        self.get(category) == Some(true)
    }

    /// Overlays every category that `partial` specifies
    pub fn merge(&mut self, partial: &ConsentState) {
        if partial.analytics.is_some() {
            self.analytics = partial.analytics;
        }
        if partial.marketing.is_some() {
            self.marketing = partial.marketing;
        }
        if partial.personalization.is_some() {
            self.personalization = partial.personalization;
        }
    }
}

/// Persisted consent blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredConsent {
    pub state: ConsentState,
    pub timestamp: DateTime<Utc>,
    pub version: u32,
}

impl StoredConsent {
    /// Wraps `state` with the current time and schema version
    pub fn new(state: ConsentState) -> Self {
        Self {
            state,
            timestamp: Utc::now(),
            version: CONSENT_SCHEMA_VERSION,
        }
    }

    /// True if written under the current schema
    pub fn is_current(&self) -> bool {
        self.version == CONSENT_SCHEMA_VERSION
    }
}
