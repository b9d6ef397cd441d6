//! Tracking events and identify payloads
//!
//! A [`TrackingEvent`] is one observed occurrence on the page. Events are
//! serialized in camelCase because that is the shape the ingestion
//! endpoint expects.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::errors::DomainError;
use super::newtypes::{SessionId, VisitorId};

/// Free-form event properties
pub type Properties = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// EventType
// ============================================================================

/// Closed set of event types accepted by the ingestion endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PageView,
    ButtonClick,
    FormView,
    FormSubmit,
    FormInteraction,
    ScrollDepth,
    Engagement,
    Download,
    ExitIntent,
    Error,
    Performance,
    TimeOnPage,
    Custom,
}

impl EventType {
    /// All event types, in declaration order
    pub const ALL: [EventType; 13] = [
        EventType::PageView,
        EventType::ButtonClick,
        EventType::FormView,
        EventType::FormSubmit,
        EventType::FormInteraction,
        EventType::ScrollDepth,
        EventType::Engagement,
        EventType::Download,
        EventType::ExitIntent,
        EventType::Error,
        EventType::Performance,
        EventType::TimeOnPage,
        EventType::Custom,
    ];

    /// Wire name of the event type
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PageView => "page_view",
            EventType::ButtonClick => "button_click",
            EventType::FormView => "form_view",
            EventType::FormSubmit => "form_submit",
            EventType::FormInteraction => "form_interaction",
            EventType::ScrollDepth => "scroll_depth",
            EventType::Engagement => "engagement",
            EventType::Download => "download",
            EventType::ExitIntent => "exit_intent",
            EventType::Error => "error",
            EventType::Performance => "performance",
            EventType::TimeOnPage => "time_on_page",
            EventType::Custom => "custom",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::UnknownEventType(s.to_string()))
    }
}

// ============================================================================
// DeviceInfo / UtmParams
// ============================================================================

/// Device descriptor attached to every event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub user_agent: String,
    pub screen_resolution: String,
    pub language: String,
    pub timezone: String,
}

/// UTM attribution parsed from the page URL
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtmParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_medium: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_campaign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_content: Option<String>,
}

impl UtmParams {
    /// Extract UTM parameters from a URL's query string.
    ///
    /// Returns `None` when the URL is unparseable or carries no UTM keys.
    pub fn from_url(url: &str) -> Option<Self> {
        let parsed = Url::parse(url).ok()?;
        let mut params = UtmParams::default();
        for (key, value) in parsed.query_pairs() {
            let value = value.into_owned();
            match key.as_ref() {
                "utm_source" => params.utm_source = Some(value),
                "utm_medium" => params.utm_medium = Some(value),
                "utm_campaign" => params.utm_campaign = Some(value),
                "utm_term" => params.utm_term = Some(value),
                "utm_content" => params.utm_content = Some(value),
                _ => {}
            }
        }
        if params.is_empty() {
            None
        } else {
            Some(params)
        }
    }

    /// Returns true when no UTM key is set
    pub fn is_empty(&self) -> bool {
        self.utm_source.is_none()
            && self.utm_medium.is_none()
            && self.utm_campaign.is_none()
            && self.utm_term.is_none()
            && self.utm_content.is_none()
    }
}

// ============================================================================
// TrackingEvent
// ============================================================================

/// One observed occurrence, ready for transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
    pub workspace_id: String,
    pub visitor_id: VisitorId,
    pub session_id: SessionId,
    pub event_type: EventType,
    pub event_name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(default)]
    pub properties: Properties,
    pub device_info: DeviceInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_params: Option<UtmParams>,
    pub timestamp: DateTime<Utc>,
    pub sdk_version: String,
}

impl TrackingEvent {
    /// Rewrites the visitor ID.
    ///
    /// Only used when consent-buffered events are released after an
    /// identity upgrade; every other field is fixed at construction.
    pub fn retag_visitor(&mut self, visitor_id: VisitorId) {
        self.visitor_id = visitor_id;
    }
}

// ============================================================================
// IdentifyPayload
// ============================================================================

/// Body of the identify endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyPayload {
    pub workspace_id: String,
    pub visitor_id: VisitorId,
    pub email: String,
    #[serde(default)]
    pub properties: Properties,
}
