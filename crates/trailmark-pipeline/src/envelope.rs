//! Event envelope construction
//!
//! Device info and UTM attribution are read fresh from the page on every
//! call, so a navigation that changes the URL changes the attribution.

use std::sync::Arc;

use chrono::Utc;
use trailmark_core::domain::{
    DeviceInfo, EventType, Properties, SessionId, TrackingEvent, UtmParams, VisitorId,
};
use trailmark_core::ports::IPageContext;
use trailmark_core::SDK_VERSION;

/// Builds [`TrackingEvent`]s for one workspace and page
#[derive(Clone)]
pub struct EnvelopeBuilder {
    workspace_id: String,
    page: Arc<dyn IPageContext>,
}

impl EnvelopeBuilder {
    pub fn new(workspace_id: impl Into<String>, page: Arc<dyn IPageContext>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            page,
        }
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    /// Device descriptor for the current page
    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            user_agent: self.page.user_agent(),
            screen_resolution: self.page.screen_resolution(),
            language: self.page.language(),
            timezone: self.page.timezone(),
        }
    }

    pub fn build(
        &self,
        visitor_id: VisitorId,
        session_id: SessionId,
        event_type: EventType,
        name: &str,
        properties: Properties,
    ) -> TrackingEvent {
        let url = self.page.url();
        TrackingEvent {
            workspace_id: self.workspace_id.clone(),
            visitor_id,
            session_id,
            event_type,
            event_name: name.to_string(),
            utm_params: UtmParams::from_url(&url),
            url,
            referrer: self.page.referrer().filter(|r| !r.is_empty()),
            properties,
            device_info: self.device_info(),
            timestamp: Utc::now(),
            sdk_version: SDK_VERSION.to_string(),
        }
    }
}
