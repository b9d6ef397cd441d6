//! HTTP event transport
//!
//! Delivers event batches and identify payloads as JSON POSTs.
//!
//! ## Retry policy
//!
//! - 2xx: success
//! - 4xx: permanent failure, returned after a single attempt
//! - 5xx, network errors, timeouts: retried with a linearly increasing
//!   delay (`retry_delay * attempt`) until `max_retries` attempts are spent
//!
//! Each attempt is bounded by the configured timeout, which aborts the
//! in-flight request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, info, warn};
use trailmark_core::config::TransportConfig;
use trailmark_core::domain::{DeliveryError, IdentifyPayload, TrackingEvent};
use trailmark_core::ports::{
    EventBatch, IBeaconSender, IEventTransport, EVENTS_PATH, IDENTIFY_PATH,
};

/// Retry and timeout tuning for [`HttpTransport`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Bound on a single attempt
    pub timeout: Duration,
    /// Total attempts for a retryable failure
    pub max_retries: u32,
    /// Base delay, multiplied by the attempt number
    pub retry_delay: Duration,
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt)
    }

    fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

impl From<&TransportConfig> for RetryPolicy {
    fn from(config: &TransportConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.timeout_ms),
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&TransportConfig::default())
    }
}

// ============================================================================
// HttpTransport
// ============================================================================

/// reqwest-backed [`IEventTransport`]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
    beacon: Option<Arc<dyn IBeaconSender>>,
}

impl HttpTransport {
    /// Creates a transport posting under `base_url`
    pub fn new(base_url: impl Into<String>, policy: RetryPolicy) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            policy,
            beacon: None,
        }
    }

    /// Creates a transport with the default policy (useful for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self::new(base_url, RetryPolicy::default())
    }

    /// Attaches the platform beacon used by [`IEventTransport::send_beacon`]
    pub fn with_beacon(mut self, beacon: Arc<dyn IBeaconSender>) -> Self {
        self.beacon = Some(beacon);
        self
    }

    /// Base URL requests are sent under
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Active retry policy
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends one POST attempt and classifies the outcome
    async fn attempt(&self, url: &str, body: &[u8]) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.policy.timeout)
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout(self.policy.timeout)
                } else {
                    DeliveryError::Network(e.to_string())
                }
            })?;

        classify(response.status())
    }

    /// POSTs `payload` to `path`, retrying transient failures
    async fn post_with_retry<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<(), DeliveryError> {
        let body =
            serde_json::to_vec(payload).map_err(|e| DeliveryError::Serialization(e.to_string()))?;
        let url = self.url(path);
        let attempts = self.policy.attempts();
        let mut last_error = DeliveryError::Network("no attempt made".to_string());

        for attempt in 1..=attempts {
            match self.attempt(&url, &body).await {
                Ok(()) => {
                    if attempt > 1 {
                        info!(path, attempt, "Request succeeded after retry");
                    } else {
                        debug!(path, bytes = body.len(), "Request succeeded");
                    }
                    return Ok(());
                }
                Err(e) if !e.is_retryable() => {
                    warn!(path, error = %e, "Request rejected, not retrying");
                    return Err(e);
                }
                Err(e) => {
                    if attempt < attempts {
                        let delay = self.policy.delay_for(attempt);
                        info!(
                            path,
                            attempt,
                            retry_in_ms = delay.as_millis() as u64,
                            error = %e,
                            "Transient delivery failure, backing off"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = e;
                }
            }
        }

        warn!(path, attempts, error = %last_error, "Retry limit exhausted");
        Err(last_error)
    }
}

/// Maps an HTTP status onto the delivery outcome
fn classify(status: StatusCode) -> Result<(), DeliveryError> {
    if status.is_success() {
        Ok(())
    } else if status.is_client_error() {
        Err(DeliveryError::Client {
            status: status.as_u16(),
        })
    } else {
        Err(DeliveryError::Server {
            status: status.as_u16(),
        })
    }
}

#[async_trait]
impl IEventTransport for HttpTransport {
    async fn send_events(&self, events: &[TrackingEvent]) -> Result<(), DeliveryError> {
        debug!(count = events.len(), "Sending event batch");
        self.post_with_retry(EVENTS_PATH, &EventBatch { events })
            .await
    }

    async fn send_identify(&self, payload: &IdentifyPayload) -> Result<(), DeliveryError> {
        debug!(visitor_id = %payload.visitor_id, "Sending identify");
        self.post_with_retry(IDENTIFY_PATH, payload).await
    }

    fn send_beacon(&self, events: &[TrackingEvent]) -> Result<(), DeliveryError> {
        let beacon = self.beacon.as_ref().ok_or(DeliveryError::BeaconUnavailable)?;
        let body = serde_json::to_string(&EventBatch { events })
            .map_err(|e| DeliveryError::Serialization(e.to_string()))?;

        if beacon.send(&self.url(EVENTS_PATH), body) {
            debug!(count = events.len(), "Beacon queued");
            Ok(())
        } else {
            warn!(count = events.len(), "Beacon refused payload");
            Err(DeliveryError::BeaconRejected)
        }
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("policy", &self.policy)
            .field("beacon", &self.beacon.is_some())
            .finish()
    }
}
