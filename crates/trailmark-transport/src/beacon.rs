//! Fire-and-forget beacon for native hosts
//!
//! Spawns the POST on the current tokio runtime and returns immediately.
//! Without a runtime there is nothing to hand the payload to, so `send`
//! reports refusal, like a browser without `navigator.sendBeacon`.

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tokio::runtime::Handle;
use tracing::{debug, warn};
use trailmark_core::ports::IBeaconSender;

/// [`IBeaconSender`] that spawns a single unretried POST
#[derive(Debug, Clone, Default)]
pub struct BackgroundBeacon {
    client: Client,
}

impl BackgroundBeacon {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IBeaconSender for BackgroundBeacon {
    fn send(&self, url: &str, body: String) -> bool {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                debug!(url, "No runtime available for beacon");
                return false;
            }
        };

        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        let url = url.to_string();

        handle.spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(url = %url, "Beacon delivered");
                }
                Ok(response) => {
                    warn!(url = %url, status = response.status().as_u16(), "Beacon rejected");
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Beacon failed");
                }
            }
        });
        true
    }
}
