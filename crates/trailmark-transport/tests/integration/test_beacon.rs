//! Beacon delivery through the background sender

use std::sync::Arc;
use std::time::Duration;

use trailmark_core::ports::IEventTransport;
use trailmark_transport::BackgroundBeacon;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{sample_event, transport_for};

#[tokio::test]
async fn test_beacon_reaches_events_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/public/track/event"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let transport = transport_for(&server, 3).with_beacon(Arc::new(BackgroundBeacon::new()));
    transport
        .send_beacon(&[sample_event("unload")])
        .expect("beacon refused");

    // The POST runs on a spawned task
    let mut received = Vec::new();
    for _ in 0..50 {
        received = server.received_requests().await.unwrap();
        if !received.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(received.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["events"][0]["eventName"], "unload");
}
