//! Identify delivery

use trailmark_core::domain::DeliveryError;
use trailmark_core::ports::IEventTransport;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{sample_identify, transport_for};

const IDENTIFY: &str = "/api/public/track/identify";

#[tokio::test]
async fn test_identify_posts_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(IDENTIFY))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport_for(&server, 3);
    let mut payload = sample_identify("ada@example.com");
    payload
        .properties
        .insert("firstName".to_string(), serde_json::json!("Ada"));

    transport.send_identify(&payload).await.expect("identify failed");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["workspaceId"], "ws-test");
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["visitorId"], payload.visitor_id.as_str());
    assert_eq!(body["properties"]["firstName"], "Ada");
}

#[tokio::test]
async fn test_identify_unauthorized_fails_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(IDENTIFY))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport_for(&server, 3);
    let result = transport
        .send_identify(&sample_identify("ada@example.com"))
        .await;

    assert_eq!(result, Err(DeliveryError::Client { status: 401 }));
}
