//! End-to-end delivery against a mock ingestion API

use serde_json::{json, Value};
use trailmark_core::domain::{EventType, Properties};
use trailmark_core::ports::{EVENTS_PATH, IDENTIFY_PATH};
use trailmark_pipeline::{FlushOutcome, TrackerBuilder, TrackerError};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::quiet_config;

fn tracker_for(server: &MockServer) -> std::sync::Arc<trailmark_pipeline::Tracker> {
    let config = quiet_config()
        .api_endpoint(server.uri())
        .timeout_ms(500)
        .max_retries(2)
        .retry_delay_ms(10)
        .build();
    TrackerBuilder::new(config)
        .start_timer(false)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_events_posted_as_camel_case_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EVENTS_PATH))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let tracker = tracker_for(&server);
    let mut props = Properties::new();
    props.insert("plan".into(), json!("pro"));
    tracker.track(EventType::Custom, "upgrade", props);
    tracker.page(Some("Home"), None);

    assert_eq!(tracker.flush().await, FlushOutcome::Sent { count: 2 });

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let events = body["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["workspaceId"], "ws-integration");
    assert_eq!(events[0]["eventType"], "custom");
    assert_eq!(events[0]["eventName"], "upgrade");
    assert_eq!(events[0]["properties"]["plan"], "pro");
    assert_eq!(events[0]["visitorId"], tracker.visitor_id().as_str());
    assert!(events[0]["deviceInfo"]["userAgent"].is_string());
    assert_eq!(events[1]["eventType"], "page_view");
}

#[tokio::test]
async fn test_server_errors_requeue_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let tracker = tracker_for(&server);
    tracker.track(EventType::Custom, "a", Properties::new());
    tracker.track(EventType::Custom, "b", Properties::new());

    let outcome = tracker.flush().await;
    assert!(matches!(outcome, FlushOutcome::Requeued { count: 2, .. }));
    assert_eq!(tracker.queue_len(), 2);
}

#[tokio::test]
async fn test_client_error_is_not_retried_but_requeued() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let tracker = tracker_for(&server);
    tracker.track(EventType::Custom, "bad", Properties::new());

    assert!(matches!(
        tracker.flush().await,
        FlushOutcome::Requeued { count: 1, .. }
    ));
}

#[tokio::test]
async fn test_identify_posts_directly() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(IDENTIFY_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let tracker = tracker_for(&server);
    let mut traits = Properties::new();
    traits.insert("company".into(), json!("Acme"));
    tracker.identify("ada@example.com", traits).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["workspaceId"], "ws-integration");
    assert_eq!(body["properties"]["company"], "Acme");
    assert_eq!(tracker.queue_len(), 0);
}

#[tokio::test]
async fn test_identify_failure_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(IDENTIFY_PATH))
        .respond_with(ResponseTemplate::new(422))
        .mount(&server)
        .await;

    let tracker = tracker_for(&server);
    let err = tracker
        .identify("ada@example.com", Properties::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::Delivery(_)));
    let metrics = tracker.metrics().unwrap().encode().unwrap();
    assert!(metrics.contains("client_error"));
}
