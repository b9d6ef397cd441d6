//! Event batch delivery: status handling and retry counts

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use trailmark_core::domain::DeliveryError;
use trailmark_core::ports::IEventTransport;
use trailmark_transport::http::HttpTransport;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{fast_policy, sample_event, transport_for};

const EVENTS: &str = "/api/public/track/event";

#[tokio::test]
async fn test_success_posts_json_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EVENTS))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport_for(&server, 3);
    let events = vec![sample_event("event-0"), sample_event("event-1")];
    transport.send_events(&events).await.expect("send failed");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let sent = body["events"].as_array().unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0]["eventName"], "event-0");
    assert_eq!(sent[0]["eventType"], "custom");
    assert_eq!(sent[1]["eventName"], "event-1");
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EVENTS))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport_for(&server, 3);
    let result = transport.send_events(&[sample_event("bad")]).await;

    assert_eq!(result, Err(DeliveryError::Client { status: 400 }));
}

#[tokio::test]
async fn test_server_error_then_success_takes_two_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EVENTS))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(EVENTS))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport_for(&server, 3);
    let result = transport.send_events(&[sample_event("flaky")]).await;

    assert!(result.is_ok());
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_server_errors_exhaust_max_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EVENTS))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let transport = transport_for(&server, 3);
    let result = transport.send_events(&[sample_event("down")]).await;

    assert_eq!(result, Err(DeliveryError::Server { status: 503 }));
}

#[tokio::test]
async fn test_network_failures_exhaust_max_retries() {
    // Accepts every connection and hangs up before answering
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let accepted = connections.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            accepted.fetch_add(1, Ordering::SeqCst);
            drop(socket);
        }
    });

    let transport = HttpTransport::new(format!("http://{}", addr), fast_policy(3));
    let result = transport.send_events(&[sample_event("offline")]).await;

    match result {
        Err(DeliveryError::Network(_)) => {}
        other => panic!("expected network error, got {:?}", other),
    }
    assert_eq!(connections.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_timeout_aborts_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EVENTS))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let transport = transport_for(&server, 2);
    let result = transport.send_events(&[sample_event("slow")]).await;

    assert_eq!(
        result,
        Err(DeliveryError::Timeout(Duration::from_millis(500)))
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}
