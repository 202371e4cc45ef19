//! HTTP-level tests for the callback endpoint

use assert_matches::assert_matches;
use harness::{CallbackEndpoint, EventQueue, HarnessError, HealthCheckRegistry};
use serde_json::json;
use shared::WorkloadId;

mod common;
use common::{http_client, loopback_url};

async fn endpoint() -> (CallbackEndpoint, EventQueue, HealthCheckRegistry) {
    let events = EventQueue::new();
    let health = HealthCheckRegistry::new();
    let endpoint = CallbackEndpoint::bind_on("127.0.0.1:0", events.clone(), health.clone())
        .await
        .unwrap();
    (endpoint, events, health)
}

#[tokio::test]
async fn test_posted_events_are_queued_in_order() {
    let (endpoint, events, _) = endpoint().await;
    let client = http_client();

    for kind in ["first", "second"] {
        let status = client
            .post(loopback_url(endpoint.port()))
            .json(&json!({"eventType": kind}))
            .send()
            .await
            .unwrap()
            .status();
        assert_eq!(status.as_u16(), 200);
    }

    assert_eq!(events.len(), 2);
    let head = events.drain_matching(|_| true).unwrap();
    assert_eq!(head.event_type(), "first");
}

#[tokio::test]
async fn test_malformed_event_body_is_kept() {
    let (endpoint, events, _) = endpoint().await;

    let status = http_client()
        .post(loopback_url(endpoint.port()))
        .body("not json")
        .send()
        .await
        .unwrap()
        .status();

    assert_eq!(status.as_u16(), 200);
    let event = events.drain_matching(|_| true).unwrap();
    assert_eq!(event.event_type(), "unknown");
    assert_eq!(event.str_field("body"), Some("not json"));
    endpoint.take_protocol_violation().unwrap();
}

#[tokio::test]
async fn test_health_answer_follows_registry() {
    let (endpoint, _, health) = endpoint().await;
    let client = http_client();
    let url = format!("{}/health/app/v1/1234", loopback_url(endpoint.port()));

    // nothing registered
    let status = client.get(&url).send().await.unwrap().status();
    assert_eq!(status.as_u16(), 200);

    let probe = health.register(WorkloadId::parse("/app").unwrap(), "v1", 0, false);
    let status = client.get(&url).send().await.unwrap().status();
    assert_eq!(status.as_u16(), 500);
    assert!(probe.pinged());

    probe.set_healthy(true);
    let status = client.get(&url).send().await.unwrap().status();
    assert_eq!(status.as_u16(), 200);

    endpoint.take_protocol_violation().unwrap();
}

#[tokio::test]
async fn test_nested_workload_health_path() {
    let (endpoint, _, health) = endpoint().await;
    health.register(WorkloadId::parse("/harness/group/app").unwrap(), "v2", 31001, false);

    let url = format!("{}/health/harness/group/app/v2/31001", loopback_url(endpoint.port()));
    let status = http_client().get(&url).send().await.unwrap().status();
    assert_eq!(status.as_u16(), 500);
}

#[tokio::test]
async fn test_unexpected_requests_are_violations() {
    let (endpoint, events, _) = endpoint().await;
    let client = http_client();
    let base = loopback_url(endpoint.port());

    let get_root = client.get(&base).send().await.unwrap().status();
    let bad_port = client
        .get(format!("{base}/health/app/v1/not-a-port"))
        .send()
        .await
        .unwrap()
        .status();
    let elsewhere = client.post(format!("{base}/events")).send().await.unwrap().status();

    assert_eq!(get_root.as_u16(), 500);
    assert_eq!(bad_port.as_u16(), 500);
    assert_eq!(elsewhere.as_u16(), 500);
    assert!(events.is_empty());
    assert_eq!(endpoint.protocol_violations().len(), 3);

    let err = endpoint.take_protocol_violation().unwrap_err();
    assert_matches!(err, HarnessError::ProtocolViolation { .. });
    assert!(endpoint.protocol_violations().is_empty());
}

#[tokio::test]
async fn test_shutdown_stops_listening() {
    let (endpoint, _, _) = endpoint().await;
    let url = loopback_url(endpoint.port());
    endpoint.shutdown().await;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    assert!(client.post(&url).body("{}").send().await.is_err());
}
