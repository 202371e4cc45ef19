//! Lifecycle tests for the `Harness` over mocked scheduler and cluster APIs

use std::sync::atomic::Ordering;
use std::time::Duration;

use assert_matches::assert_matches;
use harness::{HarnessError, testing::STATUS_UPDATE};
use serde_json::json;
use shared::WorkloadId;

mod common;
use common::{HarnessBuilder, busy_agent, event, http_client, idle_agent, launched_task, loopback_url, staged_task};

#[tokio::test]
async fn test_wait_for_events_groups_repeated_kinds() {
    let harness = HarnessBuilder::new().build();
    harness.events().push(event("B", json!({"n": 1})));
    harness.events().push(event("A", json!({"n": 2})));
    harness.events().push(event("A", json!({"n": 3})));

    let grouped = harness.wait_for_events(&["A", "B", "A"]).await.unwrap();

    assert_eq!(grouped.len(), 2);
    let a: Vec<_> = grouped["A"].iter().map(|e| e.field("n").cloned()).collect();
    assert_eq!(a, vec![Some(json!(2)), Some(json!(3))]);
    assert_eq!(grouped["B"].len(), 1);
    assert!(harness.events().is_empty());
}

#[tokio::test]
async fn test_wait_for_events_needs_every_occurrence() {
    let harness = HarnessBuilder::new().build();
    harness.events().push(event("A", json!({})));
    harness.events().push(event("B", json!({})));

    let result = harness
        .wait_for_events_within(&["A", "A", "B"], Duration::from_millis(100))
        .await;
    assert_matches!(result, Err(HarnessError::WaitTimeout { .. }));
}

#[tokio::test]
async fn test_wait_for_event_discards_earlier_events() {
    let harness = HarnessBuilder::new().build();
    harness.events().push(event("noise", json!({})));
    harness.events().push(event("target", json!({"id": "first"})));
    harness.events().push(event("target", json!({"id": "second"})));

    let found = harness.wait_for_event("target").await.unwrap();
    assert_eq!(found.str_field("id"), Some("first"));
    assert_eq!(harness.events().len(), 1);
}

#[tokio::test]
async fn test_wait_for_event_sees_late_arrivals() {
    let harness = HarnessBuilder::new().build();
    let events = harness.events().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        events.push(event("deployment_success", json!({"id": "d-42"})));
    });

    let found = harness.wait_for_deployment("d-42").await.unwrap();
    assert_eq!(found.event_type(), "deployment_success");
}

#[tokio::test]
async fn test_wait_for_event_times_out() {
    let harness = HarnessBuilder::new().with_patience(Duration::from_millis(100)).build();
    harness.events().push(event("other", json!({})));

    let err = harness.wait_for_event("never").await.unwrap_err();
    assert!(err.is_timeout());
    assert!(harness.events().is_empty());
}

#[tokio::test]
async fn test_status_updates_are_matched_in_order() {
    let harness = HarnessBuilder::new().build();
    harness.events().push(event(STATUS_UPDATE, json!({"taskStatus": "TASK_RUNNING"})));
    harness.events().push(event(STATUS_UPDATE, json!({"taskStatus": "TASK_STAGING"})));
    harness.events().push(event(STATUS_UPDATE, json!({"taskStatus": "TASK_RUNNING"})));

    let updates = harness
        .wait_for_status_updates(&["TASK_STAGING", "TASK_RUNNING"])
        .await
        .unwrap();
    let statuses: Vec<_> = updates.iter().map(|u| u.str_field("taskStatus")).collect();
    assert_eq!(statuses, vec![Some("TASK_STAGING"), Some("TASK_RUNNING")]);
}

#[tokio::test]
async fn test_wait_for_tasks_counts_launched_only() {
    let harness = HarnessBuilder::new()
        .with_tasks(vec![launched_task("t1"), staged_task("t2"), launched_task("t3")])
        .build();
    let app = WorkloadId::parse("/harness/web").unwrap();

    let tasks = harness.wait_for_tasks(&app, 2).await.unwrap();
    assert_eq!(tasks.len(), 2);

    let result = harness.wait_for_tasks_within(&app, 3, Duration::from_millis(100)).await;
    assert_matches!(result, Err(HarnessError::WaitTimeout { .. }));
}

#[tokio::test]
async fn test_callback_endpoint_is_bound_and_subscribed_once() {
    let builder = HarnessBuilder::new();
    let subscribes = builder.subscribe_calls();
    let unsubscribes = builder.unsubscribe_calls();
    let mut harness = builder.build();

    let port = harness.callback_endpoint().await.unwrap().port();
    let again = harness.callback_endpoint().await.unwrap().port();
    assert_eq!(port, again);
    assert_eq!(subscribes.load(Ordering::SeqCst), 1);

    http_client()
        .post(loopback_url(port))
        .json(&json!({"eventType": "api_post_event", "uri": "/v2/apps"}))
        .send()
        .await
        .unwrap();
    let posted = harness.wait_for_event("api_post_event").await.unwrap();
    assert_eq!(posted.str_field("uri"), Some("/v2/apps"));

    harness.teardown().await;
    assert_eq!(unsubscribes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_app_proxy_health_round_trip() {
    let harness = HarnessBuilder::new().build();
    let app = WorkloadId::parse("/harness/web").unwrap();

    let definition = harness.app_proxy(&app, "v1", 2, Some(harness.app_proxy_health_check())).await.unwrap();
    let port = harness.callback_endpoint().await.unwrap().port();
    let cmd = definition.cmd.unwrap();
    assert!(cmd.contains(&format!("--health-url http://127.0.0.1:{port}/health/harness/web/v1")));
    assert_eq!(definition.health_checks.len(), 1);

    let probe = harness.register_app_proxy_health_check(&app, "v1", false);
    let health_url = format!("{}/health/harness/web/v1/31000", loopback_url(port));

    let status = http_client().get(&health_url).send().await.unwrap().status();
    assert_eq!(status.as_u16(), 500);
    harness.wait_for_health_check(&probe).await.unwrap();

    harness.register_instance_health_check(&app, "v1", 31000, true);
    let status = http_client().get(&health_url).send().await.unwrap().status();
    assert_eq!(status.as_u16(), 200);
}

#[tokio::test]
async fn test_clean_up_on_empty_cluster() {
    let mut harness = HarnessBuilder::new()
        .with_agents(vec![idle_agent("a1"), idle_agent("a2")])
        .build();
    harness.events().push(event("stale", json!({})));
    harness.register_app_proxy_health_check(&WorkloadId::parse("/harness/x").unwrap(), "v1", false);

    harness.clean_up(false).await.unwrap();

    assert!(harness.events().is_empty());
    assert!(harness.health().is_empty());
    // idempotent
    harness.clean_up(false).await.unwrap();
}

#[tokio::test]
async fn test_clean_up_waits_for_deletion_deployment() {
    let mut harness = HarnessBuilder::new().with_deletion("d-delete").build();
    let events = harness.events().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        events.push(event("deployment_success", json!({"id": "d-delete"})));
    });

    harness.clean_up(false).await.unwrap();
}

#[tokio::test]
async fn test_clean_up_fails_when_deletion_never_finishes() {
    let mut harness = HarnessBuilder::new()
        .with_deletion("d-stuck")
        .with_patience(Duration::from_millis(100))
        .build();

    let err = harness.clean_up(false).await.unwrap_err();
    assert_matches!(err, HarnessError::CleanupAssertion { ref reason } if reason.contains("d-stuck"));
    assert!(!err.is_timeout());
}

#[tokio::test]
async fn test_clean_up_subscribes_before_deleting() {
    let builder = HarnessBuilder::new().with_deletion("d-fresh").delivering_to_subscribers();
    let subscribes = builder.subscribe_calls();
    let mut harness = builder.build();

    harness.clean_up(false).await.unwrap();
    assert_eq!(subscribes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_clean_up_after_retiring_endpoint_resubscribes() {
    let builder = HarnessBuilder::new().with_deletion("d-again").delivering_to_subscribers();
    let subscribes = builder.subscribe_calls();
    let mut harness = builder.build();

    harness.clean_up(true).await.unwrap();
    harness.clean_up(false).await.unwrap();
    assert_eq!(subscribes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_clean_up_shares_one_deadline() {
    // deletion finishes late, leaving too little patience for a busy cluster
    let mut harness = HarnessBuilder::new()
        .with_deletion("d-slow")
        .with_agents(vec![busy_agent("a1")])
        .with_patience(Duration::from_millis(400))
        .build();
    let events = harness.events().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        events.push(event("deployment_success", json!({"id": "d-slow"})));
    });

    let started = std::time::Instant::now();
    let err = harness.clean_up(false).await.unwrap_err();
    assert_matches!(err, HarnessError::CleanupAssertion { ref reason } if reason.contains("not released"));
    assert!(started.elapsed() < Duration::from_millis(650));
}

#[tokio::test]
async fn test_clean_up_rejects_leftover_apps() {
    let mut harness = HarnessBuilder::new().with_leftover_apps(&["/harness/web"]).build();

    let err = harness.clean_up(false).await.unwrap_err();
    assert_matches!(err, HarnessError::CleanupAssertion { ref reason } if reason.contains("/harness/web"));
}

#[tokio::test]
async fn test_clean_up_rejects_leftover_groups() {
    let mut harness = HarnessBuilder::new().with_leftover_groups(&["/harness/g"]).build();

    let err = harness.clean_up(false).await.unwrap_err();
    assert_matches!(err, HarnessError::CleanupAssertion { .. });
}

#[tokio::test]
async fn test_clean_up_requires_released_resources() {
    let mut harness = HarnessBuilder::new()
        .with_agents(vec![idle_agent("a1"), busy_agent("a2")])
        .with_patience(Duration::from_millis(100))
        .build();

    let err = harness.clean_up(false).await.unwrap_err();
    assert_matches!(err, HarnessError::CleanupAssertion { ref reason } if reason.contains("not released"));
}

#[tokio::test]
async fn test_clean_up_with_subscribers_retires_endpoint() {
    let builder = HarnessBuilder::new().with_subscribers(&["http://a:1", "http://b:2"]);
    let subscribes = builder.subscribe_calls();
    let unsubscribes = builder.unsubscribe_calls();
    let mut harness = builder.build();

    harness.callback_endpoint().await.unwrap();
    harness.clean_up(true).await.unwrap();
    assert_eq!(unsubscribes.load(Ordering::SeqCst), 2);

    harness.callback_endpoint().await.unwrap();
    assert_eq!(subscribes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_clean_up_surfaces_protocol_violation() {
    let mut harness = HarnessBuilder::new().build();
    let port = harness.callback_endpoint().await.unwrap().port();

    let status = http_client()
        .get(format!("{}/v2/unexpected", loopback_url(port)))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status.as_u16(), 500);

    let err = harness.clean_up(false).await.unwrap_err();
    assert_matches!(err, HarnessError::ProtocolViolation { ref message } if message.contains("/v2/unexpected"));

    // reported once
    harness.clean_up(false).await.unwrap();
}
