//! Test helpers and builder patterns for harness tests
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use harness::api::{AgentResources, DeploymentRef, MockClusterApi, MockSchedulerApi, TaskSummary};
use harness::{Harness, HarnessSettings, WaitEngine};
use serde_json::{Value, json};
use shared::WorkloadId;
use tokio::net::TcpListener;

pub const TEST_PATIENCE: Duration = Duration::from_secs(2);
pub const TEST_POLL: Duration = Duration::from_millis(10);

/// Builder for a `Harness` over mocked scheduler and cluster APIs
///
/// Every API call succeeds with an empty answer unless overridden.
pub struct HarnessBuilder {
    settings: HarnessSettings,
    deletion: Option<DeploymentRef>,
    leftover_apps: Vec<WorkloadId>,
    leftover_groups: Vec<WorkloadId>,
    agents: Vec<AgentResources>,
    subscribers: Vec<String>,
    tasks: Vec<TaskSummary>,
    subscribe_calls: Arc<AtomicUsize>,
    unsubscribe_calls: Arc<AtomicUsize>,
    deliver_to_subscribers: bool,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            settings: HarnessSettings::default()
                .with_patience(TEST_PATIENCE)
                .with_callback_host("127.0.0.1"),
            deletion: None,
            leftover_apps: Vec::new(),
            leftover_groups: Vec::new(),
            agents: Vec::new(),
            subscribers: Vec::new(),
            tasks: Vec::new(),
            subscribe_calls: Arc::new(AtomicUsize::new(0)),
            unsubscribe_calls: Arc::new(AtomicUsize::new(0)),
            deliver_to_subscribers: false,
        }
    }

    pub fn with_patience(mut self, patience: Duration) -> Self {
        self.settings = self.settings.with_patience(patience);
        self
    }

    /// Deleting the namespace starts this deployment
    pub fn with_deletion(mut self, deployment_id: &str) -> Self {
        self.deletion = Some(DeploymentRef {
            deployment_id: deployment_id.to_string(),
            version: "2026-01-01T00:00:00Z".to_string(),
        });
        self
    }

    /// The deletion's `deployment_success` is POSTed to every subscribed
    /// callback URL, as the scheduler does, instead of reaching nobody
    pub fn delivering_to_subscribers(mut self) -> Self {
        self.deliver_to_subscribers = true;
        self
    }

    pub fn with_leftover_apps(mut self, apps: &[&str]) -> Self {
        self.leftover_apps = apps.iter().map(|a| WorkloadId::parse(a).unwrap()).collect();
        self
    }

    pub fn with_leftover_groups(mut self, groups: &[&str]) -> Self {
        self.leftover_groups = groups.iter().map(|g| WorkloadId::parse(g).unwrap()).collect();
        self
    }

    pub fn with_agents(mut self, agents: Vec<AgentResources>) -> Self {
        self.agents = agents;
        self
    }

    pub fn with_subscribers(mut self, subscribers: &[&str]) -> Self {
        self.subscribers = subscribers.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_tasks(mut self, tasks: Vec<TaskSummary>) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn subscribe_calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.subscribe_calls)
    }

    pub fn unsubscribe_calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.unsubscribe_calls)
    }

    pub fn build(self) -> Harness {
        let mut api = MockSchedulerApi::new();
        let mut cluster = MockClusterApi::new();

        let subscribed = Arc::new(Mutex::new(Vec::<String>::new()));
        let subscribe_calls = self.subscribe_calls;
        let recorder = Arc::clone(&subscribed);
        api.expect_subscribe().returning(move |url| {
            subscribe_calls.fetch_add(1, Ordering::SeqCst);
            recorder.lock().unwrap().push(url.to_string());
            Ok(())
        });
        let unsubscribe_calls = self.unsubscribe_calls;
        api.expect_unsubscribe().returning(move |_| {
            unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let subscribers = self.subscribers;
        api.expect_list_subscribers()
            .returning(move || Ok(subscribers.clone()));
        let deletion = self.deletion;
        let deliver = self.deliver_to_subscribers;
        api.expect_delete_group().returning(move |_, _| {
            if let (true, Some(deployment)) = (deliver, &deletion) {
                let urls = subscribed.lock().unwrap().clone();
                tokio::spawn(deliver_deployment_success(urls, deployment.deployment_id.clone()));
            }
            Ok(deletion.clone())
        });
        let apps = self.leftover_apps;
        api.expect_list_apps().returning(move |_| Ok(apps.clone()));
        let groups = self.leftover_groups;
        api.expect_list_groups().returning(move |_| Ok(groups.clone()));
        let tasks = self.tasks;
        api.expect_list_tasks().returning(move |_| Ok(tasks.clone()));

        let agents = self.agents;
        cluster.expect_agents().returning(move || Ok(agents.clone()));

        Harness::new(Arc::new(api), Arc::new(cluster), self.settings)
            .with_wait_engine(WaitEngine::new().with_poll_interval(TEST_POLL))
    }
}

async fn deliver_deployment_success(urls: Vec<String>, deployment_id: String) {
    tokio::time::sleep(Duration::from_millis(50)).await;
    let client = http_client();
    for url in urls {
        let url = url.replace("://localhost:", "://127.0.0.1:");
        let _ = client
            .post(&url)
            .json(&json!({"eventType": "deployment_success", "id": deployment_id}))
            .send()
            .await;
    }
}

pub fn event(event_type: &str, fields: Value) -> harness::CallbackEvent {
    let mut body = fields;
    body["eventType"] = json!(event_type);
    harness::CallbackEvent::from_json(body)
}

pub fn busy_agent(id: &str) -> AgentResources {
    serde_json::from_value(json!({
        "id": id,
        "used_resources": {"cpus": 0.5, "mem": 128.0}
    }))
    .unwrap()
}

pub fn idle_agent(id: &str) -> AgentResources {
    serde_json::from_value(json!({
        "id": id,
        "used_resources": {"cpus": 0.0, "mem": 0.0}
    }))
    .unwrap()
}

pub fn launched_task(id: &str) -> TaskSummary {
    serde_json::from_value(json!({"id": id, "startedAt": "2026-01-01T00:00:00Z"})).unwrap()
}

pub fn staged_task(id: &str) -> TaskSummary {
    serde_json::from_value(json!({"id": id})).unwrap()
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

pub fn loopback_url(port: u16) -> String {
    format!("http://127.0.0.1:{port}")
}

/// Serve `app` on an ephemeral loopback port
pub async fn serve(app: axum::Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}
