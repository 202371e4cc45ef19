//! REST clients for the scheduler and the cluster master

use std::time::Duration;

use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use shared::WorkloadId;
use url::Url;

use super::types::{AgentResources, AppDefinition, DeploymentRef, TaskSummary};
use super::{ClusterApi, SchedulerApi};
use crate::error::{HarnessError, HarnessResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn http_client() -> HarnessResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .no_proxy()
        .build()?)
}

fn normalise_base_url(raw: &str) -> HarnessResult<String> {
    let with_scheme = if raw.starts_with("http") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    let parsed = Url::parse(&with_scheme).map_err(|e| HarnessError::config(format!("base url '{raw}': {e}")))?;
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

/// Turn a non-2xx response into an `ApiStatus` error
async fn expect_success(operation: &str, response: Response) -> HarnessResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(HarnessError::ApiStatus {
        operation: operation.to_string(),
        status,
        body,
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscribersResponse {
    #[serde(default)]
    callback_urls: Vec<String>,
}

#[derive(Deserialize)]
struct IdOnly {
    id: WorkloadId,
}

#[derive(Deserialize)]
struct GroupResponse {
    #[serde(default)]
    apps: Vec<IdOnly>,
    #[serde(default)]
    groups: Vec<IdOnly>,
}

#[derive(Deserialize)]
struct TasksResponse {
    #[serde(default)]
    tasks: Vec<TaskSummary>,
}

#[derive(Deserialize)]
struct StateResponse {
    #[serde(default, alias = "agents")]
    slaves: Vec<AgentResources>,
}

/// HTTP client for the scheduler REST API
#[derive(Clone)]
pub struct RestSchedulerClient {
    base_url: String,
    client: reqwest::Client,
}

impl RestSchedulerClient {
    pub fn new(base_url: &str) -> HarnessResult<Self> {
        Ok(Self {
            base_url: normalise_base_url(base_url)?,
            client: http_client()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn fetch_group(&self, group: &WorkloadId) -> HarnessResult<Option<GroupResponse>> {
        let response = self.client.get(self.url(&format!("/v2/groups{group}"))).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = expect_success("get group", response).await?;
        Ok(Some(response.json().await?))
    }
}

#[async_trait::async_trait]
impl SchedulerApi for RestSchedulerClient {
    async fn subscribe(&self, callback_url: &str) -> HarnessResult<()> {
        tracing::info!("📡 Subscribing {} to scheduler events", callback_url);
        let response = self
            .client
            .post(self.url("/v2/eventSubscriptions"))
            .query(&[("callbackUrl", callback_url)])
            .send()
            .await?;
        expect_success("subscribe", response).await?;
        Ok(())
    }

    async fn unsubscribe(&self, callback_url: &str) -> HarnessResult<()> {
        tracing::info!("🔕 Unsubscribing {} from scheduler events", callback_url);
        let response = self
            .client
            .delete(self.url("/v2/eventSubscriptions"))
            .query(&[("callbackUrl", callback_url)])
            .send()
            .await?;
        expect_success("unsubscribe", response).await?;
        Ok(())
    }

    async fn list_subscribers(&self) -> HarnessResult<Vec<String>> {
        let response = self.client.get(self.url("/v2/eventSubscriptions")).send().await?;
        let response = expect_success("list subscribers", response).await?;
        let subscribers: SubscribersResponse = response.json().await?;
        Ok(subscribers.callback_urls)
    }

    async fn create_app(&self, app: &AppDefinition) -> HarnessResult<DeploymentRef> {
        tracing::info!("🚀 Creating app {} with {} instances", app.id, app.instances);
        let response = self.client.post(self.url("/v2/apps")).json(app).send().await?;
        let response = expect_success("create app", response).await?;
        let body: Value = response.json().await?;

        let deployment_id = body["deployments"][0]["id"]
            .as_str()
            .ok_or_else(|| HarnessError::ApiStatus {
                operation: "create app".to_string(),
                status: 200,
                body: "response carries no deployment id".to_string(),
            })?
            .to_string();
        let version = body["version"].as_str().unwrap_or_default().to_string();
        Ok(DeploymentRef { deployment_id, version })
    }

    async fn delete_group(&self, group: &WorkloadId, force: bool) -> HarnessResult<Option<DeploymentRef>> {
        tracing::info!("🗑️ Deleting group {} (force: {})", group, force);
        let response = self
            .client
            .delete(self.url(&format!("/v2/groups{group}")))
            .query(&[("force", force)])
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = expect_success("delete group", response).await?;
        Ok(Some(response.json().await?))
    }

    async fn list_apps(&self, group: &WorkloadId) -> HarnessResult<Vec<WorkloadId>> {
        Ok(self
            .fetch_group(group)
            .await?
            .map(|g| g.apps.into_iter().map(|app| app.id).collect())
            .unwrap_or_default())
    }

    async fn list_groups(&self, group: &WorkloadId) -> HarnessResult<Vec<WorkloadId>> {
        Ok(self
            .fetch_group(group)
            .await?
            .map(|g| g.groups.into_iter().map(|sub| sub.id).collect())
            .unwrap_or_default())
    }

    async fn list_tasks(&self, app: &WorkloadId) -> HarnessResult<Vec<TaskSummary>> {
        let response = self.client.get(self.url(&format!("/v2/apps{app}/tasks"))).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let response = expect_success("list tasks", response).await?;
        let tasks: TasksResponse = response.json().await?;
        Ok(tasks.tasks)
    }
}

/// HTTP client for the cluster master's state endpoint
#[derive(Clone)]
pub struct RestClusterClient {
    base_url: String,
    client: reqwest::Client,
}

impl RestClusterClient {
    pub fn new(master_url: &str) -> HarnessResult<Self> {
        Ok(Self {
            base_url: normalise_base_url(master_url)?,
            client: http_client()?,
        })
    }
}

#[async_trait::async_trait]
impl ClusterApi for RestClusterClient {
    async fn agents(&self) -> HarnessResult<Vec<AgentResources>> {
        let response = self.client.get(format!("{}/state", self.base_url)).send().await?;
        let response = expect_success("cluster state", response).await?;
        let state: StateResponse = response.json().await?;
        Ok(state.slaves)
    }
}
