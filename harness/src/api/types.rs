//! Wire types exchanged with the scheduler and the cluster master

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared::WorkloadId;

/// Application definition submitted to the scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDefinition {
    pub id: WorkloadId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    pub instances: u32,
    pub cpus: f64,
    pub mem: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub health_checks: Vec<HealthCheckDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<WorkloadId>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

/// HTTP health check the scheduler runs against a workload instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckDefinition {
    pub protocol: String,
    pub path: String,
    pub port_index: u32,
    pub grace_period_seconds: u64,
    pub interval_seconds: u64,
    pub timeout_seconds: u64,
    pub max_consecutive_failures: u32,
}

impl Default for HealthCheckDefinition {
    fn default() -> Self {
        Self {
            protocol: "HTTP".to_string(),
            path: "/health".to_string(),
            port_index: 0,
            grace_period_seconds: 1,
            interval_seconds: 1,
            timeout_seconds: 1,
            max_consecutive_failures: 2,
        }
    }
}

/// Reference to a deployment started by a mutating API call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRef {
    pub deployment_id: String,
    #[serde(default)]
    pub version: String,
}

/// A running or staged instance of an app
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub id: String,
    #[serde(default)]
    pub app_id: Option<WorkloadId>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub ports: Vec<u16>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl TaskSummary {
    /// Launched means the agent reported the task as started
    pub fn is_launched(&self) -> bool {
        self.started_at.is_some()
    }
}

/// Resource accounting for one cluster agent
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentResources {
    pub id: String,
    #[serde(default)]
    pub used_resources: Map<String, Value>,
    #[serde(default)]
    pub reserved_resources: Map<String, Value>,
}

impl AgentResources {
    /// No resources in use and nothing reserved for any role
    pub fn is_quiescent(&self) -> bool {
        let nothing_used = self.used_resources.values().all(|value| match value {
            Value::Number(n) => n.as_f64().is_some_and(|v| v == 0.0),
            Value::String(s) => s.is_empty() || s == "[]",
            Value::Null => true,
            Value::Array(items) => items.is_empty(),
            Value::Object(fields) => fields.is_empty(),
            Value::Bool(_) => true,
        });
        nothing_used && self.reserved_resources.is_empty()
    }
}
