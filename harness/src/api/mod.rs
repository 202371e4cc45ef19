//! Boundary to the scheduler under test and the cluster it runs on
//!
//! Both are external systems; the harness only depends on the traits here.
//! The REST implementations are thin, and tests substitute the generated
//! mocks.

pub mod rest;
pub mod types;

use shared::WorkloadId;

use crate::error::HarnessResult;

pub use rest::{RestClusterClient, RestSchedulerClient};
pub use types::{AgentResources, AppDefinition, DeploymentRef, HealthCheckDefinition, TaskSummary};

/// Scheduler REST API operations the harness needs
#[mockall::automock]
#[async_trait::async_trait]
pub trait SchedulerApi: Send + Sync {
    /// Register `callback_url` with the event bus
    async fn subscribe(&self, callback_url: &str) -> HarnessResult<()>;

    async fn unsubscribe(&self, callback_url: &str) -> HarnessResult<()>;

    async fn list_subscribers(&self) -> HarnessResult<Vec<String>>;

    async fn create_app(&self, app: &AppDefinition) -> HarnessResult<DeploymentRef>;

    /// `Ok(None)` when the group does not exist
    async fn delete_group(&self, group: &WorkloadId, force: bool) -> HarnessResult<Option<DeploymentRef>>;

    /// Apps directly under `group`; a missing group has none
    async fn list_apps(&self, group: &WorkloadId) -> HarnessResult<Vec<WorkloadId>>;

    /// Sub-groups directly under `group`; a missing group has none
    async fn list_groups(&self, group: &WorkloadId) -> HarnessResult<Vec<WorkloadId>>;

    async fn list_tasks(&self, app: &WorkloadId) -> HarnessResult<Vec<TaskSummary>>;
}

/// Cluster resource-manager view used to verify a clean slate
#[mockall::automock]
#[async_trait::async_trait]
pub trait ClusterApi: Send + Sync {
    async fn agents(&self) -> HarnessResult<Vec<AgentResources>>;
}
