//! Workload proxy definitions
//!
//! A workload proxy is an `app-mock` process launched by the scheduler as a
//! stand-in application. It asks the harness callback endpoint whether it is
//! healthy, so tests steer health outcomes through the registry instead of
//! through the workload itself.

use std::collections::HashMap;
use std::path::Path;

use shared::{HealthTarget, WorkloadId};

use crate::api::{AppDefinition, HealthCheckDefinition};

pub const PROXY_CPUS: f64 = 0.01;
pub const PROXY_MEM: f64 = 32.0;
pub const MARKER_LABEL: &str = "harness-marker";

/// Unique token embedded in a proxy's command line so the reaper can find it
pub fn new_marker() -> String {
    format!("harness-proxy-{}", uuid::Uuid::new_v4().simple())
}

/// Health URL a proxy appends its own port to
pub fn health_url(callback_host: &str, callback_port: u16, app_id: &WorkloadId, version: &str) -> String {
    format!(
        "http://{}:{}{}",
        callback_host,
        callback_port,
        HealthTarget::base_path(app_id, version)
    )
}

/// Shell command the scheduler runs for one proxy instance
///
/// `$PORT0` and `$MESOS_TASK_ID` are expanded by the agent's shell.
pub fn proxy_command(app_mock: &Path, app_id: &WorkloadId, version: &str, health_url: &str, marker: &str) -> String {
    format!(
        "echo APP PROXY $MESOS_TASK_ID RUNNING; {} --port $PORT0 --app-id {} --version {} --health-url {} --marker {}",
        app_mock.display(),
        app_id,
        version,
        health_url,
        marker
    )
}

/// Default HTTP health check for proxies: polled every second, two failures
/// and the instance is killed
pub fn app_proxy_health_check() -> HealthCheckDefinition {
    HealthCheckDefinition::default()
}

pub fn proxy_definition(
    app_id: &WorkloadId,
    command: String,
    instances: u32,
    marker: &str,
    health_check: Option<HealthCheckDefinition>,
) -> AppDefinition {
    AppDefinition {
        id: app_id.clone(),
        cmd: Some(command),
        instances,
        cpus: PROXY_CPUS,
        mem: PROXY_MEM,
        health_checks: health_check.into_iter().collect(),
        dependencies: Vec::new(),
        labels: HashMap::from([(MARKER_LABEL.to_string(), marker.to_string())]),
    }
}
