//! Harness Settings
//!
//! Per-suite knobs for the lifecycle orchestrator

use std::path::PathBuf;
use std::time::Duration;

use shared::WorkloadId;

#[derive(Debug, Clone)]
pub struct HarnessSettings {
    /// Namespace every workload of the suite lives under; wiped by clean up
    pub base_path: WorkloadId,
    /// Default timeout for waits that do not name one
    pub patience: Duration,
    /// Workload proxy executable put into app definitions
    pub app_mock: PathBuf,
    /// Host workload proxies use to reach the callback endpoint
    pub callback_host: String,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            base_path: WorkloadId::from_segments(["harness"]).unwrap_or_else(|_| WorkloadId::root()),
            patience: Duration::from_secs(30),
            app_mock: PathBuf::from("target/release/app-mock"),
            callback_host: "$HOST".to_string(),
        }
    }
}

impl HarnessSettings {
    pub fn with_base_path(mut self, base_path: WorkloadId) -> Self {
        self.base_path = base_path;
        self
    }

    pub fn with_patience(mut self, patience: Duration) -> Self {
        self.patience = patience;
        self
    }

    pub fn with_app_mock(mut self, app_mock: impl Into<PathBuf>) -> Self {
        self.app_mock = app_mock.into();
        self
    }

    pub fn with_callback_host(mut self, host: impl Into<String>) -> Self {
        self.callback_host = host.into();
        self
    }
}
