//! Scheduler Integration-Test Harness
//!
//! Launches a scheduler under test, listens for the events it sends back,
//! answers its workloads' health queries and offers deadline-bounded waits
//! over all of it.
//!
//! ## Main Interface
//!
//! [`ProcessSupervisor`] owns the scheduler process; [`Harness`] owns the
//! callback endpoint and everything a test does against the running system.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use harness::*;
//!
//! # async fn run() -> HarnessResult<()> {
//! let config = SupervisorConfig::builder()
//!     .suite_name("deployments")
//!     .master_url("127.0.0.1:5050")
//!     .launch(HarnessEnv::from_env().launch_command())
//!     .build();
//! let mut supervisor = ProcessSupervisor::launch(config).await?;
//!
//! let api = Arc::new(RestSchedulerClient::new(&supervisor.url())?);
//! let cluster = Arc::new(RestClusterClient::new("127.0.0.1:5050")?);
//! let mut harness = Harness::new(api, cluster, HarnessSettings::default());
//!
//! let app_id = harness.settings().base_path.child("web")?;
//! let app = harness.app_proxy(&app_id, "v1", 2, None).await?;
//! let deployment = harness.api().create_app(&app).await?;
//! harness.wait_for_deployment(&deployment.deployment_id).await?;
//!
//! harness.clean_up(true).await?;
//! supervisor.close().await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod runtime;
pub mod scenarios;
pub mod testing;

// Main interfaces - re-exported at crate root for convenience
pub use config::{HarnessEnv, HarnessSettings, LaunchCommand, SupervisorConfig, SupervisorConfigBuilder};
pub use error::{HarnessError, HarnessResult};
pub use runtime::ProcessSupervisor;
pub use testing::Harness;

// Supporting types
pub use api::{ClusterApi, RestClusterClient, RestSchedulerClient, SchedulerApi};
pub use runtime::{CallbackEndpoint, CallbackEvent, EventQueue, HealthCheckRegistry, HealthProbe, WaitEngine};
pub use scenarios::TestScenarios;
