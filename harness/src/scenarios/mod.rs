//! Test Scenarios
//!
//! Short end-to-end runs against a real scheduler, selectable by name from
//! the command line.

pub mod core;

use crate::error::{HarnessError, HarnessResult};
use crate::runtime::ProcessSupervisor;
use crate::testing::Harness;

pub struct TestScenarios;

impl TestScenarios {
    /// Run a specific scenario by name
    pub async fn run_scenario(
        name: &str,
        supervisor: &mut ProcessSupervisor,
        harness: &mut Harness,
    ) -> HarnessResult<()> {
        match name {
            "ready" => core::ready(supervisor).await,
            "smoke" => core::smoke(supervisor, harness).await,

            // Run everything, cheapest first
            "all" => {
                tracing::info!("🧪 Running full scenario suite");
                core::ready(supervisor).await?;
                core::smoke(supervisor, harness).await?;
                tracing::info!("🏆 All scenarios completed successfully");
                Ok(())
            }

            _ => Err(HarnessError::config(format!(
                "unknown scenario '{}', available: {}",
                name,
                Self::available_scenarios().join(", ")
            ))),
        }
    }

    pub fn available_scenarios() -> Vec<&'static str> {
        vec!["ready", "smoke", "all"]
    }
}
