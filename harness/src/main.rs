//! Scenario Runner
//!
//! Starts the scheduler under test with the harness wired to it, runs one
//! named scenario and tears everything down again.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use shared::logging::{Component, init_tracing, log_shutdown, log_startup};
use tokio::time::timeout;

use harness::{
    Harness, HarnessEnv, HarnessSettings, ProcessSupervisor, RestClusterClient, RestSchedulerClient,
    SupervisorConfig, TestScenarios,
};

#[derive(Parser)]
#[command(name = "harness")]
#[command(about = "Integration-test harness for the scheduler")]
struct Args {
    /// Scenario to run
    #[arg(long, default_value = "ready")]
    scenario: String,

    /// Cluster master the scheduler registers with
    #[arg(long, default_value = "127.0.0.1:5050")]
    master: String,

    /// Coordination service URL
    #[arg(long, default_value = "zk://127.0.0.1:2181/harness")]
    zk: String,

    /// Scenario timeout in seconds
    #[arg(long, default_value = "120")]
    timeout_secs: u64,

    /// Keep the scheduler running after the scenario (for debugging)
    #[arg(long)]
    keep_running: bool,

    /// Enable verbose tracing output
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(Component::Harness, Some(if args.verbose { "debug" } else { "info" }));
    log_startup(Component::Harness, &format!("scenario '{}'", args.scenario));

    let env = HarnessEnv::from_env();
    let config = SupervisorConfig::builder()
        .suite_name(format!("harness-{}", args.scenario))
        .master_url(&args.master)
        .coordination_url(&args.zk)
        .auto_start(false)
        .launch(env.launch_command())
        .build();

    let mut supervisor = ProcessSupervisor::configure(config).context("configuring the scheduler")?;
    let api = Arc::new(RestSchedulerClient::new(&supervisor.url())?);
    let cluster = Arc::new(RestClusterClient::new(&args.master)?);
    let settings = HarnessSettings::default().with_app_mock(env.app_mock.clone());
    let mut harness = Harness::new(api, cluster, settings);

    let outcome = timeout(
        Duration::from_secs(args.timeout_secs),
        TestScenarios::run_scenario(&args.scenario, &mut supervisor, &mut harness),
    )
    .await;

    let result = match outcome {
        Ok(Ok(())) => {
            tracing::info!("✅ Scenario '{}' completed successfully", args.scenario);
            if args.keep_running {
                tracing::info!("🔄 Keeping the scheduler running at {} (Ctrl+C to stop)", supervisor.url());
                tokio::signal::ctrl_c().await?;
            }
            Ok(())
        }
        Ok(Err(e)) => {
            tracing::error!("❌ Scenario '{}' failed: {}", args.scenario, e);
            Err(anyhow::Error::new(e).context(format!("scenario '{}'", args.scenario)))
        }
        Err(_) => {
            tracing::error!("⏰ Scenario '{}' timed out after {}s", args.scenario, args.timeout_secs);
            Err(anyhow::anyhow!("scenario '{}' timed out", args.scenario))
        }
    };

    harness.teardown().await;
    supervisor.close().await;
    log_shutdown(Component::Harness, "scenario finished");
    result
}
