//! Core Functionality Tests

use crate::error::HarnessResult;
use crate::runtime::ProcessSupervisor;
use crate::testing::Harness;

const SMOKE_VERSION: &str = "v1";

/// The scheduler comes up and answers its readiness endpoint
pub async fn ready(supervisor: &mut ProcessSupervisor) -> HarnessResult<()> {
    tracing::info!("🧪 Ready: supervised scheduler becomes ready");

    supervisor.start().await?;
    tracing::info!(
        "✅ Ready: PASSED (PID: {:?}, {})",
        supervisor.pid(),
        supervisor.url()
    );
    Ok(())
}

/// One app proxy is deployed, reports to its health check and is cleaned up
pub async fn smoke(supervisor: &mut ProcessSupervisor, harness: &mut Harness) -> HarnessResult<()> {
    tracing::info!("🧪 Smoke: deploy an app proxy and observe its health check");

    supervisor.start().await?;
    harness.callback_endpoint().await?;

    let app_id = harness.settings().base_path.child("smoke")?;
    let probe = harness.register_app_proxy_health_check(&app_id, SMOKE_VERSION, true);
    let app = harness
        .app_proxy(&app_id, SMOKE_VERSION, 1, Some(harness.app_proxy_health_check()))
        .await?;

    let deployment = harness.api().create_app(&app).await?;
    harness.wait_for_deployment(&deployment.deployment_id).await?;
    harness.wait_for_health_check(&probe).await?;
    tracing::info!("🩺 App proxy {} reported to its health check", app_id);

    harness.clean_up(false).await?;
    tracing::info!("✅ Smoke: PASSED");
    Ok(())
}
