//! Workload proxy entry point
//!
//! Launched by the scheduler through the command line the harness puts into
//! app definitions.

use std::net::SocketAddr;

use clap::Parser;
use shared::logging::{Component, init_tracing, log_startup};

use app_mock::{AppMockResult, ProxyState};

#[derive(Parser, Debug)]
#[command(name = "app-mock")]
#[command(about = "Workload proxy that reports health through the harness")]
struct Args {
    /// Port to serve on, usually the agent-assigned $PORT0
    #[arg(long)]
    port: u16,

    /// Workload this instance belongs to
    #[arg(long)]
    app_id: String,

    /// Version of the workload definition
    #[arg(long)]
    version: String,

    /// Harness health URL without the port segment
    #[arg(long)]
    health_url: String,

    /// Token the harness uses to find stray proxies
    #[arg(long)]
    marker: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> AppMockResult<()> {
    let args = Args::parse();
    init_tracing(Component::AppMock, Some(&args.log_level));
    log_startup(
        Component::AppMock,
        &format!(
            "proxy for {}@{} on port {} (marker: {})",
            args.app_id,
            args.version,
            args.port,
            args.marker.as_deref().unwrap_or("-")
        ),
    );

    let state = ProxyState::new(&args.health_url, args.port)?;
    app_mock::run(SocketAddr::from(([0, 0, 0, 0], args.port)), state).await
}
