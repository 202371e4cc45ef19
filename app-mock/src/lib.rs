//! Workload proxy
//!
//! A stand-in application the scheduler launches during harness runs. Its
//! own health answer is whatever the harness callback endpoint says for
//! `<health-url>/<port>`, so tests decide health without touching the
//! process.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{Router, extract::State, http::StatusCode, routing::get};
use thiserror::Error;
use tokio::net::TcpListener;

const FORWARD_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum AppMockError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type AppMockResult<T> = Result<T, AppMockError>;

#[derive(Clone)]
pub struct ProxyState {
    health_url: String,
    client: reqwest::Client,
}

impl ProxyState {
    /// `health_base` is the callback URL without the trailing port segment
    pub fn new(health_base: &str, port: u16) -> AppMockResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(FORWARD_TIMEOUT)
            .no_proxy()
            .build()?;
        Ok(Self {
            health_url: format!("{}/{}", health_base.trim_end_matches('/'), port),
            client,
        })
    }

    pub fn health_url(&self) -> &str {
        &self.health_url
    }

    /// Ask the harness for this instance's health; unreachable means 503
    pub async fn query_health(&self) -> StatusCode {
        match self.client.get(&self.health_url).send().await {
            Ok(response) => StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
            Err(e) => {
                tracing::warn!("⚠️ Health callback {} unreachable: {}", self.health_url, e);
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/", get(forward_health))
        .route("/health", get(forward_health))
        .route("/ping", get(ping))
        .with_state(state)
}

async fn forward_health(State(state): State<ProxyState>) -> StatusCode {
    let status = state.query_health().await;
    tracing::debug!("🩺 Health answer {} from {}", status, state.health_url);
    status
}

async fn ping() -> &'static str {
    "pong"
}

/// Report liveness once, then serve until the process is killed
pub async fn run(listen: SocketAddr, state: ProxyState) -> AppMockResult<()> {
    let liveness = state.query_health().await;
    tracing::info!("📡 Reported liveness to {} (answer: {})", state.health_url, liveness);

    let listener = TcpListener::bind(listen).await?;
    tracing::info!("🌐 Workload proxy listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
