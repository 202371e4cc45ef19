//! Callback Endpoint
//!
//! HTTP listener the supervised system and its workload proxies call back
//! into. Two traffic classes are accepted:
//!
//! - `POST /` lifecycle notifications, appended to the [`EventQueue`]
//! - `GET /health/<workload...>/<version>/<port>` health queries, answered
//!   from the [`HealthCheckRegistry`]
//!
//! Anything else means the harness and the supervised system disagree about
//! the wire contract. Such requests are answered with 500 and recorded as
//! protocol violations, which the harness surfaces as a fatal error.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{Method, StatusCode, Uri},
    routing::any,
};
use serde_json::Value;
use shared::HealthTarget;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{HarnessError, HarnessResult};
use crate::runtime::events::{CallbackEvent, EventQueue};
use crate::runtime::health::HealthCheckRegistry;

#[derive(Clone)]
struct EndpointState {
    events: EventQueue,
    health: HealthCheckRegistry,
    violations: Arc<Mutex<Vec<String>>>,
}

impl EndpointState {
    fn record_violation(&self, message: String) -> StatusCode {
        tracing::error!("🚨 Callback protocol violation: {}", message);
        self.violations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

pub struct CallbackEndpoint {
    local_addr: SocketAddr,
    violations: Arc<Mutex<Vec<String>>>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    server_handle: Mutex<Option<JoinHandle<()>>>,
}

impl CallbackEndpoint {
    /// Bind on an ephemeral port on all interfaces
    pub async fn bind(events: EventQueue, health: HealthCheckRegistry) -> HarnessResult<Self> {
        Self::bind_on("0.0.0.0:0", events, health).await
    }

    pub async fn bind_on(addr: &str, events: EventQueue, health: HealthCheckRegistry) -> HarnessResult<Self> {
        let violations = Arc::new(Mutex::new(Vec::new()));
        let app = router(EndpointState {
            events,
            health,
            violations: Arc::clone(&violations),
        });

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let server_task = tokio::spawn(async move {
            tracing::info!("📡 Callback endpoint listening on {}", local_addr);
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                tracing::error!("Callback endpoint server error: {}", e);
            }
        });

        Ok(Self {
            local_addr,
            violations,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            server_handle: Mutex::new(Some(server_task)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// URL registered with the supervised system's event bus
    pub fn url(&self) -> String {
        self.url_for_host("localhost")
    }

    pub fn url_for_host(&self, host: &str) -> String {
        format!("http://{}:{}", host, self.port())
    }

    pub fn protocol_violations(&self) -> Vec<String> {
        self.violations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fail with the first recorded violation, draining the record
    pub fn take_protocol_violation(&self) -> HarnessResult<()> {
        let mut violations = self.violations.lock().unwrap_or_else(PoisonError::into_inner);
        if violations.is_empty() {
            return Ok(());
        }
        let message = violations.join("; ");
        violations.clear();
        Err(HarnessError::ProtocolViolation { message })
    }

    /// Stop accepting requests and wait for the server task to finish
    pub async fn shutdown(&self) {
        let sender = self.shutdown_tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(sender) = sender {
            let _ = sender.send(());
        }
        let handle = self.server_handle.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!("⚠️ Callback endpoint task ended abnormally: {}", e);
            }
            tracing::info!("🛑 Callback endpoint on port {} stopped", self.port());
        }
    }
}

impl Drop for CallbackEndpoint {
    fn drop(&mut self) {
        let handle = self.server_handle.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

fn router(state: EndpointState) -> Router {
    Router::new()
        .route("/", any(receive_event))
        .route("/health/*target", any(health_query))
        .fallback(unexpected_request)
        .with_state(state)
}

// HTTP handlers

async fn receive_event(State(state): State<EndpointState>, method: Method, body: Bytes) -> StatusCode {
    if method != Method::POST {
        return state.record_violation(format!("{method} / is not part of the callback contract"));
    }

    let value = serde_json::from_slice::<Value>(&body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));
    let event = CallbackEvent::from_json(value);
    tracing::info!("📨 Received callback event '{}'", event.event_type());
    state.events.push(event);

    StatusCode::OK
}

async fn health_query(State(state): State<EndpointState>, method: Method, uri: Uri) -> StatusCode {
    if method != Method::GET {
        return state.record_violation(format!("{method} {} is not part of the callback contract", uri.path()));
    }

    match HealthTarget::parse_path(uri.path()) {
        Ok(target) => {
            if state.health.resolve(&target) {
                StatusCode::OK
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
        Err(e) => state.record_violation(e.to_string()),
    }
}

async fn unexpected_request(State(state): State<EndpointState>, method: Method, uri: Uri) -> StatusCode {
    state.record_violation(format!("unexpected request {method} {}", uri.path()))
}
