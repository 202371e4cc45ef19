//! Harness error types

use shared::SharedError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Failed to spawn supervised process '{program}': {source}")]
    SpawnFailure {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Supervised process on port {port} not ready after {waited:?}")]
    ReadinessTimeout { port: u16, waited: Duration },

    #[error("Supervised process exited before becoming ready: {status}")]
    ProcessExited { status: String },

    #[error("{description} not satisfied within {waited:?}")]
    WaitTimeout { description: String, waited: Duration },

    #[error("Clean up failed: {reason}")]
    CleanupAssertion { reason: String },

    #[error("Callback protocol violation: {message}")]
    ProtocolViolation { message: String },

    #[error("{operation} failed with HTTP {status}: {body}")]
    ApiStatus {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("Configuration error: {field}")]
    Configuration { field: String },

    #[error("Shared component error: {0}")]
    Shared(#[from] SharedError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarnessError {
    pub fn config(field: impl Into<String>) -> Self {
        Self::Configuration { field: field.into() }
    }

    pub fn cleanup(reason: impl Into<String>) -> Self {
        Self::CleanupAssertion { reason: reason.into() }
    }

    /// Timeouts are recoverable by the caller; everything else ends the test
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::WaitTimeout { .. } | Self::ReadinessTimeout { .. })
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
