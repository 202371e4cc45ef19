//! Shared error types for the harness and the workload proxy

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SharedError {
    #[error("Invalid workload id: {input}")]
    InvalidWorkloadId { input: String },

    #[error("Malformed health path '{path}': {reason}")]
    MalformedHealthPath { path: String, reason: String },
}

pub type SharedResult<T> = Result<T, SharedError>;
