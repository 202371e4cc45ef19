//! Shared types for the scheduler integration-test harness
//!
//! Contains only what both the harness and the workload proxy need:
//! workload identity, the health-callback path codec, errors and
//! tracing setup.

pub mod errors;
pub mod logging;
pub mod types;

pub use errors::*;
pub use types::*;
