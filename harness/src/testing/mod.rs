//! Testing Framework
//!
//! The [`Harness`] is what a test talks to; workload proxy definitions live
//! alongside it.

pub mod harness;
pub mod workloads;

pub use harness::{DEPLOYMENT_SUCCESS, Harness, STATUS_UPDATE};
pub use workloads::app_proxy_health_check;
