//! Runtime Management
//!
//! Process supervision, the callback endpoint and the state it feeds, and the
//! polling primitives every wait is built on.

pub mod callback;
pub mod events;
pub mod health;
pub mod reaper;
pub mod supervisor;
pub mod wait;

pub use callback::CallbackEndpoint;
pub use events::{CallbackEvent, EventQueue};
pub use health::{DEFINITION_PORT, HealthCheckRegistry, HealthProbe};
pub use reaper::ProxyReaper;
pub use supervisor::{Backoff, ProcessSupervisor};
pub use wait::{Deadline, WaitEngine};
