//! Configuration Management
//!
//! Configuration structures and builders for the supervised process and the
//! harness itself.

pub mod builder;
pub mod env;
pub mod settings;
pub mod supervisor;

// Re-export main types
pub use builder::SupervisorConfigBuilder;
pub use env::HarnessEnv;
pub use settings::HarnessSettings;
pub use supervisor::{LaunchCommand, SupervisorConfig, flatten_args, merge_settings};
