//! Shared logging utilities for consistent tracing across the harness and
//! the workload proxies it launches

use chrono::{DateTime, Utc};
use std::fmt;
use tracing::info;

/// Which binary is initialising tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Harness,
    AppMock,
}

impl Component {
    /// Crate target used as the primary filter directive
    pub fn target(&self) -> &'static str {
        match self {
            Component::Harness => "harness",
            Component::AppMock => "app_mock",
        }
    }

    /// Build the env-filter directive string for this component
    pub fn filter_directives(&self, level: &str) -> String {
        match self {
            Component::Harness => {
                format!("harness={level},shared={level},supervised=info,hyper=warn,reqwest=warn,tower=warn")
            }
            Component::AppMock => format!("app_mock={level},shared={level},hyper=warn,reqwest=warn"),
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.target())
    }
}

/// Initialize a compact stdout subscriber for the given component
///
/// `RUST_LOG` wins over the computed directives when it is set. Calling this
/// twice in one process is harmless: the second installation is ignored.
pub fn init_tracing(component: Component, log_level: Option<&str>) {
    use tracing_subscriber::{EnvFilter, fmt};

    let base_level = log_level.unwrap_or("info");
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(component.filter_directives(base_level)));

    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .try_init();
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Contextual logging helper for startup messages
pub fn log_startup(component: Component, details: &str) {
    info!(
        component = %component,
        timestamp = format_timestamp(),
        "🚀 Starting {}",
        details
    );
}

/// Contextual logging helper for shutdown messages
pub fn log_shutdown(component: Component, reason: &str) {
    info!(
        component = %component,
        timestamp = format_timestamp(),
        "🛑 Shutting down: {}",
        reason
    );
}
