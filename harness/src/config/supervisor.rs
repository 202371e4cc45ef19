//! Supervised Process Configuration
//!
//! Describes how to launch the scheduler under test and which settings it
//! receives on its command line.

use std::path::Path;
use std::time::Duration;

/// Setting key carrying the HTTP port; also consulted by the readiness probe
pub const HTTP_PORT_KEY: &str = "http_port";

const RECONCILIATION_DELAY: Duration = Duration::from_secs(5 * 60);

/// Executable plus the arguments that precede the generated settings
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchCommand {
    pub program: String,
    pub prefix_args: Vec<String>,
}

impl LaunchCommand {
    /// `<runtime> -Xmx1024m -classpath <classpath> <entry point>`
    pub fn jvm(runtime: impl Into<String>, classpath: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self {
            program: runtime.into(),
            prefix_args: vec![
                "-Xmx1024m".to_string(),
                "-classpath".to_string(),
                classpath.into(),
                entry_point.into(),
            ],
        }
    }

    pub fn custom<I, S>(program: impl Into<String>, prefix_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            prefix_args: prefix_args.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Prefix for forwarded process output and the work directory name
    pub suite_name: String,
    pub master_url: String,
    pub coordination_url: String,
    /// Caller overrides, applied on top of the fixed settings
    pub extra: Vec<(String, String)>,
    pub auto_start: bool,
    pub launch: LaunchCommand,
    /// Forward child stdout/stderr into tracing
    pub forward_output: bool,
}

impl SupervisorConfig {
    /// Create a new builder
    pub fn builder() -> crate::config::builder::SupervisorConfigBuilder {
        crate::config::builder::SupervisorConfigBuilder::new()
    }

    /// Fixed settings every supervised instance needs, in launch order
    pub fn required_settings(&self, http_port: u16, secret_file: &Path) -> Vec<(String, String)> {
        vec![
            ("master".to_string(), self.master_url.clone()),
            ("zk".to_string(), self.coordination_url.clone()),
            (HTTP_PORT_KEY.to_string(), http_port.to_string()),
            (
                "mesos_authentication_secret_file".to_string(),
                secret_file.display().to_string(),
            ),
            ("event_subscriber".to_string(), "http_callback".to_string()),
            ("access_control_allow_origin".to_string(), "*".to_string()),
            (
                "reconciliation_initial_delay".to_string(),
                RECONCILIATION_DELAY.as_millis().to_string(),
            ),
            (
                "reconciliation_interval".to_string(),
                RECONCILIATION_DELAY.as_millis().to_string(),
            ),
        ]
    }

    /// Required settings merged with the caller's overrides
    pub fn settings(&self, http_port: u16, secret_file: &Path) -> Vec<(String, String)> {
        merge_settings(self.required_settings(http_port, secret_file), &self.extra)
    }
}

/// Overrides replace matching keys in place; unknown keys are appended in
/// the order given.
pub fn merge_settings(mut base: Vec<(String, String)>, overrides: &[(String, String)]) -> Vec<(String, String)> {
    for (key, value) in overrides {
        match base.iter_mut().find(|(existing, _)| existing == key) {
            Some(entry) => entry.1 = value.clone(),
            None => base.push((key.clone(), value.clone())),
        }
    }
    base
}

/// `--key value` pairs; an empty value yields a bare `--key` flag
pub fn flatten_args(settings: &[(String, String)]) -> Vec<String> {
    let mut args = Vec::with_capacity(settings.len() * 2);
    for (key, value) in settings {
        args.push(format!("--{key}"));
        if !value.is_empty() {
            args.push(value.clone());
        }
    }
    args
}
