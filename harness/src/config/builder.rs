//! Supervisor Configuration Builder
//!
//! Provides a flexible builder pattern for constructing supervisor configurations

use super::supervisor::{LaunchCommand, SupervisorConfig};

pub struct SupervisorConfigBuilder {
    config: SupervisorConfig,
}

impl SupervisorConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SupervisorConfig {
                suite_name: "harness".to_string(),
                master_url: "127.0.0.1:5050".to_string(),
                coordination_url: "zk://127.0.0.1:2181/harness".to_string(),
                extra: Vec::new(),
                auto_start: true,
                launch: LaunchCommand::custom("java", Vec::<String>::new()),
                forward_output: true,
            },
        }
    }

    /// Set the suite name used for log prefixes and the work directory
    pub fn suite_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.suite_name = name.into();
        self
    }

    /// Set the cluster master URL
    pub fn master_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.master_url = url.into();
        self
    }

    /// Set the coordination service URL
    pub fn coordination_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.coordination_url = url.into();
        self
    }

    /// Add a single setting override
    pub fn extra<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.config.extra.push((key.into(), value.into()));
        self
    }

    /// Add several setting overrides, keeping their order
    pub fn extras<I, K, V>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.config
            .extra
            .extend(overrides.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Start the process as part of `ProcessSupervisor::launch`
    pub fn auto_start(mut self, auto_start: bool) -> Self {
        self.config.auto_start = auto_start;
        self
    }

    /// Set the executable and its leading arguments
    pub fn launch(mut self, launch: LaunchCommand) -> Self {
        self.config.launch = launch;
        self
    }

    /// Forward child output into tracing (on by default)
    pub fn forward_output(mut self, forward: bool) -> Self {
        self.config.forward_output = forward;
        self
    }

    /// Build the configuration
    pub fn build(self) -> SupervisorConfig {
        self.config
    }
}

impl Default for SupervisorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
