//! Environment knobs
//!
//! Paths and tags the harness needs from its surroundings. Values are taken
//! verbatim; nothing here checks that the paths exist.

use std::collections::HashMap;
use std::path::PathBuf;

use super::supervisor::LaunchCommand;

pub const RUNTIME_VAR: &str = "HARNESS_RUNTIME";
pub const CLASSPATH_VAR: &str = "HARNESS_CLASSPATH";
pub const ENTRY_POINT_VAR: &str = "HARNESS_ENTRY_POINT";
pub const TARGET_DIR_VAR: &str = "HARNESS_TARGET_DIR";
pub const IMAGE_TAG_VAR: &str = "HARNESS_IMAGE_TAG";
pub const APP_MOCK_VAR: &str = "HARNESS_APP_MOCK";

#[derive(Debug, Clone, PartialEq)]
pub struct HarnessEnv {
    pub runtime: String,
    pub classpath: String,
    pub entry_point: String,
    pub target_dir: PathBuf,
    pub image_tag: Option<String>,
    pub app_mock: PathBuf,
}

impl HarnessEnv {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Self {
        if let Ok(path) = dotenv::dotenv() {
            tracing::debug!("🔧 Loaded environment overrides from {}", path.display());
        }
        Self::from_vars(std::env::vars().collect())
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Self {
        let get = |key: &str| vars.get(key).filter(|v| !v.is_empty()).cloned();

        let target_dir = PathBuf::from(get(TARGET_DIR_VAR).unwrap_or_else(|| "target".to_string()));
        let app_mock = get(APP_MOCK_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| target_dir.join("release").join("app-mock"));

        Self {
            runtime: get(RUNTIME_VAR).unwrap_or_else(|| "java".to_string()),
            classpath: get(CLASSPATH_VAR).unwrap_or_default(),
            entry_point: get(ENTRY_POINT_VAR).unwrap_or_default(),
            target_dir,
            image_tag: get(IMAGE_TAG_VAR),
            app_mock,
        }
    }

    pub fn launch_command(&self) -> LaunchCommand {
        LaunchCommand::jvm(&self.runtime, &self.classpath, &self.entry_point)
    }
}
