//! Run configuration: defaults, optional JSON file, CLI overrides on top.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MigrationConfig {
    /// Directory source file names are relative to
    pub source_root: PathBuf,
    /// Root of the generated project
    pub project_root: PathBuf,
    /// Where referenced local assets are expected to live
    pub asset_root: Option<PathBuf>,
    /// Shell command run in the project root for the build check
    pub build_command: Option<String>,
    pub build_timeout_secs: u64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("."),
            project_root: PathBuf::from("migrated"),
            asset_root: None,
            build_command: None,
            build_timeout_secs: DEFAULT_BUILD_TIMEOUT_SECS,
        }
    }
}

impl MigrationConfig {
    /// Load a JSON config file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }
}
