use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Workspace config location, relative to the workspace root.
pub const CONFIG_PATH: &str = ".jdeploy/config.json";

fn default_shell() -> String {
    "bash".to_string()
}

/// Optional per-workspace defaults. CLI flags override every field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<PathBuf>,

    #[serde(default = "default_shell")]
    pub shell: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_budget_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<PathBuf>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            matrix: None,
            shell: default_shell(),
            command_timeout_secs: None,
            run_budget_secs: None,
            journal: None,
        }
    }
}

impl WorkspaceConfig {
    /// Read `<root>/.jdeploy/config.json`; a missing file yields defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_PATH);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("{}: invalid config", path.display()))
    }

    /// Write the default config. Refuses to overwrite unless `force`.
    pub fn init(root: &Path, force: bool) -> Result<PathBuf> {
        let path = root.join(CONFIG_PATH);
        if path.exists() && !force {
            anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
        }
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("cannot create {}", dir.display()))?;
        }
        crate::atomic::write_json(&path, &Self::default())?;
        Ok(path)
    }

    pub fn execution_options(&self) -> ExecutionOptions {
        ExecutionOptions {
            command_timeout: self.command_timeout_secs.map(Duration::from_secs),
            run_budget: self.run_budget_secs.map(Duration::from_secs),
        }
    }
}

/// Explicit timing inputs to the execution engine. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionOptions {
    pub command_timeout: Option<Duration>,
    pub run_budget: Option<Duration>,
}
