//! Configuration.
//!
//! Resolution order, lowest to highest: built-in defaults, the config file in
//! the platform config directory, `NBCTL_*` environment variables, command
//! line flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Configuration file name.
const CONFIG_FILE: &str = "config.json";

/// State file name.
const STATE_FILE: &str = "state.json";

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("com", "nbr", "nbctl")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

/// Default location of the local state file.
pub fn default_state_path() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().join(STATE_FILE))
}

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Control-plane endpoint URL.
    pub endpoint: String,

    /// Bearer token for the control plane.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    pub poll_interval_secs: u64,

    /// Deadline for each lifecycle wait.
    pub timeout_secs: u64,

    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            token: None,
            poll_interval_secs: nbr_reconcile::DEFAULT_POLL_INTERVAL.as_secs(),
            timeout_secs: nbr_reconcile::DEFAULT_WAIT_TIMEOUT.as_secs(),
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load config from disk, or defaults, then apply the environment.
    pub fn load() -> Result<Self> {
        let path = project_dirs()?.config_dir().join(CONFIG_FILE);
        let mut config = Self::load_from(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from a specific file. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))
    }

    /// Apply `NBCTL_*` overrides from the given lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = lookup("NBCTL_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(token) = lookup("NBCTL_TOKEN") {
            self.token = Some(token);
        }
        if let Some(level) = lookup("NBCTL_LOG_LEVEL") {
            self.log_level = level;
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
