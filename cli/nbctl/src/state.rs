//! Local state file.
//!
//! Remembers, per instance name, the configuration last applied and the
//! record last observed. The engine owns no on-disk format; this file is the
//! CLI's own bookkeeping.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nbr_id::ResourceName;
use nbr_reconcile::{DesiredConfig, ResourceRecord};
use serde::{Deserialize, Serialize};

const STATE_VERSION: u32 = 1;

/// One tracked instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    pub config: DesiredConfig,
    pub observed: ResourceRecord,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateContents {
    version: u32,
    #[serde(default)]
    instances: BTreeMap<String, StateEntry>,
}

/// State file handle.
#[derive(Debug)]
pub struct StateFile {
    path: PathBuf,
    contents: StateContents,
}

impl StateFile {
    /// Load state from `path`. A missing file is empty state.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read state from {:?}", path))?;
            let contents: StateContents = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse state from {:?}", path))?;
            if contents.version != STATE_VERSION {
                anyhow::bail!(
                    "Unsupported state version {} in {:?} (expected {})",
                    contents.version,
                    path,
                    STATE_VERSION
                );
            }
            contents
        } else {
            StateContents {
                version: STATE_VERSION,
                instances: BTreeMap::new(),
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            contents,
        })
    }

    pub fn get(&self, name: &ResourceName) -> Option<&StateEntry> {
        self.contents.instances.get(name.as_str())
    }

    /// Store the applied configuration and the resulting record.
    pub fn record(&mut self, config: DesiredConfig, observed: ResourceRecord) {
        self.contents
            .instances
            .insert(config.name.to_string(), StateEntry { config, observed });
    }

    /// Store a refreshed record, keeping the applied configuration if known.
    pub fn refresh(&mut self, observed: ResourceRecord) {
        let key = observed.name().to_string();
        match self.contents.instances.get_mut(&key) {
            Some(entry) => entry.observed = observed,
            None => {
                let config = observed.current_config();
                self.contents
                    .instances
                    .insert(key, StateEntry { config, observed });
            }
        }
    }

    /// Drop an instance. Returns true if it was tracked.
    pub fn forget(&mut self, name: &ResourceName) -> bool {
        self.contents.instances.remove(name.as_str()).is_some()
    }

    /// Write state to disk.
    pub fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory {:?}", dir))?;
        }

        let contents = serde_json::to_string_pretty(&self.contents)?;

        // An interrupted save leaves the previous file intact.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)
            .with_context(|| format!("Failed to write state to {:?}", tmp))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to write state to {:?}", self.path))?;

        Ok(())
    }
}
