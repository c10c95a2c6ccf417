//! `~/.procflow/config.yaml` — defaults for sync passes.
//!
//! A missing file or a missing key falls back to [`Config::default`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ledger::procflow_root;
use crate::types::ConflictPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Policy used when a sync command does not pass `--policy`.
    pub default_policy: ConflictPolicy,
    /// Remove a deleted record's id from its siblings' predecessor lists.
    pub scrub_dangling_predecessors: bool,
    /// Refuse predecessor edits that would close a cycle.
    pub reject_cycles: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_policy: ConflictPolicy::Manual,
            scrub_dangling_predecessors: true,
            reject_cycles: false,
        }
    }
}

/// `<home>/.procflow/config.yaml` — pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    procflow_root(home).join("config.yaml")
}

pub fn load_at(home: &Path) -> Result<Config, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Config, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
    load_at(&home)
}

pub fn save_at(home: &Path, config: &Config) -> Result<(), ConfigError> {
    let path = config_path_at(home);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let yaml = serde_yaml::to_string(config)?;
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, yaml).map_err(|source| ConfigError::Io {
        path: tmp.clone(),
        source,
    })?;
    std::fs::rename(&tmp, &path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })
}
