pub mod diff;
pub mod init;
pub mod record;
pub mod resolve;
pub mod status;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};

use procflow_core::{config, Config, FileStore};

pub(crate) fn home() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

pub(crate) fn open_store(home: &std::path::Path) -> Result<FileStore> {
    FileStore::open_at(home).context("failed to load container ledgers")
}

pub(crate) fn load_config(home: &std::path::Path) -> Result<Config> {
    config::load_at(home).context("failed to load ~/.procflow/config.yaml")
}
