//! Sync state: fingerprints of both sides as of the last successful pass.
//!
//! Persists a [`SyncState`] JSON document at
//! `<home>/.procflow/state/<container>.json`.
//! Writes use the same atomic `.tmp` + rename pattern as the ledger.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use procflow_core::types::{ContainerId, ProcessRecord};

use crate::error::{io_err, SyncError};

/// On-disk sync state payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncState {
    pub synced_at: DateTime<Utc>,
    /// SHA-256 of the diagram document, CRLF normalised.
    pub document_hash: String,
    /// SHA-256 over the sync-relevant record fields.
    pub records_hash: String,
}

impl SyncState {
    /// Fingerprint both sides as they are now.
    pub fn capture(document: &str, records: &[ProcessRecord]) -> Self {
        Self {
            synced_at: Utc::now(),
            document_hash: document_fingerprint(document),
            records_hash: records_fingerprint(records),
        }
    }
}

/// SHA-256 hex digest of a document with line endings normalised to LF.
pub fn document_fingerprint(document: &str) -> String {
    let normalized = document.replace("\r\n", "\n");
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

/// SHA-256 hex digest of what a sync pass reads from records: id, name, link
/// and predecessors. Timestamps and derived successors are left out.
pub fn records_fingerprint(records: &[ProcessRecord]) -> String {
    let mut hasher = Sha256::new();
    for record in records {
        hasher.update(record.id.0.as_bytes());
        hasher.update([0u8]);
        hasher.update(record.name.as_bytes());
        hasher.update([0u8]);
        if let Some(external_id) = &record.external_element_id {
            hasher.update(external_id.0.as_bytes());
        }
        hasher.update([0u8]);
        for predecessor in &record.predecessor_ids {
            hasher.update(predecessor.0.as_bytes());
            hasher.update([1u8]);
        }
        hasher.update([b'\n']);
    }
    hex::encode(hasher.finalize())
}

/// Path to the state JSON for a container, rooted at `home`.
///
/// `~/.procflow/state/<container>.json`
pub fn state_path_at(home: &Path, container: &ContainerId) -> PathBuf {
    home.join(".procflow")
        .join("state")
        .join(format!("{container}.json"))
}

/// Load the last sync state; `None` if the container was never synced.
pub fn load_at(home: &Path, container: &ContainerId) -> Result<Option<SyncState>, SyncError> {
    let path = state_path_at(home, container);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(Some(serde_json::from_str(&contents)?))
}

/// Save the sync state atomically.
///
/// Writes to `<path>.tmp` then renames to `<path>`.
pub fn save_at(home: &Path, container: &ContainerId, state: &SyncState) -> Result<(), SyncError> {
    let path = state_path_at(home, container);
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("invalid sync state path")));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(state)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}
