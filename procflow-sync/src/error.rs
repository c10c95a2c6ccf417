//! Error types for procflow-sync.

use std::path::PathBuf;

use thiserror::Error;

use procflow_core::error::StoreError;
use procflow_core::types::{ContainerId, ExternalId, RecordId};
use procflow_diagram::DiagramError;

/// All errors that can arise from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from the record store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The diagram document could not be read or edited.
    #[error("diagram error: {0}")]
    Diagram(#[from] DiagramError),

    #[error("container '{container}' not found")]
    ContainerNotFound { container: ContainerId },

    #[error("record '{id}' not found")]
    RecordNotFound { id: RecordId },

    /// The record a conflict names is no longer linked to the conflicting node.
    #[error("conflict on '{external_id}' is stale: record '{record_id}' is no longer linked to it")]
    StaleConflict {
        external_id: ExternalId,
        record_id: RecordId,
    },

    /// No conflict is currently pending for the given diagram element.
    #[error("no pending conflict for diagram element '{external_id}'")]
    NoSuchConflict { external_id: ExternalId },

    /// Predecessor lists form a cycle; listed in flow order.
    #[error("predecessor cycle detected: {}", format_cycle(.cycle))]
    CycleDetected { cycle: Vec<RecordId> },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (sync state).
    #[error("sync state JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

fn format_cycle(cycle: &[RecordId]) -> String {
    let mut parts: Vec<&str> = cycle.iter().map(|id| id.0.as_str()).collect();
    if let Some(first) = parts.first().copied() {
        parts.push(first);
    }
    parts.join(" -> ")
}
