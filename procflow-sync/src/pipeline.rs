//! File-backed sync entrypoints used by the CLI.
//!
//! The orchestrator works on document text; this layer reads the diagram
//! from disk, writes it back atomically, and keeps the per-container
//! [`SyncState`] current.
//!
//! ## Document write protocol
//!
//! 1. Skip if the pass failed, was a dry run, or left the text unchanged.
//! 2. Write to `<path>.procflow.tmp`.
//! 3. Rename to the final path (atomic on POSIX).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use procflow_core::store::RecordStore;
use procflow_core::types::{ConflictPolicy, ContainerId, ExternalId};
use procflow_diagram::extract_tasks;

use crate::diff::{classify, SyncConflict};
use crate::error::{io_err, SyncError};
use crate::orchestrator::{
    sync_diagram_to_records, sync_records_to_diagram, SyncDirection, SyncOptions, SyncResult,
};
use crate::preview::{preview_records_to_diagram, DocumentPreview};
use crate::resolver::{resolve, resolve_with_hook, ConflictDecision, MergeHook, Resolution};
use crate::staleness::{self, SyncStatus};
use crate::state::{self, SyncState};

/// Outcome of one file-backed pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOutcome {
    pub result: SyncResult,
    /// The diagram file was rewritten.
    pub document_written: bool,
    /// A fresh sync state was recorded.
    pub state_saved: bool,
}

/// Run one sync pass against the diagram file at `diagram`.
///
/// This is the canonical entrypoint for `procflow sync pull|push`.
pub fn run(
    home: &Path,
    store: &mut dyn RecordStore,
    container: &ContainerId,
    diagram: &Path,
    direction: SyncDirection,
    options: &SyncOptions,
) -> Result<PassOutcome, SyncError> {
    let document = read_document(diagram)?;

    let (result, updated) = match direction {
        SyncDirection::DiagramToRecords => {
            let result = sync_diagram_to_records(store, container, &document, options);
            (result, document.clone())
        }
        SyncDirection::RecordsToDiagram => {
            sync_records_to_diagram(store, container, &document, options)
        }
    };

    let settled = result.success && !options.dry_run;
    let document_written = settled && updated != document;
    if document_written {
        write_document(diagram, &updated)?;
        tracing::info!("wrote: {}", diagram.display());
    }

    let state_saved = if settled {
        let records = store.get_by_container(container)?;
        state::save_at(home, container, &SyncState::capture(&updated, &records))?;
        true
    } else {
        false
    };

    Ok(PassOutcome {
        result,
        document_written,
        state_saved,
    })
}

/// Staleness of one container/diagram pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub status: SyncStatus,
    pub synced_at: Option<DateTime<Utc>>,
    /// Conflicts a `manual` pull would raise right now.
    pub pending_conflicts: Vec<SyncConflict>,
}

pub fn status(
    home: &Path,
    store: &dyn RecordStore,
    container: &ContainerId,
    diagram: &Path,
) -> Result<StatusReport, SyncError> {
    if !store.container_exists(container)? {
        return Err(SyncError::ContainerNotFound {
            container: container.clone(),
        });
    }
    let document = read_document(diagram)?;
    let records = store.get_by_container(container)?;
    let state = state::load_at(home, container)?;

    let status = staleness::check(state.as_ref(), &document, &records);
    let tasks = extract_tasks(&document)?;
    let pending_conflicts = classify(&tasks, &records)
        .diverged
        .iter()
        .map(SyncConflict::from_pairing)
        .collect();

    Ok(StatusReport {
        status,
        synced_at: state.map(|s| s.synced_at),
        pending_conflicts,
    })
}

/// What `push` would do to the diagram file, as a unified diff.
pub fn preview(
    store: &mut dyn RecordStore,
    container: &ContainerId,
    diagram: &Path,
    policy: ConflictPolicy,
) -> Result<DocumentPreview, SyncError> {
    let document = read_document(diagram)?;
    let label = diagram
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| diagram.display().to_string());
    Ok(preview_records_to_diagram(
        store, container, &document, policy, &label,
    ))
}

/// Settle the pending conflict on `external_id` and persist whichever side
/// changed.
pub fn resolve_file(
    store: &mut dyn RecordStore,
    container: &ContainerId,
    diagram: &Path,
    external_id: &ExternalId,
    decision: ConflictDecision,
) -> Result<Resolution, SyncError> {
    resolve_file_inner(store, container, diagram, external_id, decision, None)
}

/// [`resolve_file`] with a merge hook for [`ConflictDecision::Merge`].
pub fn resolve_file_with_hook(
    store: &mut dyn RecordStore,
    container: &ContainerId,
    diagram: &Path,
    external_id: &ExternalId,
    decision: ConflictDecision,
    hook: &dyn MergeHook,
) -> Result<Resolution, SyncError> {
    resolve_file_inner(store, container, diagram, external_id, decision, Some(hook))
}

fn resolve_file_inner(
    store: &mut dyn RecordStore,
    container: &ContainerId,
    diagram: &Path,
    external_id: &ExternalId,
    decision: ConflictDecision,
    hook: Option<&dyn MergeHook>,
) -> Result<Resolution, SyncError> {
    if !store.container_exists(container)? {
        return Err(SyncError::ContainerNotFound {
            container: container.clone(),
        });
    }
    let document = read_document(diagram)?;
    let tasks = extract_tasks(&document)?;
    let records = store.get_by_container(container)?;
    let conflict = classify(&tasks, &records)
        .diverged
        .iter()
        .find(|p| &p.task.external_id == external_id)
        .map(SyncConflict::from_pairing)
        .ok_or_else(|| SyncError::NoSuchConflict {
            external_id: external_id.clone(),
        })?;

    let resolution = match hook {
        Some(hook) => resolve_with_hook(store, &conflict, decision, &document, hook)?,
        None => resolve(store, &conflict, decision, &document)?,
    };
    match &resolution {
        Resolution::DocumentRelabeled { document } | Resolution::Merged { document, .. } => {
            write_document(diagram, document)?;
            tracing::info!("wrote: {}", diagram.display());
        }
        Resolution::RecordRenamed { .. } | Resolution::Deferred(_) => {}
    }
    Ok(resolution)
}

// ---------------------------------------------------------------------------
// Document I/O
// ---------------------------------------------------------------------------

fn read_document(path: &Path) -> Result<String, SyncError> {
    std::fs::read_to_string(path).map_err(|e| io_err(path, e))
}

/// Atomically replace the diagram file.
pub(crate) fn write_document(path: &Path, content: &str) -> Result<(), SyncError> {
    let tmp = PathBuf::from(format!("{}.procflow.tmp", path.display()));
    std::fs::write(&tmp, content).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}
