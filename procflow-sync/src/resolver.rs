//! Conflict resolution.
//!
//! A [`SyncConflict`] is settled by one operator decision: the losing side is
//! rewritten to match the winning side. `Merge` is not implemented here; it
//! defers to a caller-supplied [`MergeHook`], and without one the conflict is
//! handed back untouched.

use std::fmt;
use std::str::FromStr;

use procflow_core::store::RecordStore;
use procflow_core::types::RecordPatch;
use procflow_diagram::{apply_edits, DocumentEdit};

use crate::diff::SyncConflict;
use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictDecision {
    /// Rename the record to the diagram's name.
    PreferDiagram,
    /// Relabel the diagram node with the record's name.
    PreferRecords,
    /// Ask the merge hook for a combined name.
    Merge,
}

impl fmt::Display for ConflictDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictDecision::PreferDiagram => write!(f, "prefer-diagram"),
            ConflictDecision::PreferRecords => write!(f, "prefer-records"),
            ConflictDecision::Merge => write!(f, "merge"),
        }
    }
}

impl FromStr for ConflictDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "prefer-diagram" | "diagram" => Ok(ConflictDecision::PreferDiagram),
            "prefer-records" | "records" | "record" => Ok(ConflictDecision::PreferRecords),
            "merge" => Ok(ConflictDecision::Merge),
            other => Err(format!(
                "unknown decision '{other}'; expected: prefer-diagram, prefer-records, merge"
            )),
        }
    }
}

/// What a resolution changed. Documents are returned, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    RecordRenamed { name: String },
    DocumentRelabeled { document: String },
    /// Both sides now carry `name`.
    Merged { name: String, document: String },
    /// Nothing was changed; the conflict is still open.
    Deferred(SyncConflict),
}

/// Field-level merge supplied by the host. Returning `None` defers.
pub trait MergeHook {
    fn merge(&self, conflict: &SyncConflict) -> Option<String>;
}

impl<F> MergeHook for F
where
    F: Fn(&SyncConflict) -> Option<String>,
{
    fn merge(&self, conflict: &SyncConflict) -> Option<String> {
        self(conflict)
    }
}

/// Resolve without a merge hook; `Merge` yields [`Resolution::Deferred`].
pub fn resolve(
    store: &mut dyn RecordStore,
    conflict: &SyncConflict,
    decision: ConflictDecision,
    document: &str,
) -> Result<Resolution, SyncError> {
    resolve_inner(store, conflict, decision, document, None)
}

pub fn resolve_with_hook(
    store: &mut dyn RecordStore,
    conflict: &SyncConflict,
    decision: ConflictDecision,
    document: &str,
    hook: &dyn MergeHook,
) -> Result<Resolution, SyncError> {
    resolve_inner(store, conflict, decision, document, Some(hook))
}

fn resolve_inner(
    store: &mut dyn RecordStore,
    conflict: &SyncConflict,
    decision: ConflictDecision,
    document: &str,
    hook: Option<&dyn MergeHook>,
) -> Result<Resolution, SyncError> {
    let record = store
        .get_by_id(&conflict.record_id)?
        .ok_or_else(|| SyncError::RecordNotFound {
            id: conflict.record_id.clone(),
        })?;
    if record.external_element_id.as_ref() != Some(&conflict.external_element_id) {
        return Err(SyncError::StaleConflict {
            external_id: conflict.external_element_id.clone(),
            record_id: conflict.record_id.clone(),
        });
    }

    let resolution = match decision {
        ConflictDecision::PreferDiagram => {
            let name = conflict.diagram_side_name.clone();
            store.update(&conflict.record_id, RecordPatch::rename(name.clone()))?;
            Resolution::RecordRenamed { name }
        }
        ConflictDecision::PreferRecords => Resolution::DocumentRelabeled {
            document: relabel(document, conflict, &conflict.record_side_name)?,
        },
        ConflictDecision::Merge => match hook.and_then(|hook| hook.merge(conflict)) {
            Some(name) => {
                // Edit the document first so a bad document leaves the store alone.
                let document = relabel(document, conflict, &name)?;
                store.update(&conflict.record_id, RecordPatch::rename(name.clone()))?;
                Resolution::Merged { name, document }
            }
            None => Resolution::Deferred(conflict.clone()),
        },
    };
    if matches!(resolution, Resolution::Deferred(_)) {
        tracing::info!("conflict on '{}' deferred: no merge", conflict.external_element_id);
    } else {
        tracing::info!(
            "resolved conflict on '{}' ({decision})",
            conflict.external_element_id
        );
    }
    Ok(resolution)
}

fn relabel(document: &str, conflict: &SyncConflict, label: &str) -> Result<String, SyncError> {
    Ok(apply_edits(
        document,
        &[DocumentEdit::Relabel {
            id: conflict.external_element_id.clone(),
            label: label.to_string(),
        }],
    )?)
}
