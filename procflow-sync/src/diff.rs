//! Graph diff/merge engine.
//!
//! Pairs diagram tasks with process records by external element id only;
//! display names never establish identity. The engine is read-only: it turns
//! two snapshots into a [`SyncPlan`] and leaves applying it to the
//! orchestrator.
//!
//! Classification of one pass:
//!
//! | bucket         | diagram task | linked record | names      |
//! |----------------|--------------|---------------|------------|
//! | `diagram_only` | yes          | no            | n/a        |
//! | `unchanged`    | yes          | yes           | equal      |
//! | `diverged`     | yes          | yes           | different  |
//! | `record_only`  | no           | yes           | n/a        |
//! | `duplicates`   | repeated id  | n/a           | n/a        |

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use procflow_core::types::{ConflictPolicy, ContainerId, ExternalId, ProcessRecord, RecordId};
use procflow_diagram::DiagramTaskNode;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Both sides carry the same external id with different names, and policy
/// wants an operator to decide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncConflict {
    pub container_id: ContainerId,
    pub record_id: RecordId,
    pub external_element_id: ExternalId,
    pub diagram_side_name: String,
    pub record_side_name: String,
    pub message: String,
}

impl SyncConflict {
    pub(crate) fn from_pairing(pairing: &Pairing) -> Self {
        let message = format!(
            "'{}' is named \"{}\" in the diagram but \"{}\" in the records",
            pairing.task.external_id, pairing.task.display_name, pairing.record.name
        );
        Self {
            container_id: pairing.record.container_id.clone(),
            record_id: pairing.record.id.clone(),
            external_element_id: pairing.task.external_id.clone(),
            diagram_side_name: pairing.task.display_name.clone(),
            record_side_name: pairing.record.name.clone(),
            message,
        }
    }
}

/// A record rename the diagram side asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameUpdate {
    pub record_id: RecordId,
    pub external_id: ExternalId,
    pub from: String,
    pub to: String,
}

/// A diagram task matched to the record linked to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub task: DiagramTaskNode,
    pub record: ProcessRecord,
}

/// Policy-free pairing of one diagram snapshot against one record snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub diagram_only: Vec<DiagramTaskNode>,
    pub unchanged: Vec<Pairing>,
    pub diverged: Vec<Pairing>,
    /// Linked records whose node is absent from the diagram, in store order.
    pub record_only: Vec<ProcessRecord>,
    /// Tasks repeating an external id seen earlier in the same document.
    pub duplicates: Vec<DiagramTaskNode>,
}

/// What a diagram -> records pass should do under one policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Diagram tasks that need a new record.
    pub creates: Vec<DiagramTaskNode>,
    /// Diverged names the diagram side wins.
    pub updates: Vec<NameUpdate>,
    /// Orphaned records to delete (diagram-priority only).
    pub deletes: Vec<ProcessRecord>,
    /// Diverged names left for an operator.
    pub conflicts: Vec<SyncConflict>,
    /// Diverged names the record side wins; nothing to apply.
    pub skipped: Vec<Pairing>,
    pub unchanged: Vec<Pairing>,
    /// Orphaned records that are reported but kept.
    pub orphaned: Vec<ProcessRecord>,
    pub duplicates: Vec<DiagramTaskNode>,
}

impl SyncPlan {
    /// Nothing to create, rename or delete.
    pub fn is_noop(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// classify / diff
// ---------------------------------------------------------------------------

/// Pair `tasks` with `records` by external id.
///
/// Every task lands in exactly one of `diagram_only`, `unchanged`,
/// `diverged` or `duplicates`; every linked record is either paired or in
/// `record_only`. Unlinked records take no part.
pub fn classify(tasks: &[DiagramTaskNode], records: &[ProcessRecord]) -> Classification {
    let mut by_external_id: HashMap<&ExternalId, &ProcessRecord> = records
        .iter()
        .filter_map(|r| r.external_element_id.as_ref().map(|ext| (ext, r)))
        .collect();
    let mut seen: HashSet<&ExternalId> = HashSet::new();
    let mut out = Classification::default();

    for task in tasks {
        if !seen.insert(&task.external_id) {
            tracing::debug!("duplicate diagram id '{}'", task.external_id);
            out.duplicates.push(task.clone());
            continue;
        }
        let Some(record) = by_external_id.remove(&task.external_id) else {
            out.diagram_only.push(task.clone());
            continue;
        };
        let pairing = Pairing {
            task: task.clone(),
            record: record.clone(),
        };
        if record.name == task.display_name {
            out.unchanged.push(pairing);
        } else {
            out.diverged.push(pairing);
        }
    }

    // Store order, not map order.
    out.record_only = records
        .iter()
        .filter(|r| {
            r.external_element_id
                .as_ref()
                .is_some_and(|ext| by_external_id.contains_key(ext))
        })
        .cloned()
        .collect();
    out
}

/// Build the diagram -> records plan for `policy`.
///
/// - `diagram-priority`: diverged names become updates, orphaned records
///   become deletes.
/// - `record-priority`: diverged names are skipped, orphans are kept.
/// - `manual`: diverged names become conflicts, orphans are kept.
pub fn diff(
    tasks: &[DiagramTaskNode],
    records: &[ProcessRecord],
    policy: ConflictPolicy,
) -> SyncPlan {
    let classification = classify(tasks, records);
    let mut plan = SyncPlan {
        creates: classification.diagram_only,
        unchanged: classification.unchanged,
        duplicates: classification.duplicates,
        ..SyncPlan::default()
    };

    for pairing in classification.diverged {
        match policy {
            ConflictPolicy::DiagramPriority => plan.updates.push(NameUpdate {
                record_id: pairing.record.id.clone(),
                external_id: pairing.task.external_id.clone(),
                from: pairing.record.name.clone(),
                to: pairing.task.display_name.clone(),
            }),
            ConflictPolicy::RecordPriority => plan.skipped.push(pairing),
            ConflictPolicy::Manual => plan.conflicts.push(SyncConflict::from_pairing(&pairing)),
        }
    }

    if policy == ConflictPolicy::DiagramPriority {
        plan.deletes = classification.record_only;
    } else {
        plan.orphaned = classification.record_only;
    }
    plan
}
