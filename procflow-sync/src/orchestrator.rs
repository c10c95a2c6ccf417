//! Sync orchestration.
//!
//! Two entry points, one per direction:
//!
//! - [`sync_diagram_to_records`] extracts the diagram, diffs it against the
//!   container's records, applies the plan to the store and re-derives
//!   successors.
//! - [`sync_records_to_diagram`] walks the container's records and rewrites
//!   the document: relabel, insert, or (record-priority) remove nodes.
//!
//! Container lookup, document parsing and the initial record load are fatal
//! and happen before any mutation. Per-item store failures are collected into
//! [`SyncResult::errors`] and the pass continues; nothing already applied is
//! rolled back.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use procflow_core::config::Config;
use procflow_core::store::{RecordStore, StoreOp};
use procflow_core::types::{
    ConflictPolicy, ContainerId, ExternalId, NewRecord, ProcessRecord, RecordId, RecordPatch,
};
use procflow_diagram::{
    apply_edits, extract_nodes, new_element_id, DiagramTaskNode, DocumentEdit, NodeKind,
};

use crate::derive::{derive_container, scrub_ops};
use crate::diff::{classify, diff, SyncConflict, SyncPlan};
use crate::error::SyncError;

// ---------------------------------------------------------------------------
// Options and results
// ---------------------------------------------------------------------------

/// Which side is the source of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncDirection {
    DiagramToRecords,
    RecordsToDiagram,
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncDirection::DiagramToRecords => write!(f, "diagram -> records"),
            SyncDirection::RecordsToDiagram => write!(f, "records -> diagram"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub policy: ConflictPolicy,
    /// Plan and report, mutate nothing.
    pub dry_run: bool,
    /// Remove deleted record ids from sibling predecessor lists.
    pub scrub_dangling_predecessors: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            policy: ConflictPolicy::default(),
            dry_run: false,
            scrub_dangling_predecessors: true,
        }
    }
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            policy: config.default_policy,
            dry_run: false,
            scrub_dangling_predecessors: config.scrub_dangling_predecessors,
        }
    }

    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// One planned or applied step of a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum SyncAction {
    /// `record_id` is `None` in a dry run.
    CreateRecord {
        external_id: ExternalId,
        name: String,
        record_id: Option<RecordId>,
    },
    RenameRecord {
        record_id: RecordId,
        external_id: ExternalId,
        from: String,
        to: String,
    },
    DeleteRecord {
        record_id: RecordId,
        external_id: ExternalId,
        name: String,
    },
    /// A diverged name left as it is because the other side wins.
    KeepName {
        external_id: ExternalId,
        kept: String,
        ignored: String,
    },
    RelabelNode {
        external_id: ExternalId,
        from: String,
        to: String,
    },
    InsertNode {
        external_id: ExternalId,
        label: String,
        record_id: RecordId,
    },
    RemoveNode {
        external_id: ExternalId,
        label: String,
    },
    /// A diagram task repeating an id seen earlier in the document.
    SkipDuplicate {
        external_id: ExternalId,
        name: String,
    },
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncAction::CreateRecord { external_id, name, .. } => {
                write!(f, "create record \"{name}\" for {external_id}")
            }
            SyncAction::RenameRecord { external_id, from, to, .. } => {
                write!(f, "rename record {external_id}: \"{from}\" -> \"{to}\"")
            }
            SyncAction::DeleteRecord { external_id, name, .. } => {
                write!(f, "delete record \"{name}\" ({external_id} no longer in diagram)")
            }
            SyncAction::KeepName { external_id, kept, ignored } => {
                write!(f, "keep \"{kept}\" for {external_id} (ignoring \"{ignored}\")")
            }
            SyncAction::RelabelNode { external_id, from, to } => {
                write!(f, "relabel node {external_id}: \"{from}\" -> \"{to}\"")
            }
            SyncAction::InsertNode { external_id, label, .. } => {
                write!(f, "insert node {external_id} \"{label}\"")
            }
            SyncAction::RemoveNode { external_id, label } => {
                write!(f, "remove node {external_id} \"{label}\"")
            }
            SyncAction::SkipDuplicate { external_id, name } => {
                write!(f, "skip duplicate node {external_id} \"{name}\"")
            }
        }
    }
}

/// Outcome of one sync pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub direction: SyncDirection,
    pub container_id: ContainerId,
    pub success: bool,
    /// Creates, updates, deletes (or node edits) actually performed.
    pub applied_count: usize,
    pub errors: Vec<String>,
    pub conflicts: Vec<SyncConflict>,
    pub actions: Vec<SyncAction>,
    /// Unmatched ids on the target side, reported and left alone.
    pub orphaned: Vec<ExternalId>,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
}

impl SyncResult {
    fn new(direction: SyncDirection, container: &ContainerId, dry_run: bool) -> Self {
        Self {
            direction,
            container_id: container.clone(),
            success: true,
            applied_count: 0,
            errors: Vec::new(),
            conflicts: Vec::new(),
            actions: Vec::new(),
            orphaned: Vec::new(),
            dry_run,
            started_at: Utc::now(),
        }
    }

    /// Abort before any mutation.
    fn fatal(mut self, error: impl fmt::Display) -> Self {
        let message = error.to_string();
        tracing::warn!("sync {} of '{}' aborted: {message}", self.direction, self.container_id);
        self.success = false;
        self.applied_count = 0;
        self.actions.clear();
        self.conflicts.clear();
        self.orphaned.clear();
        self.errors = vec![message];
        self
    }

    fn item_failed(&mut self, message: String) {
        tracing::warn!("{message}");
        self.errors.push(message);
    }

    fn finish(mut self) -> Self {
        self.success = self.errors.is_empty();
        tracing::info!(
            "sync {} of '{}' finished: {} applied, {} conflict(s), {} error(s){}",
            self.direction,
            self.container_id,
            self.applied_count,
            self.conflicts.len(),
            self.errors.len(),
            if self.dry_run { " [dry-run]" } else { "" },
        );
        self
    }
}

// ---------------------------------------------------------------------------
// Shared preconditions
// ---------------------------------------------------------------------------

/// Both sides of a pass, loaded before anything is mutated.
struct Sides {
    tasks: Vec<DiagramTaskNode>,
    /// Records that are unlinked or linked to something other than an
    /// event or gateway.
    records: Vec<ProcessRecord>,
    /// Every flow-node id in the document, tasks or not.
    node_ids: HashSet<ExternalId>,
}

/// Container check, parse, record load. Any failure is fatal for the pass.
///
/// Records linked to an event or gateway node are left out: that node is
/// present, so they are neither missing nor orphaned.
fn load_sides(
    store: &dyn RecordStore,
    container: &ContainerId,
    document: &str,
) -> Result<Sides, SyncError> {
    if !store.container_exists(container)? {
        return Err(SyncError::ContainerNotFound {
            container: container.clone(),
        });
    }
    let nodes = extract_nodes(document)?;
    let node_ids: HashSet<ExternalId> = nodes.iter().map(|n| n.external_id.clone()).collect();
    let task_ids: HashSet<&ExternalId> = nodes
        .iter()
        .filter(|n| n.kind == NodeKind::Task)
        .map(|n| &n.external_id)
        .collect();
    let other_ids: HashSet<&ExternalId> = nodes
        .iter()
        .map(|n| &n.external_id)
        .filter(|id| !task_ids.contains(id))
        .collect();

    let mut records = store.get_by_container(container)?;
    records.retain(|r| match &r.external_element_id {
        Some(ext) if other_ids.contains(ext) => {
            tracing::debug!("record '{}' is linked to non-task node '{ext}'; skipped", r.id);
            false
        }
        _ => true,
    });

    let tasks = nodes.into_iter().filter(|n| n.kind == NodeKind::Task).collect();
    Ok(Sides {
        tasks,
        records,
        node_ids,
    })
}

// ---------------------------------------------------------------------------
// diagram -> records
// ---------------------------------------------------------------------------

/// Bring the container's records in line with the diagram document.
pub fn sync_diagram_to_records(
    store: &mut dyn RecordStore,
    container: &ContainerId,
    document: &str,
    options: &SyncOptions,
) -> SyncResult {
    let mut result = SyncResult::new(SyncDirection::DiagramToRecords, container, options.dry_run);
    tracing::info!(
        "sync {} of '{container}' started (policy: {})",
        result.direction,
        options.policy
    );

    let Sides { tasks, records, .. } = match load_sides(store, container, document) {
        Ok(sides) => sides,
        Err(e) => return result.fatal(e),
    };
    let plan = diff(&tasks, &records, options.policy);

    result.conflicts = plan.conflicts.clone();
    result.orphaned = plan
        .orphaned
        .iter()
        .filter_map(|r| r.external_element_id.clone())
        .collect();
    for pairing in &plan.skipped {
        result.actions.push(SyncAction::KeepName {
            external_id: pairing.task.external_id.clone(),
            kept: pairing.record.name.clone(),
            ignored: pairing.task.display_name.clone(),
        });
    }
    for task in &plan.duplicates {
        result.actions.push(SyncAction::SkipDuplicate {
            external_id: task.external_id.clone(),
            name: task.display_name.clone(),
        });
    }

    if options.dry_run {
        result.actions.extend(planned_record_actions(&plan));
        return result.finish();
    }

    apply_record_plan(store, container, plan, options, &mut result);
    result.finish()
}

fn planned_record_actions(plan: &SyncPlan) -> Vec<SyncAction> {
    let creates = plan.creates.iter().map(|task| SyncAction::CreateRecord {
        external_id: task.external_id.clone(),
        name: task.display_name.clone(),
        record_id: None,
    });
    let updates = plan.updates.iter().map(|u| SyncAction::RenameRecord {
        record_id: u.record_id.clone(),
        external_id: u.external_id.clone(),
        from: u.from.clone(),
        to: u.to.clone(),
    });
    let deletes = plan.deletes.iter().map(|r| SyncAction::DeleteRecord {
        record_id: r.id.clone(),
        external_id: r.external_element_id.clone().unwrap_or_default(),
        name: r.name.clone(),
    });
    creates.chain(updates).chain(deletes).collect()
}

fn apply_record_plan(
    store: &mut dyn RecordStore,
    container: &ContainerId,
    plan: SyncPlan,
    options: &SyncOptions,
    result: &mut SyncResult,
) {
    for task in plan.creates {
        let record = NewRecord::new(container.clone(), task.display_name.clone())
            .linked_to(task.external_id.clone());
        match store.insert(record) {
            Ok(record_id) => {
                tracing::debug!("created record '{record_id}' for '{}'", task.external_id);
                result.applied_count += 1;
                result.actions.push(SyncAction::CreateRecord {
                    external_id: task.external_id,
                    name: task.display_name,
                    record_id: Some(record_id),
                });
            }
            Err(e) => result.item_failed(format!("create record for '{}': {e}", task.external_id)),
        }
    }

    for update in plan.updates {
        match store.update(&update.record_id, RecordPatch::rename(update.to.clone())) {
            Ok(()) => {
                tracing::debug!("renamed record '{}' to {:?}", update.record_id, update.to);
                result.applied_count += 1;
                result.actions.push(SyncAction::RenameRecord {
                    record_id: update.record_id,
                    external_id: update.external_id,
                    from: update.from,
                    to: update.to,
                });
            }
            Err(e) => result.item_failed(format!("rename record '{}': {e}", update.record_id)),
        }
    }

    let mut deleted: Vec<RecordId> = Vec::new();
    for record in plan.deletes {
        match store.delete(&record.id) {
            Ok(()) => {
                tracing::debug!("deleted orphaned record '{}'", record.id);
                result.applied_count += 1;
                deleted.push(record.id.clone());
                result.actions.push(SyncAction::DeleteRecord {
                    record_id: record.id,
                    external_id: record.external_element_id.unwrap_or_default(),
                    name: record.name,
                });
            }
            Err(e) => result.item_failed(format!("delete record '{}': {e}", record.id)),
        }
    }
    if options.scrub_dangling_predecessors && !deleted.is_empty() {
        scrub_deleted(store, container, &deleted, result);
    }

    if result.applied_count > 0 {
        if let Err(e) = derive_container(store, container) {
            result.item_failed(format!("derive successors for '{container}': {e}"));
        }
    }
}

/// Drop deleted ids from the remaining records' predecessor lists, one
/// record at a time.
fn scrub_deleted(
    store: &mut dyn RecordStore,
    container: &ContainerId,
    deleted: &[RecordId],
    result: &mut SyncResult,
) {
    let remaining = match store.get_by_container(container) {
        Ok(records) => records,
        Err(e) => {
            result.item_failed(format!("reload '{container}' to scrub predecessors: {e}"));
            return;
        }
    };
    for op in scrub_ops(&remaining, deleted) {
        let StoreOp::Update { id, patch } = op else {
            continue;
        };
        if let Err(e) = store.update(&id, patch) {
            result.item_failed(format!("scrub predecessors of '{id}': {e}"));
        }
    }
}

// ---------------------------------------------------------------------------
// records -> diagram
// ---------------------------------------------------------------------------

/// Bring the diagram document in line with the container's records.
///
/// Returns the rewritten document. On a fatal error, a failed document edit
/// or a failed link batch, the input is returned unchanged. A dry run returns the
/// document the pass would produce but links no records.
pub fn sync_records_to_diagram(
    store: &mut dyn RecordStore,
    container: &ContainerId,
    document: &str,
    options: &SyncOptions,
) -> (SyncResult, String) {
    let mut result = SyncResult::new(SyncDirection::RecordsToDiagram, container, options.dry_run);
    tracing::info!(
        "sync {} of '{container}' started (policy: {})",
        result.direction,
        options.policy
    );

    let Sides {
        tasks,
        records,
        node_ids,
    } = match load_sides(store, container, document) {
        Ok(sides) => sides,
        Err(e) => return (result.fatal(e), document.to_string()),
    };
    let classification = classify(&tasks, &records);

    let mut edits: Vec<DocumentEdit> = Vec::new();
    let mut links: Vec<(RecordId, ExternalId)> = Vec::new();

    for pairing in &classification.diverged {
        let external_id = pairing.task.external_id.clone();
        match options.policy {
            ConflictPolicy::RecordPriority => {
                edits.push(DocumentEdit::Relabel {
                    id: external_id.clone(),
                    label: pairing.record.name.clone(),
                });
                result.actions.push(SyncAction::RelabelNode {
                    external_id,
                    from: pairing.task.display_name.clone(),
                    to: pairing.record.name.clone(),
                });
            }
            ConflictPolicy::DiagramPriority => result.actions.push(SyncAction::KeepName {
                external_id,
                kept: pairing.task.display_name.clone(),
                ignored: pairing.record.name.clone(),
            }),
            ConflictPolicy::Manual => result.conflicts.push(SyncConflict::from_pairing(pairing)),
        }
    }

    for task in &classification.diagram_only {
        if options.policy == ConflictPolicy::RecordPriority {
            edits.push(DocumentEdit::Remove {
                id: task.external_id.clone(),
            });
            result.actions.push(SyncAction::RemoveNode {
                external_id: task.external_id.clone(),
                label: task.display_name.clone(),
            });
        } else {
            result.orphaned.push(task.external_id.clone());
        }
    }

    // Linked records whose node went missing come back under the same id.
    for record in &classification.record_only {
        let Some(external_id) = record.external_element_id.clone() else {
            continue;
        };
        edits.push(DocumentEdit::Insert {
            id: external_id.clone(),
            label: record.name.clone(),
        });
        result.actions.push(SyncAction::InsertNode {
            external_id,
            label: record.name.clone(),
            record_id: record.id.clone(),
        });
    }

    let mut taken: HashSet<ExternalId> = node_ids
        .into_iter()
        .chain(records.iter().filter_map(|r| r.external_element_id.clone()))
        .collect();
    for record in records.iter().filter(|r| !r.is_linked()) {
        let external_id = fresh_element_id(&mut taken);
        edits.push(DocumentEdit::Insert {
            id: external_id.clone(),
            label: record.name.clone(),
        });
        links.push((record.id.clone(), external_id.clone()));
        result.actions.push(SyncAction::InsertNode {
            external_id,
            label: record.name.clone(),
            record_id: record.id.clone(),
        });
    }

    for task in &classification.duplicates {
        result.actions.push(SyncAction::SkipDuplicate {
            external_id: task.external_id.clone(),
            name: task.display_name.clone(),
        });
    }

    let updated = match apply_edits(document, &edits) {
        Ok(updated) => updated,
        Err(e) => {
            result.item_failed(format!("rewrite diagram document: {e}"));
            result.actions.clear();
            return (result.finish(), document.to_string());
        }
    };

    if options.dry_run {
        return (result.finish(), updated);
    }

    // One batch: every inserted node is claimed by its record, or none is.
    if !links.is_empty() {
        let ops = links
            .iter()
            .map(|(record_id, external_id)| StoreOp::Update {
                id: record_id.clone(),
                patch: RecordPatch::link(Some(external_id.clone())),
            })
            .collect();
        if let Err(e) = store.apply_batch(ops) {
            result.item_failed(format!(
                "link {} record(s) to inserted nodes: {e}",
                links.len()
            ));
            result.actions.clear();
            return (result.finish(), document.to_string());
        }
        for (record_id, external_id) in &links {
            tracing::debug!("linked record '{record_id}' to '{external_id}'");
        }
    }
    result.applied_count = edits.len();

    (result.finish(), updated)
}

fn fresh_element_id(taken: &mut HashSet<ExternalId>) -> ExternalId {
    loop {
        let candidate = new_element_id();
        if taken.insert(candidate.clone()) {
            return candidate;
        }
    }
}
