//! Flow graph derivation.
//!
//! `predecessor_ids` is the stored, authoritative edge list; `successor_ids`
//! is a projection recomputed from it for a whole container at a time:
//!
//! ```text
//! successors(X) == { Y | X in predecessors(Y) }   (same container)
//! ```
//!
//! The lifecycle helpers at the bottom wrap store mutations that touch the
//! graph and always re-derive before returning.

use std::collections::{HashMap, HashSet};

use procflow_core::store::{RecordStore, StoreOp};
use procflow_core::types::{ContainerId, NewRecord, ProcessRecord, RecordId, RecordPatch};

use crate::error::SyncError;

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Recompute `successor_ids` on every record of one container snapshot.
///
/// Successors appear in record order, each at most once. Predecessor ids that
/// name no record in the slice produce no edge. Idempotent.
pub fn derive_successors(records: &mut [ProcessRecord]) {
    let mut successors: HashMap<RecordId, Vec<RecordId>> = HashMap::new();
    let mut seen: HashSet<(RecordId, RecordId)> = HashSet::new();
    for record in records.iter() {
        for predecessor in &record.predecessor_ids {
            if seen.insert((predecessor.clone(), record.id.clone())) {
                successors
                    .entry(predecessor.clone())
                    .or_default()
                    .push(record.id.clone());
            }
        }
    }
    for record in records.iter_mut() {
        record.successor_ids = successors.remove(&record.id).unwrap_or_default();
    }
}

/// Re-derive successors for `container` and write back the records whose
/// successor list changed, as a single batch.
///
/// Returns how many records were rewritten.
pub fn derive_container(
    store: &mut dyn RecordStore,
    container: &ContainerId,
) -> Result<usize, SyncError> {
    if !store.container_exists(container)? {
        return Err(SyncError::ContainerNotFound {
            container: container.clone(),
        });
    }
    let before = store.get_by_container(container)?;
    let mut after = before.clone();
    derive_successors(&mut after);

    let ops: Vec<StoreOp> = before
        .iter()
        .zip(after)
        .filter(|(old, new)| old.successor_ids != new.successor_ids)
        .map(|(_, new)| StoreOp::Update {
            id: new.id,
            patch: RecordPatch::successors(new.successor_ids),
        })
        .collect();

    let changed = ops.len();
    if changed > 0 {
        store.apply_batch(ops)?;
    }
    tracing::debug!("derived successors for '{container}': {changed} record(s) rewritten");
    Ok(changed)
}

// ---------------------------------------------------------------------------
// Cycle detection (opt-in)
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// First predecessor cycle found, in flow order (each id precedes the next,
/// and the last precedes the first). `None` when the graph is acyclic.
///
/// Only edges between records in the slice are followed.
pub fn find_cycle(records: &[ProcessRecord]) -> Option<Vec<RecordId>> {
    let by_id: HashMap<&RecordId, &ProcessRecord> = records.iter().map(|r| (&r.id, r)).collect();
    let mut marks: HashMap<&RecordId, Mark> = HashMap::new();
    let mut path: Vec<&RecordId> = Vec::new();

    fn visit<'a>(
        id: &'a RecordId,
        by_id: &HashMap<&'a RecordId, &'a ProcessRecord>,
        marks: &mut HashMap<&'a RecordId, Mark>,
        path: &mut Vec<&'a RecordId>,
    ) -> Option<Vec<RecordId>> {
        match marks.get(id) {
            Some(Mark::Done) => return None,
            Some(Mark::Visiting) => {
                let start = path.iter().position(|p| *p == id)?;
                // The path follows predecessor edges; reverse it for flow order.
                return Some(path[start..].iter().rev().map(|p| (*p).clone()).collect());
            }
            None => {}
        }
        marks.insert(id, Mark::Visiting);
        path.push(id);
        if let Some(record) = by_id.get(id).copied() {
            for predecessor in &record.predecessor_ids {
                let Some((&key, _)) = by_id.get_key_value(predecessor) else {
                    continue;
                };
                if let Some(cycle) = visit(key, by_id, marks, path) {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        marks.insert(id, Mark::Done);
        None
    }

    records
        .iter()
        .find_map(|record| visit(&record.id, &by_id, &mut marks, &mut path))
}

/// `Err(CycleDetected)` if the records' predecessor lists form a cycle.
pub fn validate_acyclic(records: &[ProcessRecord]) -> Result<(), SyncError> {
    match find_cycle(records) {
        Some(cycle) => Err(SyncError::CycleDetected { cycle }),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Record lifecycle
// ---------------------------------------------------------------------------

/// Insert a record and re-derive its container.
pub fn create_record(store: &mut dyn RecordStore, record: NewRecord) -> Result<RecordId, SyncError> {
    let container = record.container_id.clone();
    let id = store.insert(record)?;
    derive_container(store, &container)?;
    Ok(id)
}

/// Replace a record's predecessor list and re-derive its container.
///
/// With `reject_cycles`, a list that would close a cycle is refused before
/// anything is written.
pub fn set_predecessors(
    store: &mut dyn RecordStore,
    id: &RecordId,
    predecessor_ids: Vec<RecordId>,
    reject_cycles: bool,
) -> Result<(), SyncError> {
    let record = store
        .get_by_id(id)?
        .ok_or_else(|| SyncError::RecordNotFound { id: id.clone() })?;

    if reject_cycles {
        let mut proposed = store.get_by_container(&record.container_id)?;
        for candidate in proposed.iter_mut().filter(|r| &r.id == id) {
            candidate.predecessor_ids = predecessor_ids.clone();
        }
        validate_acyclic(&proposed)?;
    }

    store.update(id, RecordPatch::predecessors(predecessor_ids))?;
    derive_container(store, &record.container_id)?;
    Ok(())
}

/// Delete a record and re-derive its container.
///
/// With `scrub_dangling`, the id is also removed from every sibling's
/// predecessor list in the same batch; otherwise those references are left
/// in place and simply produce no successor edge.
pub fn delete_record(
    store: &mut dyn RecordStore,
    id: &RecordId,
    scrub_dangling: bool,
) -> Result<(), SyncError> {
    let record = store
        .get_by_id(id)?
        .ok_or_else(|| SyncError::RecordNotFound { id: id.clone() })?;

    let mut ops = vec![StoreOp::Delete(id.clone())];
    if scrub_dangling {
        ops.extend(scrub_ops(
            &store.get_by_container(&record.container_id)?,
            &[id.clone()],
        ));
    }
    store.apply_batch(ops)?;
    tracing::debug!("deleted record '{id}' from '{}'", record.container_id);
    derive_container(store, &record.container_id)?;
    Ok(())
}

/// Updates dropping `removed` ids from the predecessor lists of `records`.
pub(crate) fn scrub_ops(records: &[ProcessRecord], removed: &[RecordId]) -> Vec<StoreOp> {
    records
        .iter()
        .filter(|r| !removed.contains(&r.id))
        .filter(|r| r.predecessor_ids.iter().any(|p| removed.contains(p)))
        .map(|r| StoreOp::Update {
            id: r.id.clone(),
            patch: RecordPatch::predecessors(
                r.predecessor_ids
                    .iter()
                    .filter(|p| !removed.contains(p))
                    .cloned()
                    .collect(),
            ),
        })
        .collect()
}
