//! The record store contract and its in-memory implementation.
//!
//! Every query and mutation is scoped to one container; nothing here reads
//! across containers. `MemoryStore` enforces the two store-level invariants:
//! a record's container must exist, and an external element id is unique
//! within its container.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::error::StoreError;
use crate::types::{
    Container, ContainerId, ExternalId, NewRecord, ProcessRecord, RecordId, RecordPatch,
};

/// One mutation inside an [`RecordStore::apply_batch`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Insert(NewRecord),
    Update { id: RecordId, patch: RecordPatch },
    Delete(RecordId),
}

/// Query/mutate access to process records.
///
/// Individual calls are atomic; `apply_batch` is all-or-nothing. No other
/// cross-call transaction is implied.
pub trait RecordStore {
    fn container_exists(&self, container: &ContainerId) -> Result<bool, StoreError>;

    /// Records of one container, ordered by `display_order` then creation order.
    fn get_by_container(&self, container: &ContainerId)
        -> Result<Vec<ProcessRecord>, StoreError>;

    fn get_by_id(&self, id: &RecordId) -> Result<Option<ProcessRecord>, StoreError>;

    fn insert(&mut self, record: NewRecord) -> Result<RecordId, StoreError>;

    fn update(&mut self, id: &RecordId, patch: RecordPatch) -> Result<(), StoreError>;

    fn delete(&mut self, id: &RecordId) -> Result<(), StoreError>;

    fn apply_batch(&mut self, ops: Vec<StoreOp>) -> Result<(), StoreError>;

    /// Record linked to `external_id` in `container`, if any.
    fn find_by_external_id(
        &self,
        container: &ContainerId,
        external_id: &ExternalId,
    ) -> Result<Option<ProcessRecord>, StoreError> {
        Ok(self
            .get_by_container(container)?
            .into_iter()
            .find(|r| r.external_element_id.as_ref() == Some(external_id)))
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// `BTreeMap`-backed store. Also the working set behind the file ledger.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    containers: BTreeMap<ContainerId, Container>,
    records: BTreeMap<RecordId, ProcessRecord>,
    /// Creation sequence, the tie-breaker after `display_order`.
    sequence: BTreeMap<RecordId, u64>,
    next_seq: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new, empty container.
    pub fn create_container(
        &mut self,
        id: ContainerId,
        name: impl Into<String>,
    ) -> Result<Container, StoreError> {
        if self.containers.contains_key(&id) {
            return Err(StoreError::ContainerExists { container: id });
        }
        let container = Container {
            id: id.clone(),
            name: name.into(),
            created_at: Utc::now(),
        };
        self.containers.insert(id, container.clone());
        Ok(container)
    }

    pub fn containers(&self) -> impl Iterator<Item = &Container> {
        self.containers.values()
    }

    pub fn container(&self, id: &ContainerId) -> Option<&Container> {
        self.containers.get(id)
    }

    /// Load a container with already-persisted records, keeping their order.
    ///
    /// Used when rehydrating from disk; records keep their ids and timestamps.
    pub fn restore(&mut self, container: Container, records: Vec<ProcessRecord>) {
        let container_id = container.id.clone();
        self.containers.insert(container_id.clone(), container);
        for mut record in records {
            record.container_id = container_id.clone();
            self.sequence.insert(record.id.clone(), self.next_seq);
            self.next_seq += 1;
            self.records.insert(record.id.clone(), record);
        }
    }

    fn require_container(&self, container: &ContainerId) -> Result<(), StoreError> {
        if self.containers.contains_key(container) {
            Ok(())
        } else {
            Err(StoreError::ContainerNotFound {
                container: container.clone(),
            })
        }
    }

    fn ensure_external_id_free(
        &self,
        container: &ContainerId,
        external_id: &ExternalId,
        except: Option<&RecordId>,
    ) -> Result<(), StoreError> {
        let taken = self.records.values().any(|r| {
            &r.container_id == container
                && r.external_element_id.as_ref() == Some(external_id)
                && Some(&r.id) != except
        });
        if taken {
            return Err(StoreError::DuplicateExternalId {
                container: container.clone(),
                external_id: external_id.clone(),
            });
        }
        Ok(())
    }

    fn apply_op(&mut self, op: StoreOp) -> Result<(), StoreError> {
        match op {
            StoreOp::Insert(record) => self.insert(record).map(|_| ()),
            StoreOp::Update { id, patch } => self.update(&id, patch),
            StoreOp::Delete(id) => self.delete(&id),
        }
    }
}

impl RecordStore for MemoryStore {
    fn container_exists(&self, container: &ContainerId) -> Result<bool, StoreError> {
        Ok(self.containers.contains_key(container))
    }

    fn get_by_container(
        &self,
        container: &ContainerId,
    ) -> Result<Vec<ProcessRecord>, StoreError> {
        self.require_container(container)?;
        let mut records: Vec<&ProcessRecord> = self
            .records
            .values()
            .filter(|r| &r.container_id == container)
            .collect();
        records.sort_by_key(|r| (r.display_order, self.sequence.get(&r.id).copied()));
        Ok(records.into_iter().cloned().collect())
    }

    fn get_by_id(&self, id: &RecordId) -> Result<Option<ProcessRecord>, StoreError> {
        Ok(self.records.get(id).cloned())
    }

    fn insert(&mut self, record: NewRecord) -> Result<RecordId, StoreError> {
        self.require_container(&record.container_id)?;
        if let Some(external_id) = &record.external_element_id {
            self.ensure_external_id_free(&record.container_id, external_id, None)?;
        }

        let now = Utc::now();
        let id = RecordId::generate();
        let stored = ProcessRecord {
            id: id.clone(),
            container_id: record.container_id,
            name: record.name,
            predecessor_ids: dedup_preserving_order(record.predecessor_ids),
            successor_ids: Vec::new(),
            external_element_id: record.external_element_id,
            display_order: record.display_order,
            created_at: now,
            updated_at: now,
        };
        self.sequence.insert(id.clone(), self.next_seq);
        self.next_seq += 1;
        self.records.insert(id.clone(), stored);
        Ok(id)
    }

    fn update(&mut self, id: &RecordId, patch: RecordPatch) -> Result<(), StoreError> {
        let container = match self.records.get(id) {
            Some(record) => record.container_id.clone(),
            None => return Err(StoreError::RecordNotFound { id: id.clone() }),
        };
        if let Some(Some(external_id)) = &patch.external_element_id {
            self.ensure_external_id_free(&container, external_id, Some(id))?;
        }

        let Some(record) = self.records.get_mut(id) else {
            return Err(StoreError::RecordNotFound { id: id.clone() });
        };
        let derived_only = patch.successor_ids.is_some()
            && patch.name.is_none()
            && patch.predecessor_ids.is_none()
            && patch.external_element_id.is_none()
            && patch.display_order.is_none();

        if let Some(name) = patch.name {
            record.name = name;
        }
        if let Some(predecessors) = patch.predecessor_ids {
            record.predecessor_ids = dedup_preserving_order(predecessors);
        }
        if let Some(successors) = patch.successor_ids {
            record.successor_ids = successors;
        }
        if let Some(external_id) = patch.external_element_id {
            record.external_element_id = external_id;
        }
        if let Some(order) = patch.display_order {
            record.display_order = order;
        }
        // Re-deriving successors is bookkeeping, not an edit.
        if !derived_only {
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    fn delete(&mut self, id: &RecordId) -> Result<(), StoreError> {
        if self.records.remove(id).is_none() {
            return Err(StoreError::RecordNotFound { id: id.clone() });
        }
        self.sequence.remove(id);
        Ok(())
    }

    fn apply_batch(&mut self, ops: Vec<StoreOp>) -> Result<(), StoreError> {
        let mut staged = self.clone();
        for op in ops {
            staged.apply_op(op)?;
        }
        *self = staged;
        Ok(())
    }
}

/// Predecessor lists are ordered sets.
fn dedup_preserving_order(ids: Vec<RecordId>) -> Vec<RecordId> {
    let mut out: Vec<RecordId> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
