//! Domain types for process records and their containers.
//!
//! `successor_ids` on [`ProcessRecord`] is a derived projection of every
//! sibling's `predecessor_ids`; nothing outside the deriver writes it.
//! All types are serializable/deserializable via serde + serde_yaml.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Identifier of a process table. All graph operations are scoped to one.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContainerId(pub String);

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ContainerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ContainerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Opaque, immutable identifier of a [`ProcessRecord`], assigned by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    /// Fresh random identifier (UUID v4, hyphenated).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Stable key correlating a diagram node with a process record.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExternalId(pub String);

impl ExternalId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ExternalId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ExternalId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How a diverging name is settled when no operator is asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// The diagram side wins; orphaned records are deleted.
    DiagramPriority,
    /// The record side wins; diverging diagram names are ignored.
    RecordPriority,
    /// Diverging names are surfaced as conflicts for an operator.
    #[default]
    Manual,
}

impl ConflictPolicy {
    pub fn all() -> &'static [ConflictPolicy] {
        &[
            ConflictPolicy::DiagramPriority,
            ConflictPolicy::RecordPriority,
            ConflictPolicy::Manual,
        ]
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictPolicy::DiagramPriority => write!(f, "diagram-priority"),
            ConflictPolicy::RecordPriority => write!(f, "record-priority"),
            ConflictPolicy::Manual => write!(f, "manual"),
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "diagram-priority" | "diagram" => Ok(ConflictPolicy::DiagramPriority),
            "record-priority" | "records" | "record" => Ok(ConflictPolicy::RecordPriority),
            "manual" => Ok(ConflictPolicy::Manual),
            other => Err(format!(
                "unknown conflict policy '{other}'; expected: diagram-priority, record-priority, manual"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A process table: the scope of every graph operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub id: ContainerId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// One discrete step of a business process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub id: RecordId,
    pub container_id: ContainerId,
    pub name: String,
    /// Authoritative incoming edges.
    #[serde(default)]
    pub predecessor_ids: Vec<RecordId>,
    /// Derived outgoing edges.
    #[serde(default)]
    pub successor_ids: Vec<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_element_id: Option<ExternalId>,
    #[serde(default)]
    pub display_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessRecord {
    pub fn is_linked(&self) -> bool {
        self.external_element_id.is_some()
    }
}

/// Input for creating a record. The store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewRecord {
    pub container_id: ContainerId,
    pub name: String,
    pub predecessor_ids: Vec<RecordId>,
    pub external_element_id: Option<ExternalId>,
    pub display_order: i64,
}

impl NewRecord {
    pub fn new(container_id: ContainerId, name: impl Into<String>) -> Self {
        Self {
            container_id,
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_predecessors(mut self, predecessor_ids: Vec<RecordId>) -> Self {
        self.predecessor_ids = predecessor_ids;
        self
    }

    pub fn linked_to(mut self, external_id: ExternalId) -> Self {
        self.external_element_id = Some(external_id);
        self
    }

    pub fn at_position(mut self, display_order: i64) -> Self {
        self.display_order = display_order;
        self
    }
}

/// Partial update. `None` leaves a field untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordPatch {
    pub name: Option<String>,
    pub predecessor_ids: Option<Vec<RecordId>>,
    /// Written only by the successor deriver.
    pub successor_ids: Option<Vec<RecordId>>,
    /// `Some(None)` unlinks the record from the diagram.
    pub external_element_id: Option<Option<ExternalId>>,
    pub display_order: Option<i64>,
}

impl RecordPatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn predecessors(predecessor_ids: Vec<RecordId>) -> Self {
        Self {
            predecessor_ids: Some(predecessor_ids),
            ..Self::default()
        }
    }

    pub fn successors(successor_ids: Vec<RecordId>) -> Self {
        Self {
            successor_ids: Some(successor_ids),
            ..Self::default()
        }
    }

    pub fn link(external_id: Option<ExternalId>) -> Self {
        Self {
            external_element_id: Some(external_id),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.predecessor_ids.is_none()
            && self.successor_ids.is_none()
            && self.external_element_id.is_none()
            && self.display_order.is_none()
    }

    /// Whether applying this patch can change graph structure.
    pub fn touches_graph(&self) -> bool {
        self.predecessor_ids.is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
