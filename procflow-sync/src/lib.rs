//! # procflow-sync
//!
//! Keeps a container's process records and its flow diagram consistent.
//!
//! - [`derive`]: successor lists from predecessor lists, plus lifecycle
//!   helpers that re-derive after every graph mutation.
//! - [`diff`]: pairs diagram tasks with records and plans a pass.
//! - [`orchestrator`]: applies a plan in either direction.
//! - [`resolver`]: settles one conflict from an operator decision.
//! - [`state`] / [`staleness`]: which side moved since the last pass.
//! - [`preview`] / [`pipeline`]: what the CLI drives.

pub mod derive;
pub mod diff;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod preview;
pub mod resolver;
pub mod staleness;
pub mod state;

pub use derive::{
    create_record, delete_record, derive_container, derive_successors, find_cycle,
    set_predecessors, validate_acyclic,
};
pub use diff::{classify, diff, Classification, NameUpdate, Pairing, SyncConflict, SyncPlan};
pub use error::SyncError;
pub use orchestrator::{
    sync_diagram_to_records, sync_records_to_diagram, SyncAction, SyncDirection, SyncOptions,
    SyncResult,
};
pub use preview::{preview_records_to_diagram, DocumentPreview};
pub use resolver::{resolve, resolve_with_hook, ConflictDecision, MergeHook, Resolution};
pub use staleness::SyncStatus;
pub use state::SyncState;
