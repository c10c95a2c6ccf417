//! procflow core library — domain types, record store, ledger persistence, config.
//!
//! Public API surface:
//! - [`types`] — newtypes and domain structs
//! - [`error`] — [`StoreError`], [`ConfigError`]
//! - [`store`] — the [`RecordStore`] contract and [`MemoryStore`]
//! - [`ledger`] — YAML ledger and [`FileStore`]
//! - [`config`] — `~/.procflow/config.yaml`

pub mod config;
pub mod error;
pub mod ledger;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, StoreError};
pub use ledger::{ContainerLedger, FileStore};
pub use store::{MemoryStore, RecordStore, StoreOp};
pub use types::{
    ConflictPolicy, Container, ContainerId, ExternalId, NewRecord, ProcessRecord, RecordId,
    RecordPatch,
};
