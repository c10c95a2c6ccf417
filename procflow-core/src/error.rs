//! Error types for procflow-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{ContainerId, ExternalId, RecordId};

/// All errors that can arise from record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure, with the path that was being touched.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse container ledger at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None` — cannot locate `~/.procflow/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    #[error("container '{container}' not found")]
    ContainerNotFound { container: ContainerId },

    #[error("container '{container}' already exists")]
    ContainerExists { container: ContainerId },

    #[error("record '{id}' not found")]
    RecordNotFound { id: RecordId },

    /// Two records in one container may not claim the same diagram node.
    #[error("external element '{external_id}' is already linked in container '{container}'")]
    DuplicateExternalId {
        container: ContainerId,
        external_id: ExternalId,
    },

    /// The store refused the mutation for a backend-specific reason.
    #[error("store rejected operation: {0}")]
    Rejected(String),
}

/// Errors from loading or saving `~/.procflow/config.yaml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
