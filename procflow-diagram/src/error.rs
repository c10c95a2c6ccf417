//! Error types for procflow-diagram.

use std::fmt::Display;

use thiserror::Error;

use procflow_core::types::ExternalId;

/// All errors that can arise while reading or editing a diagram document.
#[derive(Debug, Error)]
pub enum DiagramError {
    /// The document is not well-formed enough to read any element from it.
    #[error("diagram document is not well-formed near byte {position}: {message}")]
    Malformed { position: u64, message: String },

    /// A node insertion was requested but the document has no `process` element.
    #[error("diagram document has no process element to insert into")]
    NoProcess,

    /// A relabel or removal named an element id absent from the document.
    #[error("diagram element '{0}' not found")]
    UnknownElement(ExternalId),

    /// Serializing the rewritten document failed.
    #[error("failed to write diagram document: {0}")]
    Write(String),
}

/// Convenience constructor for [`DiagramError::Malformed`].
pub(crate) fn malformed(position: u64, message: impl Display) -> DiagramError {
    DiagramError::Malformed {
        position,
        message: message.to_string(),
    }
}
