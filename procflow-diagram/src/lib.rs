//! # procflow-diagram
//!
//! Reading and minimally editing BPMN 2.0 flow-diagram documents.
//!
//! - [`extract_tasks`] / [`extract_nodes`] list the flow nodes of a document.
//! - [`apply_edits`] relabels, inserts or removes nodes while leaving every
//!   other byte of the document alone.

pub mod edit;
pub mod error;
pub mod extract;

pub use edit::{apply_edits, new_element_id, DocumentEdit};
pub use error::DiagramError;
pub use extract::{classify_element, extract_nodes, extract_tasks, DiagramTaskNode, NodeKind};
