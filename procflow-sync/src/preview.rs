//! Dry-run unified diff support for `procflow diff`.

use similar::TextDiff;

use procflow_core::store::RecordStore;
use procflow_core::types::{ConflictPolicy, ContainerId};

use crate::orchestrator::{sync_records_to_diagram, SyncOptions, SyncResult};

/// What a records -> diagram pass would do to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPreview {
    /// The dry-run pass result; nothing in it was applied.
    pub result: SyncResult,
    /// Unified diff against the current document; empty when unchanged.
    pub unified_diff: String,
}

impl DocumentPreview {
    pub fn is_empty(&self) -> bool {
        self.unified_diff.is_empty()
    }
}

/// Run a dry records -> diagram pass and diff the document it would produce.
///
/// `label` names the document in the `a/` and `b/` headers.
pub fn preview_records_to_diagram(
    store: &mut dyn RecordStore,
    container: &ContainerId,
    document: &str,
    policy: ConflictPolicy,
    label: &str,
) -> DocumentPreview {
    let options = SyncOptions::default().with_policy(policy).dry_run(true);
    let (result, proposed) = sync_records_to_diagram(store, container, document, &options);

    let existing = normalize_line_endings(document);
    let proposed = normalize_line_endings(&proposed);
    let unified_diff = if existing == proposed {
        String::new()
    } else {
        let old_header = format!("a/{label}");
        let new_header = format!("b/{label}");
        TextDiff::from_lines(&existing, &proposed)
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string()
    };

    DocumentPreview {
        result,
        unified_diff,
    }
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n")
}
