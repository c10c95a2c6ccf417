//! Which side changed since the last successful pass.
//!
//! Signal precedence:
//! 1. `NeverSynced` (no sync state recorded)
//! 2. `BothChanged` (document and records both differ from the fingerprints)
//! 3. `DiagramChanged`
//! 4. `RecordsChanged`
//! 5. `Current`

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use procflow_core::types::ProcessRecord;

use crate::state::{document_fingerprint, records_fingerprint, SyncState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    NeverSynced,
    Current,
    DiagramChanged,
    RecordsChanged,
    /// Both sides were edited; a `manual` pass is the safe choice.
    BothChanged,
}

impl SyncStatus {
    /// Direction that would bring the other side up to date, if only one
    /// side moved.
    pub fn suggestion(&self) -> &'static str {
        match self {
            SyncStatus::NeverSynced => "run `procflow sync pull` or `procflow sync push`",
            SyncStatus::Current => "nothing to do",
            SyncStatus::DiagramChanged => "run `procflow sync pull`",
            SyncStatus::RecordsChanged => "run `procflow sync push`",
            SyncStatus::BothChanged => "run `procflow sync pull --policy manual` and resolve conflicts",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::NeverSynced => write!(f, "never synced"),
            SyncStatus::Current => write!(f, "current"),
            SyncStatus::DiagramChanged => write!(f, "diagram changed"),
            SyncStatus::RecordsChanged => write!(f, "records changed"),
            SyncStatus::BothChanged => write!(f, "both changed"),
        }
    }
}

/// Compare both sides against the recorded fingerprints.
pub fn check(
    state: Option<&SyncState>,
    document: &str,
    records: &[ProcessRecord],
) -> SyncStatus {
    let Some(state) = state else {
        return SyncStatus::NeverSynced;
    };
    let diagram_changed = document_fingerprint(document) != state.document_hash;
    let records_changed = records_fingerprint(records) != state.records_hash;
    match (diagram_changed, records_changed) {
        (true, true) => SyncStatus::BothChanged,
        (true, false) => SyncStatus::DiagramChanged,
        (false, true) => SyncStatus::RecordsChanged,
        (false, false) => SyncStatus::Current,
    }
}

/// Format age from a chrono timestamp (sync state `synced_at`).
pub fn format_datetime_age(timestamp: DateTime<Utc>) -> String {
    let now = Utc::now();
    let age = now.signed_duration_since(timestamp).num_seconds().max(0) as u64;
    format_seconds(age)
}

fn format_seconds(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}
