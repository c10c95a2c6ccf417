//! `procflow status` — which side moved since the last pass.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use procflow_core::types::ContainerId;
use procflow_sync::{
    pipeline::{self, StatusReport},
    staleness::format_datetime_age,
    SyncConflict, SyncStatus,
};

use super::{home, open_store};

/// Arguments for `procflow status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    pub container: String,

    /// Path to the BPMN diagram file.
    pub diagram: PathBuf,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct StatusJson<'a> {
    container: &'a str,
    diagram: String,
    status: SyncStatus,
    detail: &'static str,
    last_sync_at: Option<String>,
    last_sync_age: String,
    pending_conflicts: &'a [SyncConflict],
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let store = open_store(&home)?;
        let container = ContainerId::from(self.container.clone());

        let report = pipeline::status(&home, &store, &container, &self.diagram)
            .with_context(|| format!("status check failed for '{container}'"))?;

        if self.json {
            print_json(&self.container, &self.diagram, &report)?;
        } else {
            print_text(&self.container, &self.diagram, &report);
        }
        Ok(())
    }
}

fn last_sync_age(report: &StatusReport) -> String {
    report
        .synced_at
        .map(format_datetime_age)
        .unwrap_or_else(|| "never".to_string())
}

fn print_json(container: &str, diagram: &std::path::Path, report: &StatusReport) -> Result<()> {
    let payload = StatusJson {
        container,
        diagram: diagram.display().to_string(),
        status: report.status,
        detail: report.status.suggestion(),
        last_sync_at: report.synced_at.map(|t| t.to_rfc3339()),
        last_sync_age: last_sync_age(report),
        pending_conflicts: &report.pending_conflicts,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_text(container: &str, diagram: &std::path::Path, report: &StatusReport) {
    println!(
        "{} {}  {} ↔ {}",
        status_indicator(report.status),
        status_label(report.status),
        container.bold(),
        diagram.display(),
    );
    println!("  last sync: {}", last_sync_age(report));
    println!("  next: {}", report.status.suggestion());

    if !report.pending_conflicts.is_empty() {
        println!();
        println!(
            "{} ({})",
            "Pending conflicts".yellow().bold(),
            report.pending_conflicts.len()
        );
        for conflict in &report.pending_conflicts {
            println!("  !  {}", conflict.message);
        }
    }
}

fn status_indicator(status: SyncStatus) -> String {
    match status {
        SyncStatus::Current => "●".green().to_string(),
        SyncStatus::DiagramChanged | SyncStatus::RecordsChanged => "●".yellow().to_string(),
        SyncStatus::BothChanged => "●".red().to_string(),
        SyncStatus::NeverSynced => "○".bright_black().to_string(),
    }
}

fn status_label(status: SyncStatus) -> String {
    status.to_string().to_uppercase()
}
