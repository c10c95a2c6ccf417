//! `procflow sync pull|push` — one pass between a container and a diagram.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use procflow_core::types::{ConflictPolicy, ContainerId};
use procflow_sync::{
    pipeline::{self, PassOutcome},
    SyncDirection, SyncOptions, SyncResult,
};

use super::{home, load_config, open_store};

#[derive(Subcommand, Debug)]
pub enum SyncCommand {
    /// Diagram -> records: create, rename, or delete records.
    Pull(PassArgs),

    /// Records -> diagram: insert, relabel, or remove task nodes.
    Push(PassArgs),
}

/// Arguments shared by both directions.
#[derive(Args, Debug)]
pub struct PassArgs {
    pub container: String,

    /// Path to the BPMN diagram file.
    pub diagram: PathBuf,

    /// diagram-priority | record-priority | manual. Defaults to the
    /// `default_policy` in ~/.procflow/config.yaml.
    #[arg(long, value_name = "POLICY")]
    pub policy: Option<ConflictPolicy>,

    /// Show what would change without writing anything.
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(cmd: SyncCommand) -> Result<()> {
    match cmd {
        SyncCommand::Pull(args) => pass(args, SyncDirection::DiagramToRecords),
        SyncCommand::Push(args) => pass(args, SyncDirection::RecordsToDiagram),
    }
}

fn pass(args: PassArgs, direction: SyncDirection) -> Result<()> {
    let home = home()?;
    let config = load_config(&home)?;
    let mut store = open_store(&home)?;
    let container = ContainerId::from(args.container);

    let mut options = SyncOptions::from_config(&config).dry_run(args.dry_run);
    if let Some(policy) = args.policy {
        options = options.with_policy(policy);
    }
    tracing::debug!("sync {direction} of '{container}' with {options:?}");

    let outcome = pipeline::run(
        &home,
        &mut store,
        &container,
        &args.diagram,
        direction,
        &options,
    )
    .with_context(|| format!("sync {direction} failed for '{container}'"))?;

    print_outcome(&outcome, &args.diagram);

    if !outcome.result.success {
        bail!(
            "sync {direction} of '{container}' finished with {} error(s)",
            outcome.result.errors.len()
        );
    }
    Ok(())
}

fn print_outcome(outcome: &PassOutcome, diagram: &std::path::Path) {
    let result = &outcome.result;
    let prefix = if result.dry_run { "[dry-run] " } else { "" };
    let mark = if result.success { "✓".green() } else { "✗".red() };

    println!(
        "{prefix}{mark} '{}' {} ({} applied, {} conflict(s))",
        result.container_id,
        result.direction,
        result.applied_count,
        result.conflicts.len(),
    );
    for action in &result.actions {
        println!("  ·  {action}");
    }
    if outcome.document_written {
        println!("  ✎  {}", diagram.display());
    }

    print_sections(result, diagram);
}

/// One section per non-empty report list.
pub(crate) fn print_sections(result: &SyncResult, diagram: &std::path::Path) {
    if !result.orphaned.is_empty() {
        println!();
        println!("{} ({})", "Orphaned".yellow().bold(), result.orphaned.len());
        for id in &result.orphaned {
            println!("  -  {id}");
        }
    }

    if !result.conflicts.is_empty() {
        println!();
        println!("{} ({})", "Conflicts".yellow().bold(), result.conflicts.len());
        for conflict in &result.conflicts {
            println!("  !  {}", conflict.message);
            println!(
                "     procflow resolve {} {} {} --prefer diagram|records|merge [--name <merged name>]",
                result.container_id,
                diagram.display(),
                conflict.external_element_id
            );
        }
    }

    if !result.errors.is_empty() {
        println!();
        println!("{} ({})", "Errors".red().bold(), result.errors.len());
        for error in &result.errors {
            println!("  ✗  {error}");
        }
    }
}
