//! `procflow resolve <container> <diagram> <external-id> --prefer ...`

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use procflow_core::types::{ContainerId, ExternalId};
use procflow_sync::{pipeline, ConflictDecision, Resolution, SyncConflict};

use super::{home, open_store};

/// Arguments for `procflow resolve`.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    pub container: String,

    /// Path to the BPMN diagram file.
    pub diagram: PathBuf,

    /// Diagram element id of the conflicting task.
    pub external_id: String,

    /// diagram | records | merge
    #[arg(long, value_name = "SIDE")]
    pub prefer: ConflictDecision,

    /// Name both sides take with `--prefer merge`.
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,
}

impl ResolveArgs {
    pub fn run(self) -> Result<()> {
        if self.name.is_some() && self.prefer != ConflictDecision::Merge {
            bail!("--name only applies to --prefer merge");
        }

        let home = home()?;
        let mut store = open_store(&home)?;
        let container = ContainerId::from(self.container);
        let external_id = ExternalId::from(self.external_id);

        let resolution = match self.name {
            Some(name) => {
                let hook = move |_: &SyncConflict| Some(name.clone());
                pipeline::resolve_file_with_hook(
                    &mut store,
                    &container,
                    &self.diagram,
                    &external_id,
                    self.prefer,
                    &hook,
                )
            }
            None => pipeline::resolve_file(
                &mut store,
                &container,
                &self.diagram,
                &external_id,
                self.prefer,
            ),
        }
        .with_context(|| format!("failed to resolve '{external_id}' in '{container}'"))?;

        match resolution {
            Resolution::RecordRenamed { name } => {
                println!("✓ Record for '{external_id}' renamed to \"{name}\"");
            }
            Resolution::DocumentRelabeled { .. } => {
                println!("✓ Diagram node '{external_id}' relabelled");
                println!("  ✎  {}", self.diagram.display());
            }
            Resolution::Merged { name, .. } => {
                println!("✓ '{external_id}' is now \"{name}\" on both sides");
                println!("  ✎  {}", self.diagram.display());
            }
            Resolution::Deferred(conflict) => {
                println!("Conflict left open: {}", conflict.message);
                println!("  pass --name <merged name> to merge");
            }
        }
        Ok(())
    }
}
