//! `procflow diff <container> <diagram>` — what a push would write.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use procflow_core::types::{ConflictPolicy, ContainerId};
use procflow_sync::pipeline;

use super::sync::print_sections;
use super::{home, load_config, open_store};

/// Arguments for `procflow diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    pub container: String,

    /// Path to the BPMN diagram file.
    pub diagram: PathBuf,

    /// Policy the previewed push runs under.
    #[arg(long, value_name = "POLICY")]
    pub policy: Option<ConflictPolicy>,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let config = load_config(&home)?;
        let mut store = open_store(&home)?;
        let container = ContainerId::from(self.container);
        let policy = self.policy.unwrap_or(config.default_policy);

        let preview = pipeline::preview(&mut store, &container, &self.diagram, policy)
            .with_context(|| format!("diff failed for '{container}'"))?;

        if preview.is_empty() {
            println!("No differences for '{container}'.");
        } else {
            print!("{}", preview.unified_diff);
            if !preview.unified_diff.ends_with('\n') {
                println!();
            }
        }
        print_sections(&preview.result, &self.diagram);

        if !preview.result.success {
            bail!("diff of '{container}' could not be computed");
        }
        Ok(())
    }
}
