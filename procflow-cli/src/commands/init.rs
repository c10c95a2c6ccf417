//! `procflow init <container> [--name ...]` and `procflow list`

use anyhow::{Context, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use procflow_core::{ledger, types::ContainerId};

use super::home;

/// Create a container ledger.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Container id (e.g. "orders"). Becomes
    /// ~/.procflow/containers/<container>.yaml
    pub container: String,

    /// Display name; defaults to the container id.
    #[arg(long, short = 'n')]
    pub name: Option<String>,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let name = self.name.unwrap_or_else(|| self.container.clone());
        let ledger = ledger::init_container_at(&home, ContainerId::from(self.container.clone()), name)
            .with_context(|| format!("failed to init container '{}'", self.container))?;

        println!(
            "✓ Initialized container '{}' ({})",
            ledger.container.id, ledger.container.name
        );
        println!("  Saved to: ~/.procflow/containers/{}.yaml", ledger.container.id);
        Ok(())
    }
}

#[derive(Tabled)]
struct ContainerRow {
    #[tabled(rename = "container")]
    id: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "records")]
    records: usize,
    #[tabled(rename = "linked")]
    linked: usize,
}

pub fn list() -> Result<()> {
    let home = home()?;
    let ledgers = ledger::list_containers_at(&home).context("failed to load container ledgers")?;

    if ledgers.is_empty() {
        println!("No containers yet.");
        println!("Run: procflow init <container>");
        return Ok(());
    }

    let rows: Vec<ContainerRow> = ledgers
        .into_iter()
        .map(|l| ContainerRow {
            id: l.container.id.0,
            name: l.container.name,
            records: l.records.len(),
            linked: l.records.iter().filter(|r| r.is_linked()).count(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}
