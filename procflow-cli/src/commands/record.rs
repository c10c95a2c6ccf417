//! `procflow record add|list|preds|rm|find`
//!
//! Every graph mutation goes through the `procflow_sync` lifecycle helpers so
//! successor lists are re-derived before the command returns.

use std::collections::HashMap;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tabled::{settings::Style, Table, Tabled};

use procflow_core::{
    types::{ContainerId, ExternalId, NewRecord, ProcessRecord, RecordId},
    RecordStore,
};
use procflow_sync::{create_record, delete_record, set_predecessors};

use super::{home, load_config, open_store};

#[derive(Subcommand, Debug)]
pub enum RecordCommand {
    /// Add a record to a container.
    Add(AddArgs),

    /// List a container's records in display order.
    List(ListArgs),

    /// Replace a record's predecessor list. No ids clears it.
    Preds(PredsArgs),

    /// Delete a record.
    Rm(RmArgs),

    /// Find the record linked to a diagram element.
    Find(FindArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    pub container: String,

    /// Step name.
    pub name: String,

    /// Predecessor record id; repeat for several.
    #[arg(long = "after", value_name = "ID")]
    pub after: Vec<String>,

    /// Link the record to an existing diagram element.
    #[arg(long)]
    pub external_id: Option<String>,

    /// Display position; lower sorts first.
    #[arg(long, default_value_t = 0)]
    pub position: i64,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    pub container: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct PredsArgs {
    /// Record to edit.
    pub id: String,

    /// New predecessor ids, in order.
    pub predecessors: Vec<String>,
}

#[derive(Args, Debug)]
pub struct RmArgs {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct FindArgs {
    pub container: String,
    pub external_id: String,
}

pub fn run(cmd: RecordCommand) -> Result<()> {
    match cmd {
        RecordCommand::Add(args) => add(args),
        RecordCommand::List(args) => list(args),
        RecordCommand::Preds(args) => preds(args),
        RecordCommand::Rm(args) => rm(args),
        RecordCommand::Find(args) => find(args),
    }
}

fn add(args: AddArgs) -> Result<()> {
    let home = home()?;
    let mut store = open_store(&home)?;

    let mut record = NewRecord::new(ContainerId::from(args.container.clone()), args.name.clone())
        .with_predecessors(args.after.into_iter().map(RecordId::from).collect())
        .at_position(args.position);
    if let Some(external_id) = args.external_id {
        record = record.linked_to(ExternalId::from(external_id));
    }

    let id = create_record(&mut store, record)
        .with_context(|| format!("failed to add '{}' to '{}'", args.name, args.container))?;
    println!("✓ Added '{}' to '{}'", args.name, args.container);
    println!("  id: {id}");
    Ok(())
}

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "after")]
    after: String,
    #[tabled(rename = "before")]
    before: String,
    #[tabled(rename = "diagram element")]
    external_id: String,
}

fn list(args: ListArgs) -> Result<()> {
    let home = home()?;
    let store = open_store(&home)?;
    let container = ContainerId::from(args.container);
    let records = store
        .get_by_container(&container)
        .with_context(|| format!("failed to list records of '{container}'"))?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&records).context("failed to serialize records")?
        );
        return Ok(());
    }

    if records.is_empty() {
        println!("No records in '{container}'.");
        return Ok(());
    }

    let names: HashMap<&RecordId, &str> =
        records.iter().map(|r| (&r.id, r.name.as_str())).collect();
    let rows: Vec<RecordRow> = records
        .iter()
        .map(|r| RecordRow {
            id: r.id.0.clone(),
            name: r.name.clone(),
            after: join_names(&r.predecessor_ids, &names),
            before: join_names(&r.successor_ids, &names),
            external_id: r
                .external_element_id
                .as_ref()
                .map(|e| e.0.clone())
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

/// Ids that no longer resolve are shown as-is.
fn join_names(ids: &[RecordId], names: &HashMap<&RecordId, &str>) -> String {
    if ids.is_empty() {
        return "-".to_string();
    }
    ids.iter()
        .map(|id| names.get(id).map(|n| n.to_string()).unwrap_or_else(|| id.0.clone()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn preds(args: PredsArgs) -> Result<()> {
    let home = home()?;
    let config = load_config(&home)?;
    let mut store = open_store(&home)?;
    let id = RecordId::from(args.id);
    let predecessors: Vec<RecordId> = args.predecessors.into_iter().map(RecordId::from).collect();
    let count = predecessors.len();

    set_predecessors(&mut store, &id, predecessors, config.reject_cycles)
        .with_context(|| format!("failed to set predecessors of '{id}'"))?;
    println!("✓ '{id}' now has {count} predecessor(s)");
    Ok(())
}

fn rm(args: RmArgs) -> Result<()> {
    let home = home()?;
    let config = load_config(&home)?;
    let mut store = open_store(&home)?;
    let id = RecordId::from(args.id);

    delete_record(&mut store, &id, config.scrub_dangling_predecessors)
        .with_context(|| format!("failed to delete '{id}'"))?;
    println!("✓ Deleted '{id}'");
    Ok(())
}

fn find(args: FindArgs) -> Result<()> {
    let home = home()?;
    let store = open_store(&home)?;
    let container = ContainerId::from(args.container);
    let external_id = ExternalId::from(args.external_id);

    let record: ProcessRecord = store
        .find_by_external_id(&container, &external_id)
        .with_context(|| format!("failed to search '{container}'"))?
        .with_context(|| format!("no record in '{container}' is linked to '{external_id}'"))?;
    println!("{}\t{}", record.id, record.name);
    Ok(())
}
