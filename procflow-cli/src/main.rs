//! procflow — keep process records and flow diagrams in step.
//!
//! # Usage
//!
//! ```text
//! procflow init <container> [--name <display name>]
//! procflow list
//! procflow record add <container> <name> [--after <id>...] [--external-id <id>]
//! procflow record list <container> [--json]
//! procflow record preds <id> [<predecessor>...]
//! procflow record rm <id>
//! procflow record find <container> <external-id>
//! procflow sync pull|push <container> <diagram> [--policy <policy>] [--dry-run]
//! procflow diff <container> <diagram>
//! procflow status <container> <diagram> [--json]
//! procflow resolve <container> <diagram> <external-id> --prefer diagram|records|merge [--name <merged name>]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    diff::DiffArgs, init::InitArgs, record::RecordCommand, resolve::ResolveArgs,
    status::StatusArgs, sync::SyncCommand,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "procflow",
    version,
    about = "Synchronize process records with BPMN flow diagrams",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a container ledger under ~/.procflow/containers/.
    Init(InitArgs),

    /// List every container with its record count.
    List,

    /// Create, inspect, and delete process records.
    Record {
        #[command(subcommand)]
        command: RecordCommand,
    },

    /// Run one sync pass between a container and a diagram file.
    Sync {
        #[command(subcommand)]
        command: SyncCommand,
    },

    /// Show the unified diff a push would write to the diagram.
    Diff(DiffArgs),

    /// Show which side changed since the last sync.
    Status(StatusArgs),

    /// Settle one pending name conflict.
    Resolve(ResolveArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::List => commands::init::list(),
        Commands::Record { command } => commands::record::run(command),
        Commands::Sync { command } => commands::sync::run(command),
        Commands::Diff(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Resolve(args) => args.run(),
    }
}

/// Library crates log through the `log` facade; the subscriber picks those
/// records up. Output goes to stderr so `--json` stays parseable.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
