//! # zkl CLI Entry Point
//!
//! Assembles subcommands and dispatches to handler modules.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// ZK ledger toolchain: circuit type generation and maintenance.
#[derive(Parser, Debug)]
#[command(name = "zkl", version, about)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Generate Zinc sources from a schema.
    Generate(zkl_cli::generate::GenerateArgs),
    /// Print or write the structure tree of a schema.
    Structure(zkl_cli::structure::StructureArgs),
    /// Compare two structures and report breaking changes.
    Diff(zkl_cli::diff::DiffArgs),
    /// Check whether a circuit's compiled artifacts are still fresh.
    CacheCheck(zkl_cli::cache::CacheCheckArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(zkl_cli::log_level(cli.verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Generate(args) => zkl_cli::generate::run(args),
        Commands::Structure(args) => zkl_cli::structure::run(args),
        Commands::Diff(args) => zkl_cli::diff::run(args),
        Commands::CacheCheck(args) => zkl_cli::cache::run(args),
    };

    match result {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(zkl_cli::ERROR_EXIT_CODE)
        }
    }
}
