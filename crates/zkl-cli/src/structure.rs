//! # Structure Subcommand
//!
//! Emits the structure tree of a schema as JSON, the input of `diff`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use zkl_bfl::{SchemaDescriptor, ZkpStructureType};

use crate::Outcome;

/// Arguments for the structure subcommand.
#[derive(Args, Debug)]
pub struct StructureArgs {
    /// Schema file (YAML or JSON).
    #[arg(long)]
    pub schema: PathBuf,

    /// Write to this file instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Structure tree of the schema at `path`.
pub fn extract(path: &Path) -> anyhow::Result<Vec<ZkpStructureType>> {
    let schema =
        SchemaDescriptor::load(path).with_context(|| format!("loading schema {}", path.display()))?;
    schema.structure().context("building structure tree")
}

pub fn run(args: &StructureArgs) -> anyhow::Result<Outcome> {
    let structure = extract(&args.schema)?;
    let json = serde_json::to_string_pretty(&structure)?;
    match &args.out {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(classes = structure.len(), path = %path.display(), "wrote structure");
        }
        None => println!("{json}"),
    }
    Ok(Outcome::Success)
}
