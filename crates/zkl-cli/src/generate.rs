//! # Generate Subcommand
//!
//! Writes one Zinc source file per module reachable from a schema.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use zkl_bfl::{SchemaDescriptor, ZincGenerator};

use crate::Outcome;

/// Arguments for the generate subcommand.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Schema file (YAML or JSON).
    #[arg(long)]
    pub schema: PathBuf,

    /// Directory receiving the `.zn` files.
    #[arg(long)]
    pub out: PathBuf,

    /// Transaction component context to emit a deserializer for; repeatable.
    /// Defaults to `witness`.
    #[arg(long = "context")]
    pub contexts: Vec<String>,
}

pub fn run(args: &GenerateArgs) -> anyhow::Result<Outcome> {
    let schema = SchemaDescriptor::load(&args.schema)
        .with_context(|| format!("loading schema {}", args.schema.display()))?;
    let modules = schema.modules().context("resolving schema types")?;
    let generator = ZincGenerator::new(args.contexts.clone()).context("invalid context name")?;
    let written = generator
        .write_all(&modules, &args.out)
        .with_context(|| format!("writing sources to {}", args.out.display()))?;
    tracing::info!(files = written.len(), out = %args.out.display(), "generated zinc sources");
    for path in written {
        println!("{}", path.display());
    }
    Ok(Outcome::Success)
}
