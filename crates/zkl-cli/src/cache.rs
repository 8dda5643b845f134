//! # Cache-Check Subcommand
//!
//! Reports whether a circuit's compiled artifacts can be reused or setup
//! has to run again.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use zkl_zkp::{cache, CircuitDescriptor};

use crate::Outcome;

/// Arguments for the cache-check subcommand.
#[derive(Args, Debug)]
pub struct CacheCheckArgs {
    /// Root of the circuit project.
    #[arg(long)]
    pub circuit: PathBuf,

    /// Build directory; `<circuit>/data` when omitted.
    #[arg(long)]
    pub build_dir: Option<PathBuf>,
}

impl CacheCheckArgs {
    fn descriptor(&self) -> CircuitDescriptor {
        let name = self
            .circuit
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.circuit.display().to_string());
        let descriptor = CircuitDescriptor::new(name, &self.circuit);
        match &self.build_dir {
            Some(dir) => descriptor.with_build_dir(dir),
            None => descriptor,
        }
    }
}

pub fn run(args: &CacheCheckArgs) -> anyhow::Result<Outcome> {
    let circuit = args.descriptor();
    let status = cache::check_cache(&circuit)
        .with_context(|| format!("checking artifacts of {}", circuit.name))?;
    println!("{}: {status}", circuit.name);
    if status.is_valid() {
        Ok(Outcome::Success)
    } else {
        Ok(Outcome::Failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_until_metadata_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let circuit = dir.path().join("move_cash");
        std::fs::create_dir_all(circuit.join("src")).unwrap();
        std::fs::write(circuit.join("src/main.zn"), "fn main() {}\n").unwrap();
        let args = CacheCheckArgs {
            circuit: circuit.clone(),
            build_dir: None,
        };
        assert_eq!(run(&args).unwrap(), Outcome::Failure);

        let descriptor = args.descriptor();
        assert_eq!(descriptor.name, "move_cash");
        assert_eq!(descriptor.build_dir, circuit.join("data"));
        cache::write_metadata(&descriptor, &[]).unwrap();
        assert_eq!(run(&args).unwrap(), Outcome::Success);
    }
}
