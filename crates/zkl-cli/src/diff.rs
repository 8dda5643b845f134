//! # Diff Subcommand
//!
//! Compares two structures and lists the differences, breaking ones first.
//! Either side may be a structure JSON file or a schema (`.yaml`/`.yml`).

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use zkl_bfl::{diff_structures, StructureDifference, ZkpStructureType};

use crate::Outcome;

/// Arguments for the diff subcommand.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// The structure in use.
    pub old: PathBuf,

    /// The proposed structure.
    pub new: PathBuf,
}

fn load(path: &Path) -> anyhow::Result<Vec<ZkpStructureType>> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => crate::structure::extract(path),
        _ => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
        }
    }
}

/// Differences between the two structures, breaking ones first.
pub fn compare(old: &Path, new: &Path) -> anyhow::Result<Vec<StructureDifference>> {
    let mut differences = diff_structures(&load(old)?, &load(new)?);
    differences.sort_by_key(|d| !d.is_breaking());
    Ok(differences)
}

pub fn run(args: &DiffArgs) -> anyhow::Result<Outcome> {
    let differences = compare(&args.old, &args.new)?;
    let breaking = differences.iter().filter(|d| d.is_breaking()).count();
    for d in &differences {
        let label = if d.is_breaking() { "breaking" } else { "compatible" };
        println!("{label}: {d}");
    }
    tracing::info!(differences = differences.len(), breaking, "compared structures");
    if breaking > 0 {
        Ok(Outcome::Failure)
    } else {
        Ok(Outcome::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "classes:\n  - name: Cash\n    serialization_id: 1\n    fields:\n      - { name: amount, type: u32 }\n";

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn added_class_is_compatible() {
        let dir = tempfile::tempdir().unwrap();
        let old = write(dir.path(), "old.yaml", BASE);
        let new = write(
            dir.path(),
            "new.yaml",
            &format!("{BASE}  - name: Note\n    fields:\n      - {{ name: text, type: \"string<4>\" }}\n"),
        );
        let args = DiffArgs { old, new };
        assert_eq!(compare(&args.old, &args.new).unwrap().len(), 1);
        assert_eq!(run(&args).unwrap(), Outcome::Success);
    }

    #[test]
    fn widened_field_is_breaking() {
        let dir = tempfile::tempdir().unwrap();
        let old = write(dir.path(), "old.yaml", BASE);
        let new = write(dir.path(), "new.yaml", &BASE.replace("u32", "u64"));
        let args = DiffArgs { old, new };
        let differences = compare(&args.old, &args.new).unwrap();
        assert!(differences[0].is_breaking());
        assert_eq!(run(&args).unwrap(), Outcome::Failure);
    }

    #[test]
    fn structure_json_and_schema_inputs_mix() {
        let dir = tempfile::tempdir().unwrap();
        let schema = write(dir.path(), "cash.yaml", BASE);
        let json = serde_json::to_string(&crate::structure::extract(&schema).unwrap()).unwrap();
        let structure = write(dir.path(), "cash.json", &json);
        assert!(compare(&structure, &schema).unwrap().is_empty());
        assert!(compare(&dir.path().join("missing.json"), &schema).is_err());
    }
}
