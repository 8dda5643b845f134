//! # Zinc Backend
//!
//! Drives the Zinc toolchain as external processes:
//!
//! | Phase  | Invocation |
//! |--------|------------|
//! | build  | `zargo build --manifest-path <Zargo.toml> --circuit <main.znb>` |
//! | setup  | `zvm setup --circuit <main.znb> --proving-key <pk> --verifying-key <vk>` |
//! | prove  | `zvm prove --circuit <main.znb> --proving-key <pk> --witness <w.json> --public-data <p.json>` |
//! | verify | `zvm verify --circuit <main.znb> --verifying-key <vk> --public-data <p.json> --proof <proof>` |
//!
//! `prove` prints the proof as hex on stdout. Witness, public data and proof
//! are staged in a scratch directory that is removed when the call returns.
//! Every invocation is bounded by its phase timeout from [`ZincConfig`].

use std::path::Path;
use std::process::Command;

use crate::cache::{self, SetupCoordinator, SetupStatus};
use crate::config::ZincConfig;
use crate::process::{run_with_timeout, Phase, ProcessError, ProcessOutput};
use crate::traits::{CircuitDescriptor, Proof, ProofError, ProofSystem, VerifyError};

/// A proof system backed by the Zinc toolchain.
#[derive(Debug, Default)]
pub struct ZincProofSystem {
    config: ZincConfig,
    setups: SetupCoordinator,
}

impl ZincProofSystem {
    pub fn new(config: ZincConfig) -> Self {
        Self {
            config,
            setups: SetupCoordinator::new(),
        }
    }

    pub fn config(&self) -> &ZincConfig {
        &self.config
    }

    /// In-process setup state of `circuit`.
    pub fn setup_status(&self, circuit: &CircuitDescriptor) -> SetupStatus {
        self.setups.status(&circuit.name)
    }

    fn run(&self, phase: Phase, command: &mut Command) -> Result<ProcessOutput, ProcessError> {
        run_with_timeout(phase, command, self.config.timeouts.for_phase(phase))
    }

    fn scratch_dir(&self) -> std::io::Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("zkl-zinc-");
        match &self.config.work_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                builder.tempdir_in(dir)
            }
            None => builder.tempdir(),
        }
    }

    fn build_and_setup(&self, circuit: &CircuitDescriptor) -> Result<(), ProofError> {
        let setup_err = |reason: String| ProofError::Setup {
            circuit: circuit.name.clone(),
            reason,
        };

        let status = cache::check_cache(circuit).map_err(|e| setup_err(e.to_string()))?;
        if status.is_valid() {
            tracing::debug!(circuit = %circuit.name, "reusing cached circuit artifacts");
            return Ok(());
        }
        tracing::info!(circuit = %circuit.name, reason = %status, "rebuilding circuit artifacts");

        // A half-written build must not look fresh if we are interrupted.
        cache::invalidate(circuit).map_err(|e| setup_err(e.to_string()))?;
        std::fs::create_dir_all(&circuit.build_dir)?;

        self.run(
            Phase::Build,
            Command::new(&self.config.zargo)
                .arg("build")
                .arg("--manifest-path")
                .arg(circuit.manifest_path())
                .arg("--circuit")
                .arg(circuit.circuit_path()),
        )?;
        self.run(
            Phase::Setup,
            Command::new(&self.config.zvm)
                .arg("setup")
                .arg("--circuit")
                .arg(circuit.circuit_path())
                .arg("--proving-key")
                .arg(circuit.proving_key_path())
                .arg("--verifying-key")
                .arg(circuit.verifying_key_path()),
        )?;

        let artifacts = circuit.artifact_paths();
        if let Some(missing) = artifacts.iter().find(|p| !p.exists()) {
            return Err(setup_err(format!(
                "toolchain did not produce {}",
                missing.display()
            )));
        }
        cache::write_metadata(circuit, &artifacts).map_err(|e| setup_err(e.to_string()))?;
        tracing::info!(circuit = %circuit.name, "circuit artifacts ready");
        Ok(())
    }
}

fn write_file(dir: &Path, name: &str, contents: &[u8]) -> std::io::Result<std::path::PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, contents)?;
    Ok(path)
}

impl ProofSystem for ZincProofSystem {
    fn setup(&self, circuit: &CircuitDescriptor) -> Result<(), ProofError> {
        self.setups
            .ensure_ready(&circuit.name, || self.build_and_setup(circuit))
    }

    fn prove(&self, circuit: &CircuitDescriptor, witness: &[u8]) -> Result<Proof, ProofError> {
        serde_json::from_slice::<serde_json::Value>(witness)
            .map_err(|e| ProofError::InvalidWitness(e.to_string()))?;
        self.setup(circuit)?;

        let scratch = self.scratch_dir()?;
        let witness_path = write_file(scratch.path(), "witness.json", witness)?;
        let public_path = scratch.path().join("public-data.json");

        let output = self.run(
            Phase::Prove,
            Command::new(&self.config.zvm)
                .arg("prove")
                .arg("--circuit")
                .arg(circuit.circuit_path())
                .arg("--proving-key")
                .arg(circuit.proving_key_path())
                .arg("--witness")
                .arg(&witness_path)
                .arg("--public-data")
                .arg(&public_path),
        )?;

        let proof = Proof::from_hex(output.stdout.trim())
            .map_err(|e| ProofError::GenerationFailed(format!("unreadable proof on stdout: {e}")))?;
        if proof.as_bytes().is_empty() {
            return Err(ProofError::GenerationFailed(format!(
                "prover printed no proof; stderr: {}",
                output.stderr.trim()
            )));
        }
        tracing::debug!(circuit = %circuit.name, proof_bytes = proof.as_bytes().len(), "proof generated");
        Ok(proof)
    }

    fn verify(
        &self,
        circuit: &CircuitDescriptor,
        proof: &Proof,
        public_input: &[u8],
    ) -> Result<(), VerifyError> {
        serde_json::from_slice::<serde_json::Value>(public_input)
            .map_err(|e| VerifyError::MalformedPublicInput(e.to_string()))?;
        self.setup(circuit)?;

        let scratch = self.scratch_dir()?;
        let public_path = write_file(scratch.path(), "public-data.json", public_input)?;
        let proof_path = write_file(scratch.path(), "proof", proof.to_hex().as_bytes())?;

        self.run(
            Phase::Verify,
            Command::new(&self.config.zvm)
                .arg("verify")
                .arg("--circuit")
                .arg(circuit.circuit_path())
                .arg("--verifying-key")
                .arg(circuit.verifying_key_path())
                .arg("--public-data")
                .arg(&public_path)
                .arg("--proof")
                .arg(&proof_path),
        )?;
        tracing::debug!(circuit = %circuit.name, "proof verified");
        Ok(())
    }
}
