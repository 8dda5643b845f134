//! # Proof System Trait (Sealed)
//!
//! The seam between the ledger and a zk-SNARK engine. The ledger hands a
//! backend a circuit descriptor plus the JSON-encoded witness and gets an
//! opaque [`Proof`] back; to verify it hands over the proof and the
//! JSON-encoded public input.
//!
//! ## Sealed Trait
//!
//! Only backends defined in this crate implement [`ProofSystem`]. Callers
//! pick a backend, they do not supply one.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use zkl_core::{from_hex, to_hex};

use crate::process::ProcessError;

/// Error during setup or proof generation.
#[derive(Error, Debug)]
pub enum ProofError {
    /// The witness is malformed or missing required members.
    #[error("invalid witness: {0}")]
    InvalidWitness(String),
    /// Circuit compilation or key generation failed.
    #[error("circuit setup failed for {circuit}: {reason}")]
    Setup { circuit: String, reason: String },
    /// Proof generation failed inside the backend.
    #[error("proof generation failed: {0}")]
    GenerationFailed(String),
    /// An external tool failed or timed out.
    #[error(transparent)]
    Process(#[from] ProcessError),
    /// Filesystem error while staging inputs or reading outputs.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error during proof verification.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// The proof bytes cannot be interpreted by this backend.
    #[error("malformed proof: {0}")]
    MalformedProof(String),
    /// The public input is not valid JSON for this circuit.
    #[error("malformed public input: {0}")]
    MalformedPublicInput(String),
    /// The proof is well-formed but does not verify against the public input.
    #[error("proof rejected for circuit {circuit}")]
    Rejected { circuit: String },
    /// Verifying-key preparation failed.
    #[error(transparent)]
    Setup(#[from] ProofError),
    /// An external tool failed or timed out.
    #[error(transparent)]
    Process(#[from] ProcessError),
    /// Filesystem error while staging inputs.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An opaque proof artifact. Serializes as a lowercase hex string.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Proof(Vec<u8>);

impl Proof {
    /// Wrap raw proof bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The raw proof bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Render as lowercase hex.
    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }

    /// Parse from hex.
    pub fn from_hex(hex: &str) -> Result<Self, VerifyError> {
        from_hex(hex)
            .map(Self)
            .map_err(|e| VerifyError::MalformedProof(e.to_string()))
    }
}

impl fmt::Debug for Proof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = &self.0[..self.0.len().min(8)];
        write!(f, "Proof({}.., {} bytes)", to_hex(head), self.0.len())
    }
}

impl Serialize for Proof {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Proof {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// Identifies a circuit and where its sources and compiled artifacts live.
///
/// A Zinc circuit project is a directory with a `Zargo.toml` manifest and a
/// `src/` tree. Build outputs (compiled circuit, proving key, verifying key,
/// cache metadata) go to `build_dir`, which defaults to `<source_dir>/data`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CircuitDescriptor {
    /// Stable circuit name. Mock proofs bind to it.
    pub name: String,
    /// Root of the circuit project.
    pub source_dir: PathBuf,
    /// Directory for compiled artifacts.
    pub build_dir: PathBuf,
}

impl CircuitDescriptor {
    /// Describe circuit `name` rooted at `source_dir`, building into
    /// `<source_dir>/data`.
    pub fn new(name: impl Into<String>, source_dir: impl Into<PathBuf>) -> Self {
        let source_dir = source_dir.into();
        let build_dir = source_dir.join("data");
        Self {
            name: name.into(),
            source_dir,
            build_dir,
        }
    }

    /// Override the build directory.
    pub fn with_build_dir(mut self, build_dir: impl Into<PathBuf>) -> Self {
        self.build_dir = build_dir.into();
        self
    }

    /// The project manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.source_dir.join("Zargo.toml")
    }

    /// The compiled circuit.
    pub fn circuit_path(&self) -> PathBuf {
        self.build_dir.join("main.znb")
    }

    pub fn proving_key_path(&self) -> PathBuf {
        self.build_dir.join("proving_key")
    }

    pub fn verifying_key_path(&self) -> PathBuf {
        self.build_dir.join("verifying_key.txt")
    }

    /// Every artifact setup produces, in the order they are written.
    pub fn artifact_paths(&self) -> Vec<PathBuf> {
        vec![
            self.circuit_path(),
            self.proving_key_path(),
            self.verifying_key_path(),
        ]
    }

    /// Whether `path` lies inside the build directory.
    pub fn is_build_output(&self, path: &Path) -> bool {
        path.starts_with(&self.build_dir)
    }
}

/// Sealing marker. Not reachable outside this crate.
mod private {
    pub trait Sealed {}
}

/// A zero-knowledge proof backend.
///
/// Witness and public input travel as JSON bytes so the trait stays
/// independent of the ledger's types. `Send + Sync` so one backend instance
/// can serve concurrent provers and verifiers.
pub trait ProofSystem: private::Sealed + Send + Sync {
    /// Make the circuit ready for proving and verifying: compile it and
    /// generate keys if the cached artifacts are missing or stale.
    ///
    /// Concurrent calls for the same circuit must not run setup twice.
    fn setup(&self, circuit: &CircuitDescriptor) -> Result<(), ProofError>;

    /// Prove that `witness` satisfies `circuit`.
    ///
    /// # Errors
    ///
    /// [`ProofError::InvalidWitness`] when the witness is not valid JSON or
    /// lacks its public input; other variants for backend failures.
    fn prove(&self, circuit: &CircuitDescriptor, witness: &[u8]) -> Result<Proof, ProofError>;

    /// Verify `proof` against `public_input`. `Ok(())` means accepted.
    fn verify(
        &self,
        circuit: &CircuitDescriptor,
        proof: &Proof,
        public_input: &[u8],
    ) -> Result<(), VerifyError>;
}

impl private::Sealed for crate::mock::MockProofSystem {}
impl private::Sealed for crate::zinc::ZincProofSystem {}

impl<T: ProofSystem + ?Sized> private::Sealed for std::sync::Arc<T> {}

impl<T: ProofSystem + ?Sized> ProofSystem for std::sync::Arc<T> {
    fn setup(&self, circuit: &CircuitDescriptor) -> Result<(), ProofError> {
        (**self).setup(circuit)
    }

    fn prove(&self, circuit: &CircuitDescriptor, witness: &[u8]) -> Result<Proof, ProofError> {
        (**self).prove(circuit, witness)
    }

    fn verify(
        &self,
        circuit: &CircuitDescriptor,
        proof: &Proof,
        public_input: &[u8],
    ) -> Result<(), VerifyError> {
        (**self).verify(circuit, proof, public_input)
    }
}
