//! # zkl-zkp — Prover/Verifier Abstraction
//!
//! The ledger core treats the zk-SNARK engine as an opaque collaborator:
//! `prove(witness) -> proof` and `verify(proof, public_input)`. This crate
//! defines that seam and its backends.
//!
//! ## Architecture
//!
//! - **Traits** (`traits.rs`): the sealed [`ProofSystem`] trait plus
//!   [`Proof`] and [`CircuitDescriptor`].
//! - **Mock** (`mock.rs`): [`MockProofSystem`], deterministic SHA-256
//!   "proofs" that bind a circuit name to the canonical public input. No
//!   zero-knowledge guarantees; used in tests and local development.
//! - **Zinc** (`zinc.rs`): [`ZincProofSystem`], which shells out to the Zinc
//!   toolchain for build, setup, prove and verify. Each phase has its own
//!   timeout (`config.rs`); expiry kills the process (`process.rs`).
//! - **Artifact cache** (`cache.rs`): the on-disk metadata file that decides
//!   whether compiled circuits and keys are still fresh, and the in-process
//!   coordinator that makes concurrent setup requests for one circuit wait for
//!   the first.

pub mod cache;
pub mod config;
pub mod mock;
pub mod process;
pub mod traits;
pub mod zinc;

// Re-export primary types.
pub use cache::{CacheError, CacheStatus, SetupCoordinator, SetupStatus, METADATA_FILE_NAME};
pub use config::{ConfigError, PhaseTimeouts, ZincConfig};
pub use mock::MockProofSystem;
pub use process::{Phase, ProcessError, ProcessOutput};
pub use traits::{CircuitDescriptor, Proof, ProofError, ProofSystem, VerifyError};
pub use zinc::ZincProofSystem;
