//! # Ledger Error Types
//!
//! One enum per failure class, aggregated by [`LedgerError`]:
//!
//! - [`CommitmentError`]: a filtered commitment that cannot exist (gap or
//!   overlap between visible and hidden indices, length mismatch, hidden
//!   chain components). Construction defects; never retried.
//! - [`ResolutionError`]: ancestor data missing from storage. The caller may
//!   backfill and retry.
//! - [`VerificationError`]: the transaction is rejected (root mismatch, proof
//!   rejected, UTXO hash mismatch, bad signature).
//!
//! External-process failures arrive wrapped in [`ProofError`] or
//! [`VerifyError`] and keep their captured output.

use thiserror::Error;

use zkl_core::{CanonicalizationError, ComponentGroupEnum, CoreError, SecureHash, StateRef};
use zkl_crypto::{CryptoError, Ed25519PublicKey};
use zkl_zkp::{ProofError, VerifyError};

/// A filtered component group or verifier transaction that violates its
/// structural invariants.
#[derive(Error, Debug)]
pub enum CommitmentError {
    /// Visible and hidden indices do not exactly cover `0..n`.
    #[error("malformed partition in group {group_index}: {reason}")]
    MalformedPartition { group_index: u32, reason: String },

    /// `components` and `nonces` differ in length.
    #[error("group {group_index} has {components} visible components but {nonces} nonces")]
    ComponentCountMismatch {
        group_index: u32,
        components: usize,
        nonces: usize,
    },

    /// Nonces or hashes in one commitment use different digest algorithms.
    #[error("group {group_index} mixes digest algorithms: expected {expected}, found {found}")]
    MixedAlgorithms {
        group_index: u32,
        expected: String,
        found: String,
    },

    /// Inputs and references must stay visible so the chain can be walked.
    #[error("{group} component {index} must be public in a verifier transaction")]
    HiddenChainComponent {
        group: ComponentGroupEnum,
        index: u32,
    },

    /// Two groups share one index.
    #[error("duplicate component group index {0}")]
    DuplicateGroup(u32),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Data needed to resolve a transaction's ancestry is missing.
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// The referenced transaction is not in storage.
    #[error("transaction not found: {0}")]
    TransactionNotFound(SecureHash),

    /// No UTXO info is recorded for the state reference.
    #[error("UTXO info not found for state {0}")]
    UtxoNotFound(StateRef),

    /// The ancestor exists but has fewer outputs than the reference needs.
    #[error("output index {index} out of range for transaction {tx_id} ({outputs} outputs)")]
    OutputIndexOutOfRange {
        tx_id: SecureHash,
        index: u32,
        outputs: usize,
    },

    /// The dependency graph loops back on itself.
    #[error("dependency cycle through transaction {0}")]
    DependencyCycle(SecureHash),
}

/// The transaction is rejected.
#[derive(Error, Debug)]
pub enum VerificationError {
    /// The filtered groups do not hash to the transaction id.
    #[error("Merkle root mismatch for transaction {tx_id}: recomputed {computed}")]
    MerkleRootMismatch {
        tx_id: SecureHash,
        computed: SecureHash,
    },

    /// The circuit verifier did not accept the proof.
    #[error("proof for command {command} of transaction {tx_id} rejected: {reason}")]
    ProofRejected {
        tx_id: SecureHash,
        command: String,
        reason: String,
    },

    /// A verifier transaction carries no proofs at all.
    #[error("transaction {0} carries no proofs")]
    NoProofs(SecureHash),

    /// Recomputing a state's leaf hash from its nonce and bytes gave a
    /// different value than the committed output hash.
    #[error("UTXO hash mismatch for state {state_ref}: committed {expected}, recomputed {actual}")]
    UtxoHashMismatch {
        state_ref: StateRef,
        expected: SecureHash,
        actual: SecureHash,
    },

    /// The plaintext transaction does not hash to the id it claims.
    #[error("transaction id mismatch: expected {expected}, computed {actual}")]
    TransactionIdMismatch {
        expected: SecureHash,
        actual: SecureHash,
    },

    /// A signature does not verify.
    #[error("invalid signature by {signer} on transaction {tx_id}: {reason}")]
    SignatureInvalid {
        tx_id: SecureHash,
        signer: Ed25519PublicKey,
        reason: String,
    },

    /// A required signer did not sign.
    #[error("transaction {tx_id} is missing a signature by {signer}")]
    MissingSignature {
        tx_id: SecureHash,
        signer: Ed25519PublicKey,
    },
}

/// Top-level error for the ledger core.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)]
    Commitment(#[from] CommitmentError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// Setup defects: unknown command, too many inputs for the circuit,
    /// missing filler state.
    #[error("structural error: {0}")]
    Structural(String),

    /// A component could not be decoded.
    #[error("encoding error: {0}")]
    Encoding(#[from] CoreError),

    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Proving failed, including toolchain failures and timeouts.
    #[error("prover error: {0}")]
    Prover(#[from] ProofError),

    /// Verification could not run, including toolchain failures and timeouts.
    #[error("verifier error: {0}")]
    Verifier(#[from] VerifyError),
}

impl LedgerError {
    /// Whether the error is missing data rather than a rejection.
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution(_))
    }

    /// Whether the transaction (or one of its ancestors) was rejected.
    pub fn is_verification(&self) -> bool {
        matches!(self, Self::Verification(_))
    }
}
