//! # Cryptographic Error Types
//!
//! Structured errors for all cryptographic operations in `zkl-crypto`.

use thiserror::Error;

use zkl_core::CoreError;

/// Errors from cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Ed25519 signature verification failed.
    #[error("Ed25519 verification failed: {0}")]
    VerificationFailed(String),

    /// Invalid Ed25519 signature length.
    #[error("invalid Ed25519 signature length: expected 64 bytes, got {0}")]
    InvalidSignatureLength(usize),

    /// Invalid Ed25519 public key.
    #[error("invalid Ed25519 public key: {0}")]
    InvalidPublicKey(String),

    /// The privacy salt is malformed (wrong length or all zeros).
    #[error("invalid privacy salt: {0}")]
    InvalidPrivacySalt(String),

    /// Merkle leaves hashed with different algorithms were mixed.
    #[error("Merkle leaves must share one digest algorithm: expected {expected}, found {found}")]
    MixedAlgorithms {
        /// Algorithm of the tree.
        expected: String,
        /// Algorithm of the offending leaf.
        found: String,
    },

    /// Underlying value-type error (hex decoding, lengths).
    #[error(transparent)]
    Core(#[from] CoreError),
}
