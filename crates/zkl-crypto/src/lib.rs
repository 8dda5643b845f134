//! # zkl-crypto — Cryptographic Primitives for the ZK Ledger Stack
//!
//! - **Merkle trees** ([`merkle`]) over algorithm-tagged leaf hashes, padded
//!   with the zero hash to a power of two. Used at both levels of the
//!   transaction commitment: per component group and over the group roots.
//! - **Component commitments** ([`commitment`]): the privacy salt, per
//!   component nonces `H(salt || group || index)` and leaf hashes
//!   `H(nonce || bytes)`.
//! - **Ed25519** ([`ed25519`]) key pairs, public keys and signatures over
//!   [`CanonicalBytes`](zkl_core::CanonicalBytes).
//!
//! ## Crate Policy
//!
//! - Depends only on `zkl-core` internally.
//! - No mocking of cryptographic operations in tests.

pub mod commitment;
pub mod ed25519;
pub mod error;
pub mod merkle;

// Re-export primary types.
pub use commitment::{component_hash, compute_nonce, PrivacySalt};
pub use ed25519::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
pub use error::CryptoError;
pub use merkle::MerkleTree;
