//! # zkl-core — Foundational Types for the ZK Ledger Stack
//!
//! This crate is the leaf of the workspace dependency graph. It defines the
//! value types every other crate agrees on bit-for-bit:
//!
//! 1. **`SecureHash`** — a 32-byte digest tagged with the [`DigestAlgorithm`]
//!    that produced it. Transaction ids, Merkle roots, nonces and component
//!    leaf hashes are all `SecureHash` values.
//!
//! 2. **`CanonicalBytes`** — the single construction path for bytes derived
//!    from serde-serializable values (sorted keys, compact separators, no
//!    floats). Used wherever a structured value must be hashed or signed.
//!
//! 3. **`StateRef`** — a pointer to one output of a prior transaction, with a
//!    fixed 36-byte wire encoding.
//!
//! 4. **`ComponentGroupEnum`** — the fixed ordinal of every component group in
//!    a transaction.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `zkl-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod component;
pub mod digest;
pub mod error;
pub mod identity;

// Re-export primary types for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use component::ComponentGroupEnum;
pub use digest::{from_hex, to_hex, DigestAlgorithm, SecureHash, HASH_LENGTH};
pub use error::{CanonicalizationError, CoreError};
pub use identity::StateRef;
