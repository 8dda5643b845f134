//! # zkl-ledger — Ledger Verification Core
//!
//! Commitments over transaction components, their filtered verifier form, and
//! the backward-chain protocol that proves and verifies a transaction
//! together with its ancestry.
//!
//! ## Architecture
//!
//! - **Plain transactions** (`transaction.rs`): [`WireTransaction`] and its
//!   typed builder. The id is a two-level Merkle root over nonce-salted
//!   component leaves.
//! - **Filtering** (`visibility.rs`, `filtered.rs`): a [`VisibilityPolicy`]
//!   splits every group into visible components and hidden leaf hashes
//!   ([`ZkFilteredComponentGroup`]) without changing the group root.
//! - **Verifier transactions** (`verifier_tx.rs`): [`ZkVerifierTransaction`]
//!   re-derives the id from filtered groups; [`SignedZkVerifierTransaction`]
//!   adds Ed25519 signatures.
//! - **Proving inputs** (`utxo.rs`, `public_input.rs`, `witness.rs`,
//!   `metadata.rs`): output openings, padded public inputs, witnesses and
//!   per-command circuit configuration.
//! - **Chain protocol** (`chain.rs`): [`ChainProver`] and [`ChainVerifier`]
//!   over the storage collaborators in `storage.rs`.
//!
//! ## Crate Policy
//!
//! - Structural defects are returned as typed errors, never panics.
//! - Prover and verifier derive public inputs through the same function.

pub mod chain;
pub mod error;
pub mod filtered;
pub mod metadata;
pub mod public_input;
pub mod storage;
pub mod transaction;
pub mod utxo;
pub mod verifier_tx;
pub mod visibility;
pub mod witness;

mod encoding;

// Re-export primary types.
pub use chain::{collect_dependencies, direct_dependencies, ChainProver, ChainVerifier};
pub use error::{CommitmentError, LedgerError, ResolutionError, VerificationError};
pub use filtered::ZkFilteredComponentGroup;
pub use metadata::{CommandMetadata, MetadataRegistry, TransactionMetadata, ZkTransactionBuilder};
pub use public_input::{
    build_public_input, filler_hash, pad_slots, PaddedSlot, PublicInput, PublicInputSlot,
};
pub use storage::{
    InMemoryStore, LedgerStores, TransactionStorage, UtxoStorage, ZkTransactionStorage,
};
pub use transaction::{
    Command, ComponentGroup, TimeWindow, TransactionComponents, TransactionState, WireTransaction,
};
pub use utxo::UtxoInfo;
pub use verifier_tx::{
    OutputCommitment, SignedZkVerifierTransaction, TransactionSignature, ZkVerifierTransaction,
};
pub use visibility::{ComponentOverride, VisibilityPolicy};
pub use witness::Witness;
