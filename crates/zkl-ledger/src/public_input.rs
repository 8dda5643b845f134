//! # Public Input and Padding
//!
//! Circuits take a fixed number of input and reference slots. A transaction
//! with fewer fills the rest with [`PaddedSlot::Filler`]. The public input
//! carries, per slot, the committed leaf hash of the state it points at and
//! the nonce when the creating transaction left that output visible:
//!
//! - original slot: nonce and hash from the ancestor's verifier transaction;
//! - filler slot: zero nonce, hash `H(zero || filler_state_bytes)`.
//!
//! Prover and verifier both build it through [`build_public_input`], from
//! persisted verifier transactions only, so they agree byte for byte.

use serde::{Deserialize, Serialize};

use zkl_core::{CanonicalBytes, DigestAlgorithm, SecureHash, StateRef};
use zkl_crypto::component_hash;

use crate::error::{LedgerError, ResolutionError};
use crate::storage::ZkTransactionStorage;

/// One input or reference slot of the public input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicInputSlot {
    /// Absent when the ancestor keeps the output hidden.
    pub nonce: Option<SecureHash>,
    pub hash: SecureHash,
}

/// What a circuit verifier is given besides the proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicInput {
    pub transaction_id: SecureHash,
    pub inputs: Vec<PublicInputSlot>,
    pub references: Vec<PublicInputSlot>,
}

impl PublicInput {
    /// Canonical JSON, the form handed to proof systems.
    pub fn to_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        Ok(CanonicalBytes::new(self)?.into_bytes())
    }
}

/// A circuit slot: a real state reference or padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddedSlot {
    Original(StateRef),
    Filler,
}

impl PaddedSlot {
    pub fn state_ref(&self) -> Option<&StateRef> {
        match self {
            Self::Original(r) => Some(r),
            Self::Filler => None,
        }
    }
}

/// Pad `refs` to `capacity` slots. `kind` names the slots in errors.
///
/// # Errors
///
/// [`LedgerError::Structural`] if there are more references than slots.
pub fn pad_slots(
    refs: &[StateRef],
    capacity: usize,
    kind: &str,
) -> Result<Vec<PaddedSlot>, LedgerError> {
    if refs.len() > capacity {
        return Err(LedgerError::Structural(format!(
            "{} {kind} exceed the circuit capacity of {capacity}",
            refs.len()
        )));
    }
    let mut slots: Vec<PaddedSlot> = refs.iter().copied().map(PaddedSlot::Original).collect();
    slots.resize(capacity, PaddedSlot::Filler);
    Ok(slots)
}

/// Leaf hash every filler slot commits to.
pub fn filler_hash(algorithm: DigestAlgorithm, filler_bytes: &[u8]) -> SecureHash {
    component_hash(&algorithm.zero_hash(), filler_bytes)
}

/// Assemble the public input for transaction `tx_id`.
///
/// Original slots are resolved against `zk`; filler slots never touch it.
/// The filler hash is computed once per call.
///
/// # Errors
///
/// - [`ResolutionError::TransactionNotFound`] for an ancestor missing from `zk`;
/// - [`ResolutionError::OutputIndexOutOfRange`] for a dangling output index;
/// - [`LedgerError::Structural`] for a filler slot without a filler state.
pub fn build_public_input<Z: ZkTransactionStorage + ?Sized>(
    tx_id: SecureHash,
    inputs: &[PaddedSlot],
    references: &[PaddedSlot],
    filler_bytes: Option<&[u8]>,
    zk: &Z,
) -> Result<PublicInput, LedgerError> {
    let algorithm = tx_id.algorithm();
    let mut filler: Option<PublicInputSlot> = None;

    let mut resolve = |slot: &PaddedSlot| -> Result<PublicInputSlot, LedgerError> {
        match slot {
            PaddedSlot::Original(state_ref) => {
                let ancestor = zk
                    .zk_transaction(&state_ref.txhash)
                    .ok_or(ResolutionError::TransactionNotFound(state_ref.txhash))?;
                let commitment = ancestor.tx().output_commitment(state_ref.index)?;
                Ok(PublicInputSlot {
                    nonce: commitment.nonce,
                    hash: commitment.hash,
                })
            }
            PaddedSlot::Filler => {
                if let Some(slot) = filler {
                    return Ok(slot);
                }
                let bytes = filler_bytes.ok_or_else(|| {
                    LedgerError::Structural(format!(
                        "transaction {tx_id} needs padding but no filler state is configured"
                    ))
                })?;
                let slot = PublicInputSlot {
                    nonce: Some(algorithm.zero_hash()),
                    hash: filler_hash(algorithm, bytes),
                };
                filler = Some(slot);
                Ok(slot)
            }
        }
    };

    let inputs = inputs.iter().map(&mut resolve).collect::<Result<Vec<_>, _>>()?;
    let references = references
        .iter()
        .map(&mut resolve)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(PublicInput {
        transaction_id: tx_id,
        inputs,
        references,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use crate::verifier_tx::SignedZkVerifierTransaction;

    const ALG: DigestAlgorithm = DigestAlgorithm::Sha256;

    /// A store that fails the test if it is ever consulted.
    struct Untouchable;

    impl ZkTransactionStorage for Untouchable {
        fn zk_transaction(&self, id: &SecureHash) -> Option<SignedZkVerifierTransaction> {
            panic!("storage consulted for {id}");
        }

        fn add_zk_transaction(&self, _tx: SignedZkVerifierTransaction) {
            panic!("storage written");
        }
    }

    #[test]
    fn padding_fills_to_capacity() {
        let r = StateRef::new(ALG.digest(b"a"), 0);
        let slots = pad_slots(&[r], 3, "inputs").unwrap();
        assert_eq!(
            slots,
            vec![PaddedSlot::Original(r), PaddedSlot::Filler, PaddedSlot::Filler]
        );
        assert_eq!(slots[0].state_ref(), Some(&r));
        assert!(pad_slots(&[r, r], 1, "inputs").is_err());
        assert!(pad_slots(&[], 0, "references").unwrap().is_empty());
    }

    #[test]
    fn all_filler_slots_never_touch_storage() {
        let id = ALG.digest(b"tx");
        let pi = build_public_input(
            id,
            &[PaddedSlot::Filler; 2],
            &[PaddedSlot::Filler],
            Some(b"\x00\x04Cash"),
            &Untouchable,
        )
        .unwrap();
        let expected = PublicInputSlot {
            nonce: Some(ALG.zero_hash()),
            hash: filler_hash(ALG, b"\x00\x04Cash"),
        };
        assert_eq!(pi.transaction_id, id);
        assert_eq!(pi.inputs, vec![expected; 2]);
        assert_eq!(pi.references, vec![expected]);
    }

    #[test]
    fn filler_without_state_is_structural() {
        let err = build_public_input(ALG.digest(b"tx"), &[PaddedSlot::Filler], &[], None, &Untouchable)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Structural(_)));
    }

    #[test]
    fn missing_ancestor_is_named() {
        let store = InMemoryStore::<SecureHash, SignedZkVerifierTransaction>::new();
        let missing = ALG.digest(b"missing");
        let err = build_public_input(
            ALG.digest(b"tx"),
            &[PaddedSlot::Original(StateRef::new(missing, 0))],
            &[],
            None,
            &store,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Resolution(ResolutionError::TransactionNotFound(id)) if id == missing
        ));
    }

    #[test]
    fn canonical_bytes_are_stable() {
        let pi = PublicInput {
            transaction_id: ALG.digest(b"tx"),
            inputs: vec![PublicInputSlot {
                nonce: None,
                hash: ALG.digest(b"leaf"),
            }],
            references: vec![],
        };
        let bytes = pi.to_bytes().unwrap();
        assert_eq!(bytes, pi.clone().to_bytes().unwrap());
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("{\"inputs\":[{\"hash\":"));
        assert!(text.contains("\"nonce\":null"));
    }
}
