//! # UTXO Info
//!
//! What a prover needs to open one committed output: the serialized state,
//! the nonce it was hashed with and its class name. [`UtxoInfo::verify`]
//! recomputes the leaf hash and compares it with the hash committed in the
//! creating transaction, so a prover cannot swap in a different state for
//! an input.

use serde::{Deserialize, Serialize};

use zkl_core::{ComponentGroupEnum, SecureHash, StateRef};
use zkl_crypto::component_hash;

use crate::error::{LedgerError, ResolutionError, VerificationError};
use crate::transaction::{TransactionState, WireTransaction};

/// Opening of one output of a prior transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoInfo {
    pub state_ref: StateRef,
    /// Header-prefixed [`TransactionState`] bytes.
    #[serde(with = "crate::encoding::hex_bytes")]
    pub serialized: Vec<u8>,
    pub nonce: SecureHash,
    pub state_class: String,
}

impl UtxoInfo {
    /// Open output `index` of `tx`.
    pub fn from_transaction(tx: &WireTransaction, index: u32) -> Result<Self, LedgerError> {
        let serialized = tx.output_bytes(index).ok_or_else(|| {
            ResolutionError::OutputIndexOutOfRange {
                tx_id: tx.id(),
                index,
                outputs: tx.components(ComponentGroupEnum::Outputs).len(),
            }
        })?;
        let state = TransactionState::from_bytes(serialized)?;
        Ok(Self {
            state_ref: StateRef::new(tx.id(), index),
            serialized: serialized.to_vec(),
            nonce: tx.nonce(ComponentGroupEnum::Outputs.ordinal(), index),
            state_class: state.class_name,
        })
    }

    /// Every output of `tx`, in output order.
    pub fn all_from_transaction(tx: &WireTransaction) -> Result<Vec<Self>, LedgerError> {
        (0..tx.components(ComponentGroupEnum::Outputs).len() as u32)
            .map(|i| Self::from_transaction(tx, i))
            .collect()
    }

    /// `H(nonce || serialized)`.
    pub fn leaf_hash(&self) -> SecureHash {
        component_hash(&self.nonce, &self.serialized)
    }

    /// Decode the state.
    pub fn state(&self) -> Result<TransactionState, LedgerError> {
        Ok(TransactionState::from_bytes(&self.serialized)?)
    }

    /// Require the recomputed leaf hash to equal `expected`.
    pub fn verify(&self, expected: &SecureHash) -> Result<(), VerificationError> {
        let actual = self.leaf_hash();
        if actual != *expected {
            return Err(VerificationError::UtxoHashMismatch {
                state_ref: self.state_ref,
                expected: *expected,
                actual,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TransactionComponents;
    use zkl_core::DigestAlgorithm;
    use zkl_crypto::PrivacySalt;

    fn issue() -> WireTransaction {
        let mut c = TransactionComponents::new(DigestAlgorithm::Sha256);
        c.add_output(TransactionState::new("Cash", vec![0, 0, 0, 100]))
            .add_output(TransactionState::new("Bond", vec![7]));
        c.build(PrivacySalt::from_bytes([1u8; 32]).unwrap()).unwrap()
    }

    #[test]
    fn opening_matches_committed_hash() {
        let tx = issue();
        let hashes = tx.component_hashes(ComponentGroupEnum::Outputs.ordinal());
        for (i, utxo) in UtxoInfo::all_from_transaction(&tx).unwrap().iter().enumerate() {
            assert_eq!(utxo.state_ref, StateRef::new(tx.id(), i as u32));
            utxo.verify(&hashes[i]).unwrap();
        }
        let bond = UtxoInfo::from_transaction(&tx, 1).unwrap();
        assert_eq!(bond.state_class, "Bond");
        assert_eq!(bond.state().unwrap().data, vec![7]);
    }

    #[test]
    fn altered_state_is_a_hash_mismatch() {
        let tx = issue();
        let expected = tx.component_hashes(ComponentGroupEnum::Outputs.ordinal())[0];
        let mut utxo = UtxoInfo::from_transaction(&tx, 0).unwrap();
        *utxo.serialized.last_mut().unwrap() = 101;
        let err = utxo.verify(&expected).unwrap_err();
        assert!(matches!(
            err,
            VerificationError::UtxoHashMismatch { state_ref, .. } if state_ref == utxo.state_ref
        ));
    }

    #[test]
    fn missing_output_is_a_resolution_error() {
        let err = UtxoInfo::from_transaction(&issue(), 2).unwrap_err();
        assert!(err.is_resolution());
    }
}
