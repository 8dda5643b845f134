//! # Witness
//!
//! Everything the prover feeds a circuit: the plaintext transaction, the
//! openings of the states its inputs and references point at, the filler
//! state and the public input it must reproduce.
//!
//! [`Witness::check`] runs the ledger-side constraints before any prover is
//! started, so obviously bad witnesses fail fast with a typed error instead
//! of an opaque circuit failure.

use serde::{Deserialize, Serialize};

use zkl_core::{SecureHash, StateRef};

use crate::error::{LedgerError, VerificationError};
use crate::public_input::{filler_hash, PublicInput, PublicInputSlot};
use crate::transaction::WireTransaction;
use crate::utxo::UtxoInfo;

/// Prover input for one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    pub transaction: WireTransaction,
    /// Openings of the transaction's inputs, in input order.
    pub input_utxos: Vec<UtxoInfo>,
    /// Openings of the transaction's references, in reference order.
    pub reference_utxos: Vec<UtxoInfo>,
    /// Serialized filler state, when any slot is padded.
    #[serde(default, with = "filler_hex")]
    pub filler_output: Option<Vec<u8>>,
    /// Proof systems read this member; it must equal what verifiers rebuild.
    pub public_input: PublicInput,
}

mod filler_hex {
    use serde::{Deserialize, Deserializer, Serializer};
    use zkl_core::{from_hex, to_hex};

    pub fn serialize<S: Serializer>(v: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(bytes) => s.serialize_some(&to_hex(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|h| from_hex(&h).map_err(serde::de::Error::custom))
            .transpose()
    }
}

impl Witness {
    /// JSON bytes for a proof system.
    pub fn to_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Check the witness against its own public input.
    ///
    /// # Errors
    ///
    /// - [`VerificationError::TransactionIdMismatch`] if the transaction does
    ///   not hash to the public input's id;
    /// - [`VerificationError::UtxoHashMismatch`] if an opening does not match
    ///   its slot hash;
    /// - [`LedgerError::Structural`] if openings, slots and references do not
    ///   line up, or a filler slot does not carry the filler hash.
    pub fn check(&self) -> Result<(), LedgerError> {
        let id = self.transaction.id();
        if id != self.public_input.transaction_id {
            return Err(VerificationError::TransactionIdMismatch {
                expected: self.public_input.transaction_id,
                actual: id,
            }
            .into());
        }
        let filler = self
            .filler_output
            .as_deref()
            .map(|b| filler_hash(id.algorithm(), b));

        check_slots(
            "input",
            &self.transaction.inputs()?,
            &self.input_utxos,
            &self.public_input.inputs,
            filler,
        )?;
        check_slots(
            "reference",
            &self.transaction.references()?,
            &self.reference_utxos,
            &self.public_input.references,
            filler,
        )
    }
}

fn check_slots(
    kind: &str,
    refs: &[StateRef],
    utxos: &[UtxoInfo],
    slots: &[PublicInputSlot],
    filler: Option<SecureHash>,
) -> Result<(), LedgerError> {
    if refs.len() != utxos.len() || refs.len() > slots.len() {
        return Err(LedgerError::Structural(format!(
            "{} {kind}s, {} openings and {} slots do not line up",
            refs.len(),
            utxos.len(),
            slots.len()
        )));
    }
    for ((state_ref, utxo), slot) in refs.iter().zip(utxos).zip(slots) {
        if utxo.state_ref != *state_ref {
            return Err(LedgerError::Structural(format!(
                "{kind} {state_ref} opened as {}",
                utxo.state_ref
            )));
        }
        utxo.verify(&slot.hash)?;
    }
    for slot in &slots[refs.len()..] {
        if Some(slot.hash) != filler {
            return Err(LedgerError::Structural(format!(
                "padded {kind} slot does not carry the filler hash"
            )));
        }
    }
    Ok(())
}
