//! # Verifier Transactions
//!
//! A [`ZkVerifierTransaction`] is what gets persisted and shipped in place of
//! a plaintext transaction: the id, one proof per command, and the filtered
//! component groups. [`ZkVerifierTransaction::verify`] recomputes the
//! two-level Merkle root from the filtered groups and requires it to equal
//! the id; the all-ones hash stands in for absent or empty groups.
//!
//! [`SignedZkVerifierTransaction`] adds Ed25519 signatures over the id.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use zkl_core::{CanonicalBytes, ComponentGroupEnum, DigestAlgorithm, SecureHash, StateRef};
use zkl_crypto::merkle::merkle_root;
use zkl_crypto::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
use zkl_zkp::Proof;

use crate::error::{CommitmentError, LedgerError, ResolutionError, VerificationError};
use crate::filtered::ZkFilteredComponentGroup;
use crate::transaction::WireTransaction;
use crate::visibility::VisibilityPolicy;

/// The committed form of one output: its leaf hash, and its nonce when the
/// output is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputCommitment {
    pub nonce: Option<SecureHash>,
    pub hash: SecureHash,
}

/// A transaction as verifiers see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkVerifierTransaction {
    id: SecureHash,
    proofs: BTreeMap<String, Proof>,
    groups: Vec<ZkFilteredComponentGroup>,
}

impl ZkVerifierTransaction {
    /// Assemble from parts, without checking the root. Call [`Self::verify`]
    /// before trusting the result.
    pub fn new(
        id: SecureHash,
        proofs: BTreeMap<String, Proof>,
        mut groups: Vec<ZkFilteredComponentGroup>,
    ) -> Result<Self, CommitmentError> {
        groups.sort_by_key(ZkFilteredComponentGroup::group_index);
        for pair in groups.windows(2) {
            if pair[0].group_index() == pair[1].group_index() {
                return Err(CommitmentError::DuplicateGroup(pair[0].group_index()));
            }
        }
        Ok(Self { id, proofs, groups })
    }

    /// Filter `tx` under `policy` and attach `proofs`.
    ///
    /// # Errors
    ///
    /// [`CommitmentError::HiddenChainComponent`] if the policy would hide an
    /// input or reference.
    pub fn from_wire(
        tx: &WireTransaction,
        policy: &VisibilityPolicy,
        proofs: BTreeMap<String, Proof>,
    ) -> Result<Self, CommitmentError> {
        policy.check_chain_visible(
            tx.components(ComponentGroupEnum::Inputs).len(),
            tx.components(ComponentGroupEnum::References).len(),
        )?;
        let groups = tx
            .groups()
            .iter()
            .map(|g| {
                ZkFilteredComponentGroup::filter(g, tx.algorithm(), policy, |i| {
                    tx.nonce(g.group_index, i)
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(tx.id(), proofs, groups)
    }

    pub fn id(&self) -> SecureHash {
        self.id
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.id.algorithm()
    }

    pub fn proofs(&self) -> &BTreeMap<String, Proof> {
        &self.proofs
    }

    pub fn proof(&self, command: &str) -> Option<&Proof> {
        self.proofs.get(command)
    }

    pub fn groups(&self) -> &[ZkFilteredComponentGroup] {
        &self.groups
    }

    pub fn group(&self, group: ComponentGroupEnum) -> Option<&ZkFilteredComponentGroup> {
        self.groups
            .iter()
            .find(|g| g.group_index() == group.ordinal())
    }

    /// Recompute the top-level root from the filtered groups.
    pub fn compute_root(&self) -> Result<SecureHash, LedgerError> {
        let algorithm = self.algorithm();
        let Some(max) = self.groups.iter().map(ZkFilteredComponentGroup::group_index).max() else {
            return Ok(merkle_root(algorithm, &[])?);
        };
        let mut roots = Vec::with_capacity(max as usize + 1);
        for index in 0..=max {
            let root = match self.groups.iter().find(|g| g.group_index() == index) {
                Some(g) if g.original_count() > 0 => g.merkle_root(),
                _ => algorithm.all_ones_hash(),
            };
            roots.push(root);
        }
        Ok(merkle_root(algorithm, &roots)?)
    }

    /// Check that the filtered groups commit to the id.
    pub fn verify(&self) -> Result<(), LedgerError> {
        let computed = self.compute_root()?;
        if computed != self.id {
            return Err(VerificationError::MerkleRootMismatch {
                tx_id: self.id,
                computed,
            }
            .into());
        }
        Ok(())
    }

    fn decode_refs(&self, group: ComponentGroupEnum) -> Result<Vec<StateRef>, LedgerError> {
        let Some(g) = self.group(group) else {
            return Ok(Vec::new());
        };
        if let Some(&index) = g.private_component_hashes().keys().next() {
            return Err(CommitmentError::HiddenChainComponent { group, index }.into());
        }
        g.components()
            .iter()
            .map(|b| StateRef::from_bytes(self.algorithm(), b).map_err(LedgerError::from))
            .collect()
    }

    /// Input state references. Inputs are always visible.
    pub fn inputs(&self) -> Result<Vec<StateRef>, LedgerError> {
        self.decode_refs(ComponentGroupEnum::Inputs)
    }

    /// Reference state references. References are always visible.
    pub fn references(&self) -> Result<Vec<StateRef>, LedgerError> {
        self.decode_refs(ComponentGroupEnum::References)
    }

    fn outputs_group(&self, index: u32) -> Result<&ZkFilteredComponentGroup, ResolutionError> {
        self.group(ComponentGroupEnum::Outputs)
            .ok_or(ResolutionError::OutputIndexOutOfRange {
                tx_id: self.id,
                index,
                outputs: 0,
            })
    }

    /// Leaf hash of output `index`.
    pub fn output_hash(&self, index: u32) -> Result<SecureHash, ResolutionError> {
        let g = self.outputs_group(index)?;
        g.leaf_hash(index)
            .ok_or(ResolutionError::OutputIndexOutOfRange {
                tx_id: self.id,
                index,
                outputs: g.original_count(),
            })
    }

    /// Leaf hash and, if visible, nonce of output `index`.
    pub fn output_commitment(&self, index: u32) -> Result<OutputCommitment, ResolutionError> {
        let hash = self.output_hash(index)?;
        let nonce = self.outputs_group(index)?.nonce(index);
        Ok(OutputCommitment { nonce, hash })
    }

    /// Number of outputs in the original transaction.
    pub fn output_count(&self) -> usize {
        self.group(ComponentGroupEnum::Outputs)
            .map_or(0, ZkFilteredComponentGroup::original_count)
    }
}

/// A signature over a transaction id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    pub by: Ed25519PublicKey,
    pub signature: Ed25519Signature,
}

#[derive(Serialize)]
struct SignableData<'a> {
    tx_id: &'a SecureHash,
    signer: &'a Ed25519PublicKey,
}

fn signable(tx_id: &SecureHash, signer: &Ed25519PublicKey) -> Result<CanonicalBytes, LedgerError> {
    Ok(CanonicalBytes::new(&SignableData { tx_id, signer })?)
}

impl TransactionSignature {
    /// Sign `tx_id` with `key`.
    pub fn sign(tx_id: &SecureHash, key: &Ed25519KeyPair) -> Result<Self, LedgerError> {
        let by = key.public_key();
        let signature = key.sign(&signable(tx_id, &by)?);
        Ok(Self { by, signature })
    }

    pub fn verify(&self, tx_id: &SecureHash) -> Result<(), LedgerError> {
        let data = signable(tx_id, &self.by)?;
        self.by.verify(&data, &self.signature).map_err(|e| {
            LedgerError::from(VerificationError::SignatureInvalid {
                tx_id: *tx_id,
                signer: self.by.clone(),
                reason: e.to_string(),
            })
        })
    }
}

/// A verifier transaction with its signatures, in the order they were added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedZkVerifierTransaction {
    tx: ZkVerifierTransaction,
    sigs: Vec<TransactionSignature>,
}

impl SignedZkVerifierTransaction {
    pub fn new(tx: ZkVerifierTransaction) -> Self {
        Self {
            tx,
            sigs: Vec::new(),
        }
    }

    pub fn id(&self) -> SecureHash {
        self.tx.id()
    }

    pub fn tx(&self) -> &ZkVerifierTransaction {
        &self.tx
    }

    pub fn signatures(&self) -> &[TransactionSignature] {
        &self.sigs
    }

    /// A copy with `sig` appended.
    pub fn add_signature(&self, sig: TransactionSignature) -> Self {
        let mut sigs = self.sigs.clone();
        sigs.push(sig);
        Self {
            tx: self.tx.clone(),
            sigs,
        }
    }

    /// A copy signed by `key`.
    pub fn sign_with(&self, key: &Ed25519KeyPair) -> Result<Self, LedgerError> {
        Ok(self.add_signature(TransactionSignature::sign(&self.id(), key)?))
    }

    /// Check every signature and require one from each of `required`.
    pub fn verify_signatures(&self, required: &[Ed25519PublicKey]) -> Result<(), LedgerError> {
        let id = self.id();
        for sig in &self.sigs {
            sig.verify(&id)?;
        }
        if let Some(missing) = required
            .iter()
            .find(|k| !self.sigs.iter().any(|s| &s.by == *k))
        {
            return Err(VerificationError::MissingSignature {
                tx_id: id,
                signer: missing.clone(),
            }
            .into());
        }
        Ok(())
    }
}
