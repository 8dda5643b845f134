//! # Backward-Chain Proving and Verification
//!
//! A transaction is only as valid as the states it consumes and references.
//! Proving a transaction therefore proves its whole ancestry first, and
//! verifying it verifies the ancestry first.
//!
//! ## Proving
//!
//! [`ChainProver::prove_chain`] collects the not-yet-proven ancestors of a
//! transaction in dependency order and proves each in turn:
//!
//! 1. look up the command metadata and pad inputs and references to the
//!    circuit's slot counts;
//! 2. build the public input from the ancestors' persisted verifier
//!    transactions;
//! 3. assemble and check the [`Witness`];
//! 4. prove once per command;
//! 5. filter the transaction into a [`ZkVerifierTransaction`], persist it and
//!    record the openings of its outputs.
//!
//! ## Verification
//!
//! [`ChainVerifier::verify_chain`] walks the same graph over verifier
//! transactions. For each transaction, ancestors strictly first, it checks
//! the Merkle root and signatures, rebuilds the public input exactly as the
//! prover did and hands every proof to the proof system. The first failure
//! stops the walk.
//!
//! Both walks are iterative, so chain length does not bound stack depth.

use std::collections::{BTreeMap, HashMap, HashSet};

use zkl_core::{SecureHash, StateRef};
use zkl_zkp::{ProofSystem, VerifyError};

use crate::error::{LedgerError, ResolutionError, VerificationError};
use crate::metadata::{MetadataRegistry, TransactionMetadata};
use crate::public_input::{build_public_input, PublicInput};
use crate::storage::LedgerStores;
use crate::transaction::WireTransaction;
use crate::utxo::UtxoInfo;
use crate::verifier_tx::{SignedZkVerifierTransaction, ZkVerifierTransaction};
use crate::witness::Witness;

/// Distinct transactions referenced by `inputs` then `references`, in
/// first-seen order.
pub fn direct_dependencies(inputs: &[StateRef], references: &[StateRef]) -> Vec<SecureHash> {
    let mut seen = HashSet::new();
    inputs
        .iter()
        .chain(references)
        .map(|r| r.txhash)
        .filter(|id| seen.insert(*id))
        .collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Depth-first post-order over the dependency graph rooted at `root`.
///
/// `deps(id)` returns the direct dependencies of `id`, or `None` to prune
/// the walk there (the id is neither descended into nor returned). `root`
/// itself is never pruned. Returns ids with every dependency before its
/// dependents, `root` last.
fn topological_order<F>(root: SecureHash, mut deps: F) -> Result<Vec<SecureHash>, LedgerError>
where
    F: FnMut(&SecureHash, bool) -> Result<Option<Vec<SecureHash>>, LedgerError>,
{
    let mut marks: HashMap<SecureHash, Mark> = HashMap::new();
    let mut order = Vec::new();
    // (id, its dependencies, next dependency to visit)
    let mut stack: Vec<(SecureHash, Vec<SecureHash>, usize)> = Vec::new();

    let Some(root_deps) = deps(&root, true)? else {
        return Ok(vec![root]);
    };
    marks.insert(root, Mark::Visiting);
    stack.push((root, root_deps, 0));

    while let Some((id, children, next)) = stack.last_mut() {
        if let Some(child) = children.get(*next).copied() {
            *next += 1;
            match marks.get(&child) {
                Some(Mark::Done) => continue,
                Some(Mark::Visiting) => {
                    return Err(ResolutionError::DependencyCycle(child).into());
                }
                None => {}
            }
            match deps(&child, false)? {
                Some(grandchildren) => {
                    marks.insert(child, Mark::Visiting);
                    stack.push((child, grandchildren, 0));
                }
                None => {
                    marks.insert(child, Mark::Done);
                }
            }
        } else {
            let id = *id;
            marks.insert(id, Mark::Done);
            order.push(id);
            stack.pop();
        }
    }
    Ok(order)
}

/// Every transaction `tx_id` depends on, transitively, followed by `tx_id`
/// itself. Each appears after all of its own dependencies; ties follow
/// input-then-reference discovery order.
///
/// # Errors
///
/// [`ResolutionError::TransactionNotFound`] naming the first missing id, or
/// [`ResolutionError::DependencyCycle`].
pub fn collect_dependencies(
    tx_id: SecureHash,
    stores: &LedgerStores,
) -> Result<Vec<SecureHash>, LedgerError> {
    topological_order(tx_id, |id, _| {
        let tx = stores
            .transactions
            .transaction(id)
            .ok_or(ResolutionError::TransactionNotFound(*id))?;
        Ok(Some(direct_dependencies(&tx.inputs()?, &tx.references()?)))
    })
}

/// Proves transactions together with their ancestry.
#[derive(Debug, Clone)]
pub struct ChainProver<P> {
    proof_system: P,
    metadata: MetadataRegistry,
    stores: LedgerStores,
}

impl<P: ProofSystem> ChainProver<P> {
    pub fn new(proof_system: P, metadata: MetadataRegistry, stores: LedgerStores) -> Self {
        Self {
            proof_system,
            metadata,
            stores,
        }
    }

    pub fn stores(&self) -> &LedgerStores {
        &self.stores
    }

    pub fn metadata(&self) -> &MetadataRegistry {
        &self.metadata
    }

    /// Prove `tx_id` and every ancestor without a persisted verifier
    /// transaction, ancestors first. Returns the ids proven, in order.
    pub fn prove_chain(&self, tx_id: SecureHash) -> Result<Vec<SecureHash>, LedgerError> {
        let zk = &self.stores.zk_transactions;
        let order = topological_order(tx_id, |id, is_root| {
            if !is_root && zk.contains_zk_transaction(id) {
                return Ok(None);
            }
            let tx = self
                .stores
                .transactions
                .transaction(id)
                .ok_or(ResolutionError::TransactionNotFound(*id))?;
            Ok(Some(direct_dependencies(&tx.inputs()?, &tx.references()?)))
        })?;
        tracing::debug!(tx_id = %tx_id, count = order.len(), "collected transactions to prove");

        let mut proven = Vec::with_capacity(order.len());
        for id in order {
            if zk.contains_zk_transaction(&id) {
                tracing::debug!(tx_id = %id, "already proven, skipping");
                continue;
            }
            let tx = self
                .stores
                .transactions
                .transaction(&id)
                .ok_or(ResolutionError::TransactionNotFound(id))?;
            self.prove_transaction(&tx)?;
            proven.push(id);
        }
        Ok(proven)
    }

    /// Prove one transaction whose ancestors are already proven, persist its
    /// verifier transaction and record its output openings.
    pub fn prove_transaction(
        &self,
        tx: &WireTransaction,
    ) -> Result<SignedZkVerifierTransaction, LedgerError> {
        let id = tx.id();
        let metadata = self.metadata.for_transaction(tx)?;
        let inputs = tx.inputs()?;
        let references = tx.references()?;

        let witness = Witness {
            transaction: tx.clone(),
            input_utxos: self.openings(&inputs)?,
            reference_utxos: self.openings(&references)?,
            filler_output: metadata.filler_bytes()?,
            public_input: self.public_input(id, &inputs, &references, &metadata)?,
        };
        witness.check()?;
        let witness_bytes = witness.to_bytes()?;

        let mut proofs = BTreeMap::new();
        for command in metadata.commands() {
            tracing::debug!(tx_id = %id, command = %command.command_name, "proving");
            let proof = self.proof_system.prove(&command.circuit, &witness_bytes)?;
            proofs.insert(command.command_name.clone(), proof);
        }

        let zk = ZkVerifierTransaction::from_wire(tx, metadata.visibility(), proofs)?;
        zk.verify()?;
        let signed = SignedZkVerifierTransaction::new(zk);

        self.stores.transactions.add_transaction(tx.clone());
        self.stores.zk_transactions.add_zk_transaction(signed.clone());
        for utxo in UtxoInfo::all_from_transaction(tx)? {
            self.stores.utxos.add_utxo(utxo);
        }
        tracing::debug!(tx_id = %id, "persisted verifier transaction");
        Ok(signed)
    }

    fn openings(&self, refs: &[StateRef]) -> Result<Vec<UtxoInfo>, LedgerError> {
        refs.iter()
            .map(|r| {
                self.stores
                    .utxos
                    .utxo(r)
                    .ok_or_else(|| ResolutionError::UtxoNotFound(*r).into())
            })
            .collect()
    }

    fn public_input(
        &self,
        id: SecureHash,
        inputs: &[StateRef],
        references: &[StateRef],
        metadata: &TransactionMetadata,
    ) -> Result<PublicInput, LedgerError> {
        let filler = metadata.filler_bytes()?;
        build_public_input(
            id,
            &metadata.input_slots(inputs)?,
            &metadata.reference_slots(references)?,
            filler.as_deref(),
            self.stores.zk_transactions.as_ref(),
        )
    }
}

/// Verifies verifier transactions together with their ancestry.
#[derive(Debug, Clone)]
pub struct ChainVerifier<P> {
    proof_system: P,
    metadata: MetadataRegistry,
    stores: LedgerStores,
}

impl<P: ProofSystem> ChainVerifier<P> {
    pub fn new(proof_system: P, metadata: MetadataRegistry, stores: LedgerStores) -> Self {
        Self {
            proof_system,
            metadata,
            stores,
        }
    }

    /// Verify `tx_id` and all of its ancestors. Returns the ids verified,
    /// ancestors first.
    ///
    /// # Errors
    ///
    /// The first failure: [`ResolutionError::TransactionNotFound`] naming a
    /// missing ancestor, a [`VerificationError`], or a proof system failure.
    pub fn verify_chain(&self, tx_id: SecureHash) -> Result<Vec<SecureHash>, LedgerError> {
        let mut loaded: HashMap<SecureHash, SignedZkVerifierTransaction> = HashMap::new();
        let order = topological_order(tx_id, |id, _| {
            let tx = self.load(id)?;
            let deps = direct_dependencies(&tx.tx().inputs()?, &tx.tx().references()?);
            loaded.insert(*id, tx);
            Ok(Some(deps))
        })?;
        tracing::debug!(tx_id = %tx_id, count = order.len(), "verifying chain");

        for id in &order {
            let tx = match loaded.remove(id) {
                Some(tx) => tx,
                None => self.load(id)?,
            };
            self.verify_transaction(&tx)?;
        }
        Ok(order)
    }

    fn load(&self, id: &SecureHash) -> Result<SignedZkVerifierTransaction, LedgerError> {
        self.stores
            .zk_transactions
            .zk_transaction(id)
            .ok_or_else(|| ResolutionError::TransactionNotFound(*id).into())
    }

    /// Verify one transaction against its persisted ancestors, without
    /// verifying the ancestors themselves.
    pub fn verify_transaction(
        &self,
        signed: &SignedZkVerifierTransaction,
    ) -> Result<(), LedgerError> {
        let tx = signed.tx();
        let id = tx.id();
        tx.verify()?;
        signed.verify_signatures(&[])?;
        if tx.proofs().is_empty() {
            return Err(VerificationError::NoProofs(id).into());
        }

        let metadata = self.metadata.for_commands(tx.proofs().keys())?;
        let filler = metadata.filler_bytes()?;
        let public_input = build_public_input(
            id,
            &metadata.input_slots(&tx.inputs()?)?,
            &metadata.reference_slots(&tx.references()?)?,
            filler.as_deref(),
            self.stores.zk_transactions.as_ref(),
        )?
        .to_bytes()?;

        for (command, proof) in tx.proofs() {
            let circuit = &self.metadata.require(command)?.circuit;
            self.proof_system
                .verify(circuit, proof, &public_input)
                .map_err(|e| match e {
                    VerifyError::Rejected { .. } | VerifyError::MalformedProof(_) => {
                        tracing::warn!(tx_id = %id, command = %command, error = %e, "proof rejected");
                        LedgerError::from(VerificationError::ProofRejected {
                            tx_id: id,
                            command: command.clone(),
                            reason: e.to_string(),
                        })
                    }
                    other => LedgerError::from(other),
                })?;
        }
        tracing::debug!(tx_id = %id, proofs = tx.proofs().len(), "verified transaction");
        Ok(())
    }
}
