//! End-to-end proving and verification of transaction chains with the mock
//! proof system.

use std::collections::BTreeMap;

use zkl_core::{ComponentGroupEnum, DigestAlgorithm, SecureHash, StateRef};
use zkl_crypto::{Ed25519KeyPair, PrivacySalt};
use zkl_ledger::{
    collect_dependencies, ChainProver, ChainVerifier, CommandMetadata, Command, LedgerError,
    LedgerStores, MetadataRegistry, ResolutionError, SignedZkVerifierTransaction,
    TransactionComponents, TransactionState, VerificationError, VisibilityPolicy, WireTransaction,
    ZkFilteredComponentGroup, ZkVerifierTransaction,
};
use zkl_zkp::{CircuitDescriptor, MockProofSystem, Proof};

const ALG: DigestAlgorithm = DigestAlgorithm::Sha256;

fn salt(n: u8) -> PrivacySalt {
    PrivacySalt::from_bytes([n; 32]).unwrap()
}

fn cash(amount: u32) -> TransactionState {
    TransactionState::new("Cash", amount.to_be_bytes().to_vec())
}

fn registry() -> MetadataRegistry {
    let mut r = MetadataRegistry::new();
    r.register(
        CommandMetadata::new("Issue", CircuitDescriptor::new("issue", "/circuits/issue"), 0, 0)
            .with_filler(cash(0)),
    )
    .register(
        CommandMetadata::new("Move", CircuitDescriptor::new("move", "/circuits/move"), 2, 1)
            .with_filler(cash(0)),
    )
    .register(
        CommandMetadata::new("Audit", CircuitDescriptor::new("audit", "/circuits/audit"), 2, 1)
            .with_filler(cash(0)),
    );
    r
}

fn issue(amount: u32, s: u8) -> WireTransaction {
    let mut c = TransactionComponents::new(ALG);
    c.add_output(cash(amount))
        .add_command(Command::new("Issue", vec![]));
    c.build(salt(s)).unwrap()
}

fn spend(inputs: &[StateRef], amount: u32, s: u8) -> WireTransaction {
    let mut c = TransactionComponents::new(ALG);
    for i in inputs {
        c.add_input(*i);
    }
    c.add_output(cash(amount))
        .add_command(Command::new("Move", vec![]));
    c.build(salt(s)).unwrap()
}

struct Ledger {
    stores: LedgerStores,
    prover: ChainProver<MockProofSystem>,
    verifier: ChainVerifier<MockProofSystem>,
}

impl Ledger {
    fn new() -> Self {
        let stores = LedgerStores::in_memory();
        Self {
            prover: ChainProver::new(MockProofSystem, registry(), stores.clone()),
            verifier: ChainVerifier::new(MockProofSystem, registry(), stores.clone()),
            stores,
        }
    }

    fn record(&self, tx: &WireTransaction) -> SecureHash {
        self.stores.transactions.add_transaction(tx.clone());
        tx.id()
    }

    fn stored(&self, id: &SecureHash) -> SignedZkVerifierTransaction {
        self.stores.zk_transactions.zk_transaction(id).unwrap()
    }

    /// issue -> spend -> spend
    fn three_step_chain(&self) -> [SecureHash; 3] {
        let a = issue(10, 1);
        let b = spend(&[StateRef::new(a.id(), 0)], 10, 2);
        let c = spend(&[StateRef::new(b.id(), 0)], 10, 3);
        [self.record(&a), self.record(&b), self.record(&c)]
    }
}

#[test]
fn chain_proves_ancestors_first_and_verifies() {
    let ledger = Ledger::new();
    let [a, b, c] = ledger.three_step_chain();

    assert_eq!(collect_dependencies(c, &ledger.stores).unwrap(), vec![a, b, c]);
    assert_eq!(ledger.prover.prove_chain(c).unwrap(), vec![a, b, c]);
    assert_eq!(ledger.verifier.verify_chain(c).unwrap(), vec![a, b, c]);

    // Outputs of every proven transaction are openable.
    assert!(ledger.stores.utxos.utxo(&StateRef::new(c, 0)).is_some());
}

#[test]
fn proving_again_skips_proven_transactions() {
    let ledger = Ledger::new();
    let [a, b, c] = ledger.three_step_chain();
    ledger.prover.prove_chain(b).unwrap();
    assert_eq!(ledger.prover.prove_chain(c).unwrap(), vec![c]);
    assert!(ledger.prover.prove_chain(c).unwrap().is_empty());
    assert_eq!(ledger.verifier.verify_chain(c).unwrap(), vec![a, b, c]);
}

#[test]
fn missing_ancestor_is_a_resolution_error_naming_it() {
    let ledger = Ledger::new();
    let missing = ALG.digest(b"never recorded");
    let orphan = spend(&[StateRef::new(missing, 0)], 5, 4);
    let id = ledger.record(&orphan);

    let err = ledger.prover.prove_chain(id).unwrap_err();
    assert!(err.is_resolution());
    assert!(matches!(
        err,
        LedgerError::Resolution(ResolutionError::TransactionNotFound(m)) if m == missing
    ));
    assert!(err.to_string().contains(&missing.to_string()));
}

#[test]
fn verifier_without_ancestor_reports_it() {
    let ledger = Ledger::new();
    let [a, b, c] = ledger.three_step_chain();
    ledger.prover.prove_chain(c).unwrap();

    let partial = LedgerStores::in_memory();
    for id in [b, c] {
        partial.zk_transactions.add_zk_transaction(ledger.stored(&id));
    }
    let verifier = ChainVerifier::new(MockProofSystem, registry(), partial);
    let err = verifier.verify_chain(c).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Resolution(ResolutionError::TransactionNotFound(m)) if m == a
    ));
}

#[test]
fn all_filler_transaction_verifies_alone() {
    let ledger = Ledger::new();
    let a = ledger.record(&issue(1, 9));
    ledger.prover.prove_chain(a).unwrap();

    // A verifier holding nothing but this transaction succeeds: filler slots
    // never resolve ancestors.
    let alone = LedgerStores::in_memory();
    alone.zk_transactions.add_zk_transaction(ledger.stored(&a));
    let verifier = ChainVerifier::new(MockProofSystem, registry(), alone);
    assert_eq!(verifier.verify_chain(a).unwrap(), vec![a]);
}

#[test]
fn tampered_proof_is_rejected() {
    let ledger = Ledger::new();
    let [_, _, c] = ledger.three_step_chain();
    ledger.prover.prove_chain(c).unwrap();

    let original = ledger.stored(&c);
    let forged_proofs = BTreeMap::from([("Move".to_string(), Proof::new(vec![0u8; 32]))]);
    let forged =
        ZkVerifierTransaction::new(c, forged_proofs, original.tx().groups().to_vec()).unwrap();
    ledger
        .stores
        .zk_transactions
        .add_zk_transaction(SignedZkVerifierTransaction::new(forged));

    let err = ledger.verifier.verify_chain(c).unwrap_err();
    assert!(err.is_verification());
    assert!(matches!(
        err,
        LedgerError::Verification(VerificationError::ProofRejected { tx_id, ref command, .. })
            if tx_id == c && command == "Move"
    ));
}

#[test]
fn tampered_ancestor_fails_the_descendant() {
    let ledger = Ledger::new();
    let [a, _, c] = ledger.three_step_chain();
    ledger.prover.prove_chain(c).unwrap();

    // Replace the issuance's hidden output hash: the groups no longer commit
    // to the id.
    let original = ledger.stored(&a);
    let groups = original
        .tx()
        .groups()
        .iter()
        .map(|g| {
            if g.group_index() != ComponentGroupEnum::Outputs.ordinal() {
                return g.clone();
            }
            let forged = g
                .private_component_hashes()
                .keys()
                .map(|i| (*i, ALG.digest(b"more cash")))
                .collect();
            ZkFilteredComponentGroup::new(
                g.group_index(),
                g.algorithm(),
                g.components().to_vec(),
                g.nonces().to_vec(),
                forged,
            )
            .unwrap()
        })
        .collect();
    let forged = ZkVerifierTransaction::new(a, original.tx().proofs().clone(), groups).unwrap();
    ledger
        .stores
        .zk_transactions
        .add_zk_transaction(SignedZkVerifierTransaction::new(forged));

    let err = ledger.verifier.verify_chain(c).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Verification(VerificationError::MerkleRootMismatch { tx_id, .. }) if tx_id == a
    ));
}

#[test]
fn transaction_without_proofs_is_rejected() {
    let ledger = Ledger::new();
    let a = ledger.record(&issue(3, 5));
    ledger.prover.prove_chain(a).unwrap();
    let groups = ledger.stored(&a).tx().groups().to_vec();
    let bare = ZkVerifierTransaction::new(a, BTreeMap::new(), groups).unwrap();
    ledger
        .stores
        .zk_transactions
        .add_zk_transaction(SignedZkVerifierTransaction::new(bare));
    assert!(matches!(
        ledger.verifier.verify_chain(a).unwrap_err(),
        LedgerError::Verification(VerificationError::NoProofs(id)) if id == a
    ));
}

#[test]
fn signatures_are_checked_during_chain_verification() {
    let ledger = Ledger::new();
    let a = ledger.record(&issue(4, 6));
    ledger.prover.prove_chain(a).unwrap();

    let key = Ed25519KeyPair::from_seed(&[42u8; 32]);
    let signed = ledger.stored(&a).sign_with(&key).unwrap();
    ledger.stores.zk_transactions.add_zk_transaction(signed.clone());
    ledger.verifier.verify_chain(a).unwrap();

    let mut sig = signed.signatures()[0].clone();
    sig.by = Ed25519KeyPair::from_seed(&[43u8; 32]).public_key();
    let bad = SignedZkVerifierTransaction::new(signed.tx().clone()).add_signature(sig);
    ledger.stores.zk_transactions.add_zk_transaction(bad);
    assert!(matches!(
        ledger.verifier.verify_chain(a).unwrap_err(),
        LedgerError::Verification(VerificationError::SignatureInvalid { .. })
    ));
}

#[test]
fn each_command_gets_its_own_proof() {
    let ledger = Ledger::new();
    let a = issue(7, 7);
    let mut c = TransactionComponents::new(ALG);
    c.add_input(StateRef::new(a.id(), 0))
        .add_output(cash(7))
        .add_command(Command::new("Move", vec![]))
        .add_command(Command::new("Audit", vec![]));
    let b = c.build(salt(8)).unwrap();
    ledger.record(&a);
    let id = ledger.record(&b);

    ledger.prover.prove_chain(id).unwrap();
    let proofs = ledger.stored(&id).tx().proofs().clone();
    assert_eq!(proofs.keys().collect::<Vec<_>>(), ["Audit", "Move"]);
    assert_ne!(proofs["Audit"], proofs["Move"]);
    ledger.verifier.verify_chain(id).unwrap();
}

#[test]
fn visible_outputs_expose_their_nonce_to_dependents() {
    let mut r = registry();
    r.register(
        CommandMetadata::new("Issue", CircuitDescriptor::new("issue", "/circuits/issue"), 0, 0)
            .with_visibility(VisibilityPolicy::all_public())
            .with_filler(cash(0)),
    );
    let stores = LedgerStores::in_memory();
    let prover = ChainProver::new(MockProofSystem, r.clone(), stores.clone());
    let a = issue(2, 11);
    stores.transactions.add_transaction(a.clone());
    prover.prove_chain(a.id()).unwrap();

    let zk = stores.zk_transactions.zk_transaction(&a.id()).unwrap();
    let commitment = zk.tx().output_commitment(0).unwrap();
    assert_eq!(
        commitment.nonce,
        Some(a.nonce(ComponentGroupEnum::Outputs.ordinal(), 0))
    );

    let b = spend(&[StateRef::new(a.id(), 0)], 2, 12);
    stores.transactions.add_transaction(b.clone());
    prover.prove_chain(b.id()).unwrap();
    ChainVerifier::new(MockProofSystem, r, stores)
        .verify_chain(b.id())
        .unwrap();
}

#[test]
fn too_many_inputs_for_the_circuit_is_structural() {
    let ledger = Ledger::new();
    let sources: Vec<_> = (0..3u8).map(|i| issue(1, 20 + i)).collect();
    for s in &sources {
        ledger.record(s);
    }
    let refs: Vec<_> = sources.iter().map(|s| StateRef::new(s.id(), 0)).collect();
    let id = ledger.record(&spend(&refs, 3, 30));
    assert!(matches!(
        ledger.prover.prove_chain(id).unwrap_err(),
        LedgerError::Structural(_)
    ));
}
