//! # Storage Collaborators
//!
//! The chain protocol reads and writes three key-value maps:
//!
//! - plaintext transactions by id ([`TransactionStorage`]), read by the prover;
//! - verifier transactions by id ([`ZkTransactionStorage`]), written by the
//!   prover and read by both sides;
//! - UTXO openings by state reference ([`UtxoStorage`]).
//!
//! Persistent backends live outside this crate. [`InMemoryStore`] implements
//! all three for tests and tools. Writers are assumed to be unique per key;
//! a second write to the same key replaces the first.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

use zkl_core::{SecureHash, StateRef};

use crate::transaction::WireTransaction;
use crate::utxo::UtxoInfo;
use crate::verifier_tx::SignedZkVerifierTransaction;

/// Plaintext transactions by id.
pub trait TransactionStorage: Send + Sync {
    fn transaction(&self, id: &SecureHash) -> Option<WireTransaction>;

    fn add_transaction(&self, tx: WireTransaction);
}

/// Verifier transactions by id.
pub trait ZkTransactionStorage: Send + Sync {
    fn zk_transaction(&self, id: &SecureHash) -> Option<SignedZkVerifierTransaction>;

    fn add_zk_transaction(&self, tx: SignedZkVerifierTransaction);

    fn contains_zk_transaction(&self, id: &SecureHash) -> bool {
        self.zk_transaction(id).is_some()
    }
}

/// UTXO openings by state reference.
pub trait UtxoStorage: Send + Sync {
    fn utxo(&self, state_ref: &StateRef) -> Option<UtxoInfo>;

    fn add_utxo(&self, utxo: UtxoInfo);
}

/// Thread-safe, cloneable in-memory map. Clones share the same data.
#[derive(Debug)]
pub struct InMemoryStore<K, V> {
    data: Arc<RwLock<HashMap<K, V>>>,
}

impl<K, V> Clone for InMemoryStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<K, V> Default for InMemoryStore<K, V> {
    fn default() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<K: Eq + Hash, V: Clone> InMemoryStore<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.data.write().insert(key, value)
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.data.read().get(key).cloned()
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.data.write().remove(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.data.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TransactionStorage for InMemoryStore<SecureHash, WireTransaction> {
    fn transaction(&self, id: &SecureHash) -> Option<WireTransaction> {
        self.get(id)
    }

    fn add_transaction(&self, tx: WireTransaction) {
        self.insert(tx.id(), tx);
    }
}

impl ZkTransactionStorage for InMemoryStore<SecureHash, SignedZkVerifierTransaction> {
    fn zk_transaction(&self, id: &SecureHash) -> Option<SignedZkVerifierTransaction> {
        self.get(id)
    }

    fn add_zk_transaction(&self, tx: SignedZkVerifierTransaction) {
        self.insert(tx.id(), tx);
    }

    fn contains_zk_transaction(&self, id: &SecureHash) -> bool {
        self.contains(id)
    }
}

impl UtxoStorage for InMemoryStore<StateRef, UtxoInfo> {
    fn utxo(&self, state_ref: &StateRef) -> Option<UtxoInfo> {
        self.get(state_ref)
    }

    fn add_utxo(&self, utxo: UtxoInfo) {
        self.insert(utxo.state_ref, utxo);
    }
}

/// The three stores a prover or verifier works against.
#[derive(Clone)]
pub struct LedgerStores {
    pub transactions: Arc<dyn TransactionStorage>,
    pub zk_transactions: Arc<dyn ZkTransactionStorage>,
    pub utxos: Arc<dyn UtxoStorage>,
}

impl LedgerStores {
    /// Fresh, empty in-memory stores.
    pub fn in_memory() -> Self {
        Self {
            transactions: Arc::new(InMemoryStore::<SecureHash, WireTransaction>::new()),
            zk_transactions: Arc::new(
                InMemoryStore::<SecureHash, SignedZkVerifierTransaction>::new(),
            ),
            utxos: Arc::new(InMemoryStore::<StateRef, UtxoInfo>::new()),
        }
    }
}

impl std::fmt::Debug for LedgerStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerStores").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkl_core::DigestAlgorithm;

    #[test]
    fn clones_share_data() {
        let a: InMemoryStore<u32, String> = InMemoryStore::new();
        let b = a.clone();
        assert!(a.insert(1, "one".into()).is_none());
        assert_eq!(b.get(&1).as_deref(), Some("one"));
        assert_eq!(b.insert(1, "uno".into()).as_deref(), Some("one"));
        assert_eq!(a.len(), 1);
        assert_eq!(a.remove(&1).as_deref(), Some("uno"));
        assert!(b.is_empty());
    }

    #[test]
    fn utxo_store_is_keyed_by_state_ref() {
        let store = InMemoryStore::<StateRef, UtxoInfo>::new();
        let alg = DigestAlgorithm::Sha256;
        let state_ref = StateRef::new(alg.digest(b"tx"), 2);
        store.add_utxo(UtxoInfo {
            state_ref,
            serialized: vec![0, 1, b'A'],
            nonce: alg.digest(b"nonce"),
            state_class: "A".into(),
        });
        assert_eq!(store.utxo(&state_ref).map(|u| u.state_class).as_deref(), Some("A"));
        assert!(store.utxo(&StateRef::new(alg.digest(b"tx"), 3)).is_none());
    }

    #[test]
    fn concurrent_writers_do_not_lose_records() {
        let store: InMemoryStore<u32, u32> = InMemoryStore::new();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        store.insert(t * 100 + i, i);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(), 800);
    }
}
