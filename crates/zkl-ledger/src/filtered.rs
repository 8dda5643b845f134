//! # Filtered Component Groups
//!
//! A [`ZkFilteredComponentGroup`] is one component group as a verifier sees
//! it: the visible components with their nonces, in original relative order,
//! plus the leaf hash of every hidden component keyed by its original index.
//! Visible components sit at the indices not claimed by a hidden hash, so
//! the original layout is recoverable without storing it.
//!
//! The full leaf list and the group Merkle tree are computed once, at
//! construction, and never change afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use zkl_core::{DigestAlgorithm, SecureHash};
use zkl_crypto::{component_hash, MerkleTree};

use crate::error::CommitmentError;
use crate::transaction::ComponentGroup;
use crate::visibility::VisibilityPolicy;

/// One component group with its hidden components reduced to hashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FilteredGroupRecord", into = "FilteredGroupRecord")]
pub struct ZkFilteredComponentGroup {
    group_index: u32,
    algorithm: DigestAlgorithm,
    components: Vec<Vec<u8>>,
    nonces: Vec<SecureHash>,
    private_component_hashes: BTreeMap<u32, SecureHash>,
    visible_indices: Vec<u32>,
    tree: MerkleTree,
}

/// The persisted form.
#[derive(Serialize, Deserialize)]
struct FilteredGroupRecord {
    group_index: u32,
    algorithm: DigestAlgorithm,
    #[serde(with = "crate::encoding::hex_bytes_vec")]
    components: Vec<Vec<u8>>,
    nonces: Vec<SecureHash>,
    private_component_hashes: BTreeMap<u32, SecureHash>,
}

impl TryFrom<FilteredGroupRecord> for ZkFilteredComponentGroup {
    type Error = CommitmentError;

    fn try_from(r: FilteredGroupRecord) -> Result<Self, Self::Error> {
        Self::new(
            r.group_index,
            r.algorithm,
            r.components,
            r.nonces,
            r.private_component_hashes,
        )
    }
}

impl From<ZkFilteredComponentGroup> for FilteredGroupRecord {
    fn from(g: ZkFilteredComponentGroup) -> Self {
        Self {
            group_index: g.group_index,
            algorithm: g.algorithm,
            components: g.components,
            nonces: g.nonces,
            private_component_hashes: g.private_component_hashes,
        }
    }
}

impl ZkFilteredComponentGroup {
    /// Build a filtered group, checking that visible and hidden components
    /// partition `0..components.len() + private_component_hashes.len()`.
    pub fn new(
        group_index: u32,
        algorithm: DigestAlgorithm,
        components: Vec<Vec<u8>>,
        nonces: Vec<SecureHash>,
        private_component_hashes: BTreeMap<u32, SecureHash>,
    ) -> Result<Self, CommitmentError> {
        if components.len() != nonces.len() {
            return Err(CommitmentError::ComponentCountMismatch {
                group_index,
                components: components.len(),
                nonces: nonces.len(),
            });
        }
        if let Some(bad) = nonces
            .iter()
            .chain(private_component_hashes.values())
            .find(|h| h.algorithm() != algorithm)
        {
            return Err(CommitmentError::MixedAlgorithms {
                group_index,
                expected: algorithm.to_string(),
                found: bad.algorithm().to_string(),
            });
        }

        let total = components.len() + private_component_hashes.len();
        if let Some((&index, _)) = private_component_hashes
            .iter()
            .find(|(i, _)| **i as usize >= total)
        {
            return Err(CommitmentError::MalformedPartition {
                group_index,
                reason: format!(
                    "hidden index {index} outside 0..{total}: visible and hidden indices leave a gap"
                ),
            });
        }

        let visible_indices: Vec<u32> = (0..total as u32)
            .filter(|i| !private_component_hashes.contains_key(i))
            .collect();
        let mut visible = components.iter().zip(&nonces);
        let mut leaves = Vec::with_capacity(total);
        for i in 0..total as u32 {
            let leaf = match private_component_hashes.get(&i) {
                Some(hash) => *hash,
                None => {
                    let (bytes, nonce) = visible.next().ok_or_else(|| {
                        CommitmentError::MalformedPartition {
                            group_index,
                            reason: format!("no visible component for index {i}"),
                        }
                    })?;
                    component_hash(nonce, bytes)
                }
            };
            leaves.push(leaf);
        }
        let tree = MerkleTree::build(algorithm, &leaves)?;

        Ok(Self {
            group_index,
            algorithm,
            components,
            nonces,
            private_component_hashes,
            visible_indices,
            tree,
        })
    }

    /// Filter a plaintext group. `nonce(index)` yields the nonce of each
    /// component.
    pub fn filter(
        group: &ComponentGroup,
        algorithm: DigestAlgorithm,
        policy: &VisibilityPolicy,
        nonce: impl Fn(u32) -> SecureHash,
    ) -> Result<Self, CommitmentError> {
        let mut components = Vec::new();
        let mut nonces = Vec::new();
        let mut hidden = BTreeMap::new();
        for (i, bytes) in group.components.iter().enumerate() {
            let index = i as u32;
            let n = nonce(index);
            if policy.is_public(group.group_index, index) {
                components.push(bytes.clone());
                nonces.push(n);
            } else {
                hidden.insert(index, component_hash(&n, bytes));
            }
        }
        Self::new(group.group_index, algorithm, components, nonces, hidden)
    }

    pub fn group_index(&self) -> u32 {
        self.group_index
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Visible components in original relative order.
    pub fn components(&self) -> &[Vec<u8>] {
        &self.components
    }

    /// Nonces of the visible components, parallel to [`Self::components`].
    pub fn nonces(&self) -> &[SecureHash] {
        &self.nonces
    }

    pub fn private_component_hashes(&self) -> &BTreeMap<u32, SecureHash> {
        &self.private_component_hashes
    }

    /// Original indices of the visible components.
    pub fn visible_indices(&self) -> &[u32] {
        &self.visible_indices
    }

    /// Number of components in the original group.
    pub fn original_count(&self) -> usize {
        self.tree.leaf_count()
    }

    fn visible_position(&self, index: u32) -> Option<usize> {
        self.visible_indices.binary_search(&index).ok()
    }

    /// Bytes of original component `index`, if it is visible.
    pub fn component(&self, index: u32) -> Option<&[u8]> {
        self.visible_position(index)
            .map(|p| self.components[p].as_slice())
    }

    /// Nonce of original component `index`, if it is visible.
    pub fn nonce(&self, index: u32) -> Option<SecureHash> {
        self.visible_position(index).map(|p| self.nonces[p])
    }

    /// Leaf hash of original component `index`, visible or hidden.
    pub fn leaf_hash(&self, index: u32) -> Option<SecureHash> {
        self.tree.leaves().get(index as usize).copied()
    }

    /// Every leaf hash in original order.
    pub fn leaf_hashes(&self) -> &[SecureHash] {
        self.tree.leaves()
    }

    /// Root of the group's Merkle tree; the zero hash when the group is empty.
    pub fn merkle_root(&self) -> SecureHash {
        self.tree.root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkl_core::ComponentGroupEnum;

    const ALG: DigestAlgorithm = DigestAlgorithm::Sha256;

    fn nonce(i: u32) -> SecureHash {
        ALG.digest(&i.to_be_bytes())
    }

    fn group(n: u8) -> ComponentGroup {
        ComponentGroup::new(
            ComponentGroupEnum::Outputs,
            (0..n).map(|i| vec![i; (i as usize) + 1]).collect(),
        )
    }

    fn plain_root(g: &ComponentGroup) -> SecureHash {
        let leaves: Vec<_> = g
            .components
            .iter()
            .enumerate()
            .map(|(i, b)| component_hash(&nonce(i as u32), b))
            .collect();
        MerkleTree::build(ALG, &leaves).unwrap().root()
    }

    #[test]
    fn filtering_preserves_group_root() {
        let g = group(5);
        let policy = VisibilityPolicy::default()
            .with_component(ComponentGroupEnum::Outputs, 1, true)
            .with_component(ComponentGroupEnum::Outputs, 3, true);
        let filtered = ZkFilteredComponentGroup::filter(&g, ALG, &policy, nonce).unwrap();
        assert_eq!(filtered.visible_indices(), &[1, 3]);
        assert_eq!(filtered.components().len(), 2);
        assert_eq!(filtered.private_component_hashes().len(), 3);
        assert_eq!(filtered.merkle_root(), plain_root(&g));
    }

    #[test]
    fn visible_components_keep_bytes_and_nonces() {
        let g = group(3);
        let policy = VisibilityPolicy::default().with_component(ComponentGroupEnum::Outputs, 2, true);
        let filtered = ZkFilteredComponentGroup::filter(&g, ALG, &policy, nonce).unwrap();
        assert_eq!(filtered.component(2), Some(&g.components[2][..]));
        assert_eq!(filtered.nonce(2), Some(nonce(2)));
        assert_eq!(filtered.component(0), None);
        assert_eq!(filtered.nonce(0), None);
        assert_eq!(
            filtered.leaf_hash(0),
            Some(component_hash(&nonce(0), &g.components[0]))
        );
        assert_eq!(filtered.leaf_hash(3), None);
    }

    #[test]
    fn empty_group_root_is_zero_hash() {
        let g = ZkFilteredComponentGroup::new(1, ALG, vec![], vec![], BTreeMap::new()).unwrap();
        assert_eq!(g.merkle_root(), ALG.zero_hash());
        assert_eq!(g.original_count(), 0);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let err = ZkFilteredComponentGroup::new(1, ALG, vec![vec![1]], vec![], BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, CommitmentError::ComponentCountMismatch { .. }));
    }

    #[test]
    fn partition_gap_is_rejected() {
        // One visible component and a hidden hash at index 5 cannot cover 0..2.
        let hidden = BTreeMap::from([(5u32, ALG.digest(b"h"))]);
        let err = ZkFilteredComponentGroup::new(1, ALG, vec![vec![1]], vec![nonce(0)], hidden)
            .unwrap_err();
        assert!(matches!(err, CommitmentError::MalformedPartition { .. }));
    }

    #[test]
    fn mixed_algorithms_are_rejected() {
        let hidden = BTreeMap::from([(0u32, DigestAlgorithm::Sha512_256.digest(b"h"))]);
        let err = ZkFilteredComponentGroup::new(1, ALG, vec![], vec![], hidden).unwrap_err();
        assert!(matches!(err, CommitmentError::MixedAlgorithms { .. }));
    }

    #[test]
    fn serde_roundtrip_rebuilds_tree() {
        let g = group(4);
        let filtered =
            ZkFilteredComponentGroup::filter(&g, ALG, &VisibilityPolicy::default(), nonce).unwrap();
        let json = serde_json::to_string(&filtered).unwrap();
        assert!(!json.contains("tree"));
        let back: ZkFilteredComponentGroup = serde_json::from_str(&json).unwrap();
        assert_eq!(back, filtered);
        assert_eq!(back.merkle_root(), plain_root(&g));
    }

    #[test]
    fn tampered_record_fails_to_deserialize() {
        let json = serde_json::json!({
            "group_index": 1,
            "algorithm": "sha256",
            "components": ["01"],
            "nonces": [],
            "private_component_hashes": {}
        });
        assert!(serde_json::from_value::<ZkFilteredComponentGroup>(json).is_err());
    }
}
