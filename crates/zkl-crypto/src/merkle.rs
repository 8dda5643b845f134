//! # Merkle Trees
//!
//! A binary Merkle tree over algorithm-tagged leaf hashes. The same
//! construction is used at both levels of a transaction commitment:
//!
//! - **group level**: leaves are component leaf hashes `H(nonce || bytes)` in
//!   original component order;
//! - **transaction level**: leaves are the group roots in group-ordinal order,
//!   with the all-ones hash standing in for absent groups. The root is the
//!   transaction id.
//!
//! ## Construction
//!
//! - Leaves are padded on the right with the zero hash up to the next power of
//!   two. A single leaf is its own root.
//! - Node: `H(left || right)` using the leaves' algorithm.
//! - The empty tree has the zero hash as its root.
//!
//! The tree keeps every level, so the root and the original leaves can be read
//! back without rehashing.

use zkl_core::{DigestAlgorithm, SecureHash};

use crate::error::CryptoError;

/// A fully materialised Merkle tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    algorithm: DigestAlgorithm,
    leaf_count: usize,
    /// `levels[0]` is the padded leaf level, the last level holds the root.
    levels: Vec<Vec<SecureHash>>,
}

impl MerkleTree {
    /// Build a tree over `leaves`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MixedAlgorithms`] if any leaf was produced by a
    /// different algorithm than `algorithm`.
    pub fn build(algorithm: DigestAlgorithm, leaves: &[SecureHash]) -> Result<Self, CryptoError> {
        if let Some(bad) = leaves.iter().find(|l| l.algorithm() != algorithm) {
            return Err(CryptoError::MixedAlgorithms {
                expected: algorithm.to_string(),
                found: bad.algorithm().to_string(),
            });
        }
        if leaves.is_empty() {
            return Ok(Self {
                algorithm,
                leaf_count: 0,
                levels: Vec::new(),
            });
        }

        let mut level = leaves.to_vec();
        level.resize(leaves.len().next_power_of_two(), algorithm.zero_hash());

        let mut levels = vec![level];
        while let Some(current) = levels.last() {
            if current.len() <= 1 {
                break;
            }
            let next: Vec<SecureHash> = current
                .chunks(2)
                .map(|pair| pair[0].concat(&pair[1]))
                .collect();
            levels.push(next);
        }

        Ok(Self {
            algorithm,
            leaf_count: leaves.len(),
            levels,
        })
    }

    /// The root hash. The zero hash for an empty tree.
    pub fn root(&self) -> SecureHash {
        self.levels
            .last()
            .and_then(|top| top.first())
            .copied()
            .unwrap_or_else(|| self.algorithm.zero_hash())
    }

    /// The algorithm every node was hashed with.
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Number of leaves before padding.
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Number of leaves after zero-hash padding.
    pub fn padded_leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    /// The original (unpadded) leaves.
    pub fn leaves(&self) -> &[SecureHash] {
        self.levels
            .first()
            .map_or(&[][..], |level| &level[..self.leaf_count])
    }

    /// Height of the tree (0 for empty or single-leaf trees).
    pub fn height(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }
}

/// Convenience: the root of the tree over `leaves`.
pub fn merkle_root(
    algorithm: DigestAlgorithm,
    leaves: &[SecureHash],
) -> Result<SecureHash, CryptoError> {
    Ok(MerkleTree::build(algorithm, leaves)?.root())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALG: DigestAlgorithm = DigestAlgorithm::Sha256;

    fn leaf(i: usize) -> SecureHash {
        ALG.digest(format!("leaf-{i}").as_bytes())
    }

    #[test]
    fn empty_tree_root_is_zero_hash() {
        let tree = MerkleTree::build(ALG, &[]).unwrap();
        assert_eq!(tree.root(), ALG.zero_hash());
        assert_eq!(tree.leaf_count(), 0);
        assert_eq!(tree.padded_leaf_count(), 0);
        assert!(tree.leaves().is_empty());
    }

    #[test]
    fn single_leaf_is_its_own_root() {
        let tree = MerkleTree::build(ALG, &[leaf(0)]).unwrap();
        assert_eq!(tree.root(), leaf(0));
        assert_eq!(tree.height(), 0);
    }

    #[test]
    fn two_leaves_hash_pairwise() {
        let tree = MerkleTree::build(ALG, &[leaf(0), leaf(1)]).unwrap();
        assert_eq!(tree.root(), leaf(0).concat(&leaf(1)));
        assert_eq!(tree.height(), 1);
    }

    #[test]
    fn three_leaves_pad_with_zero_hash() {
        let tree = MerkleTree::build(ALG, &[leaf(0), leaf(1), leaf(2)]).unwrap();
        let expected = leaf(0)
            .concat(&leaf(1))
            .concat(&leaf(2).concat(&ALG.zero_hash()));
        assert_eq!(tree.root(), expected);
        assert_eq!(tree.leaf_count(), 3);
        assert_eq!(tree.padded_leaf_count(), 4);
        assert_eq!(tree.leaves(), &[leaf(0), leaf(1), leaf(2)]);
    }

    #[test]
    fn five_leaves_pad_to_eight() {
        let leaves: Vec<_> = (0..5).map(leaf).collect();
        let tree = MerkleTree::build(ALG, &leaves).unwrap();
        assert_eq!(tree.padded_leaf_count(), 8);
        assert_eq!(tree.height(), 3);
    }

    #[test]
    fn leaf_order_matters() {
        let a = merkle_root(ALG, &[leaf(0), leaf(1)]).unwrap();
        let b = merkle_root(ALG, &[leaf(1), leaf(0)]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn mixed_algorithms_are_rejected() {
        let other = DigestAlgorithm::Sha512_256.digest(b"x");
        let err = MerkleTree::build(ALG, &[leaf(0), other]).unwrap_err();
        assert!(matches!(err, CryptoError::MixedAlgorithms { .. }));
    }

    #[test]
    fn root_uses_tree_algorithm() {
        let alg = DigestAlgorithm::Sha512_256;
        let leaves = [alg.digest(b"a"), alg.digest(b"b")];
        let root = merkle_root(alg, &leaves).unwrap();
        assert_eq!(root.algorithm(), alg);
        assert_eq!(merkle_root(alg, &[]).unwrap(), alg.zero_hash());
    }
}
