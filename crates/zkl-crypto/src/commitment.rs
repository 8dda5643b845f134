//! # Component Commitments
//!
//! Every component of a transaction is committed to as a salted leaf:
//!
//! ```text
//! nonce     = H(privacy_salt || be32(group_index) || be32(component_index))
//! leaf_hash = H(nonce || serialized_component)
//! ```
//!
//! The privacy salt is secret to the parties that hold the plaintext
//! transaction. Without it a verifier cannot derive the nonce of a hidden
//! component and so cannot brute-force low-entropy component contents from
//! the leaf hash.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use zkl_core::{from_hex, to_hex, DigestAlgorithm, SecureHash, HASH_LENGTH};

use crate::error::CryptoError;

/// 32 bytes of per-transaction secret entropy. Never all zeros.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrivacySalt([u8; HASH_LENGTH]);

impl PrivacySalt {
    /// Draw a fresh salt from the operating system RNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; HASH_LENGTH];
        loop {
            rand::rngs::OsRng.fill_bytes(&mut bytes);
            if bytes.iter().any(|b| *b != 0) {
                return Self(bytes);
            }
        }
    }

    /// Wrap explicit salt bytes.
    ///
    /// # Errors
    ///
    /// Rejects the all-zero salt, which would make nonces predictable.
    pub fn from_bytes(bytes: [u8; HASH_LENGTH]) -> Result<Self, CryptoError> {
        if bytes.iter().all(|b| *b == 0) {
            return Err(CryptoError::InvalidPrivacySalt(
                "privacy salt must not be all zeros".into(),
            ));
        }
        Ok(Self(bytes))
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        let bytes = from_hex(hex)?;
        let arr: [u8; HASH_LENGTH] = bytes.as_slice().try_into().map_err(|_| {
            CryptoError::InvalidPrivacySalt(format!(
                "expected {HASH_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;
        Self::from_bytes(arr)
    }

    /// The raw salt bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }

    /// Render as lowercase hex.
    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }
}

impl fmt::Debug for PrivacySalt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivacySalt(<secret>)")
    }
}

impl Serialize for PrivacySalt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PrivacySalt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// Derive the nonce of component `internal_index` in group `group_index`.
pub fn compute_nonce(
    algorithm: DigestAlgorithm,
    salt: &PrivacySalt,
    group_index: u32,
    internal_index: u32,
) -> SecureHash {
    algorithm.digest_parts(&[
        salt.as_bytes(),
        &group_index.to_be_bytes(),
        &internal_index.to_be_bytes(),
    ])
}

/// The leaf hash of a component: `H(nonce || bytes)` with the nonce's
/// algorithm.
pub fn component_hash(nonce: &SecureHash, bytes: &[u8]) -> SecureHash {
    nonce.algorithm().digest_parts(&[nonce.as_bytes(), bytes])
}
