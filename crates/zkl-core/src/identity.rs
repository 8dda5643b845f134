//! # State References
//!
//! A [`StateRef`] points at one output of a prior transaction: the
//! transaction id plus the output's index. Inputs and references of a
//! transaction are lists of state references, and they are what the
//! backward chain walks.
//!
//! ## Wire Encoding
//!
//! Fixed 36 bytes: the 32 raw hash bytes followed by the index as a
//! big-endian `u32`. The digest algorithm is not encoded; it is the algorithm
//! of the transaction carrying the reference.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::digest::{DigestAlgorithm, SecureHash, HASH_LENGTH};
use crate::error::CoreError;

/// A pointer to output `index` of transaction `txhash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateRef {
    /// Id of the transaction that created the state.
    pub txhash: SecureHash,
    /// Position of the state in that transaction's outputs.
    pub index: u32,
}

impl StateRef {
    /// Length of the wire encoding in bytes.
    pub const ENCODED_LEN: usize = HASH_LENGTH + 4;

    /// Create a state reference.
    pub fn new(txhash: SecureHash, index: u32) -> Self {
        Self { txhash, index }
    }

    /// Encode as 36 bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::ENCODED_LEN);
        out.extend_from_slice(self.txhash.as_bytes());
        out.extend_from_slice(&self.index.to_be_bytes());
        out
    }

    /// Decode from the 36-byte wire encoding.
    pub fn from_bytes(algorithm: DigestAlgorithm, bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() != Self::ENCODED_LEN {
            return Err(CoreError::InvalidStateRef(format!(
                "expected {} bytes, got {}",
                Self::ENCODED_LEN,
                bytes.len()
            )));
        }
        let (hash, index) = bytes.split_at(HASH_LENGTH);
        let mut index_bytes = [0u8; 4];
        index_bytes.copy_from_slice(index);
        Ok(Self {
            txhash: SecureHash::from_slice(algorithm, hash)?,
            index: u32::from_be_bytes(index_bytes),
        })
    }
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.txhash, self.index)
    }
}

impl FromStr for StateRef {
    type Err = CoreError;

    /// Parses the `Display` form, `<hash>(<index>)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (hash, rest) = s
            .split_once('(')
            .ok_or_else(|| CoreError::InvalidStateRef(s.to_string()))?;
        let index = rest
            .strip_suffix(')')
            .and_then(|i| i.parse::<u32>().ok())
            .ok_or_else(|| CoreError::InvalidStateRef(s.to_string()))?;
        Ok(Self {
            txhash: hash.parse()?,
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StateRef {
        StateRef::new(DigestAlgorithm::Sha256.digest(b"tx-1"), 7)
    }

    #[test]
    fn wire_encoding_is_36_bytes_big_endian_index() {
        let bytes = sample().to_bytes();
        assert_eq!(bytes.len(), StateRef::ENCODED_LEN);
        assert_eq!(&bytes[32..], &[0, 0, 0, 7]);
        let back = StateRef::from_bytes(DigestAlgorithm::Sha256, &bytes).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn from_bytes_rejects_short_input() {
        assert!(StateRef::from_bytes(DigestAlgorithm::Sha256, &[0u8; 35]).is_err());
    }

    #[test]
    fn display_parses_back() {
        let s = sample().to_string();
        assert!(s.ends_with("(7)"));
        assert_eq!(s.parse::<StateRef>().unwrap(), sample());
    }

    #[test]
    fn malformed_strings_are_rejected() {
        assert!("nohash".parse::<StateRef>().is_err());
        assert!(format!("{}(x)", sample().txhash).parse::<StateRef>().is_err());
        assert!(format!("{}(1", sample().txhash).parse::<StateRef>().is_err());
    }
}
