//! # Secure Hashes — Algorithm-Tagged Digests
//!
//! Defines [`SecureHash`] and [`DigestAlgorithm`]. Every digest carries the
//! algorithm that produced it, so a transaction declares its hash function
//! once and every derived value (nonces, leaf hashes, Merkle nodes, the id)
//! stays self-describing.
//!
//! ## Sentinels
//!
//! - [`DigestAlgorithm::zero_hash`] — all zero bytes. Used as the zero nonce
//!   for filler slots, as Merkle padding, and as the root of an empty tree.
//! - [`DigestAlgorithm::all_ones_hash`] — all `0xff` bytes. Substituted for
//!   component groups that are absent from a transaction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256, Sha512_256};

use crate::error::CoreError;

/// Length of every digest in bytes.
pub const HASH_LENGTH: usize = 32;

/// The hash function a transaction commits with.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum DigestAlgorithm {
    /// SHA-256. The default for new transactions.
    #[default]
    Sha256,
    /// SHA-512 truncated to 256 bits.
    Sha512_256,
}

impl DigestAlgorithm {
    /// Returns the algorithm identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512_256 => "sha512-256",
        }
    }

    /// Hash arbitrary bytes with this algorithm.
    pub fn digest(&self, data: &[u8]) -> SecureHash {
        let mut bytes = [0u8; HASH_LENGTH];
        match self {
            Self::Sha256 => bytes.copy_from_slice(&Sha256::digest(data)),
            Self::Sha512_256 => bytes.copy_from_slice(&Sha512_256::digest(data)),
        }
        SecureHash::new(*self, bytes)
    }

    /// Hash the concatenation of several byte slices without an intermediate
    /// allocation.
    pub fn digest_parts(&self, parts: &[&[u8]]) -> SecureHash {
        let mut bytes = [0u8; HASH_LENGTH];
        match self {
            Self::Sha256 => {
                let mut hasher = Sha256::new();
                for part in parts {
                    hasher.update(part);
                }
                bytes.copy_from_slice(&hasher.finalize());
            }
            Self::Sha512_256 => {
                let mut hasher = Sha512_256::new();
                for part in parts {
                    hasher.update(part);
                }
                bytes.copy_from_slice(&hasher.finalize());
            }
        }
        SecureHash::new(*self, bytes)
    }

    /// The all-zero hash for this algorithm.
    pub fn zero_hash(&self) -> SecureHash {
        SecureHash::new(*self, [0u8; HASH_LENGTH])
    }

    /// The all-ones hash for this algorithm.
    pub fn all_ones_hash(&self) -> SecureHash {
        SecureHash::new(*self, [0xffu8; HASH_LENGTH])
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "sha512-256" | "sha-512/256" => Ok(Self::Sha512_256),
            other => Err(CoreError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// A 32-byte digest together with the algorithm that produced it.
///
/// Serializes as `"<algorithm>:<hex>"`, e.g. `"sha256:9f86d0..."`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SecureHash {
    algorithm: DigestAlgorithm,
    bytes: [u8; HASH_LENGTH],
}

impl SecureHash {
    /// Wrap raw digest bytes.
    pub fn new(algorithm: DigestAlgorithm, bytes: [u8; HASH_LENGTH]) -> Self {
        Self { algorithm, bytes }
    }

    /// Build a hash from a byte slice that must be exactly 32 bytes long.
    pub fn from_slice(algorithm: DigestAlgorithm, bytes: &[u8]) -> Result<Self, CoreError> {
        let arr: [u8; HASH_LENGTH] = bytes.try_into().map_err(|_| CoreError::InvalidLength {
            expected: HASH_LENGTH,
            actual: bytes.len(),
        })?;
        Ok(Self::new(algorithm, arr))
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(algorithm: DigestAlgorithm, hex: &str) -> Result<Self, CoreError> {
        let bytes = from_hex(hex)?;
        Self::from_slice(algorithm, &bytes)
    }

    /// The algorithm that produced this hash.
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.bytes
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        to_hex(&self.bytes)
    }

    /// Hash `self || other` with this hash's algorithm.
    pub fn concat(&self, other: &SecureHash) -> SecureHash {
        self.algorithm.digest_parts(&[&self.bytes, &other.bytes])
    }

    /// Whether this is the all-zero sentinel.
    pub fn is_zero(&self) -> bool {
        self.bytes.iter().all(|b| *b == 0)
    }
}

impl fmt::Display for SecureHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

impl fmt::Debug for SecureHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureHash({self})")
    }
}

impl FromStr for SecureHash {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algorithm, hex) = match s.split_once(':') {
            Some((alg, hex)) => (alg.parse()?, hex),
            None => (DigestAlgorithm::Sha256, s),
        };
        Self::from_hex(algorithm, hex)
    }
}

impl Serialize for SecureHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SecureHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Encode bytes as a lowercase hex string.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decode a hex string (case-insensitive, surrounding whitespace ignored).
pub fn from_hex(s: &str) -> Result<Vec<u8>, CoreError> {
    let s = s.trim();
    if s.len() % 2 != 0 {
        return Err(CoreError::HexDecode(format!(
            "hex string has odd length: {}",
            s.len()
        )));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            s.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| CoreError::HexDecode(format!("invalid hex at position {i}")))
        })
        .collect()
}
