//! # Error Types
//!
//! Errors raised by the foundational value types. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.

use thiserror::Error;

/// Errors from the core value types.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Hex decoding failed.
    #[error("hex decode error: {0}")]
    HexDecode(String),

    /// A fixed-width value had the wrong number of bytes.
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Required byte count.
        expected: usize,
        /// Byte count received.
        actual: usize,
    },

    /// The digest algorithm tag is not recognised.
    #[error("unknown digest algorithm: {0}")]
    UnknownAlgorithm(String),

    /// A state reference string or encoding could not be parsed.
    #[error("invalid state reference: {0}")]
    InvalidStateRef(String),

    /// A fixed binary layout could not be decoded.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// The component group ordinal is outside the known range.
    #[error("unknown component group ordinal: {0}")]
    UnknownComponentGroup(u32),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    /// Amounts must be strings or integers.
    #[error("float values are not permitted in canonical representations; use string or integer: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}
