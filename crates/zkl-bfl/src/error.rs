//! # Error Types
//!
//! Schema errors are construction-time defects and must not be retried.
//! Codec errors carry the type id and bit offset that failed. The BigDecimal
//! overflow message is matched by callers, so it never changes.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error for the type model, codec and generators.
#[derive(Error, Debug)]
pub enum BflError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    BigDecimal(#[from] BigDecimalError),

    /// A value's shape does not match the type it is encoded as.
    #[error("value does not match type {type_id}: {reason}")]
    TypeMismatch { type_id: String, reason: String },

    /// A number does not fit its primitive width.
    #[error("{value} does not fit {type_id}")]
    OutOfRange { type_id: String, value: String },

    /// A decoded enum ordinal has no variant.
    #[error("ordinal {ordinal} is out of range for enum {type_id} with {variants} variants")]
    EnumOrdinalOutOfRange {
        type_id: String,
        ordinal: u128,
        variants: usize,
    },

    /// A container holds more entries than its fixed capacity.
    #[error("{type_id} holds {size} entries but its capacity is {capacity}")]
    CapacityExceeded {
        type_id: String,
        size: u128,
        capacity: usize,
    },

    /// A wrapped component's fixed header did not match.
    #[error("header of {type_id} does not match")]
    HeaderMismatch { type_id: String },

    #[error("truncated input: {needed} bits needed at bit {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Bytes left over after a value, or non-zero padding bits.
    #[error("{0} unexpected trailing bits")]
    TrailingData(usize),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Defects in a schema or type graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("unknown type `{0}`")]
    UnknownType(String),

    #[error("`{0}` is not a valid identifier")]
    InvalidName(String),

    #[error("`{0}` is declared more than once")]
    DuplicateName(String),

    #[error("field `{field}` appears more than once in `{owner}`")]
    DuplicateField { owner: String, field: String },

    #[error("enum `{0}` must declare between 1 and 65536 distinct variants")]
    InvalidEnum(String),

    #[error("`{0}` must have a capacity of at least one")]
    ZeroCapacity(String),

    /// Fixed-size layouts cannot contain themselves.
    #[error("cyclic type: {}", path.join(" -> "))]
    Cyclic { path: Vec<String> },

    #[error("invalid type expression `{expr}`: {reason}")]
    InvalidTypeExpression { expr: String, reason: String },

    #[error("failed to read schema {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },

    #[error("failed to parse schema: {0}")]
    Parse(String),
}

/// Fixed-capacity decimal arithmetic and encoding errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BigDecimalError {
    /// A carry remained after the most significant integer digit.
    #[error("Magnitude exceeds the maximum stored value")]
    Overflow,

    #[error("invalid decimal literal {0:?}")]
    Parse(String),

    #[error("{literal} does not fit {integer_digits} integer and {fraction_digits} fraction digits")]
    ExceedsCapacity {
        literal: String,
        integer_digits: usize,
        fraction_digits: usize,
    },

    #[error("operands have different capacities: {left:?} and {right:?}")]
    CapacityMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },

    /// Decoded sign or digit outside its domain.
    #[error("invalid decimal encoding: {0}")]
    InvalidEncoding(String),
}
