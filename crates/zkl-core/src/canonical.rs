//! # Canonical Serialization
//!
//! Defines [`CanonicalBytes`], the sole construction path for bytes derived
//! from structured values that are hashed or signed: non-binary transaction
//! components (commands, notary, time window, signers), signature payloads and
//! public inputs handed to a proof system.
//!
//! ## Rules
//!
//! 1. Reject floats. Amounts must be strings or integers.
//! 2. Object keys sorted lexicographically (serde_json's default `Map` is
//!    ordered).
//! 3. Compact separators, no whitespace.
//!
//! Two parties serializing the same value therefore produce identical bytes,
//! which is what makes the resulting digests comparable.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by canonical JSON serialization.
///
/// The inner `Vec<u8>` is private. Downstream code cannot construct
/// `CanonicalBytes` except through [`CanonicalBytes::new()`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalizationError::FloatRejected`] if the value contains
    /// a float, [`CanonicalizationError::SerializationFailed`] if serde fails.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        let coerced = coerce_json_value(value)?;
        Ok(Self(serde_json::to_vec(&coerced)?))
    }

    /// Access the canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume and return the inner byte vector.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Number of bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the canonical form is empty. Never true for a value produced
    /// by [`CanonicalBytes::new()`].
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Recursively validate and rebuild a JSON value so that object keys land in
/// sorted order.
fn coerce_json_value(value: Value) -> Result<Value, CanonicalizationError> {
    match value {
        Value::Number(n) => {
            if n.is_f64() {
                return Err(CanonicalizationError::FloatRejected(
                    n.as_f64().unwrap_or(f64::NAN),
                ));
            }
            Ok(Value::Number(n))
        }
        Value::Object(map) => {
            let mut coerced = serde_json::Map::new();
            for (k, v) in map {
                coerced.insert(k, coerce_json_value(v)?);
            }
            Ok(Value::Object(coerced))
        }
        Value::Array(arr) => {
            let coerced: Result<Vec<_>, _> = arr.into_iter().map(coerce_json_value).collect();
            Ok(Value::Array(coerced?))
        }
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_and_compact() {
        let cb = CanonicalBytes::new(&json!({"b": 2, "a": 1, "c": {"z": 0, "y": [1, 2]}})).unwrap();
        assert_eq!(
            std::str::from_utf8(cb.as_bytes()).unwrap(),
            r#"{"a":1,"b":2,"c":{"y":[1,2],"z":0}}"#
        );
    }

    #[test]
    fn floats_are_rejected() {
        let err = CanonicalBytes::new(&json!({"amount": 1.5})).unwrap_err();
        assert!(matches!(err, CanonicalizationError::FloatRejected(f) if f == 1.5));
    }

    #[test]
    fn nested_floats_are_rejected() {
        assert!(CanonicalBytes::new(&json!([1, [2, 3.25]])).is_err());
    }

    #[test]
    fn integers_and_strings_pass() {
        let cb = CanonicalBytes::new(&json!({"n": -42, "s": "1.5", "big": 999999999999u64})).unwrap();
        assert_eq!(
            std::str::from_utf8(cb.as_bytes()).unwrap(),
            r#"{"big":999999999999,"n":-42,"s":"1.5"}"#
        );
        assert!(!cb.is_empty());
    }

    #[test]
    fn struct_field_order_does_not_matter() {
        #[derive(Serialize)]
        struct A {
            x: u32,
            y: u32,
        }
        #[derive(Serialize)]
        struct B {
            y: u32,
            x: u32,
        }
        assert_eq!(
            CanonicalBytes::new(&A { x: 1, y: 2 }).unwrap(),
            CanonicalBytes::new(&B { y: 2, x: 1 }).unwrap()
        );
    }
}
