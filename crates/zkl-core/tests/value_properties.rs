//! Property tests for the wire and text forms of the core value types.

use std::collections::HashMap;

use proptest::prelude::*;

use zkl_core::{CanonicalBytes, DigestAlgorithm, SecureHash, StateRef};

fn algorithm() -> impl Strategy<Value = DigestAlgorithm> {
    prop_oneof![Just(DigestAlgorithm::Sha256), Just(DigestAlgorithm::Sha512_256)]
}

fn hash() -> impl Strategy<Value = SecureHash> {
    (algorithm(), any::<[u8; 32]>()).prop_map(|(a, b)| SecureHash::new(a, b))
}

proptest! {
    #[test]
    fn hash_text_form_round_trips(h in hash()) {
        prop_assert_eq!(h.to_string().parse::<SecureHash>().unwrap(), h);
        prop_assert_eq!(SecureHash::from_hex(h.algorithm(), &h.to_hex()).unwrap(), h);
    }

    #[test]
    fn state_ref_wire_form_is_36_bytes(h in hash(), index in any::<u32>()) {
        let r = StateRef::new(h, index);
        let bytes = r.to_bytes();
        prop_assert_eq!(bytes.len(), StateRef::ENCODED_LEN);
        prop_assert_eq!(StateRef::from_bytes(h.algorithm(), &bytes).unwrap(), r);
        prop_assert_eq!(r.to_string().parse::<StateRef>().unwrap(), r);
    }

    #[test]
    fn canonical_bytes_ignore_insertion_order(
        entries in prop::collection::btree_map("[a-z]{1,6}", any::<u64>(), 0..8)
    ) {
        let forward: HashMap<String, u64> = entries.clone().into_iter().collect();
        let mut backward = HashMap::new();
        for (k, v) in entries.into_iter().rev() {
            backward.insert(k, v);
        }
        prop_assert_eq!(
            CanonicalBytes::new(&forward).unwrap().into_bytes(),
            CanonicalBytes::new(&backward).unwrap().into_bytes()
        );
    }
}

#[test]
fn truncated_state_refs_are_rejected() {
    let r = StateRef::new(DigestAlgorithm::Sha256.digest(b"tx"), 3);
    let bytes = r.to_bytes();
    assert!(StateRef::from_bytes(DigestAlgorithm::Sha256, &bytes[..35]).is_err());
}
