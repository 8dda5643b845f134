//! Property tests for the decimal reference arithmetic and the bit codec.

use std::cmp::Ordering;

use proptest::prelude::*;

use zkl_bfl::{decode, encode, values_equal, BflModule, BflType, BflValue, FixedDecimal, Primitive};

const INTEGER_DIGITS: usize = 4;
const FRACTION_DIGITS: usize = 2;

fn decimal() -> impl Strategy<Value = FixedDecimal> {
    (
        any::<bool>(),
        prop::collection::vec(0u8..10, INTEGER_DIGITS),
        prop::collection::vec(0u8..10, FRACTION_DIGITS),
    )
        .prop_map(|(negative, integer, fraction)| {
            let zero = integer.iter().chain(&fraction).all(|d| *d == 0);
            let sign = match (zero, negative) {
                (true, _) => 0,
                (false, true) => -1,
                (false, false) => 1,
            };
            FixedDecimal::from_parts(sign, integer, fraction).unwrap()
        })
}

proptest! {
    #[test]
    fn subtraction_undoes_addition(a in decimal(), b in decimal()) {
        if let Ok(sum) = a.plus(&b) {
            prop_assert_eq!(sum.minus(&b).unwrap(), a);
        }
    }

    #[test]
    fn addition_commutes(a in decimal(), b in decimal()) {
        prop_assert_eq!(a.plus(&b).ok(), b.plus(&a).ok());
    }

    #[test]
    fn comparison_is_antisymmetric(a in decimal(), b in decimal()) {
        prop_assert_eq!(a.compare(&b).unwrap(), b.compare(&a).unwrap().reverse());
    }

    #[test]
    fn comparison_agrees_with_the_sign_of_the_difference(a in decimal(), b in decimal()) {
        if let Ok(difference) = a.minus(&b) {
            prop_assert_eq!(a.compare(&b).unwrap(), difference.sign().cmp(&0));
        }
    }

    #[test]
    fn display_parses_back(a in decimal()) {
        let parsed = FixedDecimal::parse(&a.to_string(), INTEGER_DIGITS, FRACTION_DIGITS).unwrap();
        prop_assert_eq!(parsed, a);
    }

    #[test]
    fn lists_survive_the_codec(items in prop::collection::vec(any::<i16>(), 0..=6)) {
        let ty = BflType::from(BflModule::list(Primitive::I16, 6).unwrap());
        let value = ty
            .list_value(items.iter().map(|i| BflValue::Signed((*i).into())).collect())
            .unwrap();
        let bytes = encode(&ty, &value).unwrap();
        prop_assert_eq!(bytes.len(), (32 + 6 * 16) / 8);
        let decoded = decode(&ty, &bytes).unwrap();
        prop_assert!(values_equal(&ty, &decoded, &value));
        prop_assert_eq!(decoded, value);
    }

    #[test]
    fn strings_survive_the_codec(text in "[ -~]{0,12}") {
        let ty = BflType::from(BflModule::string(12).unwrap());
        let value = ty.string_value(&text).unwrap();
        let decoded = decode(&ty, &encode(&ty, &value).unwrap()).unwrap();
        prop_assert_eq!(decoded, value);
    }
}

#[test]
fn magnitude_overflow_is_an_error() {
    let max = FixedDecimal::parse("9999.99", INTEGER_DIGITS, FRACTION_DIGITS).unwrap();
    let cent = FixedDecimal::parse("0.01", INTEGER_DIGITS, FRACTION_DIGITS).unwrap();
    let err = max.plus(&cent).unwrap_err();
    assert_eq!(err.to_string(), "Magnitude exceeds the maximum stored value");
    assert_eq!(max.minus(&max.negate()).unwrap_err(), err);
    assert_eq!(max.compare(&cent).unwrap(), Ordering::Greater);
}

#[test]
fn full_capacity_values_survive_the_codec() {
    let list = BflType::from(BflModule::list(Primitive::U8, 3).unwrap());
    let full = list
        .list_value(vec![BflValue::Unsigned(255); 3])
        .unwrap();
    let bytes = encode(&list, &full).unwrap();
    assert_eq!(bytes, vec![0, 0, 0, 3, 0xff, 0xff, 0xff]);
    assert_eq!(decode(&list, &bytes).unwrap(), full);

    let empty = list.list_value(Vec::new()).unwrap();
    assert_eq!(encode(&list, &empty).unwrap(), vec![0; 7]);

    // Two four-byte scalars fill an eight-byte string.
    let string = BflType::from(BflModule::string(8).unwrap());
    let widest = string.string_value("\u{10FFFF}\u{1F600}").unwrap();
    let bytes = encode(&string, &widest).unwrap();
    assert_eq!(&bytes[..4], &[0, 0, 0, 8]);
    assert_eq!(bytes[4], 0xf4);
    assert_eq!(decode(&string, &bytes).unwrap(), widest);
    assert!(string.string_value("\u{1F600}\u{1F600}!").is_err());
}
