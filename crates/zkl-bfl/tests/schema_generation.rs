//! From a schema file to generated Zinc sources and witness values.

use std::collections::BTreeSet;

use zkl_bfl::{
    diff_structures, encode, to_witness_json, BflValue, FixedDecimal, SchemaDescriptor, TypeExpr,
    ZincGenerator,
};

const SCHEMA: &str = r#"
enums:
  - name: Currency
    variants: [Eur, Usd, Chf]
typedefs:
  - name: Amount
    type: u64
classes:
  - name: Party
    fields:
      - { name: key, type: "[u8; 4]" }
  - name: Cash
    serialization_id: 17
    state: true
    fields:
      - { name: amount, type: Amount }
      - { name: currency, type: Currency }
      - { name: owner, type: Party }
      - { name: memo, type: "string<8>" }
      - { name: rate, type: "nullable<decimal<4, 2>>" }
"#;

#[test]
fn schema_generates_one_file_per_module() {
    let dir = tempfile::tempdir().unwrap();
    let schema_path = dir.path().join("cash.yaml");
    std::fs::write(&schema_path, SCHEMA).unwrap();
    let schema = SchemaDescriptor::load(&schema_path).unwrap();

    let out = dir.path().join("src");
    let generator = ZincGenerator::new(vec!["witness".into(), "serialized".into()]).unwrap();
    let written = generator.write_all(&schema.modules().unwrap(), &out).unwrap();

    let names: BTreeSet<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    let expected: BTreeSet<String> = [
        "amount.zn",
        "currency.zn",
        "party.zn",
        "utf8_string8.zn",
        "big_decimal4x2.zn",
        "nullable_big_decimal4x2.zn",
        "cash.zn",
        "wrapped_cash.zn",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    assert_eq!(names, expected);

    let cash = std::fs::read_to_string(out.join("cash.zn")).unwrap();
    assert!(cash.contains("mod amount;"));
    assert!(cash.contains("use std::convert::from_bits_unsigned;"));
    assert!(cash.contains("amount: from_bits_unsigned(serialized[CASH_AMOUNT_OFFSET..CASH_AMOUNT_OFFSET + 64]) as u64,"));

    let wrapped = std::fs::read_to_string(out.join("wrapped_cash.zn")).unwrap();
    assert!(wrapped.contains("fn deserialize_from_witness(witness: [bool; WRAPPED_CASH_SIZE]) -> Cash {"));
    assert!(wrapped.contains("fn deserialize_from_serialized(serialized: [bool; WRAPPED_CASH_SIZE]) -> Cash {"));
}

#[test]
fn witness_values_follow_the_schema_layout() {
    let schema = SchemaDescriptor::from_yaml_str(SCHEMA).unwrap();
    let party = schema.resolve(&TypeExpr::Named("Party".into())).unwrap();
    let value = BflValue::Struct(vec![BflValue::Array(vec![
        BflValue::Unsigned(1),
        BflValue::Unsigned(2),
        BflValue::Unsigned(3),
        BflValue::Unsigned(4),
    ])]);
    assert_eq!(encode(&party, &value).unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(
        to_witness_json(&party, &value).unwrap(),
        serde_json::json!({ "key": ["1", "2", "3", "4"] })
    );

    let rate = schema.resolve(&"decimal<4, 2>".parse::<TypeExpr>().unwrap()).unwrap();
    let decimal = BflValue::Decimal(FixedDecimal::parse("-1.5", 4, 2).unwrap());
    assert_eq!(encode(&rate, &decimal).unwrap().len(), (8 + 6 * 8) / 8);
}

#[test]
fn widening_a_field_is_a_breaking_change() {
    let old = SchemaDescriptor::from_yaml_str(SCHEMA).unwrap().structure().unwrap();
    let new = SchemaDescriptor::from_yaml_str(&SCHEMA.replace("type: u64", "type: u128"))
        .unwrap()
        .structure()
        .unwrap();
    let differences = diff_structures(&old, &new);
    assert!(!differences.is_empty());
    assert!(differences.iter().all(|d| d.is_breaking()));
    assert!(diff_structures(&old, &old).is_empty());
}
