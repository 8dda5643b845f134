//! # Bit Codec
//!
//! The serialized form circuits deserialize: fields packed back to back,
//! most significant bit first, with no alignment. Signed integers use two's
//! complement in their own width, `bool` takes one bit. The final byte is
//! zero-padded; decoding rejects non-zero padding and trailing bytes.

use crate::error::BflError;
use crate::types::{BflType, ModuleKind, Primitive};
use crate::value::{field_values, from_field_values, BflValue};

/// Appends bits MSB-first.
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    bytes: Vec<u8>,
    len: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_bit(&mut self, bit: bool) {
        if self.len % 8 == 0 {
            self.bytes.push(0);
        }
        if bit {
            self.bytes[self.len / 8] |= 0x80 >> (self.len % 8);
        }
        self.len += 1;
    }

    /// The low `width` bits of `value`, most significant first.
    pub fn write_bits(&mut self, value: u128, width: usize) {
        for k in (0..width).rev() {
            self.write_bit((value >> k) & 1 == 1);
        }
    }

    pub fn bit_len(&self) -> usize {
        self.len
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Reads bits MSB-first from a byte slice.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, cursor: 0 }
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() * 8 - self.cursor
    }

    pub fn read_bit(&mut self) -> Result<bool, BflError> {
        self.ensure(1)?;
        let bit = self.bytes[self.cursor / 8] & (0x80 >> (self.cursor % 8)) != 0;
        self.cursor += 1;
        Ok(bit)
    }

    /// `width` bits as an unsigned number; `width` is at most 128.
    pub fn read_bits(&mut self, width: usize) -> Result<u128, BflError> {
        self.ensure(width)?;
        let mut value = 0u128;
        for _ in 0..width {
            value = (value << 1) | u128::from(self.read_bit()?);
        }
        Ok(value)
    }

    /// Accept only zero padding up to the next byte boundary.
    pub fn finish(mut self) -> Result<(), BflError> {
        let remaining = self.remaining();
        if remaining >= 8 {
            return Err(BflError::TrailingData(remaining));
        }
        for _ in 0..remaining {
            if self.read_bit()? {
                return Err(BflError::TrailingData(remaining));
            }
        }
        Ok(())
    }

    fn ensure(&self, needed: usize) -> Result<(), BflError> {
        let available = self.remaining();
        if needed > available {
            return Err(BflError::Truncated {
                offset: self.cursor,
                needed,
                available,
            });
        }
        Ok(())
    }
}

/// Serialize `value` as `ty`.
pub fn encode(ty: &BflType, value: &BflValue) -> Result<Vec<u8>, BflError> {
    let mut writer = BitWriter::new();
    write_value(ty, value, &mut writer)?;
    Ok(writer.into_bytes())
}

/// Deserialize exactly one `ty` from `bytes`.
pub fn decode(ty: &BflType, bytes: &[u8]) -> Result<BflValue, BflError> {
    let mut reader = BitReader::new(bytes);
    let value = read_value(ty, &mut reader)?;
    reader.finish()?;
    Ok(value)
}

pub fn write_value(ty: &BflType, value: &BflValue, w: &mut BitWriter) -> Result<(), BflError> {
    match (ty, value) {
        (BflType::Primitive(Primitive::Bool), BflValue::Bool(b)) => w.write_bit(*b),
        (BflType::Primitive(p), BflValue::Unsigned(n)) if !p.is_signed() => {
            if *n > p.max_unsigned() {
                return Err(out_of_range(ty, n));
            }
            w.write_bits(*n, p.bit_size());
        }
        (BflType::Primitive(p), BflValue::Signed(n)) if p.is_signed() => {
            let (min, max) = p.signed_range();
            if *n < min || *n > max {
                return Err(out_of_range(ty, n));
            }
            w.write_bits(*n as u128 & mask(p.bit_size()), p.bit_size());
        }
        (BflType::Primitive(_), _) => {
            return Err(BflError::TypeMismatch {
                type_id: ty.id(),
                reason: format!("cannot encode {value:?}"),
            })
        }
        (BflType::Array { element, count }, BflValue::Array(items)) if items.len() == *count => {
            for item in items {
                write_value(element, item, w)?;
            }
        }
        (BflType::Array { count, .. }, _) => {
            return Err(BflError::TypeMismatch {
                type_id: ty.id(),
                reason: format!("expected {count} array items"),
            })
        }
        (BflType::Module(m), _) => match m.kind() {
            ModuleKind::Enum(variants) => match value {
                BflValue::Enum(ordinal) if *ordinal < variants.len() => {
                    w.write_bits(*ordinal as u128, m.bit_size());
                }
                BflValue::Enum(ordinal) => {
                    return Err(BflError::EnumOrdinalOutOfRange {
                        type_id: m.id().to_string(),
                        ordinal: *ordinal as u128,
                        variants: variants.len(),
                    })
                }
                _ => {
                    return Err(BflError::TypeMismatch {
                        type_id: m.id().to_string(),
                        reason: "expected a variant ordinal".into(),
                    })
                }
            },
            ModuleKind::TypeDef(aliased) => write_value(aliased, value, w)?,
            _ => {
                for (layout, v) in m.layout().iter().zip(field_values(m, value)?) {
                    write_value(&layout.field.ty, &v, w)?;
                }
            }
        },
    }
    Ok(())
}

pub fn read_value(ty: &BflType, r: &mut BitReader<'_>) -> Result<BflValue, BflError> {
    Ok(match ty {
        BflType::Primitive(Primitive::Bool) => BflValue::Bool(r.read_bit()?),
        BflType::Primitive(p) if p.is_signed() => {
            let width = p.bit_size();
            let raw = r.read_bits(width)?;
            let value = if width < 128 && raw >> (width - 1) == 1 {
                raw as i128 - (1i128 << width)
            } else {
                raw as i128
            };
            BflValue::Signed(value)
        }
        BflType::Primitive(p) => BflValue::Unsigned(r.read_bits(p.bit_size())?),
        BflType::Array { element, count } => {
            let mut items = Vec::with_capacity(*count);
            for _ in 0..*count {
                items.push(read_value(element, r)?);
            }
            BflValue::Array(items)
        }
        BflType::Module(m) => match m.kind() {
            ModuleKind::Enum(variants) => {
                let ordinal = r.read_bits(m.bit_size())?;
                if ordinal >= variants.len() as u128 {
                    return Err(BflError::EnumOrdinalOutOfRange {
                        type_id: m.id().to_string(),
                        ordinal,
                        variants: variants.len(),
                    });
                }
                BflValue::Enum(ordinal as usize)
            }
            ModuleKind::TypeDef(aliased) => read_value(aliased, r)?,
            _ => {
                let mut fields = Vec::new();
                for layout in m.layout() {
                    fields.push(read_value(&layout.field.ty, r)?);
                }
                from_field_values(m, fields)?
            }
        },
    })
}

fn mask(width: usize) -> u128 {
    if width >= 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

fn out_of_range(ty: &BflType, value: &dyn std::fmt::Display) -> BflError {
    BflError::OutOfRange {
        type_id: ty.id(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bigdecimal::FixedDecimal;
    use crate::types::{BflField, BflModule};

    #[test]
    fn fields_are_packed_msb_first_without_alignment() {
        let ty: BflType = BflModule::structure(
            "Packed",
            vec![
                BflField::new("flag", Primitive::Bool),
                BflField::new("small", Primitive::I8),
                BflField::new("tail", Primitive::Bool),
            ],
        )
        .unwrap()
        .into();
        let bytes = encode(
            &ty,
            &BflValue::Struct(vec![
                BflValue::Bool(true),
                BflValue::Signed(-1),
                BflValue::Bool(true),
            ]),
        )
        .unwrap();
        // 1 | 1111_1111 | 1, then six padding bits.
        assert_eq!(bytes, vec![0xff, 0xc0]);
        assert_eq!(
            decode(&ty, &bytes).unwrap(),
            BflValue::Struct(vec![
                BflValue::Bool(true),
                BflValue::Signed(-1),
                BflValue::Bool(true),
            ])
        );
    }

    #[test]
    fn signed_values_sign_extend() {
        for (p, v) in [
            (Primitive::I8, -128),
            (Primitive::I16, -2),
            (Primitive::I64, i64::MIN as i128),
            (Primitive::I128, i128::MIN),
            (Primitive::I128, i128::MAX),
        ] {
            let ty = BflType::from(p);
            let bytes = encode(&ty, &BflValue::Signed(v)).unwrap();
            assert_eq!(decode(&ty, &bytes).unwrap(), BflValue::Signed(v));
        }
    }

    #[test]
    fn out_of_range_scalars_are_rejected() {
        assert!(matches!(
            encode(&Primitive::U8.into(), &BflValue::Unsigned(256)),
            Err(BflError::OutOfRange { .. })
        ));
        assert!(matches!(
            encode(&Primitive::I8.into(), &BflValue::Signed(128)),
            Err(BflError::OutOfRange { .. })
        ));
        assert!(matches!(
            encode(&Primitive::U8.into(), &BflValue::Signed(1)),
            Err(BflError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn out_of_range_ordinals_do_not_decode() {
        let ty: BflType = BflModule::enumeration("Color", ["Red", "Green", "Blue"])
            .unwrap()
            .into();
        assert_eq!(decode(&ty, &[2]).unwrap(), BflValue::Enum(2));
        assert!(matches!(
            decode(&ty, &[3]),
            Err(BflError::EnumOrdinalOutOfRange { ordinal: 3, variants: 3, .. })
        ));
    }

    #[test]
    fn list_sizes_beyond_capacity_do_not_decode() {
        let ty: BflType = BflModule::list(Primitive::U8, 2).unwrap().into();
        let mut w = BitWriter::new();
        w.write_bits(3, 32);
        w.write_bits(0, 16);
        assert!(matches!(
            decode(&ty, &w.into_bytes()),
            Err(BflError::CapacityExceeded { size: 3, capacity: 2, .. })
        ));
    }

    #[test]
    fn unused_list_slots_survive_a_round_trip() {
        let ty: BflType = BflModule::list(Primitive::I32, 4).unwrap().into();
        let value = BflValue::List {
            size: 2,
            items: [7, 9, 99, 99].into_iter().map(BflValue::Signed).collect(),
        };
        let bytes = encode(&ty, &value).unwrap();
        assert_eq!(bytes.len(), (32 + 4 * 32) / 8);
        assert_eq!(decode(&ty, &bytes).unwrap(), value);
    }

    #[test]
    fn truncation_and_trailing_data_are_errors() {
        let ty = BflType::from(Primitive::U16);
        assert!(matches!(
            decode(&ty, &[1]),
            Err(BflError::Truncated { offset: 0, needed: 16, available: 8 })
        ));
        assert!(matches!(decode(&ty, &[0, 1, 0]), Err(BflError::TrailingData(8))));

        let flag = BflType::from(Primitive::Bool);
        assert!(matches!(decode(&flag, &[0x81]), Err(BflError::TrailingData(7))));
        assert_eq!(decode(&flag, &[0x80]).unwrap(), BflValue::Bool(true));
    }

    #[test]
    fn wrapped_states_carry_the_output_header() {
        let module = BflModule::wrapped_state("Cash", Primitive::U32).unwrap();
        let ty: BflType = module.into();
        let bytes = encode(&ty, &BflValue::Unsigned(9)).unwrap();
        assert_eq!(bytes, vec![0, 4, b'C', b'a', b's', b'h', 0, 0, 0, 9]);
        assert_eq!(decode(&ty, &bytes).unwrap(), BflValue::Unsigned(9));

        let mut forged = bytes.clone();
        forged[2] = b'K';
        assert!(matches!(decode(&ty, &forged), Err(BflError::HeaderMismatch { .. })));
    }

    #[test]
    fn decimals_validate_decoded_digits() {
        let ty: BflType = BflModule::big_decimal(1, 1).unwrap().into();
        let value = BflValue::Decimal(FixedDecimal::parse("-3.5", 1, 1).unwrap());
        let bytes = encode(&ty, &value).unwrap();
        assert_eq!(bytes, vec![0xff, 3, 5]);
        assert_eq!(decode(&ty, &bytes).unwrap(), value);
        assert!(decode(&ty, &[0x01, 10, 0]).is_err());
        assert!(decode(&ty, &[0x00, 1, 0]).is_err());
    }
}
