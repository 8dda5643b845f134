//! # Values
//!
//! [`BflValue`] is the host-side image of a circuit value. Containers keep
//! their full backing capacity: a list value always carries `capacity`
//! items, of which only the first `size` are meaningful. Keeping the unused
//! slots makes decoding bit-exact; [`values_equal`] ignores them, as the
//! generated `equals` methods do.
//!
//! Type aliases and wrapped components have no value form of their own;
//! their values are the values of the aliased or wrapped type.

use serde_json::{Map, Value};

use crate::bigdecimal::FixedDecimal;
use crate::error::BflError;
use crate::types::{BflModule, BflType, ModuleKind, Primitive};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BflValue {
    Bool(bool),
    Unsigned(u128),
    Signed(i128),
    Array(Vec<BflValue>),
    /// Field values in declaration order.
    Struct(Vec<BflValue>),
    /// Variant ordinal.
    Enum(usize),
    /// Lists and strings; `items` spans the full capacity.
    List { size: usize, items: Vec<BflValue> },
    Map {
        size: usize,
        keys: Vec<BflValue>,
        values: Vec<BflValue>,
    },
    Nullable { present: bool, value: Box<BflValue> },
    Decimal(FixedDecimal),
}

fn mismatch(ty: &BflType, reason: impl Into<String>) -> BflError {
    BflError::TypeMismatch {
        type_id: ty.id(),
        reason: reason.into(),
    }
}

fn module_mismatch(module: &BflModule, reason: impl Into<String>) -> BflError {
    BflError::TypeMismatch {
        type_id: module.id().to_string(),
        reason: reason.into(),
    }
}

/// The value generated `empty()` constructors produce.
pub fn default_value(ty: &BflType) -> BflValue {
    match ty {
        BflType::Primitive(Primitive::Bool) => BflValue::Bool(false),
        BflType::Primitive(p) if p.is_signed() => BflValue::Signed(0),
        BflType::Primitive(_) => BflValue::Unsigned(0),
        BflType::Array { element, count } => BflValue::Array(vec![default_value(element); *count]),
        BflType::Module(m) => match m.kind() {
            ModuleKind::Struct(fields) => {
                BflValue::Struct(fields.iter().map(|f| default_value(&f.ty)).collect())
            }
            ModuleKind::Enum(_) => BflValue::Enum(0),
            ModuleKind::TypeDef(aliased) => default_value(aliased),
            ModuleKind::List { element, capacity } => BflValue::List {
                size: 0,
                items: vec![default_value(element); *capacity],
            },
            ModuleKind::String { capacity } => BflValue::List {
                size: 0,
                items: vec![BflValue::Unsigned(0); *capacity],
            },
            ModuleKind::Map {
                key,
                value,
                capacity,
            } => BflValue::Map {
                size: 0,
                keys: vec![default_value(key); *capacity],
                values: vec![default_value(value); *capacity],
            },
            ModuleKind::Option(inner) => BflValue::Nullable {
                present: false,
                value: Box::new(default_value(inner)),
            },
            ModuleKind::BigDecimal {
                integer_digits,
                fraction_digits,
            } => BflValue::Decimal(FixedDecimal::zero(*integer_digits, *fraction_digits)),
            ModuleKind::WrappedState { state: inner, .. }
            | ModuleKind::WrappedTransactionComponent {
                component: inner, ..
            } => default_value(inner),
        },
    }
}

impl BflType {
    /// A list or string value holding `items`, padded with defaults.
    pub fn list_value(&self, items: Vec<BflValue>) -> Result<BflValue, BflError> {
        let (element, capacity) = match self.as_module().map(|m| m.kind()) {
            Some(ModuleKind::List { element, capacity }) => (default_value(element), *capacity),
            Some(ModuleKind::String { capacity }) => (BflValue::Unsigned(0), *capacity),
            _ => return Err(mismatch(self, "not a list")),
        };
        if items.len() > capacity {
            return Err(BflError::CapacityExceeded {
                type_id: self.id(),
                size: items.len() as u128,
                capacity,
            });
        }
        let size = items.len();
        let mut items = items;
        items.resize(capacity, element);
        Ok(BflValue::List { size, items })
    }

    /// A string value holding the UTF-8 bytes of `text`.
    pub fn string_value(&self, text: &str) -> Result<BflValue, BflError> {
        if !matches!(self.as_module().map(|m| m.kind()), Some(ModuleKind::String { .. })) {
            return Err(mismatch(self, "not a string"));
        }
        self.list_value(text.bytes().map(|b| BflValue::Unsigned(b.into())).collect())
    }

    /// A nullable value; `None` leaves the payload at its default.
    pub fn nullable_value(&self, value: Option<BflValue>) -> Result<BflValue, BflError> {
        match self.as_module().map(|m| m.kind()) {
            Some(ModuleKind::Option(inner)) => Ok(BflValue::Nullable {
                present: value.is_some(),
                value: Box::new(value.unwrap_or_else(|| default_value(inner))),
            }),
            _ => Err(mismatch(self, "not nullable")),
        }
    }
}

/// Split a value of a struct-like module into its layout fields.
pub(crate) fn field_values(module: &BflModule, value: &BflValue) -> Result<Vec<BflValue>, BflError> {
    let size_of = |size: usize, capacity: usize, lengths: &[usize]| {
        if size > capacity {
            return Err(BflError::CapacityExceeded {
                type_id: module.id().to_string(),
                size: size as u128,
                capacity,
            });
        }
        if lengths.iter().any(|l| *l != capacity) {
            return Err(module_mismatch(module, "backing storage must span the capacity"));
        }
        Ok(BflValue::Unsigned(size as u128))
    };
    match (module.kind(), value) {
        (ModuleKind::Struct(fields), BflValue::Struct(values)) => {
            if fields.len() != values.len() {
                return Err(module_mismatch(
                    module,
                    format!("{} fields, {} values", fields.len(), values.len()),
                ));
            }
            Ok(values.clone())
        }
        (ModuleKind::List { capacity, .. } | ModuleKind::String { capacity }, BflValue::List { size, items }) => Ok(vec![
            size_of(*size, *capacity, &[items.len()])?,
            BflValue::Array(items.clone()),
        ]),
        (ModuleKind::Map { capacity, .. }, BflValue::Map { size, keys, values }) => Ok(vec![
            size_of(*size, *capacity, &[keys.len(), values.len()])?,
            BflValue::Array(keys.clone()),
            BflValue::Array(values.clone()),
        ]),
        (ModuleKind::Option(_), BflValue::Nullable { present, value }) => {
            Ok(vec![BflValue::Bool(*present), (**value).clone()])
        }
        (
            ModuleKind::BigDecimal {
                integer_digits,
                fraction_digits,
            },
            BflValue::Decimal(d),
        ) => {
            if d.capacity() != (*integer_digits, *fraction_digits) {
                return Err(module_mismatch(
                    module,
                    format!("decimal capacity {:?}", d.capacity()),
                ));
            }
            let digits = |ds: &[u8]| BflValue::Array(ds.iter().map(|x| BflValue::Unsigned((*x).into())).collect());
            Ok(vec![
                BflValue::Signed(d.sign().into()),
                digits(d.integer()),
                digits(d.fraction()),
            ])
        }
        (ModuleKind::WrappedState { .. } | ModuleKind::WrappedTransactionComponent { .. }, inner) => {
            let header = module.header().into_iter().map(|b| BflValue::Unsigned(b.into())).collect();
            Ok(vec![BflValue::Array(header), inner.clone()])
        }
        (ModuleKind::Enum(_) | ModuleKind::TypeDef(_), _) => {
            Err(module_mismatch(module, "module has no fields"))
        }
        _ => Err(module_mismatch(module, "value has the wrong shape")),
    }
}

/// Reassemble a struct-like module value from decoded layout fields.
pub(crate) fn from_field_values(module: &BflModule, fields: Vec<BflValue>) -> Result<BflValue, BflError> {
    let count = |v: &BflValue, capacity: usize| match v {
        BflValue::Unsigned(n) if *n <= capacity as u128 => Ok(*n as usize),
        BflValue::Unsigned(n) => Err(BflError::CapacityExceeded {
            type_id: module.id().to_string(),
            size: *n,
            capacity,
        }),
        _ => Err(module_mismatch(module, "size is not unsigned")),
    };
    let array = |v: BflValue| match v {
        BflValue::Array(items) => Ok(items),
        _ => Err(module_mismatch(module, "expected an array field")),
    };
    let digits = |v: BflValue| -> Result<Vec<u8>, BflError> {
        array(v)?
            .into_iter()
            .map(|d| match d {
                BflValue::Unsigned(n) => u8::try_from(n).map_err(|_| module_mismatch(module, "digit")),
                _ => Err(module_mismatch(module, "digit")),
            })
            .collect()
    };

    let mut fields = fields.into_iter();
    let mut next = || fields.next().ok_or_else(|| module_mismatch(module, "missing field"));
    Ok(match module.kind() {
        ModuleKind::Struct(declared) => {
            let values: Vec<BflValue> = (0..declared.len()).map(|_| next()).collect::<Result<_, _>>()?;
            BflValue::Struct(values)
        }
        ModuleKind::List { capacity, .. } | ModuleKind::String { capacity } => {
            let size = count(&next()?, *capacity)?;
            BflValue::List {
                size,
                items: array(next()?)?,
            }
        }
        ModuleKind::Map { capacity, .. } => {
            let size = count(&next()?, *capacity)?;
            BflValue::Map {
                size,
                keys: array(next()?)?,
                values: array(next()?)?,
            }
        }
        ModuleKind::Option(_) => match next()? {
            BflValue::Bool(present) => BflValue::Nullable {
                present,
                value: Box::new(next()?),
            },
            _ => return Err(module_mismatch(module, "has_value is not a bool")),
        },
        ModuleKind::BigDecimal { .. } => {
            let sign = match next()? {
                BflValue::Signed(s) => i8::try_from(s).map_err(|_| module_mismatch(module, "sign"))?,
                _ => return Err(module_mismatch(module, "sign")),
            };
            let integer = digits(next()?)?;
            let fraction = digits(next()?)?;
            BflValue::Decimal(FixedDecimal::from_parts(sign, integer, fraction)?)
        }
        ModuleKind::WrappedState { .. } | ModuleKind::WrappedTransactionComponent { .. } => {
            let header = digits_as_bytes(array(next()?)?);
            if header.as_deref() != Some(module.header().as_slice()) {
                return Err(BflError::HeaderMismatch {
                    type_id: module.id().to_string(),
                });
            }
            next()?
        }
        ModuleKind::Enum(_) | ModuleKind::TypeDef(_) => {
            return Err(module_mismatch(module, "module has no fields"))
        }
    })
}

fn digits_as_bytes(items: Vec<BflValue>) -> Option<Vec<u8>> {
    items
        .into_iter()
        .map(|v| match v {
            BflValue::Unsigned(n) => u8::try_from(n).ok(),
            _ => None,
        })
        .collect()
}

/// Equality by the type's rule: containers compare only their first `size`
/// entries, absent nullables ignore their payload.
pub fn values_equal(ty: &BflType, a: &BflValue, b: &BflValue) -> bool {
    match ty {
        BflType::Primitive(_) => a == b,
        BflType::Array { element, count } => match (a, b) {
            (BflValue::Array(x), BflValue::Array(y)) => {
                x.len() == *count && y.len() == *count && all_equal(element, x, y, *count)
            }
            _ => false,
        },
        BflType::Module(m) => match (m.kind(), a, b) {
            (ModuleKind::Struct(fields), BflValue::Struct(x), BflValue::Struct(y)) => {
                x.len() == fields.len()
                    && y.len() == fields.len()
                    && fields
                        .iter()
                        .zip(x.iter().zip(y))
                        .all(|(f, (u, v))| values_equal(&f.ty, u, v))
            }
            (ModuleKind::Enum(_), _, _) | (ModuleKind::BigDecimal { .. }, _, _) => a == b,
            (ModuleKind::TypeDef(aliased), _, _) => values_equal(aliased, a, b),
            (ModuleKind::List { element, .. }, BflValue::List { size: s, items: x }, BflValue::List { size: t, items: y }) => {
                s == t && all_equal(element, x, y, *s)
            }
            (ModuleKind::String { .. }, BflValue::List { size: s, items: x }, BflValue::List { size: t, items: y }) => {
                s == t && all_equal(&BflType::Primitive(Primitive::U8), x, y, *s)
            }
            (
                ModuleKind::Map { key, value, .. },
                BflValue::Map { size: s, keys: k1, values: v1 },
                BflValue::Map { size: t, keys: k2, values: v2 },
            ) => s == t && all_equal(key, k1, k2, *s) && all_equal(value, v1, v2, *s),
            (
                ModuleKind::Option(inner),
                BflValue::Nullable { present: p, value: x },
                BflValue::Nullable { present: q, value: y },
            ) => p == q && (!p || values_equal(inner, x, y)),
            (ModuleKind::WrappedState { state: inner, .. }, _, _)
            | (ModuleKind::WrappedTransactionComponent { component: inner, .. }, _, _) => {
                values_equal(inner, a, b)
            }
            _ => false,
        },
    }
}

/// First `n` entries of both slices are equal.
fn all_equal(element: &BflType, x: &[BflValue], y: &[BflValue], n: usize) -> bool {
    x.len() >= n && y.len() >= n && x[..n].iter().zip(&y[..n]).all(|(u, v)| values_equal(element, u, v))
}

/// Witness JSON: numbers as decimal strings, containers at full capacity
/// with their size as a separate field, field names as generated.
pub fn to_witness_json(ty: &BflType, value: &BflValue) -> Result<Value, BflError> {
    match (ty, value) {
        (BflType::Primitive(Primitive::Bool), BflValue::Bool(b)) => Ok(Value::Bool(*b)),
        (BflType::Primitive(p), BflValue::Unsigned(n)) if !p.is_signed() => Ok(Value::String(n.to_string())),
        (BflType::Primitive(p), BflValue::Signed(n)) if p.is_signed() => Ok(Value::String(n.to_string())),
        (BflType::Primitive(_), _) => Err(mismatch(ty, "expected a scalar of this type")),
        (BflType::Array { element, count }, BflValue::Array(items)) if items.len() == *count => items
            .iter()
            .map(|v| to_witness_json(element, v))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (BflType::Array { .. }, _) => Err(mismatch(ty, "expected a full array")),
        (BflType::Module(m), _) => match m.kind() {
            ModuleKind::Enum(variants) => match value {
                BflValue::Enum(o) if *o < variants.len() => Ok(Value::String(o.to_string())),
                _ => Err(mismatch(ty, "expected a variant ordinal")),
            },
            ModuleKind::TypeDef(aliased) => to_witness_json(aliased, value),
            _ => {
                let mut object = Map::new();
                for (layout, v) in m.layout().into_iter().zip(field_values(m, value)?) {
                    object.insert(layout.field.name.clone(), to_witness_json(&layout.field.ty, &v)?);
                }
                Ok(Value::Object(object))
            }
        },
    }
}
