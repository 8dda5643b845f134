//! # Structure Trees
//!
//! A [`ZkpStructureType`] is the serialized description of a class layout
//! that is checked into a project, so later versions of a schema can be
//! compared with what existing proofs were generated against. Comparison is
//! field-wise and recursive. A class keeps its identity across versions
//! through its `serialization_id`; classes without one are matched by name.
//!
//! [`diff_structures`] reports differences for humans. It never rewrites
//! anything.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One node of a structure tree. Sizes are in bits; `None` marks a size
/// that depends on a recursive reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ZkpStructureType {
    Primitive {
        name: String,
        bit_size: usize,
    },
    Array {
        count: usize,
        element: Box<ZkpStructureType>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bit_size: Option<usize>,
    },
    List {
        capacity: usize,
        element: Box<ZkpStructureType>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bit_size: Option<usize>,
    },
    Map {
        capacity: usize,
        key: Box<ZkpStructureType>,
        value: Box<ZkpStructureType>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bit_size: Option<usize>,
    },
    String {
        capacity: usize,
        bit_size: usize,
    },
    Nullable {
        inner: Box<ZkpStructureType>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bit_size: Option<usize>,
    },
    Decimal {
        integer_digits: usize,
        fraction_digits: usize,
        bit_size: usize,
    },
    Enum {
        name: String,
        variants: Vec<String>,
        bit_size: usize,
    },
    Class {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        family_class_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        serialization_id: Option<u32>,
        fields: Vec<ZkpStructureField>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bit_size: Option<usize>,
    },
    /// Back-reference to a class already being described.
    ClassRef {
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkpStructureField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: ZkpStructureType,
}

impl ZkpStructureField {
    pub fn new(name: impl Into<String>, field_type: ZkpStructureType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

fn same_class(a: (&str, Option<u32>), b: (&str, Option<u32>)) -> bool {
    match (a.1, b.1) {
        (Some(x), Some(y)) => x == y,
        _ => a.0 == b.0,
    }
}

/// Classes being compared, outermost first, as (old name, new name) pairs.
/// A [`ZkpStructureType::ClassRef`] resolves to the innermost enclosing
/// class of that name on its own side.
type Scope<'a> = Vec<(&'a str, &'a str)>;

/// Two back-references match when they point at the same enclosing pair.
/// References to classes outside the comparison match by name.
fn same_ref(scope: &[(&str, &str)], a: &str, b: &str) -> bool {
    let old = scope.iter().rposition(|(o, _)| *o == a);
    let new = scope.iter().rposition(|(_, n)| *n == b);
    match (old, new) {
        (None, None) => a == b,
        (old, new) => old == new,
    }
}

fn equivalent<'a>(a: &'a ZkpStructureType, b: &'a ZkpStructureType, scope: &mut Scope<'a>) -> bool {
    use ZkpStructureType as T;
    match (a, b) {
        (T::Primitive { name: a, bit_size: x }, T::Primitive { name: b, bit_size: y }) => a == b && x == y,
        (T::Array { count: a, element: x, .. }, T::Array { count: b, element: y, .. })
        | (T::List { capacity: a, element: x, .. }, T::List { capacity: b, element: y, .. }) => {
            a == b && equivalent(x, y, scope)
        }
        (
            T::Map { capacity: a, key: k1, value: v1, .. },
            T::Map { capacity: b, key: k2, value: v2, .. },
        ) => a == b && equivalent(k1, k2, scope) && equivalent(v1, v2, scope),
        (T::String { capacity: a, .. }, T::String { capacity: b, .. }) => a == b,
        (T::Nullable { inner: a, .. }, T::Nullable { inner: b, .. }) => equivalent(a, b, scope),
        (
            T::Decimal { integer_digits: i1, fraction_digits: f1, .. },
            T::Decimal { integer_digits: i2, fraction_digits: f2, .. },
        ) => i1 == i2 && f1 == f2,
        (T::Enum { name: a, variants: x, .. }, T::Enum { name: b, variants: y, .. }) => a == b && x == y,
        (
            T::Class { name: a, serialization_id: i, fields: x, .. },
            T::Class { name: b, serialization_id: j, fields: y, .. },
        ) => {
            if !same_class((a.as_str(), *i), (b.as_str(), *j)) || x.len() != y.len() {
                return false;
            }
            scope.push((a.as_str(), b.as_str()));
            let equal = x
                .iter()
                .zip(y)
                .all(|(f, g)| f.name == g.name && equivalent(&f.field_type, &g.field_type, scope));
            scope.pop();
            equal
        }
        (T::ClassRef { name: a }, T::ClassRef { name: b }) => same_ref(scope, a, b),
        _ => false,
    }
}

/// Structural equality. Classes that both carry a serialization id are
/// compared by id and fields; their names may differ, and so may the names
/// their fields use to refer back to them.
impl PartialEq for ZkpStructureType {
    fn eq(&self, other: &Self) -> bool {
        equivalent(self, other, &mut Vec::new())
    }
}

impl Eq for ZkpStructureType {}

impl ZkpStructureType {
    pub fn bit_size(&self) -> Option<usize> {
        match self {
            ZkpStructureType::Primitive { bit_size, .. }
            | ZkpStructureType::String { bit_size, .. }
            | ZkpStructureType::Decimal { bit_size, .. }
            | ZkpStructureType::Enum { bit_size, .. } => Some(*bit_size),
            ZkpStructureType::Array { bit_size, .. }
            | ZkpStructureType::List { bit_size, .. }
            | ZkpStructureType::Map { bit_size, .. }
            | ZkpStructureType::Nullable { bit_size, .. }
            | ZkpStructureType::Class { bit_size, .. } => *bit_size,
            ZkpStructureType::ClassRef { .. } => None,
        }
    }

    /// Short form in schema type-expression syntax.
    pub fn describe(&self) -> String {
        match self {
            ZkpStructureType::Primitive { name, .. }
            | ZkpStructureType::Enum { name, .. }
            | ZkpStructureType::Class { name, .. }
            | ZkpStructureType::ClassRef { name } => name.clone(),
            ZkpStructureType::Array { count, element, .. } => format!("[{}; {count}]", element.describe()),
            ZkpStructureType::List { capacity, element, .. } => {
                format!("list<{}, {capacity}>", element.describe())
            }
            ZkpStructureType::Map {
                capacity, key, value, ..
            } => format!("map<{}, {}, {capacity}>", key.describe(), value.describe()),
            ZkpStructureType::String { capacity, .. } => format!("string<{capacity}>"),
            ZkpStructureType::Nullable { inner, .. } => format!("nullable<{}>", inner.describe()),
            ZkpStructureType::Decimal {
                integer_digits,
                fraction_digits,
                ..
            } => format!("decimal<{integer_digits}, {fraction_digits}>"),
        }
    }

    /// Same kind with the same own parameters; only nested contents may
    /// differ.
    fn same_shape(&self, other: &Self, scope: &[(&str, &str)]) -> bool {
        use ZkpStructureType as T;
        match (self, other) {
            (T::Primitive { name: a, .. }, T::Primitive { name: b, .. }) => a == b,
            (T::Array { count: a, element: x, .. }, T::Array { count: b, element: y, .. })
            | (T::List { capacity: a, element: x, .. }, T::List { capacity: b, element: y, .. }) => {
                a == b && x.same_shape(y, scope)
            }
            (
                T::Map { capacity: a, key: k1, value: v1, .. },
                T::Map { capacity: b, key: k2, value: v2, .. },
            ) => a == b && k1.same_shape(k2, scope) && v1.same_shape(v2, scope),
            (T::String { capacity: a, .. }, T::String { capacity: b, .. }) => a == b,
            (T::Nullable { inner: a, .. }, T::Nullable { inner: b, .. }) => a.same_shape(b, scope),
            (T::Decimal { .. }, T::Decimal { .. }) => self == other,
            (T::Enum { name: a, .. }, T::Enum { name: b, .. }) => a == b,
            (
                T::Class { name: a, serialization_id: i, .. },
                T::Class { name: b, serialization_id: j, .. },
            ) => same_class((a.as_str(), *i), (b.as_str(), *j)),
            (T::ClassRef { name: a }, T::ClassRef { name: b }) => same_ref(scope, a, b),
            _ => false,
        }
    }
}

/// How a field differs between two versions of a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldChange {
    /// Same position and type under a new name.
    Renamed { new_name: String },
    /// Same name and type at a different position.
    Moved { old_index: usize, new_index: usize },
    /// The field's own type changed.
    TypeSizeChanged {
        old_type: String,
        new_type: String,
        old_bits: Option<usize>,
        new_bits: Option<usize>,
    },
    /// The field's type is the same, but something it contains changed.
    NestedSizeChanged {
        nested: String,
        old_bits: Option<usize>,
        new_bits: Option<usize>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructureDifference {
    AddedClass { class: String },
    RemovedClass { class: String },
    AddedField { class: String, field: String },
    RemovedField { class: String, field: String },
    ModifiedField {
        class: String,
        field: String,
        change: FieldChange,
    },
}

impl StructureDifference {
    /// Everything but a new class changes a layout existing data relies on.
    pub fn is_breaking(&self) -> bool {
        !matches!(self, StructureDifference::AddedClass { .. })
    }
}

fn bits(b: &Option<usize>) -> String {
    match b {
        Some(n) => format!("{n} bits"),
        None => "unbounded".to_string(),
    }
}

impl fmt::Display for StructureDifference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructureDifference::AddedClass { class } => write!(f, "class {class} was added"),
            StructureDifference::RemovedClass { class } => write!(f, "class {class} was removed"),
            StructureDifference::AddedField { class, field } => {
                write!(f, "{class}: field `{field}` was added")
            }
            StructureDifference::RemovedField { class, field } => {
                write!(f, "{class}: field `{field}` was removed")
            }
            StructureDifference::ModifiedField {
                class,
                field,
                change,
            } => match change {
                FieldChange::Renamed { new_name } => {
                    write!(f, "{class}.{field}: renamed to `{new_name}`")
                }
                FieldChange::Moved {
                    old_index,
                    new_index,
                } => write!(f, "{class}.{field}: moved from position {old_index} to {new_index}"),
                FieldChange::TypeSizeChanged {
                    old_type,
                    new_type,
                    old_bits,
                    new_bits,
                } => write!(
                    f,
                    "{class}.{field}: type changed from {old_type} ({}) to {new_type} ({})",
                    bits(old_bits),
                    bits(new_bits)
                ),
                FieldChange::NestedSizeChanged {
                    nested,
                    old_bits,
                    new_bits,
                } => write!(
                    f,
                    "{class}.{field}: nested {nested} changed ({} -> {})",
                    bits(old_bits),
                    bits(new_bits)
                ),
            },
        }
    }
}

struct ClassView<'a> {
    name: &'a str,
    id: Option<u32>,
    fields: &'a [ZkpStructureField],
}

impl<'a> ClassView<'a> {
    fn of(t: &'a ZkpStructureType) -> Option<Self> {
        match t {
            ZkpStructureType::Class {
                name,
                serialization_id,
                fields,
                ..
            } => Some(Self {
                name,
                id: *serialization_id,
                fields,
            }),
            _ => None,
        }
    }
}

/// Compare the top-level classes of two structure files.
///
/// Differences inside a nested class are reported twice: once on the field
/// that holds it, and once per inner field under the path `Class.field`.
pub fn diff_structures(old: &[ZkpStructureType], new: &[ZkpStructureType]) -> Vec<StructureDifference> {
    let old: Vec<ClassView<'_>> = old.iter().filter_map(ClassView::of).collect();
    let new: Vec<ClassView<'_>> = new.iter().filter_map(ClassView::of).collect();
    let mut matched = vec![false; new.len()];
    let mut out = Vec::new();

    for o in &old {
        let found = new
            .iter()
            .enumerate()
            .position(|(j, n)| !matched[j] && same_class((o.name, o.id), (n.name, n.id)));
        match found {
            Some(j) => {
                matched[j] = true;
                let mut scope = vec![(o.name, new[j].name)];
                diff_fields(o.name, o.fields, new[j].fields, &mut scope, &mut out);
            }
            None => out.push(StructureDifference::RemovedClass {
                class: o.name.to_string(),
            }),
        }
    }
    for (n, used) in new.iter().zip(matched) {
        if !used {
            out.push(StructureDifference::AddedClass {
                class: n.name.to_string(),
            });
        }
    }
    out
}

fn diff_fields<'a>(
    class: &str,
    old: &'a [ZkpStructureField],
    new: &'a [ZkpStructureField],
    scope: &mut Scope<'a>,
    out: &mut Vec<StructureDifference>,
) {
    let modified = |field: &str, change| StructureDifference::ModifiedField {
        class: class.to_string(),
        field: field.to_string(),
        change,
    };

    let mut used = vec![false; new.len()];
    let mut unmatched_old = Vec::new();
    let mut furthest = None;
    for (i, f) in old.iter().enumerate() {
        let Some(j) = new.iter().position(|g| g.name == f.name) else {
            unmatched_old.push(i);
            continue;
        };
        used[j] = true;
        if furthest.is_some_and(|k| j < k) {
            out.push(modified(
                &f.name,
                FieldChange::Moved {
                    old_index: i,
                    new_index: j,
                },
            ));
        }
        furthest = furthest.max(Some(j));
        if let Some(change) = type_change(&f.field_type, &new[j].field_type, scope) {
            let nested = matches!(change, FieldChange::NestedSizeChanged { .. });
            out.push(modified(&f.name, change));
            if nested {
                let path = format!("{class}.{}", f.name);
                diff_nested(&path, &f.field_type, &new[j].field_type, scope, out);
            }
        }
    }

    for i in unmatched_old {
        let renamed = new
            .get(i)
            .filter(|g| !used[i] && equivalent(&old[i].field_type, &g.field_type, scope));
        match renamed {
            Some(g) => {
                used[i] = true;
                out.push(modified(
                    &old[i].name,
                    FieldChange::Renamed {
                        new_name: g.name.clone(),
                    },
                ));
            }
            None => out.push(StructureDifference::RemovedField {
                class: class.to_string(),
                field: old[i].name.clone(),
            }),
        }
    }
    for (g, used) in new.iter().zip(used) {
        if !used {
            out.push(StructureDifference::AddedField {
                class: class.to_string(),
                field: g.name.clone(),
            });
        }
    }
}

/// Walk two same-shaped types down to the classes they contain and diff
/// those field by field.
fn diff_nested<'a>(
    path: &str,
    old: &'a ZkpStructureType,
    new: &'a ZkpStructureType,
    scope: &mut Scope<'a>,
    out: &mut Vec<StructureDifference>,
) {
    use ZkpStructureType as T;
    match (old, new) {
        (T::Array { element: x, .. }, T::Array { element: y, .. })
        | (T::List { element: x, .. }, T::List { element: y, .. })
        | (T::Nullable { inner: x, .. }, T::Nullable { inner: y, .. }) => diff_nested(path, x, y, scope, out),
        (T::Map { key: k1, value: v1, .. }, T::Map { key: k2, value: v2, .. }) => {
            diff_nested(path, k1, k2, scope, out);
            diff_nested(path, v1, v2, scope, out);
        }
        (T::Class { name: a, fields: x, .. }, T::Class { name: b, fields: y, .. }) => {
            scope.push((a.as_str(), b.as_str()));
            diff_fields(path, x, y, scope, out);
            scope.pop();
        }
        _ => {}
    }
}

fn type_change<'a>(
    old: &'a ZkpStructureType,
    new: &'a ZkpStructureType,
    scope: &mut Scope<'a>,
) -> Option<FieldChange> {
    if equivalent(old, new, scope) {
        return None;
    }
    Some(if old.same_shape(new, scope) {
        FieldChange::NestedSizeChanged {
            nested: old.describe(),
            old_bits: old.bit_size(),
            new_bits: new.bit_size(),
        }
    } else {
        FieldChange::TypeSizeChanged {
            old_type: old.describe(),
            new_type: new.describe(),
            old_bits: old.bit_size(),
            new_bits: new.bit_size(),
        }
    })
}
