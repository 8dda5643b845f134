//! # Type Model
//!
//! A [`BflType`] is either anonymous (a primitive or a fixed-length array)
//! or a named [`BflModule`]: a struct, enum, type alias or one of the
//! container layouts (list, string, map, nullable, decimal, wrapped
//! component). Every type has a statically known bit size, so every field
//! sits at a constant offset.
//!
//! Besides its layout, each type knows how to render itself as Zinc source:
//! its type name, a default value, an equality expression and a
//! deserialization expression reading from a bit array at a given offset.
//! The generator in `zinc.rs` stitches these into per-module files.
//!
//! ## Layouts
//!
//! | Kind | Fields |
//! |------|--------|
//! | list of `T`, capacity `n` | `size: u32`, `elements: [T; n]` |
//! | string, capacity `n` bytes | `size: u32`, `bytes: [u8; n]` |
//! | map `K -> V`, capacity `n` | `size: u32`, `keys: [K; n]`, `values: [V; n]` |
//! | nullable `T` | `has_value: bool`, `value: T` |
//! | decimal `(i, f)` | `sign: i8`, `integer: [u8; i]`, `fraction: [u8; f]` |
//! | wrapped | `header: [u8; h]`, then the wrapped type |
//!
//! Enums store their ordinal in 8 bits, or 16 bits past 256 variants.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Fixed-width scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    U128,
    I128,
}

impl Primitive {
    pub const ALL: [Primitive; 11] = [
        Primitive::Bool,
        Primitive::U8,
        Primitive::I8,
        Primitive::U16,
        Primitive::I16,
        Primitive::U32,
        Primitive::I32,
        Primitive::U64,
        Primitive::I64,
        Primitive::U128,
        Primitive::I128,
    ];

    pub const fn bit_size(self) -> usize {
        match self {
            Primitive::Bool => 1,
            Primitive::U8 | Primitive::I8 => 8,
            Primitive::U16 | Primitive::I16 => 16,
            Primitive::U32 | Primitive::I32 => 32,
            Primitive::U64 | Primitive::I64 => 64,
            Primitive::U128 | Primitive::I128 => 128,
        }
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            Primitive::I8 | Primitive::I16 | Primitive::I32 | Primitive::I64 | Primitive::I128
        )
    }

    /// Lower-case name, shared by schemas and Zinc.
    pub const fn name(self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::U8 => "u8",
            Primitive::I8 => "i8",
            Primitive::U16 => "u16",
            Primitive::I16 => "i16",
            Primitive::U32 => "u32",
            Primitive::I32 => "i32",
            Primitive::U64 => "u64",
            Primitive::I64 => "i64",
            Primitive::U128 => "u128",
            Primitive::I128 => "i128",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Largest unsigned value; meaningless for signed types.
    pub fn max_unsigned(self) -> u128 {
        match self.bit_size() {
            128 => u128::MAX,
            bits => (1u128 << bits) - 1,
        }
    }

    /// Inclusive range of a signed type.
    pub fn signed_range(self) -> (i128, i128) {
        match self.bit_size() {
            128 => (i128::MIN, i128::MAX),
            bits => (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1),
        }
    }
}

/// A node in the type graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BflType {
    Primitive(Primitive),
    Array { element: Box<BflType>, count: usize },
    Module(Arc<BflModule>),
}

impl From<Primitive> for BflType {
    fn from(p: Primitive) -> Self {
        BflType::Primitive(p)
    }
}

impl From<BflModule> for BflType {
    fn from(m: BflModule) -> Self {
        BflType::Module(Arc::new(m))
    }
}

impl BflType {
    pub fn array(element: impl Into<BflType>, count: usize) -> Self {
        BflType::Array {
            element: Box::new(element.into()),
            count,
        }
    }

    /// Camel-case identifier used to derive names of container modules.
    pub fn id(&self) -> String {
        match self {
            BflType::Primitive(p) => {
                let name = p.name();
                let mut id = name[..1].to_ascii_uppercase();
                id.push_str(&name[1..]);
                id
            }
            BflType::Array { element, count } => format!("Array{count}Of{}", element.id()),
            BflType::Module(m) => m.id().to_string(),
        }
    }

    pub fn bit_size(&self) -> usize {
        match self {
            BflType::Primitive(p) => p.bit_size(),
            BflType::Array { element, count } => element.bit_size() * count,
            BflType::Module(m) => m.bit_size(),
        }
    }

    /// The module this type names, if any.
    pub fn as_module(&self) -> Option<&Arc<BflModule>> {
        match self {
            BflType::Module(m) => Some(m),
            _ => None,
        }
    }

    /// Type aliases and wrapped components are used as the type they wrap.
    fn resolved(&self) -> &BflType {
        match self {
            BflType::Module(m) => match m.kind() {
                ModuleKind::TypeDef(aliased) => aliased.resolved(),
                ModuleKind::WrappedState { state: inner, .. }
                | ModuleKind::WrappedTransactionComponent {
                    component: inner, ..
                } => inner.resolved(),
                _ => self,
            },
            _ => self,
        }
    }

    /// Zinc type expression.
    pub fn zinc_type(&self) -> String {
        match self {
            BflType::Primitive(p) => p.name().to_string(),
            BflType::Array { element, count } => format!("[{}; {count}]", element.zinc_type()),
            BflType::Module(m) => match m.kind() {
                ModuleKind::WrappedState { state: inner, .. }
                | ModuleKind::WrappedTransactionComponent {
                    component: inner, ..
                } => inner.zinc_type(),
                _ => m.id().to_string(),
            },
        }
    }

    /// Size expression: a literal, or the module's size constant.
    pub fn size_expr(&self) -> String {
        match self {
            BflType::Module(m) => format!("{}_SIZE", screaming_case(m.id())),
            other => other.bit_size().to_string(),
        }
    }

    /// Zinc expression for the default value.
    pub fn default_expr(&self) -> String {
        match self {
            BflType::Primitive(Primitive::Bool) => "false".to_string(),
            BflType::Primitive(p) => format!("0 as {}", p.name()),
            BflType::Array { element, count } => format!("[{}; {count}]", element.default_expr()),
            BflType::Module(m) => match m.kind() {
                ModuleKind::TypeDef(_)
                | ModuleKind::WrappedState { .. }
                | ModuleKind::WrappedTransactionComponent { .. } => self.resolved().default_expr(),
                _ => format!("{}::empty()", m.id()),
            },
        }
    }

    /// Zinc boolean expression comparing `a` and `b` by this type's rule.
    pub fn equals_expr(&self, a: &str, b: &str) -> String {
        self.equals_expr_at(a, b, 0)
    }

    fn equals_expr_at(&self, a: &str, b: &str, depth: usize) -> String {
        match self.resolved() {
            BflType::Primitive(_) => format!("{a} == {b}"),
            BflType::Array { element, count } => {
                let (i, eq) = (format!("i{depth}"), format!("equal{depth}"));
                let inner = element.equals_expr_at(&format!("{a}[{i}]"), &format!("{b}[{i}]"), depth + 1);
                format!(
                    "{{\n    let mut {eq} = true;\n    for {i} in (0 as u24)..{count} while {eq} {{\n        {eq} = {};\n    }}\n    {eq}\n}}",
                    indent_continuation(&inner, 8)
                )
            }
            BflType::Module(_) => format!("{a}.equals({b})"),
        }
    }

    /// Zinc expression reading this type from bit array `source` at
    /// `offset`, for the given transaction component context.
    pub fn deserialize_expr(&self, source: &str, offset: &str, context: &str) -> String {
        self.deserialize_expr_at(source, offset, context, 0)
    }

    fn deserialize_expr_at(&self, source: &str, offset: &str, context: &str, depth: usize) -> String {
        match self {
            BflType::Primitive(Primitive::Bool) => format!("{source}[{offset}]"),
            BflType::Primitive(p) => format!(
                "{}({source}[{offset}..{offset} + {}]) as {}",
                if p.is_signed() { "from_bits_signed" } else { "from_bits_unsigned" },
                p.bit_size(),
                p.name()
            ),
            BflType::Array { element, count } => {
                let (i, values) = (format!("i{depth}"), format!("array{depth}"));
                let element_offset = format!("{offset} + {i} * {}", element.bit_size());
                let inner = element.deserialize_expr_at(source, &element_offset, context, depth + 1);
                format!(
                    "{{\n    let mut {values} = [{}; {count}];\n    for {i} in (0 as u24)..{count} {{\n        {values}[{i}] = {};\n    }}\n    {values}\n}}",
                    element.default_expr(),
                    indent_continuation(&inner, 8)
                )
            }
            BflType::Module(m) => match m.kind() {
                ModuleKind::TypeDef(aliased) => {
                    aliased.deserialize_expr_at(source, offset, context, depth)
                }
                _ => format!(
                    "{}::deserialize_from_{context}({source}[{offset}..{offset} + {}])",
                    m.id(),
                    self.size_expr()
                ),
            },
        }
    }

    /// Modules this type refers to without looking inside them.
    pub fn direct_modules(&self) -> Vec<Arc<BflModule>> {
        match self {
            BflType::Primitive(_) => Vec::new(),
            BflType::Array { element, .. } => element.direct_modules(),
            BflType::Module(m) => vec![Arc::clone(m)],
        }
    }

    /// Primitives read directly by this type's deserialization expression.
    pub(crate) fn direct_primitives(&self, out: &mut BTreeSet<Primitive>) {
        match self {
            BflType::Primitive(p) => {
                out.insert(*p);
            }
            BflType::Array { element, .. } => element.direct_primitives(out),
            BflType::Module(m) => {
                if let ModuleKind::TypeDef(aliased) = m.kind() {
                    aliased.direct_primitives(out);
                }
            }
        }
    }
}

/// A named field of a struct-like module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BflField {
    pub name: String,
    pub ty: BflType,
}

impl BflField {
    pub fn new(name: impl Into<String>, ty: impl Into<BflType>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// A field with its position in the module's bit layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayout {
    pub field: BflField,
    pub offset: usize,
    pub bit_size: usize,
}

/// Hand-written Zinc method attached to a module at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZincMethod {
    /// Position among the module's methods; built-ins use multiples of ten.
    pub order: u32,
    pub source: String,
}

impl ZincMethod {
    pub fn new(order: u32, source: impl Into<String>) -> Self {
        Self {
            order,
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleKind {
    Struct(Vec<BflField>),
    Enum(Vec<String>),
    TypeDef(BflType),
    List { element: BflType, capacity: usize },
    /// UTF-8 bytes with a byte capacity.
    String { capacity: usize },
    Map {
        key: BflType,
        value: BflType,
        capacity: usize,
    },
    Option(BflType),
    BigDecimal {
        integer_digits: usize,
        fraction_digits: usize,
    },
    /// A transaction state behind its class-name header.
    WrappedState { class_name: String, state: BflType },
    /// A component behind a constant header.
    WrappedTransactionComponent { header: Vec<u8>, component: BflType },
}

/// A named, file-worthy type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BflModule {
    id: String,
    kind: ModuleKind,
    extra_methods: Vec<ZincMethod>,
}

impl BflModule {
    /// Validate and build a module.
    ///
    /// # Errors
    ///
    /// [`SchemaError`] for invalid identifiers, duplicate fields or
    /// variants, empty enums and zero capacities.
    pub fn new(
        id: impl Into<String>,
        kind: ModuleKind,
        extra_methods: Vec<ZincMethod>,
    ) -> Result<Self, SchemaError> {
        let id = id.into();
        check_identifier(&id)?;
        match &kind {
            ModuleKind::Struct(fields) => {
                let mut seen = BTreeSet::new();
                for f in fields {
                    check_identifier(&f.name)?;
                    if !seen.insert(f.name.as_str()) {
                        return Err(SchemaError::DuplicateField {
                            owner: id,
                            field: f.name.clone(),
                        });
                    }
                }
            }
            ModuleKind::Enum(variants) => {
                let distinct: BTreeSet<_> = variants.iter().collect();
                if variants.is_empty() || variants.len() > 1 << 16 || distinct.len() != variants.len() {
                    return Err(SchemaError::InvalidEnum(id));
                }
                for v in variants {
                    check_identifier(v)?;
                }
            }
            ModuleKind::List { capacity, .. }
            | ModuleKind::String { capacity }
            | ModuleKind::Map { capacity, .. } => {
                if *capacity == 0 {
                    return Err(SchemaError::ZeroCapacity(id));
                }
            }
            ModuleKind::BigDecimal {
                integer_digits,
                fraction_digits,
            } => {
                if *integer_digits == 0 || *fraction_digits == 0 {
                    return Err(SchemaError::ZeroCapacity(id));
                }
            }
            ModuleKind::WrappedState { class_name, .. } => {
                if class_name.is_empty() || class_name.len() > u16::MAX as usize {
                    return Err(SchemaError::InvalidName(class_name.clone()));
                }
            }
            ModuleKind::TypeDef(_)
            | ModuleKind::Option(_)
            | ModuleKind::WrappedTransactionComponent { .. } => {}
        }
        Ok(Self {
            id,
            kind,
            extra_methods,
        })
    }

    pub fn structure(id: impl Into<String>, fields: Vec<BflField>) -> Result<Self, SchemaError> {
        Self::new(id, ModuleKind::Struct(fields), Vec::new())
    }

    pub fn enumeration<S: Into<String>>(
        id: impl Into<String>,
        variants: impl IntoIterator<Item = S>,
    ) -> Result<Self, SchemaError> {
        let variants = variants.into_iter().map(Into::into).collect();
        Self::new(id, ModuleKind::Enum(variants), Vec::new())
    }

    pub fn type_def(id: impl Into<String>, aliased: impl Into<BflType>) -> Result<Self, SchemaError> {
        Self::new(id, ModuleKind::TypeDef(aliased.into()), Vec::new())
    }

    /// `List{capacity}Of{Element}`.
    pub fn list(element: impl Into<BflType>, capacity: usize) -> Result<Self, SchemaError> {
        let element = element.into();
        let id = format!("List{capacity}Of{}", element.id());
        Self::new(id, ModuleKind::List { element, capacity }, Vec::new())
    }

    /// `Utf8String{capacity}`.
    pub fn string(capacity: usize) -> Result<Self, SchemaError> {
        Self::new(
            format!("Utf8String{capacity}"),
            ModuleKind::String { capacity },
            Vec::new(),
        )
    }

    /// `Map{capacity}Of{Key}To{Value}`.
    pub fn map(
        key: impl Into<BflType>,
        value: impl Into<BflType>,
        capacity: usize,
    ) -> Result<Self, SchemaError> {
        let (key, value) = (key.into(), value.into());
        let id = format!("Map{capacity}Of{}To{}", key.id(), value.id());
        Self::new(id, ModuleKind::Map { key, value, capacity }, Vec::new())
    }

    /// `Nullable{Inner}`.
    pub fn option(inner: impl Into<BflType>) -> Result<Self, SchemaError> {
        let inner = inner.into();
        Self::new(format!("Nullable{}", inner.id()), ModuleKind::Option(inner), Vec::new())
    }

    /// `BigDecimal{integer}x{fraction}`.
    pub fn big_decimal(integer_digits: usize, fraction_digits: usize) -> Result<Self, SchemaError> {
        Self::new(
            format!("BigDecimal{integer_digits}x{fraction_digits}"),
            ModuleKind::BigDecimal {
                integer_digits,
                fraction_digits,
            },
            Vec::new(),
        )
    }

    /// `Wrapped{State}`: the state behind a `be16 length || class name`
    /// header, as transaction outputs are serialized.
    pub fn wrapped_state(class_name: impl Into<String>, state: impl Into<BflType>) -> Result<Self, SchemaError> {
        let state = state.into();
        Self::new(
            format!("Wrapped{}", state.id()),
            ModuleKind::WrappedState {
                class_name: class_name.into(),
                state,
            },
            Vec::new(),
        )
    }

    pub fn wrapped_component(
        id: impl Into<String>,
        header: Vec<u8>,
        component: impl Into<BflType>,
    ) -> Result<Self, SchemaError> {
        Self::new(
            id,
            ModuleKind::WrappedTransactionComponent {
                header,
                component: component.into(),
            },
            Vec::new(),
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &ModuleKind {
        &self.kind
    }

    pub fn extra_methods(&self) -> &[ZincMethod] {
        &self.extra_methods
    }

    /// File name stem of the generated module.
    pub fn file_stem(&self) -> String {
        snake_case(&self.id)
    }

    /// Constant-name prefix.
    pub fn const_prefix(&self) -> String {
        screaming_case(&self.id)
    }

    /// Fields of struct-like modules; `None` for enums and type aliases.
    pub fn fields(&self) -> Option<Vec<BflField>> {
        let size = || BflField::new("size", Primitive::U32);
        Some(match &self.kind {
            ModuleKind::Struct(fields) => fields.clone(),
            ModuleKind::Enum(_) | ModuleKind::TypeDef(_) => return None,
            ModuleKind::List { element, capacity } => vec![
                size(),
                BflField::new("elements", BflType::array(element.clone(), *capacity)),
            ],
            ModuleKind::String { capacity } => vec![
                size(),
                BflField::new("bytes", BflType::array(Primitive::U8, *capacity)),
            ],
            ModuleKind::Map {
                key,
                value,
                capacity,
            } => vec![
                size(),
                BflField::new("keys", BflType::array(key.clone(), *capacity)),
                BflField::new("values", BflType::array(value.clone(), *capacity)),
            ],
            ModuleKind::Option(inner) => vec![
                BflField::new("has_value", Primitive::Bool),
                BflField::new("value", inner.clone()),
            ],
            ModuleKind::BigDecimal {
                integer_digits,
                fraction_digits,
            } => vec![
                BflField::new("sign", Primitive::I8),
                BflField::new("integer", BflType::array(Primitive::U8, *integer_digits)),
                BflField::new("fraction", BflType::array(Primitive::U8, *fraction_digits)),
            ],
            ModuleKind::WrappedState { state, .. } => vec![
                BflField::new("header", BflType::array(Primitive::U8, self.header().len())),
                BflField::new("state", state.clone()),
            ],
            ModuleKind::WrappedTransactionComponent { header, component } => vec![
                BflField::new("header", BflType::array(Primitive::U8, header.len())),
                BflField::new("component", component.clone()),
            ],
        })
    }

    /// Fields with cumulative offsets in declaration order.
    pub fn layout(&self) -> Vec<FieldLayout> {
        let mut offset = 0;
        self.fields()
            .unwrap_or_default()
            .into_iter()
            .map(|field| {
                let bit_size = field.ty.bit_size();
                let entry = FieldLayout {
                    field,
                    offset,
                    bit_size,
                };
                offset += bit_size;
                entry
            })
            .collect()
    }

    pub fn bit_size(&self) -> usize {
        match &self.kind {
            ModuleKind::Enum(variants) => ordinal_bits(variants.len()),
            ModuleKind::TypeDef(aliased) => aliased.bit_size(),
            _ => self.layout().iter().map(|f| f.bit_size).sum(),
        }
    }

    /// Constant header bytes of wrapped modules; empty otherwise.
    pub fn header(&self) -> Vec<u8> {
        match &self.kind {
            ModuleKind::WrappedState { class_name, .. } => {
                let mut header = (class_name.len() as u16).to_be_bytes().to_vec();
                header.extend_from_slice(class_name.as_bytes());
                header
            }
            ModuleKind::WrappedTransactionComponent { header, .. } => header.clone(),
            _ => Vec::new(),
        }
    }

    /// Modules referenced by this module's own declaration.
    pub fn dependencies(&self) -> Vec<Arc<BflModule>> {
        let mut out: Vec<Arc<BflModule>> = Vec::new();
        let types: Vec<BflType> = match &self.kind {
            ModuleKind::TypeDef(aliased) => vec![aliased.clone()],
            _ => self
                .fields()
                .unwrap_or_default()
                .into_iter()
                .map(|f| f.ty)
                .collect(),
        };
        for m in types.iter().flat_map(BflType::direct_modules) {
            if !out.iter().any(|o| o.id() == m.id()) {
                out.push(m);
            }
        }
        out
    }
}

/// Width of an enum ordinal.
pub fn ordinal_bits(variants: usize) -> usize {
    if variants <= 1 << 8 {
        8
    } else {
        16
    }
}

fn check_identifier(name: &str) -> Result<(), SchemaError> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SchemaError::InvalidName(name.to_string()))
    }
}

/// `List4OfU32` -> `list4_of_u32`.
pub(crate) fn snake_case(id: &str) -> String {
    let mut out = String::with_capacity(id.len() + 4);
    let mut previous: Option<char> = None;
    for c in id.chars() {
        if c.is_ascii_uppercase() {
            if matches!(previous, Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit()) {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
        previous = Some(c);
    }
    out
}

pub(crate) fn screaming_case(id: &str) -> String {
    snake_case(id).to_ascii_uppercase()
}

/// Indent every line after the first.
pub(crate) fn indent_continuation(text: &str, by: usize) -> String {
    let pad = " ".repeat(by);
    text.lines()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 || line.is_empty() {
                line.to_string()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
