//! # Schema Descriptors
//!
//! A schema names the classes, enums and type aliases of a contract's
//! states and commands. Field types are written as type expressions:
//!
//! ```text
//! u8 | i64 | bool | ...                 primitives
//! [T; n]                                fixed array
//! list<T, n>   map<K, V, n>             fixed-capacity containers
//! string<n>                             UTF-8, n bytes
//! nullable<T>
//! decimal<i, f>                         i integer and f fraction digits
//! Name                                  a class, enum or type alias
//! ```
//!
//! A schema file in YAML (JSON works as well):
//!
//! ```yaml
//! enums:
//!   - name: Currency
//!     variants: [Eur, Usd]
//! typedefs:
//!   - name: Amount
//!     type: u64
//! classes:
//!   - name: Cash
//!     serialization_id: 17
//!     state: true
//!     fields:
//!       - { name: amount, type: Amount }
//!       - { name: currency, type: Currency }
//!       - { name: owner, type: "[u8; 32]" }
//! ```
//!
//! From one schema both the BFL module graph ([`SchemaDescriptor::modules`])
//! and the structure tree ([`SchemaDescriptor::structure`]) are derived.
//! Self-referencing classes can be described (as `class_ref` nodes) but not
//! laid out.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::structure::{ZkpStructureField, ZkpStructureType};
use crate::types::{ordinal_bits, BflField, BflModule, BflType, Primitive};

/// A parsed type expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeExpr {
    Primitive(Primitive),
    Array(Box<TypeExpr>, usize),
    List(Box<TypeExpr>, usize),
    Map(Box<TypeExpr>, Box<TypeExpr>, usize),
    String(usize),
    Nullable(Box<TypeExpr>),
    Decimal(usize, usize),
    Named(String),
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Primitive(p) => f.write_str(p.name()),
            TypeExpr::Array(t, n) => write!(f, "[{t}; {n}]"),
            TypeExpr::List(t, n) => write!(f, "list<{t}, {n}>"),
            TypeExpr::Map(k, v, n) => write!(f, "map<{k}, {v}, {n}>"),
            TypeExpr::String(n) => write!(f, "string<{n}>"),
            TypeExpr::Nullable(t) => write!(f, "nullable<{t}>"),
            TypeExpr::Decimal(i, d) => write!(f, "decimal<{i}, {d}>"),
            TypeExpr::Named(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Int(usize),
    Punct(char),
}

struct ExprParser<'a> {
    expr: &'a str,
    tokens: Vec<Token>,
    cursor: usize,
}

impl<'a> ExprParser<'a> {
    fn new(expr: &'a str) -> Result<Self, SchemaError> {
        let mut tokens = Vec::new();
        let mut chars = expr.char_indices().peekable();
        let mut parser = Self {
            expr,
            tokens: Vec::new(),
            cursor: 0,
        };
        while let Some(&(start, c)) = chars.peek() {
            if c.is_whitespace() {
                chars.next();
            } else if c.is_ascii_alphabetic() || c == '_' {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if !(c.is_ascii_alphanumeric() || c == '_') {
                        break;
                    }
                    end = i + c.len_utf8();
                    chars.next();
                }
                tokens.push(Token::Ident(expr[start..end].to_string()));
            } else if c.is_ascii_digit() {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if !c.is_ascii_digit() {
                        break;
                    }
                    end = i + 1;
                    chars.next();
                }
                let n = expr[start..end]
                    .parse()
                    .map_err(|_| parser.error("number too large"))?;
                tokens.push(Token::Int(n));
            } else if "[];<>,".contains(c) {
                tokens.push(Token::Punct(c));
                chars.next();
            } else {
                return Err(parser.error(&format!("unexpected character `{c}`")));
            }
        }
        parser.tokens = tokens;
        Ok(parser)
    }

    fn error(&self, reason: &str) -> SchemaError {
        SchemaError::InvalidTypeExpression {
            expr: self.expr.to_string(),
            reason: reason.to_string(),
        }
    }

    fn next(&mut self) -> Result<Token, SchemaError> {
        let token = self
            .tokens
            .get(self.cursor)
            .cloned()
            .ok_or_else(|| self.error("unexpected end"))?;
        self.cursor += 1;
        Ok(token)
    }

    fn expect(&mut self, c: char) -> Result<(), SchemaError> {
        match self.next()? {
            Token::Punct(p) if p == c => Ok(()),
            _ => Err(self.error(&format!("expected `{c}`"))),
        }
    }

    /// A positive count.
    fn count(&mut self) -> Result<usize, SchemaError> {
        match self.next()? {
            Token::Int(0) => Err(self.error("capacities must be at least one")),
            Token::Int(n) => Ok(n),
            _ => Err(self.error("expected a number")),
        }
    }

    fn parse(mut self) -> Result<TypeExpr, SchemaError> {
        let expr = self.parse_type()?;
        if self.cursor != self.tokens.len() {
            return Err(self.error("trailing input"));
        }
        Ok(expr)
    }

    fn parse_type(&mut self) -> Result<TypeExpr, SchemaError> {
        let name = match self.next()? {
            Token::Punct('[') => {
                let element = self.parse_type()?;
                self.expect(';')?;
                let n = self.count()?;
                self.expect(']')?;
                return Ok(TypeExpr::Array(Box::new(element), n));
            }
            Token::Ident(name) => name,
            _ => return Err(self.error("expected a type")),
        };
        let expr = match name.as_str() {
            "list" => {
                self.expect('<')?;
                let element = self.parse_type()?;
                self.expect(',')?;
                let n = self.count()?;
                TypeExpr::List(Box::new(element), n)
            }
            "map" => {
                self.expect('<')?;
                let key = self.parse_type()?;
                self.expect(',')?;
                let value = self.parse_type()?;
                self.expect(',')?;
                let n = self.count()?;
                TypeExpr::Map(Box::new(key), Box::new(value), n)
            }
            "string" => {
                self.expect('<')?;
                TypeExpr::String(self.count()?)
            }
            "nullable" => {
                self.expect('<')?;
                TypeExpr::Nullable(Box::new(self.parse_type()?))
            }
            "decimal" => {
                self.expect('<')?;
                let integer = self.count()?;
                self.expect(',')?;
                TypeExpr::Decimal(integer, self.count()?)
            }
            other => {
                return Ok(match Primitive::from_name(other) {
                    Some(p) => TypeExpr::Primitive(p),
                    None => TypeExpr::Named(other.to_string()),
                })
            }
        };
        self.expect('>')?;
        Ok(expr)
    }
}

impl FromStr for TypeExpr {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExprParser::new(s)?.parse()
    }
}

impl TryFrom<String> for TypeExpr {
    type Error = SchemaError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TypeExpr> for String {
    fn from(t: TypeExpr) -> Self {
        t.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassDescriptor {
    pub name: String,
    /// Name shared by all versions of the class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_class_name: Option<String>,
    /// Stable identity across renames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serialization_id: Option<u32>,
    /// Transaction states are also generated behind their output header.
    #[serde(default)]
    pub state: bool,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumDescriptor {
    pub name: String,
    pub variants: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeDefDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDescriptor {
    #[serde(default)]
    pub classes: Vec<ClassDescriptor>,
    #[serde(default)]
    pub enums: Vec<EnumDescriptor>,
    #[serde(default)]
    pub typedefs: Vec<TypeDefDescriptor>,
}

enum Named<'s> {
    Class(&'s ClassDescriptor),
    Enum(&'s EnumDescriptor),
    TypeDef(&'s TypeDefDescriptor),
}

impl SchemaDescriptor {
    /// Parse and check name uniqueness.
    pub fn from_yaml_str(text: &str) -> Result<Self, SchemaError> {
        let schema: Self =
            serde_yaml::from_str(text).map_err(|e| SchemaError::Parse(e.to_string()))?;
        schema.check_names()?;
        Ok(schema)
    }

    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let text = std::fs::read_to_string(path).map_err(|e| SchemaError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_yaml_str(&text)
    }

    fn check_names(&self) -> Result<(), SchemaError> {
        let mut seen = BTreeSet::new();
        let names = self
            .classes
            .iter()
            .map(|c| &c.name)
            .chain(self.enums.iter().map(|e| &e.name))
            .chain(self.typedefs.iter().map(|t| &t.name));
        for name in names {
            if !seen.insert(name.as_str()) {
                return Err(SchemaError::DuplicateName(name.clone()));
            }
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<Named<'_>> {
        if let Some(c) = self.classes.iter().find(|c| c.name == name) {
            return Some(Named::Class(c));
        }
        if let Some(e) = self.enums.iter().find(|e| e.name == name) {
            return Some(Named::Enum(e));
        }
        self.typedefs
            .iter()
            .find(|t| t.name == name)
            .map(Named::TypeDef)
    }

    /// Root modules, sorted by id: every class (states wrapped behind their
    /// output header), enum and type alias.
    ///
    /// # Errors
    ///
    /// [`SchemaError::Cyclic`] when a class contains itself, directly or
    /// through other types; [`SchemaError::UnknownType`] for dangling names.
    pub fn modules(&self) -> Result<Vec<Arc<BflModule>>, SchemaError> {
        let mut resolver = ModuleResolver {
            schema: self,
            done: HashMap::new(),
            in_progress: Vec::new(),
        };
        let mut roots = Vec::new();
        for class in &self.classes {
            let module = resolver.named(&class.name)?;
            roots.push(if class.state {
                Arc::new(BflModule::wrapped_state(
                    class.name.clone(),
                    BflType::Module(module),
                )?)
            } else {
                module
            });
        }
        for name in self
            .enums
            .iter()
            .map(|e| &e.name)
            .chain(self.typedefs.iter().map(|t| &t.name))
        {
            roots.push(resolver.named(name)?);
        }
        roots.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(roots)
    }

    /// Resolve one type expression against this schema.
    pub fn resolve(&self, expr: &TypeExpr) -> Result<BflType, SchemaError> {
        ModuleResolver {
            schema: self,
            done: HashMap::new(),
            in_progress: Vec::new(),
        }
        .expr(expr)
    }

    /// Structure trees of all classes, sorted by name.
    pub fn structure(&self) -> Result<Vec<ZkpStructureType>, SchemaError> {
        let mut builder = StructureBuilder {
            schema: self,
            in_progress: Vec::new(),
        };
        let mut classes: Vec<&ClassDescriptor> = self.classes.iter().collect();
        classes.sort_by(|a, b| a.name.cmp(&b.name));
        classes.into_iter().map(|c| builder.class(c)).collect()
    }
}

struct ModuleResolver<'s> {
    schema: &'s SchemaDescriptor,
    done: HashMap<String, Arc<BflModule>>,
    in_progress: Vec<String>,
}

impl ModuleResolver<'_> {
    fn named(&mut self, name: &str) -> Result<Arc<BflModule>, SchemaError> {
        if let Some(m) = self.done.get(name) {
            return Ok(Arc::clone(m));
        }
        if let Some(at) = self.in_progress.iter().position(|n| n == name) {
            let mut path = self.in_progress[at..].to_vec();
            path.push(name.to_string());
            return Err(SchemaError::Cyclic { path });
        }
        let schema = self.schema;
        let named = schema
            .lookup(name)
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))?;

        self.in_progress.push(name.to_string());
        let module = match named {
            Named::Class(c) => {
                let fields = c
                    .fields
                    .iter()
                    .map(|f| -> Result<BflField, SchemaError> {
                        Ok(BflField::new(f.name.clone(), self.expr(&f.ty)?))
                    })
                    .collect::<Result<Vec<_>, SchemaError>>()?;
                BflModule::structure(name, fields)?
            }
            Named::Enum(e) => BflModule::enumeration(name, e.variants.iter().cloned())?,
            Named::TypeDef(t) => BflModule::type_def(name, self.expr(&t.ty)?)?,
        };
        self.in_progress.pop();

        let module = Arc::new(module);
        self.done.insert(name.to_string(), Arc::clone(&module));
        Ok(module)
    }

    fn expr(&mut self, expr: &TypeExpr) -> Result<BflType, SchemaError> {
        Ok(match expr {
            TypeExpr::Primitive(p) => BflType::Primitive(*p),
            TypeExpr::Array(t, n) => BflType::array(self.expr(t)?, *n),
            TypeExpr::List(t, n) => BflModule::list(self.expr(t)?, *n)?.into(),
            TypeExpr::Map(k, v, n) => {
                let key = self.expr(k)?;
                BflModule::map(key, self.expr(v)?, *n)?.into()
            }
            TypeExpr::String(n) => BflModule::string(*n)?.into(),
            TypeExpr::Nullable(t) => BflModule::option(self.expr(t)?)?.into(),
            TypeExpr::Decimal(i, f) => BflModule::big_decimal(*i, *f)?.into(),
            TypeExpr::Named(name) => BflType::Module(self.named(name)?),
        })
    }
}

struct StructureBuilder<'s> {
    schema: &'s SchemaDescriptor,
    /// Classes and aliases being described, outermost first.
    in_progress: Vec<String>,
}

impl StructureBuilder<'_> {
    fn class(&mut self, class: &ClassDescriptor) -> Result<ZkpStructureType, SchemaError> {
        self.in_progress.push(class.name.clone());
        let fields = class
            .fields
            .iter()
            .map(|f| -> Result<ZkpStructureField, SchemaError> {
                Ok(ZkpStructureField::new(f.name.clone(), self.expr(&f.ty)?))
            })
            .collect::<Result<Vec<_>, SchemaError>>()?;
        self.in_progress.pop();
        let bit_size = fields.iter().map(|f| f.field_type.bit_size()).sum();
        Ok(ZkpStructureType::Class {
            name: class.name.clone(),
            family_class_name: class.family_class_name.clone(),
            serialization_id: class.serialization_id,
            fields,
            bit_size,
        })
    }

    fn expr(&mut self, expr: &TypeExpr) -> Result<ZkpStructureType, SchemaError> {
        let boxed = |this: &mut Self, t: &TypeExpr| this.expr(t).map(Box::new);
        Ok(match expr {
            TypeExpr::Primitive(p) => ZkpStructureType::Primitive {
                name: p.name().to_string(),
                bit_size: p.bit_size(),
            },
            TypeExpr::Array(t, n) => {
                let element = boxed(self, t)?;
                ZkpStructureType::Array {
                    count: *n,
                    bit_size: element.bit_size().map(|b| b * n),
                    element,
                }
            }
            TypeExpr::List(t, n) => {
                let element = boxed(self, t)?;
                ZkpStructureType::List {
                    capacity: *n,
                    bit_size: element.bit_size().map(|b| 32 + b * n),
                    element,
                }
            }
            TypeExpr::Map(k, v, n) => {
                let key = boxed(self, k)?;
                let value = boxed(self, v)?;
                let bit_size = key
                    .bit_size()
                    .zip(value.bit_size())
                    .map(|(k, v)| 32 + (k + v) * n);
                ZkpStructureType::Map {
                    capacity: *n,
                    key,
                    value,
                    bit_size,
                }
            }
            TypeExpr::String(n) => ZkpStructureType::String {
                capacity: *n,
                bit_size: 32 + 8 * n,
            },
            TypeExpr::Nullable(t) => {
                let inner = boxed(self, t)?;
                ZkpStructureType::Nullable {
                    bit_size: inner.bit_size().map(|b| b + 1),
                    inner,
                }
            }
            TypeExpr::Decimal(i, f) => ZkpStructureType::Decimal {
                integer_digits: *i,
                fraction_digits: *f,
                bit_size: 8 + 8 * (i + f),
            },
            TypeExpr::Named(name) => {
                if self.in_progress.iter().any(|n| n == name) {
                    return match self.schema.lookup(name) {
                        Some(Named::Class(_)) => Ok(ZkpStructureType::ClassRef { name: name.clone() }),
                        _ => Err(SchemaError::Cyclic {
                            path: vec![name.clone(), name.clone()],
                        }),
                    };
                }
                let schema = self.schema;
                match schema.lookup(name) {
                    Some(Named::Class(c)) => self.class(c)?,
                    Some(Named::Enum(e)) => ZkpStructureType::Enum {
                        name: e.name.clone(),
                        variants: e.variants.clone(),
                        bit_size: ordinal_bits(e.variants.len()),
                    },
                    Some(Named::TypeDef(t)) => {
                        self.in_progress.push(t.name.clone());
                        let aliased = self.expr(&t.ty);
                        self.in_progress.pop();
                        aliased?
                    }
                    None => return Err(SchemaError::UnknownType(name.clone())),
                }
            }
        })
    }
}
