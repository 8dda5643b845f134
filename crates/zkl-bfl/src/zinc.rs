//! # Zinc Code Generation
//!
//! One source file per [`BflModule`]: imports, layout constants, the type
//! declaration and an `impl` block. Methods come from an explicit ordered
//! registry: every module kind lists its built-in `(order, generator)`
//! pairs ([`BflModule::builtin_methods`]) and a module may carry extra
//! hand-written methods from construction. The generator sorts both by
//! order; nothing is discovered at runtime.
//!
//! Deserialization is emitted once per configured transaction component
//! context as `deserialize_from_<context>(<context>: [bool; SIZE])`.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{BflError, SchemaError};
use crate::types::{indent_continuation, screaming_case, BflModule, ModuleKind, Primitive};

/// Context generated when none is configured.
pub const DEFAULT_CONTEXT: &str = "witness";

/// Renders one method from a module and the configured contexts.
pub type MethodGenerator = fn(&BflModule, &[String]) -> String;

/// A built-in method and its position in the `impl` block.
#[derive(Clone, Copy)]
pub struct BuiltinMethod {
    pub order: u32,
    pub name: &'static str,
    pub generate: MethodGenerator,
}

impl std::fmt::Debug for BuiltinMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinMethod")
            .field("order", &self.order)
            .field("name", &self.name)
            .finish()
    }
}

const fn method(order: u32, name: &'static str, generate: MethodGenerator) -> BuiltinMethod {
    BuiltinMethod {
        order,
        name,
        generate,
    }
}

static STRUCT_METHODS: [BuiltinMethod; 4] = [
    method(10, "new", gen_new),
    method(20, "empty", gen_empty),
    method(30, "equals", gen_equals),
    method(40, "deserialize", gen_deserialize),
];

static ENUM_METHODS: [BuiltinMethod; 3] = [
    method(20, "empty", gen_enum_empty),
    method(30, "equals", gen_enum_equals),
    method(40, "deserialize", gen_enum_deserialize),
];

static CONTAINER_METHODS: [BuiltinMethod; 4] = [
    method(10, "new", gen_new),
    method(20, "empty", gen_empty),
    method(30, "equals", gen_container_equals),
    method(40, "deserialize", gen_deserialize),
];

static OPTION_METHODS: [BuiltinMethod; 4] = [
    method(10, "new", gen_new),
    method(20, "empty", gen_empty),
    method(30, "equals", gen_option_equals),
    method(40, "deserialize", gen_deserialize),
];

static DECIMAL_METHODS: [BuiltinMethod; 10] = [
    method(10, "new", gen_new),
    method(20, "empty", gen_empty),
    method(30, "equals", gen_equals),
    method(40, "deserialize", gen_deserialize),
    method(50, "compare_magnitude", gen_compare_magnitude),
    method(60, "add_magnitudes", gen_add_magnitudes),
    method(70, "subtract_magnitudes", gen_subtract_magnitudes),
    method(80, "negate", gen_negate),
    method(90, "plus", gen_plus),
    method(100, "minus_and_compare", gen_minus_and_compare),
];

static WRAPPED_METHODS: [BuiltinMethod; 1] = [method(40, "deserialize", gen_wrapped_deserialize)];

impl BflModule {
    /// Built-in methods of this module's kind, in order.
    pub fn builtin_methods(&self) -> &'static [BuiltinMethod] {
        match self.kind() {
            ModuleKind::Struct(_) => &STRUCT_METHODS,
            ModuleKind::Enum(_) => &ENUM_METHODS,
            ModuleKind::TypeDef(_) => &[],
            ModuleKind::List { .. } | ModuleKind::String { .. } | ModuleKind::Map { .. } => {
                &CONTAINER_METHODS
            }
            ModuleKind::Option(_) => &OPTION_METHODS,
            ModuleKind::BigDecimal { .. } => &DECIMAL_METHODS,
            ModuleKind::WrappedState { .. } | ModuleKind::WrappedTransactionComponent { .. } => {
                &WRAPPED_METHODS
            }
        }
    }
}

/// A rendered source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedModule {
    pub module_id: String,
    pub file_name: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZincGenerator {
    contexts: Vec<String>,
}

impl Default for ZincGenerator {
    fn default() -> Self {
        Self {
            contexts: vec![DEFAULT_CONTEXT.to_string()],
        }
    }
}

impl ZincGenerator {
    /// A generator emitting one deserializer per context.
    pub fn new(contexts: Vec<String>) -> Result<Self, SchemaError> {
        if contexts.is_empty() {
            return Ok(Self::default());
        }
        let mut seen = BTreeSet::new();
        for c in &contexts {
            let valid = c.chars().next().is_some_and(|f| f.is_ascii_lowercase())
                && c.chars().all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_');
            if !valid {
                return Err(SchemaError::InvalidName(c.clone()));
            }
            if !seen.insert(c.as_str()) {
                return Err(SchemaError::DuplicateName(c.clone()));
            }
        }
        Ok(Self { contexts })
    }

    pub fn contexts(&self) -> &[String] {
        &self.contexts
    }

    /// Every module reachable from `roots`, each after its dependencies.
    pub fn collect_modules(roots: &[Arc<BflModule>]) -> Vec<Arc<BflModule>> {
        fn visit(m: &Arc<BflModule>, seen: &mut HashSet<String>, out: &mut Vec<Arc<BflModule>>) {
            if !seen.insert(m.id().to_string()) {
                return;
            }
            for dep in m.dependencies() {
                visit(&dep, seen, out);
            }
            out.push(Arc::clone(m));
        }
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for root in roots {
            visit(root, &mut seen, &mut out);
        }
        out
    }

    pub fn generate(&self, roots: &[Arc<BflModule>]) -> Vec<GeneratedModule> {
        Self::collect_modules(roots)
            .iter()
            .map(|m| GeneratedModule {
                module_id: m.id().to_string(),
                file_name: format!("{}.zn", m.file_stem()),
                source: self.render(m),
            })
            .collect()
    }

    /// Generate and write every module under `dir`.
    pub fn write_all(&self, roots: &[Arc<BflModule>], dir: &Path) -> Result<Vec<PathBuf>, BflError> {
        let io = |path: &Path| {
            let path = path.to_path_buf();
            move |source| BflError::Io { path, source }
        };
        std::fs::create_dir_all(dir).map_err(io(dir))?;
        let mut written = Vec::new();
        for module in self.generate(roots) {
            let path = dir.join(&module.file_name);
            std::fs::write(&path, &module.source).map_err(io(&path))?;
            tracing::debug!(module = %module.module_id, path = %path.display(), "generated zinc module");
            written.push(path);
        }
        Ok(written)
    }

    /// The module's methods with their order: built-ins, then extras.
    pub fn methods(&self, module: &BflModule) -> Vec<(u32, String)> {
        let mut methods: Vec<(u32, String)> = module
            .builtin_methods()
            .iter()
            .map(|m| (m.order, (m.generate)(module, &self.contexts)))
            .collect();
        methods.extend(
            module
                .extra_methods()
                .iter()
                .map(|m| (m.order, m.source.trim_end().to_string())),
        );
        methods.sort_by_key(|(order, _)| *order);
        methods
    }

    /// Source of one module file.
    pub fn render(&self, module: &BflModule) -> String {
        let mut out = format!("//! Generated from `{}`. Do not edit.\n", module.id());

        let imports = imports(module);
        if !imports.is_empty() {
            out.push('\n');
            for m in &imports {
                out.push_str(&format!("mod {};\n", m.file_stem()));
            }
            out.push('\n');
            for m in &imports {
                out.push_str(&format!("use {}::{};\n", m.file_stem(), m.id()));
                if uses_size_constant(m) {
                    out.push_str(&format!("use {}::{}_SIZE;\n", m.file_stem(), m.const_prefix()));
                }
            }
        }
        let converters = converters(module);
        if !converters.is_empty() {
            if imports.is_empty() {
                out.push('\n');
            }
            for c in converters {
                out.push_str(&format!("use std::convert::{c};\n"));
            }
        }

        out.push('\n');
        for (name, ty, value) in constants(module) {
            out.push_str(&format!("const {name}: {ty} = {value};\n"));
        }

        out.push('\n');
        out.push_str(&declaration(module));

        let methods = self.methods(module);
        if !methods.is_empty() {
            out.push_str(&format!("\nimpl {} {{\n", module.id()));
            let bodies: Vec<String> = methods.into_iter().map(|(_, source)| indent_block(&source, 4)).collect();
            out.push_str(&bodies.join("\n\n"));
            out.push_str("\n}\n");
        }
        out
    }
}

/// Modules whose names appear in this module's source.
fn imports(module: &BflModule) -> Vec<Arc<BflModule>> {
    fn add(m: Arc<BflModule>, out: &mut Vec<Arc<BflModule>>) {
        if out.iter().any(|o| o.id() == m.id()) {
            return;
        }
        // Aliases and wrappers expand to the types behind them.
        let behind = match m.kind() {
            ModuleKind::TypeDef(_)
            | ModuleKind::WrappedState { .. }
            | ModuleKind::WrappedTransactionComponent { .. } => m.dependencies(),
            _ => Vec::new(),
        };
        out.push(m);
        for dep in behind {
            add(dep, out);
        }
    }
    let mut out = Vec::new();
    for dep in module.dependencies() {
        add(dep, &mut out);
    }
    out
}

/// Deserializing a field of this module's type slices by its size constant.
fn uses_size_constant(m: &BflModule) -> bool {
    !matches!(m.kind(), ModuleKind::TypeDef(_))
}

fn converters(module: &BflModule) -> Vec<&'static str> {
    let mut primitives = BTreeSet::new();
    match module.kind() {
        ModuleKind::Enum(_) => {
            primitives.insert(Primitive::U8);
        }
        ModuleKind::TypeDef(_) => {}
        _ => {
            for layout in module.layout() {
                layout.field.ty.direct_primitives(&mut primitives);
            }
            if let ModuleKind::WrappedState { .. } | ModuleKind::WrappedTransactionComponent { .. } = module.kind() {
                // The header is skipped, not read.
                primitives.clear();
                if let Some(last) = module.layout().last() {
                    last.field.ty.direct_primitives(&mut primitives);
                }
            }
        }
    }
    let mut out = Vec::new();
    if primitives.iter().any(|p| *p != Primitive::Bool && !p.is_signed()) {
        out.push("from_bits_unsigned");
    }
    if primitives.iter().any(|p| p.is_signed()) {
        out.push("from_bits_signed");
    }
    out
}

fn constants(module: &BflModule) -> Vec<(String, &'static str, String)> {
    let prefix = module.const_prefix();
    let mut out = Vec::new();
    for layout in module.layout() {
        let field = screaming_case(&layout.field.name);
        out.push((format!("{prefix}_{field}_OFFSET"), "u24", layout.offset.to_string()));
        out.push((format!("{prefix}_{field}_SIZE"), "u24", layout.bit_size.to_string()));
    }
    match module.kind() {
        ModuleKind::List { capacity, .. } | ModuleKind::String { capacity } | ModuleKind::Map { capacity, .. } => {
            out.push((format!("{prefix}_CAPACITY"), "u32", capacity.to_string()));
        }
        ModuleKind::BigDecimal {
            integer_digits,
            fraction_digits,
        } => {
            out.push((format!("{prefix}_INTEGER_DIGITS"), "u24", integer_digits.to_string()));
            out.push((format!("{prefix}_FRACTION_DIGITS"), "u24", fraction_digits.to_string()));
        }
        _ => {}
    }
    out.push((format!("{prefix}_SIZE"), "u24", module.bit_size().to_string()));
    out
}

fn declaration(module: &BflModule) -> String {
    match module.kind() {
        ModuleKind::Enum(variants) => {
            let mut out = format!("enum {} {{\n", module.id());
            for (i, v) in variants.iter().enumerate() {
                out.push_str(&format!("    {v} = {i},\n"));
            }
            out.push_str("}\n");
            out
        }
        ModuleKind::TypeDef(aliased) => format!("type {} = {};\n", module.id(), aliased.zinc_type()),
        _ => {
            let mut out = format!("struct {} {{\n", module.id());
            for layout in module.layout() {
                out.push_str(&format!("    {}: {},\n", layout.field.name, layout.field.ty.zinc_type()));
            }
            out.push_str("}\n");
            out
        }
    }
}

/// Indent every non-empty line.
fn indent_block(text: &str, by: usize) -> String {
    let pad = " ".repeat(by);
    text.lines()
        .map(|line| if line.is_empty() { String::new() } else { format!("{pad}{line}") })
        .collect::<Vec<_>>()
        .join("\n")
}

fn offset_const(module: &BflModule, field: &str) -> String {
    format!("{}_{}_OFFSET", module.const_prefix(), screaming_case(field))
}

fn gen_new(module: &BflModule, _: &[String]) -> String {
    let layout = module.layout();
    let params: Vec<String> = layout
        .iter()
        .map(|l| format!("{}: {}", l.field.name, l.field.ty.zinc_type()))
        .collect();
    let mut out = format!("fn new({}) -> Self {{\n    Self {{\n", params.join(", "));
    for l in &layout {
        out.push_str(&format!("        {0}: {0},\n", l.field.name));
    }
    out.push_str("    }\n}");
    out
}

fn gen_empty(module: &BflModule, _: &[String]) -> String {
    let mut out = String::from("fn empty() -> Self {\n    Self {\n");
    for l in module.layout() {
        out.push_str(&format!(
            "        {}: {},\n",
            l.field.name,
            indent_continuation(&l.field.ty.default_expr(), 8)
        ));
    }
    out.push_str("    }\n}");
    out
}

fn gen_equals(module: &BflModule, _: &[String]) -> String {
    let terms: Vec<String> = module
        .layout()
        .iter()
        .map(|l| {
            let name = &l.field.name;
            indent_continuation(
                &l.field.ty.equals_expr(&format!("self.{name}"), &format!("other.{name}")),
                8,
            )
        })
        .collect();
    let body = if terms.is_empty() {
        "true".to_string()
    } else {
        terms.join("\n        && ")
    };
    format!("fn equals(self, other: Self) -> bool {{\n    {body}\n}}")
}

fn gen_container_equals(module: &BflModule, _: &[String]) -> String {
    let capacity = format!("{}_CAPACITY", module.const_prefix());
    let element_checks: Vec<String> = match module.kind() {
        ModuleKind::List { element, .. } => vec![element.equals_expr("self.elements[i]", "other.elements[i]")],
        ModuleKind::String { .. } => vec!["self.bytes[i] == other.bytes[i]".to_string()],
        ModuleKind::Map { key, value, .. } => vec![
            key.equals_expr("self.keys[i]", "other.keys[i]"),
            value.equals_expr("self.values[i]", "other.values[i]"),
        ],
        _ => Vec::new(),
    };
    let check = element_checks
        .iter()
        .map(|c| indent_continuation(c, 12))
        .collect::<Vec<_>>()
        .join("\n                && ");
    format!(
        "fn equals(self, other: Self) -> bool {{\n    \
         let mut result = self.size == other.size;\n    \
         for i in (0 as u32)..{capacity} while result {{\n        \
         if i < self.size {{\n            \
         result = {check};\n        \
         }}\n    \
         }}\n    \
         result\n\
         }}"
    )
}

fn gen_option_equals(module: &BflModule, _: &[String]) -> String {
    let inner = match module.kind() {
        ModuleKind::Option(inner) => inner.equals_expr("self.value", "other.value"),
        _ => "true".to_string(),
    };
    format!(
        "fn equals(self, other: Self) -> bool {{\n    \
         if self.has_value && other.has_value {{\n        \
         {}\n    \
         }} else {{\n        \
         self.has_value == other.has_value\n    \
         }}\n\
         }}",
        indent_continuation(&inner, 8)
    )
}

fn gen_deserialize(module: &BflModule, contexts: &[String]) -> String {
    let size = format!("{}_SIZE", module.const_prefix());
    let methods: Vec<String> = contexts
        .iter()
        .map(|ctx| {
            let mut out = format!("fn deserialize_from_{ctx}({ctx}: [bool; {size}]) -> Self {{\n    Self {{\n");
            for l in module.layout() {
                let expr = l
                    .field
                    .ty
                    .deserialize_expr(ctx, &offset_const(module, &l.field.name), ctx);
                out.push_str(&format!("        {}: {},\n", l.field.name, indent_continuation(&expr, 8)));
            }
            out.push_str("    }\n}");
            out
        })
        .collect();
    methods.join("\n\n")
}

fn gen_wrapped_deserialize(module: &BflModule, contexts: &[String]) -> String {
    let size = format!("{}_SIZE", module.const_prefix());
    let Some(last) = module.layout().pop() else {
        return String::new();
    };
    contexts
        .iter()
        .map(|ctx| {
            let expr = last
                .field
                .ty
                .deserialize_expr(ctx, &offset_const(module, &last.field.name), ctx);
            format!(
                "fn deserialize_from_{ctx}({ctx}: [bool; {size}]) -> {} {{\n    {}\n}}",
                last.field.ty.zinc_type(),
                indent_continuation(&expr, 4)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn enum_parts(module: &BflModule) -> (&[String], &'static str) {
    match module.kind() {
        ModuleKind::Enum(variants) => (variants, if module.bit_size() == 8 { "u8" } else { "u16" }),
        _ => (&[], "u8"),
    }
}

fn gen_enum_empty(module: &BflModule, _: &[String]) -> String {
    let (variants, _) = enum_parts(module);
    let first = variants.first().map(String::as_str).unwrap_or_default();
    format!("fn empty() -> Self {{\n    {}::{first}\n}}", module.id())
}

fn gen_enum_equals(module: &BflModule, _: &[String]) -> String {
    let (_, ordinal) = enum_parts(module);
    format!("fn equals(self, other: Self) -> bool {{\n    self as {ordinal} == other as {ordinal}\n}}")
}

fn gen_enum_deserialize(module: &BflModule, contexts: &[String]) -> String {
    let (variants, ordinal) = enum_parts(module);
    let size = format!("{}_SIZE", module.const_prefix());
    let id = module.id();
    let last = variants.len().saturating_sub(1);
    let mut arms = String::new();
    for (i, v) in variants.iter().enumerate() {
        let pattern = if i == last { "_".to_string() } else { i.to_string() };
        arms.push_str(&format!("        {pattern} => {id}::{v},\n"));
    }
    contexts
        .iter()
        .map(|ctx| {
            format!(
                "fn deserialize_from_{ctx}({ctx}: [bool; {size}]) -> Self {{\n    \
                 let ordinal = from_bits_unsigned({ctx}[0..{size}]) as {ordinal};\n    \
                 assert!(ordinal < {count} as {ordinal}, \"Invalid ordinal for {id}\");\n    \
                 match ordinal {{\n{arms}    }}\n\
                 }}",
                count = variants.len()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn digit_loop(module: &BflModule, part: &str, body: &str) -> String {
    let digits = format!("{}_{}_DIGITS", module.const_prefix(), part.to_ascii_uppercase());
    format!(
        "for i in (0 as u24)..{digits} {{\n    \
         let position = {digits} - 1 - i;\n    \
         {}\n\
         }}",
        indent_continuation(&body.replace("PART", part), 4)
    )
}

fn gen_compare_magnitude(module: &BflModule, _: &[String]) -> String {
    let scan = |part: &str| {
        let digits = format!("{}_{}_DIGITS", module.const_prefix(), part.to_ascii_uppercase());
        format!(
            "for i in (0 as u24)..{digits} while result == 0 {{\n    \
             if self.{part}[i] > other.{part}[i] {{\n        result = 1;\n    }}\n    \
             if self.{part}[i] < other.{part}[i] {{\n        result = -1;\n    }}\n\
             }}"
        )
    };
    format!(
        "fn compare_magnitude(self, other: Self) -> i8 {{\n    \
         let mut result: i8 = 0;\n    \
         {}\n    \
         {}\n    \
         result\n\
         }}",
        indent_continuation(&scan("integer"), 4),
        indent_continuation(&scan("fraction"), 4)
    )
}

fn gen_add_magnitudes(module: &BflModule, _: &[String]) -> String {
    let body = "let sum = self.PART[position] + other.PART[position] + carry;\n\
                result.PART[position] = sum % 10;\n\
                carry = sum / 10;";
    format!(
        "fn add_magnitudes(self, other: Self) -> Self {{\n    \
         let mut result = Self::empty();\n    \
         let mut carry: u8 = 0;\n    \
         {}\n    \
         {}\n    \
         assert!(carry == 0, \"Magnitude exceeds the maximum stored value\");\n    \
         result\n\
         }}",
        indent_continuation(&digit_loop(module, "fraction", body), 4),
        indent_continuation(&digit_loop(module, "integer", body), 4)
    )
}

fn gen_subtract_magnitudes(module: &BflModule, _: &[String]) -> String {
    let body = "let subtrahend = other.PART[position] + borrow;\n\
                if self.PART[position] >= subtrahend {\n    \
                result.PART[position] = self.PART[position] - subtrahend;\n    \
                borrow = 0;\n\
                } else {\n    \
                result.PART[position] = self.PART[position] + 10 - subtrahend;\n    \
                borrow = 1;\n\
                }";
    format!(
        "fn subtract_magnitudes(self, other: Self) -> Self {{\n    \
         let mut result = Self::empty();\n    \
         let mut borrow: u8 = 0;\n    \
         {}\n    \
         {}\n    \
         result\n\
         }}",
        indent_continuation(&digit_loop(module, "fraction", body), 4),
        indent_continuation(&digit_loop(module, "integer", body), 4)
    )
}

fn gen_negate(_: &BflModule, _: &[String]) -> String {
    "fn negate(self) -> Self {\n    \
     let mut result = self;\n    \
     result.sign = -self.sign;\n    \
     result\n\
     }"
    .to_string()
}

fn gen_plus(_: &BflModule, _: &[String]) -> String {
    "fn plus(self, other: Self) -> Self {\n    \
     if self.sign == 0 {\n        other\n    \
     } else if other.sign == 0 {\n        self\n    \
     } else if self.sign == other.sign {\n        \
     let mut result = self.add_magnitudes(other);\n        \
     result.sign = self.sign;\n        \
     result\n    \
     } else {\n        \
     let order = self.compare_magnitude(other);\n        \
     if order == 0 {\n            \
     Self::empty()\n        \
     } else if order > 0 {\n            \
     let mut result = self.subtract_magnitudes(other);\n            \
     result.sign = self.sign;\n            \
     result\n        \
     } else {\n            \
     let mut result = other.subtract_magnitudes(self);\n            \
     result.sign = other.sign;\n            \
     result\n        \
     }\n    \
     }\n\
     }"
    .to_string()
}

fn gen_minus_and_compare(_: &BflModule, _: &[String]) -> String {
    "fn minus(self, other: Self) -> Self {\n    \
     self.plus(other.negate())\n\
     }\n\
     \n\
     fn compare(self, other: Self) -> i8 {\n    \
     if self.sign != other.sign {\n        \
     if self.sign > other.sign { 1 } else { -1 }\n    \
     } else if self.sign == 0 {\n        \
     0\n    \
     } else if self.sign > 0 {\n        \
     self.compare_magnitude(other)\n    \
     } else {\n        \
     other.compare_magnitude(self)\n    \
     }\n\
     }"
    .to_string()
}
