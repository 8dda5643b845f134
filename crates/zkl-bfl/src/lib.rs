//! # zkl-bfl — Fixed-Layout Circuit Types
//!
//! Circuit inputs have a fixed width: every value of a type occupies the same
//! number of bits regardless of content. This crate models such types and
//! everything derived from them.
//!
//! ## Architecture
//!
//! - **Type model** (`types.rs`): [`Primitive`], [`BflType`] and
//!   [`BflModule`]. Containers (lists, strings, maps, nullables, decimals) are
//!   modules with a fixed backing capacity; their layouts and bit sizes are
//!   computed, never declared.
//! - **Values** (`value.rs`, `codec.rs`): [`BflValue`] and the bit-exact codec.
//!   Fields are packed MSB-first without alignment; the final byte is
//!   zero-padded. Equality ignores container slots beyond the logical size.
//! - **BigDecimal** (`bigdecimal.rs`): [`FixedDecimal`], the off-circuit
//!   reference for the generated decimal arithmetic. Overflow is an error,
//!   never a wrap.
//! - **Schemas** (`schema.rs`): YAML [`SchemaDescriptor`]s naming classes,
//!   enums and type aliases with type expressions such as `list<u32, 4>`.
//! - **Structure** (`structure.rs`): the serializable [`ZkpStructureType`]
//!   tree and [`diff_structures`], which classifies layout changes as
//!   breaking or compatible.
//! - **Zinc** (`zinc.rs`): [`ZincGenerator`], one source file per module.

pub mod bigdecimal;
pub mod codec;
pub mod error;
pub mod schema;
pub mod structure;
pub mod types;
pub mod value;
pub mod zinc;

// Re-export primary types.
pub use bigdecimal::FixedDecimal;
pub use codec::{decode, encode, BitReader, BitWriter};
pub use error::{BflError, BigDecimalError, SchemaError};
pub use schema::{SchemaDescriptor, TypeExpr};
pub use structure::{diff_structures, FieldChange, StructureDifference, ZkpStructureField, ZkpStructureType};
pub use types::{BflField, BflModule, BflType, FieldLayout, ModuleKind, Primitive, ZincMethod};
pub use value::{default_value, to_witness_json, values_equal, BflValue};
pub use zinc::{GeneratedModule, ZincGenerator};
