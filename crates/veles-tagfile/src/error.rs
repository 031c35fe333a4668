//! Error types for tagfile parsing.
//!
//! Each phase of a decode session has its own error enum. Decode and schema
//! errors are fatal to the structures they concern; patch and resolve errors
//! are collected into the [`SessionReport`](crate::SessionReport) so callers
//! can inspect a best-effort object graph.

use thiserror::Error;

/// Errors from the chunk tree decoder. Fatal to the subtree being parsed.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A chunk's declared size overran the bytes available to it.
    #[error("truncated chunk stream at offset {offset}: needed {needed} bytes but only {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// The buffer contained no TAG0 root chunk.
    #[error("no TAG0 root chunk found")]
    MissingRoot,

    /// Common library error.
    #[error("{0}")]
    Common(#[from] veles_common::Error),
}

/// Errors from type registry construction. Fatal to the session: later
/// phases assume the registry is trustworthy.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A type index pointed beyond the declared type table.
    #[error("dangling type reference: index {index} out of bounds (table size: {count})")]
    DanglingTypeRef { index: u32, count: usize },

    /// A string index pointed beyond the TST1/FST1 name table.
    #[error("dangling name reference: index {index} out of bounds (table size: {count})")]
    DanglingNameRef { index: u32, count: usize },

    /// A type's parent chain loops back on itself.
    #[error("parent cycle through type {0}")]
    ParentCycle(String),

    /// Field offsets within a type's own region must be monotonic.
    #[error("field offsets not monotonic in type {0}")]
    NonMonotonicOffsets(String),

    /// Unrecognized field type value in a TBDY record.
    #[error("invalid field type: {0:#06x}")]
    InvalidFieldType(u16),

    /// Unrecognized edit opcode in a PTCH record.
    #[error("invalid patch opcode: {0}")]
    InvalidPatchOpcode(u8),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] veles_common::Error),
}

/// Errors from patch application. Reported per type, never fatal.
#[derive(Debug, Error)]
pub enum PatchError {
    /// The target type's hash matched neither the patch's old nor new hash.
    #[error("patch for {type_name}: hash {found:#010x} matches neither old {old:#010x} nor new {new:#010x}")]
    UnexpectedHash {
        type_name: String,
        found: u32,
        old: u32,
        new: u32,
    },

    /// The patch named a type the registry does not know.
    #[error("patch targets unknown type: {0}")]
    UnknownType(String),

    /// The target type carries no version hash to reconcile against.
    #[error("patch targets {0}, which carries no version hash")]
    UnhashedType(String),

    /// A field edit referenced a field the target type does not have.
    #[error("patch edit for {type_name} references unknown field: {field}")]
    UnknownField { type_name: String, field: String },
}

/// Errors from reference resolution. Reported, field left unbound.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A pointer field carried a slot with no matching item entry.
    #[error("unresolved slot {slot} referenced by {path}")]
    UnresolvedSlot { slot: u32, path: String },
}

/// Errors from field-by-name access on a record instance.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The record's schema has no field with this name. Always a
    /// programmer or schema-mismatch error, never expected in well-formed
    /// input.
    #[error("unknown field: {0}")]
    UnknownField(String),
}

/// Errors from typed adapter projection. Fatal to that projection call only.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The instance's schema type name did not match the adapter's.
    #[error("type name mismatch: adapter expects {expected}, instance is {actual}")]
    TypeNameMismatch {
        expected: &'static str,
        actual: String,
    },

    /// The instance was not a record variant.
    #[error("expected a record instance")]
    NotARecord,

    /// Field lookup failed.
    #[error("{0}")]
    Access(#[from] AccessError),

    /// A field held a different variant than the adapter expects.
    #[error("field {field}: expected {expected}")]
    FieldType {
        field: String,
        expected: &'static str,
    },
}

/// Top-level error for tagfile sessions.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] veles_common::Error),

    /// Chunk stream decode error.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Type registry construction error.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
}

/// Result type for tagfile operations.
pub type Result<T> = std::result::Result<T, Error>;
