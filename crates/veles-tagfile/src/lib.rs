//! Havok tagfile parser.
//!
//! A tagfile is a chunk-structured binary container carrying both runtime
//! type metadata (class layouts, hashes, inheritance) and serialized object
//! data. The schema lives inside the stream itself, so no external schema
//! compiler is needed: this crate decodes the chunk tree, rebuilds the type
//! registry from the TYPE subtree, applies version patches, materializes
//! generic instances from DATA bytes, and resolves the item-slot references
//! the format uses in place of pointers.
//!
//! # Quick Start
//!
//! ```no_run
//! use veles_tagfile::TagFile;
//!
//! let file = TagFile::open("asset.hkt")?;
//! println!("SDK: {}", file.sdk_version().unwrap_or("?"));
//!
//! for root in file.roots() {
//!     let view = file.view(root);
//!     println!("root type: {}", view.type_name().unwrap_or("?"));
//! }
//!
//! // Anything that could not be fully reconstructed is in the report.
//! for err in &file.report().resolve_errors {
//!     eprintln!("warning: {}", err);
//! }
//! # Ok::<(), veles_tagfile::Error>(())
//! ```
//!
//! # Architecture
//!
//! The crate is organized in two layers:
//!
//! - **Chunk layer**: [`ChunkKind`], [`Chunk`], and the tree decoder split
//!   the raw buffer into typed nodes honoring declared sizes.
//! - **Reflection layer**: [`TypeRegistry`] + [`Instance`] rebuild a typed,
//!   navigable object graph; [`TagClass`] adapters project generic
//!   instances into concrete structs.
//!
//! A [`TagFile`] session owns the buffer and runs the strictly ordered
//! phases: decode tree, build registry, apply patches, materialize
//! instances, resolve references.

mod adapter;
mod chunk;
mod decoder;
mod error;
mod instance;
mod item;
mod patch;
mod resolve;
mod schema;
mod tagfile;
mod wire;

pub mod classes;
pub mod export;

// Primary API
pub use chunk::{Chunk, ChunkHeader, ChunkKind, CHUNK_HEADER_SIZE, LEAF_DECORATOR};
pub use decoder::decode_chunks;
pub use error::{
    AccessError, AdapterError, DecodeError, Error, PatchError, ResolveError, Result, SchemaError,
};
pub use instance::{
    ArrayValue, Instance, InstanceView, ItemRef, PointerValue, Primitive, RecordValue, RefShape,
};
pub use item::ItemTable;
pub use patch::{FieldEdit, PatchRecord};
pub use schema::{FieldSpec, FieldType, TypeIndex, TypeRegistry, TypeSchema};
pub use tagfile::{SessionReport, TagFile};

// Adapter contract
pub use adapter::{
    expect_record, field_f32, field_i32, field_pointer, field_string, field_u16, field_u32,
    TagClass,
};

// Export types
#[cfg(feature = "json-export")]
pub use export::JsonDumper;

// Wire structures
pub use wire::{HashEntry, ItemEntry, PaddingEntry};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(format!("{}", ChunkKind::Tag0), "TAG0");
        assert_eq!(format!("{}", ChunkKind::Unknown), "????");
    }

    #[test]
    fn test_primitive_display() {
        assert_eq!(format!("{}", Primitive::Bool(true)), "true");
        assert_eq!(format!("{}", Primitive::Int32(42)), "42");
        assert_eq!(format!("{}", Primitive::Str("hello".into())), "hello");
    }

    #[test]
    fn test_empty_parse_has_no_root() {
        match TagFile::parse(&[]) {
            Err(Error::Decode(DecodeError::MissingRoot)) => {}
            other => panic!("expected MissingRoot, got {:?}", other.err()),
        }
    }
}
