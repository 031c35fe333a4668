//! Veles - Havok tagfile binary asset parsing library.
//!
//! This crate provides a unified interface to the Veles library ecosystem
//! for working with Havok tagfile assets.
//!
//! # Crates
//!
//! - [`veles_common`] - Common utilities (binary reading, error types)
//! - [`veles_tagfile`] - Tagfile decoding (chunk tree, type registry,
//!   patches, instances, reference resolution)
//!
//! # Example
//!
//! ```no_run
//! use veles::prelude::*;
//!
//! // Decode a tagfile asset
//! let file = TagFile::open("character.hkt")?;
//! println!("SDK: {}", file.sdk_version().unwrap_or("?"));
//!
//! // Walk the root objects
//! for root in file.roots() {
//!     let view = file.view(root);
//!     println!("{}", view.type_name().unwrap_or("?"));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use veles_common as common;
pub use veles_tagfile as tagfile;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use veles_common::BinaryReader;
    pub use veles_tagfile::{
        Chunk, ChunkKind, Instance, InstanceView, Primitive, SessionReport, TagClass, TagFile,
        TypeRegistry,
    };
    #[cfg(feature = "full")]
    pub use veles_tagfile::JsonDumper;
}

// Re-export commonly used types at the crate root
pub use veles_tagfile::{TagClass, TagFile};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
