//! Demonstration adapters for well-known Havok classes.
//!
//! The full class catalogue is generated per SDK and lives outside this
//! crate; these adapters show the pattern every generated one follows,
//! including parent-chain delegation. Reference-typed fields round-trip
//! their pointer value, not the pointee: writing pointees requires an
//! encoder, which this crate does not provide.

mod base;
mod root_container;

pub use base::{HkBaseObject, HkReferencedObject};
pub use root_container::{HkRootLevelContainer, HkRootLevelContainerNamedVariant};
