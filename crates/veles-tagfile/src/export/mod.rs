//! Export facilities for inspection tooling.

#[cfg(feature = "json-export")]
mod json;

#[cfg(feature = "json-export")]
pub use json::JsonDumper;
