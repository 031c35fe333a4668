//! Fixed-layout wire structures read straight from chunk payloads.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// One THSH record: a type's version hash.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct HashEntry {
    /// 1-based type index.
    pub type_index: u32,
    /// Version hash for the type's layout.
    pub hash: u32,
}

/// One TPAD record: a type's alignment.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct PaddingEntry {
    /// 1-based type index.
    pub type_index: u32,
    /// Alignment in bytes.
    pub alignment: u32,
}

/// One ITEM record: the format's substitute for a pointer target.
///
/// `data_offset` is relative to the DATA chunk payload. Slot numbers are
/// positions in the item table; slot 0 is the conventional null entry.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct ItemEntry {
    /// 1-based type index of the referenced value (0 for the null entry).
    pub type_index: u32,
    /// Byte offset of the value within the DATA payload.
    pub data_offset: u32,
    /// Number of consecutive values at that offset.
    pub count: u32,
}
