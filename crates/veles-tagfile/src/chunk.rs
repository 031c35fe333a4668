//! Chunk model: the tag vocabulary and the decoded chunk node.

use std::ops::Range;

use veles_common::BinaryReader;

use crate::DecodeError;

/// Size of a chunk header: the big-endian size word plus the 4-byte tag.
pub const CHUNK_HEADER_SIZE: usize = 8;

/// Decorator bit marking a chunk as a leaf: no children, payload is opaque.
pub const LEAF_DECORATOR: u16 = 0x4000;

/// Decorator bit marking one's-complement size mode: the stored magnitude
/// is the one's complement of the actual size.
pub const SIZE_COMPLEMENT: u16 = 0x8000;

/// Mask selecting the 30-bit size magnitude out of the header word.
const SIZE_MASK: u32 = 0x3FFF_FFFF;

/// Chunk kinds found in a tagfile.
///
/// The 4-byte ASCII tags are the actual values from the file format. Any
/// other tag decodes to [`ChunkKind::Unknown`] and is retained opaquely
/// rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    /// Root container chunk.
    Tag0,
    /// SDK version string.
    Sdkv,
    /// Serialized object data.
    Data,
    /// Type metadata container.
    Type,
    /// Type pointer table (retained opaque).
    TypePointer,
    /// Type name string table.
    TypeStruct,
    /// Per-type name and template argument records.
    TypeNameTable,
    /// Field name string table.
    FunctionStruct,
    /// Per-type parent, size, and field layout records.
    TypeBody,
    /// Per-type version hashes.
    TypeHash,
    /// Per-type alignment metadata.
    TypePadding,
    /// Index container holding item entries.
    Index,
    /// Item table: the format's pointer substitute.
    Item,
    /// Version patch records.
    Patch,
    /// Unrecognized tag, retained as an opaque leaf.
    Unknown,
}

impl ChunkKind {
    /// Map a 4-byte tag to its kind.
    pub fn from_tag(tag: &[u8; 4]) -> Self {
        match tag {
            b"TAG0" => Self::Tag0,
            b"SDKV" => Self::Sdkv,
            b"DATA" => Self::Data,
            b"TYPE" => Self::Type,
            b"TPTR" => Self::TypePointer,
            b"TST1" => Self::TypeStruct,
            b"TNA1" => Self::TypeNameTable,
            b"FST1" => Self::FunctionStruct,
            b"TBDY" => Self::TypeBody,
            b"THSH" => Self::TypeHash,
            b"TPAD" => Self::TypePadding,
            b"INDX" => Self::Index,
            b"ITEM" => Self::Item,
            b"PTCH" => Self::Patch,
            _ => Self::Unknown,
        }
    }

    /// Get the 4-byte tag for this kind, if it has one.
    pub fn tag(&self) -> Option<&'static [u8; 4]> {
        match self {
            Self::Tag0 => Some(b"TAG0"),
            Self::Sdkv => Some(b"SDKV"),
            Self::Data => Some(b"DATA"),
            Self::Type => Some(b"TYPE"),
            Self::TypePointer => Some(b"TPTR"),
            Self::TypeStruct => Some(b"TST1"),
            Self::TypeNameTable => Some(b"TNA1"),
            Self::FunctionStruct => Some(b"FST1"),
            Self::TypeBody => Some(b"TBDY"),
            Self::TypeHash => Some(b"THSH"),
            Self::TypePadding => Some(b"TPAD"),
            Self::Index => Some(b"INDX"),
            Self::Item => Some(b"ITEM"),
            Self::Patch => Some(b"PTCH"),
            Self::Unknown => None,
        }
    }

    /// Get a display name for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tag0 => "TAG0",
            Self::Sdkv => "SDKV",
            Self::Data => "DATA",
            Self::Type => "TYPE",
            Self::TypePointer => "TPTR",
            Self::TypeStruct => "TST1",
            Self::TypeNameTable => "TNA1",
            Self::FunctionStruct => "FST1",
            Self::TypeBody => "TBDY",
            Self::TypeHash => "THSH",
            Self::TypePadding => "TPAD",
            Self::Index => "INDX",
            Self::Item => "ITEM",
            Self::Patch => "PTCH",
            Self::Unknown => "????",
        }
    }

    /// Check whether chunks of this kind may hold children.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Tag0 | Self::Type | Self::Index)
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decoded chunk header.
///
/// The header is one big-endian u32 word followed by the 4-byte tag. The
/// word's high u16 is the decorator; the low 30 bits are the size magnitude,
/// counting the header itself. With [`SIZE_COMPLEMENT`] set, the magnitude
/// stores the one's complement of the size.
#[derive(Debug, Clone, Copy)]
pub struct ChunkHeader {
    pub decorator: u16,
    pub size: u32,
    pub tag: [u8; 4],
    pub kind: ChunkKind,
}

impl ChunkHeader {
    /// Read a header at the reader's current position.
    pub fn read(reader: &mut BinaryReader<'_>) -> Result<Self, DecodeError> {
        let word = reader.read_u32_be()?;
        let decorator = (word >> 16) as u16;
        let size = if decorator & SIZE_COMPLEMENT != 0 {
            !word & SIZE_MASK
        } else {
            word & SIZE_MASK
        };

        let bytes = reader.read_bytes(4)?;
        let mut tag = [0u8; 4];
        tag.copy_from_slice(bytes);

        Ok(Self {
            decorator,
            size,
            tag,
            kind: ChunkKind::from_tag(&tag),
        })
    }

    /// Check the leaf decorator bit.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.decorator & LEAF_DECORATOR != 0
    }
}

/// One node in the decoded chunk tree.
///
/// A chunk owns no bytes: `payload` is a range into the session buffer,
/// which outlives the whole tree. Chunks are immutable after decode.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Header decorator flags.
    pub decorator: u16,
    /// Declared size including the 8-byte header.
    pub declared_size: u32,
    /// Raw 4-byte tag as read from the file.
    pub tag: [u8; 4],
    /// Kind resolved from the tag.
    pub kind: ChunkKind,
    /// Payload byte range into the session buffer.
    pub payload: Range<usize>,
    /// Child chunks, in file order. Empty for leaves.
    pub children: Vec<Chunk>,
}

impl Chunk {
    /// Payload length in bytes.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Full byte range of this chunk, header included.
    #[inline]
    pub fn full_range(&self) -> Range<usize> {
        self.payload.start - CHUNK_HEADER_SIZE..self.payload.end
    }

    /// The tag as a display string.
    pub fn tag_str(&self) -> &str {
        std::str::from_utf8(&self.tag).unwrap_or("????")
    }

    /// Find the first descendant of the given kind, depth-first.
    pub fn find(&self, kind: ChunkKind) -> Option<&Chunk> {
        for child in &self.children {
            if child.kind == kind {
                return Some(child);
            }
            if let Some(found) = child.find(kind) {
                return Some(found);
            }
        }
        None
    }

    /// Pre-order traversal over this chunk and all descendants.
    pub fn traverse<'a>(&'a self, visit: &mut impl FnMut(&'a Chunk)) {
        visit(self);
        for child in &self.children {
            child.traverse(visit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for tag in [
            b"TAG0", b"SDKV", b"DATA", b"TYPE", b"TPTR", b"TST1", b"TNA1",
            b"FST1", b"TBDY", b"THSH", b"TPAD", b"INDX", b"ITEM", b"PTCH",
        ] {
            let kind = ChunkKind::from_tag(tag);
            assert_ne!(kind, ChunkKind::Unknown);
            assert_eq!(kind.tag(), Some(tag));
        }
    }

    #[test]
    fn test_unknown_tag() {
        assert_eq!(ChunkKind::from_tag(b"XYZZ"), ChunkKind::Unknown);
        assert_eq!(ChunkKind::Unknown.tag(), None);
    }

    #[test]
    fn test_header_plain_size() {
        // decorator 0x4000 (leaf), size 0x30, tag SDKV
        let data = [0x40, 0x00, 0x00, 0x30, b'S', b'D', b'K', b'V'];
        let mut reader = BinaryReader::new(&data);
        let header = ChunkHeader::read(&mut reader).unwrap();

        assert_eq!(header.decorator, 0x4000);
        assert_eq!(header.size, 0x30);
        assert!(header.is_leaf());
        assert_eq!(header.kind, ChunkKind::Sdkv);
    }

    #[test]
    fn test_header_complement_size() {
        // Size 0x30 stored one's-complemented with bit 15 of the decorator set.
        let word = 0x8000_0000u32 | (!0x30u32 & 0x3FFF_FFFF);
        let mut data = word.to_be_bytes().to_vec();
        data.extend_from_slice(b"DATA");

        let mut reader = BinaryReader::new(&data);
        let header = ChunkHeader::read(&mut reader).unwrap();

        assert_eq!(header.size, 0x30);
        assert!(!header.is_leaf());
        assert_eq!(header.kind, ChunkKind::Data);
    }

    #[test]
    fn test_container_kinds() {
        assert!(ChunkKind::Tag0.is_container());
        assert!(ChunkKind::Type.is_container());
        assert!(ChunkKind::Index.is_container());
        assert!(!ChunkKind::Data.is_container());
        assert!(!ChunkKind::Unknown.is_container());
    }
}
