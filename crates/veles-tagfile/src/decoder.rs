//! Chunk tree decoder.
//!
//! Splits a raw buffer into a tree of chunks honoring each chunk's declared
//! size. There is no child-count field in the format: children are parsed
//! back-to-back until the parent's payload is exhausted, and a declared
//! child that would overrun the payload is a [`DecodeError::Truncated`].

use veles_common::BinaryReader;

use crate::chunk::{Chunk, ChunkHeader, CHUNK_HEADER_SIZE};
use crate::DecodeError;

/// Decode a buffer into a sequence of top-level chunks.
///
/// An empty buffer decodes to an empty sequence, not an error. Unknown
/// chunk kinds are retained as opaque leaves and never abort their
/// siblings.
pub fn decode_chunks(data: &[u8]) -> Result<Vec<Chunk>, DecodeError> {
    decode_window(data, 0, data.len())
}

/// Decode the chunks occupying `data[start..end]` back-to-back.
fn decode_window(data: &[u8], start: usize, end: usize) -> Result<Vec<Chunk>, DecodeError> {
    let mut chunks = Vec::new();
    let mut pos = start;

    while pos < end {
        let available = end - pos;
        if available < CHUNK_HEADER_SIZE {
            return Err(DecodeError::Truncated {
                offset: pos,
                needed: CHUNK_HEADER_SIZE,
                available,
            });
        }

        let mut reader = BinaryReader::new_at(data, pos);
        let header = ChunkHeader::read(&mut reader)?;

        // A zero magnitude means a header-only chunk; otherwise the size
        // counts the header and must cover it.
        let declared = header.size as usize;
        let total = if declared == 0 {
            CHUNK_HEADER_SIZE
        } else {
            declared
        };
        if total < CHUNK_HEADER_SIZE || total > available {
            return Err(DecodeError::Truncated {
                offset: pos,
                needed: total,
                available,
            });
        }

        let payload = pos + CHUNK_HEADER_SIZE..pos + total;

        let children = if header.kind.is_container() && !header.is_leaf() {
            decode_window(data, payload.start, payload.end)?
        } else {
            Vec::new()
        };

        chunks.push(Chunk {
            decorator: header.decorator,
            declared_size: total as u32,
            tag: header.tag,
            kind: header.kind,
            payload,
            children,
        });

        pos += total;
    }

    Ok(chunks)
}
