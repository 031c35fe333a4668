//! Tagfile decode session.
//!
//! A session owns the raw buffer for its whole lifetime and runs the
//! strictly ordered phases over it: decode the chunk tree, build the type
//! registry, apply patches, materialize item instances, resolve references.
//! Each phase completes before the next starts, and the buffer is released
//! with the session, on success and failure alike.

use std::path::Path;

use memmap2::Mmap;
use veles_common::BinaryReader;

use crate::chunk::{Chunk, ChunkKind};
use crate::decoder::decode_chunks;
use crate::instance::{materialize_record, Instance, InstanceView, PointerValue};
use crate::item::ItemTable;
use crate::patch::{apply_patches, parse_patch_chunk};
use crate::resolve::{resolve_references, ResolveContext};
use crate::schema::TypeRegistry;
use crate::{DecodeError, PatchError, ResolveError, Result, SchemaError};

/// Session-owned backing storage for the raw tagfile bytes.
enum TagBuffer {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

impl TagBuffer {
    fn as_slice(&self) -> &[u8] {
        match self {
            TagBuffer::Mmap(mmap) => mmap,
            TagBuffer::Owned(vec) => vec,
        }
    }
}

/// Best-effort session report: what could not be fully reconstructed and
/// why. Nothing is silently dropped without an entry here.
#[derive(Debug, Default)]
pub struct SessionReport {
    /// Types whose patches could not be applied.
    pub degraded_types: Vec<String>,
    /// Patch application errors, in file order.
    pub patch_errors: Vec<PatchError>,
    /// Unresolved references, with the field paths that carried them.
    pub resolve_errors: Vec<ResolveError>,
}

impl SessionReport {
    /// True when every phase completed without degradation.
    pub fn is_clean(&self) -> bool {
        self.degraded_types.is_empty()
            && self.patch_errors.is_empty()
            && self.resolve_errors.is_empty()
    }
}

/// A fully decoded tagfile.
pub struct TagFile {
    buffer: TagBuffer,
    root: Chunk,
    sdk_version: Option<String>,
    registry: TypeRegistry,
    items: ItemTable,
    values: Vec<Vec<Instance>>,
    data_base: usize,
    report: SessionReport,
}

impl TagFile {
    /// Decode a tagfile from a file path (memory-mapped).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_buffer(TagBuffer::Mmap(mmap))
    }

    /// Decode a tagfile from bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::from_buffer(TagBuffer::Owned(data.to_vec()))
    }

    fn from_buffer(buffer: TagBuffer) -> Result<Self> {
        let data = buffer.as_slice();

        // Phase 1: chunk tree.
        let chunks = decode_chunks(data)?;
        let root = chunks
            .into_iter()
            .find(|c| c.kind == ChunkKind::Tag0)
            .ok_or(DecodeError::MissingRoot)?;

        // Single pre-order pass collecting the kind-specific chunks, in
        // file order.
        let mut sdkv_chunk = None;
        let mut type_chunk = None;
        let mut data_chunk = None;
        let mut item_chunks = Vec::new();
        let mut patch_chunks = Vec::new();
        root.traverse(&mut |chunk| match chunk.kind {
            ChunkKind::Sdkv => sdkv_chunk = sdkv_chunk.or(Some(chunk)),
            ChunkKind::Type => type_chunk = type_chunk.or(Some(chunk)),
            ChunkKind::Data => data_chunk = data_chunk.or(Some(chunk)),
            ChunkKind::Item => item_chunks.push(chunk),
            ChunkKind::Patch => patch_chunks.push(chunk),
            _ => {}
        });

        let sdk_version = match sdkv_chunk {
            Some(chunk) => {
                let mut reader = BinaryReader::new(&data[chunk.payload.clone()]);
                Some(
                    reader
                        .read_str_bounded(chunk.payload_len())
                        .map_err(DecodeError::from)?
                        .to_string(),
                )
            }
            None => None,
        };

        // Phase 2: type registry.
        let mut registry = match type_chunk {
            Some(chunk) => TypeRegistry::from_type_chunk(data, chunk)?,
            None => TypeRegistry::empty(),
        };

        // Phase 3: patches, in file order, before any instance exists.
        let mut report = SessionReport::default();
        for chunk in &patch_chunks {
            let records = parse_patch_chunk(&data[chunk.payload.clone()], &registry)?;
            apply_patches(&mut registry, &records, &mut report);
        }

        // Phase 4: item instances.
        let mut items = ItemTable::empty();
        for chunk in &item_chunks {
            items.extend_from_payload(&data[chunk.payload.clone()])?;
        }
        let data_base = data_chunk.map(|c| c.payload.start).unwrap_or(0);

        let mut values: Vec<Vec<Instance>> = Vec::with_capacity(items.len());
        for (slot, entry) in items.iter() {
            if slot == 0 || entry.type_index == 0 {
                values.push(Vec::new());
                continue;
            }
            let type_index = entry.type_index;
            let schema = registry.schema(type_index).ok_or(SchemaError::DanglingTypeRef {
                index: type_index,
                count: registry.len(),
            })?;

            // Only record-shaped items materialize eagerly; primitive
            // carriers stay raw bytes until a reference decodes them.
            if registry.flattened_fields(type_index).is_empty() {
                values.push(Vec::new());
                continue;
            }

            let stride = schema.byte_size as usize;
            let base = data_base + entry.data_offset as usize;
            let mut instances = Vec::with_capacity(entry.count as usize);
            for index in 0..entry.count as usize {
                instances.push(materialize_record(
                    data,
                    base + index * stride,
                    type_index,
                    &registry,
                )?);
            }
            values.push(instances);
        }

        // Phase 5: reference resolution.
        let cx = ResolveContext {
            data,
            data_base,
            items: &items,
        };
        resolve_references(&cx, &mut values, &mut report);

        Ok(Self {
            buffer,
            root,
            sdk_version,
            registry,
            items,
            values,
            data_base,
            report,
        })
    }

    /// The raw tagfile bytes.
    pub fn data(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// The decoded TAG0 root chunk.
    pub fn root(&self) -> &Chunk {
        &self.root
    }

    /// A chunk's payload bytes.
    pub fn chunk_payload(&self, chunk: &Chunk) -> &[u8] {
        &self.data()[chunk.payload.clone()]
    }

    /// The SDK version string from the SDKV chunk.
    pub fn sdk_version(&self) -> Option<&str> {
        self.sdk_version.as_deref()
    }

    /// The type schema registry.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// The item table.
    pub fn items(&self) -> &ItemTable {
        &self.items
    }

    /// Byte offset of the DATA payload within the buffer.
    pub fn data_base(&self) -> usize {
        self.data_base
    }

    /// The session report: degraded types and unresolved references.
    pub fn report(&self) -> &SessionReport {
        &self.report
    }

    /// The materialized instances of an item slot.
    pub fn item(&self, slot: u32) -> Option<&[Instance]> {
        self.values.get(slot as usize).map(|v| v.as_slice())
    }

    /// The root instances (item slot 1, by convention).
    pub fn roots(&self) -> &[Instance] {
        self.item(1).unwrap_or(&[])
    }

    /// Dereference a bound pointer to its target's first instance.
    pub fn deref(&self, pointer: &PointerValue) -> Option<&Instance> {
        let target = pointer.target?;
        self.values.get(target.slot as usize)?.first()
    }

    /// Dereference a bound pointer to all instances at its target slot.
    pub fn deref_all(&self, pointer: &PointerValue) -> Option<&[Instance]> {
        let target = pointer.target?;
        self.values.get(target.slot as usize).map(|v| v.as_slice())
    }

    /// A typed accessor view over an instance.
    pub fn view<'a>(&'a self, instance: &'a Instance) -> InstanceView<'a> {
        InstanceView::new(self, instance)
    }
}
