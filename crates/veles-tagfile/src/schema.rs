//! Type schema registry built from the TYPE subtree.
//!
//! The schema is carried inside the tagfile itself: TST1 holds the type-name
//! string table, FST1 the field-name table, TNA1 names and template
//! arguments per type, TBDY parent/size/field layouts, THSH version hashes,
//! and TPAD alignment metadata. Type indices are 1-based; index 0 is the
//! null type.

use hashbrown::HashMap as FastHashMap;
use rustc_hash::FxHasher;
use veles_common::BinaryReader;

use crate::chunk::{Chunk, ChunkKind};
use crate::wire::{HashEntry, PaddingEntry};
use crate::SchemaError;

type FxHashMap<K, V> = FastHashMap<K, V, std::hash::BuildHasherDefault<FxHasher>>;

/// 1-based index into the registry's type table. 0 is the null type.
pub type TypeIndex = u32;

/// Field element kinds used in TBDY field records.
///
/// The values are the binary values from the TBDY encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FieldType {
    /// Boolean value.
    Bool = 0x0001,
    /// Signed 8-bit integer.
    Int8 = 0x0002,
    /// Signed 16-bit integer.
    Int16 = 0x0003,
    /// Signed 32-bit integer.
    Int32 = 0x0004,
    /// Signed 64-bit integer.
    Int64 = 0x0005,
    /// Unsigned 8-bit integer.
    UInt8 = 0x0006,
    /// Unsigned 16-bit integer.
    UInt16 = 0x0007,
    /// Unsigned 32-bit integer.
    UInt32 = 0x0008,
    /// Unsigned 64-bit integer.
    UInt64 = 0x0009,
    /// 32-bit floating point.
    Float = 0x000A,
    /// 64-bit floating point.
    Double = 0x000B,
    /// NUL-or-length bounded string held in a referenced item.
    String = 0x000C,
    /// Nested record, laid out inline.
    Record = 0x0010,
    /// Slot-numbered reference to another item.
    Pointer = 0x0011,
}

impl FieldType {
    /// Parse from a u16 value.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0001 => Some(Self::Bool),
            0x0002 => Some(Self::Int8),
            0x0003 => Some(Self::Int16),
            0x0004 => Some(Self::Int32),
            0x0005 => Some(Self::Int64),
            0x0006 => Some(Self::UInt8),
            0x0007 => Some(Self::UInt16),
            0x0008 => Some(Self::UInt32),
            0x0009 => Some(Self::UInt64),
            0x000A => Some(Self::Float),
            0x000B => Some(Self::Double),
            0x000C => Some(Self::String),
            0x0010 => Some(Self::Record),
            0x0011 => Some(Self::Pointer),
            _ => None,
        }
    }

    /// Get the string name for this field type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "Bool",
            Self::Int8 => "Int8",
            Self::Int16 => "Int16",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::UInt8 => "UInt8",
            Self::UInt16 => "UInt16",
            Self::UInt32 => "UInt32",
            Self::UInt64 => "UInt64",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::String => "String",
            Self::Record => "Record",
            Self::Pointer => "Pointer",
        }
    }

    /// Size in bytes of a non-array field of this type within DATA.
    ///
    /// String fields store a slot plus a length bound; pointer fields store
    /// a slot. Nested records have schema-dependent size and return 0 here.
    pub fn inline_size(&self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float => 4,
            Self::Int64 | Self::UInt64 | Self::Double => 8,
            Self::String => 8,  // slot + max length
            Self::Pointer => 4, // slot
            Self::Record => 0,
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One field of a type schema.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Field name, from the FST1 table.
    pub name: String,
    /// Element kind.
    pub field_type: FieldType,
    /// Whether the field is an array of the element kind.
    pub is_array: bool,
    /// Referenced type for Record/Pointer elements (0 if none).
    pub elem_type: TypeIndex,
    /// Absolute byte offset within an instance of the owning type.
    pub byte_offset: u32,
    /// Raw default for patch-added fields. The materializer uses this
    /// instead of reading DATA bytes, which were written without the field.
    pub synthetic_default: Option<u64>,
}

/// Reconstructed description of one declared type.
#[derive(Debug, Clone)]
pub struct TypeSchema {
    /// Type name, from the TST1 table.
    pub name: String,
    /// Parent type (0 if none). Parent fields form a prefix of instances.
    pub parent: TypeIndex,
    /// Instance size in bytes, used as the array stride.
    pub byte_size: u32,
    /// Version hash from THSH, absent if the chunk had no entry.
    pub hash: Option<u32>,
    /// Alignment from TPAD, recorded but not structurally required.
    pub alignment: Option<u32>,
    /// Template parameters as (param name, argument type index).
    pub templates: Vec<(String, TypeIndex)>,
    /// Own declared fields, in declaration order. Inherited fields are not
    /// repeated here; see [`TypeRegistry::flattened_fields`].
    pub fields: Vec<FieldSpec>,
    /// Set when a patch could not be applied to this type.
    pub degraded: bool,
}

/// Registry of every type declared in a tagfile's TYPE subtree.
pub struct TypeRegistry {
    type_names: Vec<String>,
    field_names: Vec<String>,
    types: Vec<TypeSchema>,
    by_name: FxHashMap<String, TypeIndex>,
}

impl TypeRegistry {
    /// An empty registry, for buffers carrying no TYPE subtree.
    pub fn empty() -> Self {
        Self {
            type_names: Vec::new(),
            field_names: Vec::new(),
            types: Vec::new(),
            by_name: FxHashMap::default(),
        }
    }

    /// Build the registry from a decoded TYPE chunk.
    ///
    /// Consumes, in required order: TST1, FST1, TNA1, TBDY, THSH, TPAD.
    /// TPTR is retained opaque and not consumed here.
    pub fn from_type_chunk(data: &[u8], type_chunk: &Chunk) -> Result<Self, SchemaError> {
        let mut registry = Self::empty();

        if let Some(chunk) = type_chunk.find(ChunkKind::TypeStruct) {
            registry.type_names = read_string_table(&data[chunk.payload.clone()]);
        }
        if let Some(chunk) = type_chunk.find(ChunkKind::FunctionStruct) {
            registry.field_names = read_string_table(&data[chunk.payload.clone()]);
        }
        if let Some(chunk) = type_chunk.find(ChunkKind::TypeNameTable) {
            registry.read_type_names(&data[chunk.payload.clone()])?;
        }
        if let Some(chunk) = type_chunk.find(ChunkKind::TypeBody) {
            registry.read_type_bodies(&data[chunk.payload.clone()])?;
        }
        if let Some(chunk) = type_chunk.find(ChunkKind::TypeHash) {
            registry.read_type_hashes(&data[chunk.payload.clone()])?;
        }
        if let Some(chunk) = type_chunk.find(ChunkKind::TypePadding) {
            registry.read_type_padding(&data[chunk.payload.clone()])?;
        }

        registry.validate()?;
        for (name, index) in registry
            .types
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i as TypeIndex + 1))
        {
            registry.by_name.insert(name, index);
        }

        Ok(registry)
    }

    /// Number of declared types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if the registry declares no types.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The positional TST1 type-name table.
    pub fn type_name_table(&self) -> &[String] {
        &self.type_names
    }

    /// The positional FST1 field-name table.
    pub fn field_name_table(&self) -> &[String] {
        &self.field_names
    }

    /// Get a schema by 1-based type index.
    pub fn schema(&self, index: TypeIndex) -> Option<&TypeSchema> {
        if index == 0 {
            return None;
        }
        self.types.get(index as usize - 1)
    }

    pub(crate) fn schema_mut(&mut self, index: TypeIndex) -> Option<&mut TypeSchema> {
        if index == 0 {
            return None;
        }
        self.types.get_mut(index as usize - 1)
    }

    /// Resolve a type name to its index.
    pub fn index_of(&self, name: &str) -> Option<TypeIndex> {
        self.by_name.get(name).copied()
    }

    /// Get a type's name by index.
    pub fn type_name(&self, index: TypeIndex) -> Option<&str> {
        self.schema(index).map(|t| t.name.as_str())
    }

    /// Iterate all (index, schema) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (TypeIndex, &TypeSchema)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, t)| (i as TypeIndex + 1, t))
    }

    /// The flattened field list of a type: the parent chain's fields first,
    /// then the type's own, in declaration order.
    pub fn flattened_fields(&self, index: TypeIndex) -> Vec<&FieldSpec> {
        let mut chain = Vec::new();
        let mut cursor = index;
        while let Some(schema) = self.schema(cursor) {
            chain.push(schema);
            cursor = schema.parent;
            // validate() rejects cycles; the bound guards hand-built registries.
            if chain.len() > self.types.len() {
                break;
            }
        }

        let mut fields = Vec::new();
        for schema in chain.iter().rev() {
            fields.extend(schema.fields.iter());
        }
        fields
    }

    /// Resolve a type's template arguments to (param name, type name) pairs.
    pub fn template_args(&self, index: TypeIndex) -> Vec<(&str, &str)> {
        let Some(schema) = self.schema(index) else {
            return Vec::new();
        };
        schema
            .templates
            .iter()
            .map(|(param, arg)| {
                (param.as_str(), self.type_name(*arg).unwrap_or(""))
            })
            .collect()
    }

    fn type_name_at(&self, index: u32) -> Result<String, SchemaError> {
        self.type_names
            .get(index as usize)
            .cloned()
            .ok_or(SchemaError::DanglingNameRef {
                index,
                count: self.type_names.len(),
            })
    }

    fn field_name_at(&self, index: u32) -> Result<String, SchemaError> {
        self.field_names
            .get(index as usize)
            .cloned()
            .ok_or(SchemaError::DanglingNameRef {
                index,
                count: self.field_names.len(),
            })
    }

    fn check_type_index(&self, index: TypeIndex) -> Result<(), SchemaError> {
        if index != 0 && index as usize > self.types.len() {
            return Err(SchemaError::DanglingTypeRef {
                index,
                count: self.types.len(),
            });
        }
        Ok(())
    }

    /// TNA1: `u32 count`, then per type a name index and template args.
    fn read_type_names(&mut self, payload: &[u8]) -> Result<(), SchemaError> {
        let mut reader = BinaryReader::new(payload);
        let count = reader.read_u32()? as usize;

        for _ in 0..count {
            let name_index = reader.read_u32()?;
            let name = self.type_name_at(name_index)?;

            let template_count = reader.read_u32()? as usize;
            let mut templates = Vec::with_capacity(template_count);
            for _ in 0..template_count {
                let param_index = reader.read_u32()?;
                let arg_type = reader.read_u32()?;
                templates.push((self.type_name_at(param_index)?, arg_type));
            }

            self.types.push(TypeSchema {
                name,
                parent: 0,
                byte_size: 0,
                hash: None,
                alignment: None,
                templates,
                fields: Vec::new(),
                degraded: false,
            });
        }

        Ok(())
    }

    /// TBDY: repeated type bodies until the payload is exhausted.
    fn read_type_bodies(&mut self, payload: &[u8]) -> Result<(), SchemaError> {
        let mut reader = BinaryReader::new(payload);

        while !reader.is_empty() {
            let type_index = reader.read_u32()?;
            self.check_type_index(type_index)?;
            if type_index == 0 {
                return Err(SchemaError::DanglingTypeRef {
                    index: 0,
                    count: self.types.len(),
                });
            }

            let parent = reader.read_u32()?;
            self.check_type_index(parent)?;
            let byte_size = reader.read_u32()?;
            let field_count = reader.read_u32()? as usize;

            let mut fields = Vec::with_capacity(field_count);
            for _ in 0..field_count {
                let name_index = reader.read_u32()?;
                let name = self.field_name_at(name_index)?;
                let raw_type = reader.read_u16()?;
                let field_type = FieldType::from_u16(raw_type)
                    .ok_or(SchemaError::InvalidFieldType(raw_type))?;
                let flags = reader.read_u16()?;
                let elem_type = reader.read_u32()?;
                self.check_type_index(elem_type)?;
                let byte_offset = reader.read_u32()?;

                fields.push(FieldSpec {
                    name,
                    field_type,
                    is_array: flags & 0x0001 != 0,
                    elem_type,
                    byte_offset,
                    synthetic_default: None,
                });
            }

            let schema = self.schema_mut(type_index).expect("index checked above");
            schema.parent = parent;
            schema.byte_size = byte_size;
            schema.fields = fields;
        }

        Ok(())
    }

    /// THSH: repeated fixed-size hash entries.
    fn read_type_hashes(&mut self, payload: &[u8]) -> Result<(), SchemaError> {
        let mut reader = BinaryReader::new(payload);
        while !reader.is_empty() {
            let entry: HashEntry = reader.read_struct()?;
            let type_index = entry.type_index;
            self.check_type_index(type_index)?;
            if let Some(schema) = self.schema_mut(type_index) {
                schema.hash = Some(entry.hash);
            }
        }
        Ok(())
    }

    /// TPAD: repeated fixed-size alignment entries.
    fn read_type_padding(&mut self, payload: &[u8]) -> Result<(), SchemaError> {
        let mut reader = BinaryReader::new(payload);
        while !reader.is_empty() {
            let entry: PaddingEntry = reader.read_struct()?;
            let type_index = entry.type_index;
            self.check_type_index(type_index)?;
            if let Some(schema) = self.schema_mut(type_index) {
                schema.alignment = Some(entry.alignment);
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), SchemaError> {
        for (_, schema) in self.iter() {
            // Template arguments must name declared types.
            for (_, arg) in &schema.templates {
                self.check_type_index(*arg)?;
            }

            // Parent chains must terminate without revisiting a type.
            let mut seen = 0usize;
            let mut cursor = schema.parent;
            while cursor != 0 {
                seen += 1;
                if seen > self.types.len() {
                    return Err(SchemaError::ParentCycle(schema.name.clone()));
                }
                cursor = self
                    .schema(cursor)
                    .ok_or(SchemaError::DanglingTypeRef {
                        index: cursor,
                        count: self.types.len(),
                    })?
                    .parent;
            }

            // Offsets are monotonic within the type's own region.
            let mut last_offset = None;
            for field in &schema.fields {
                if let Some(prev) = last_offset {
                    if field.byte_offset < prev {
                        return Err(SchemaError::NonMonotonicOffsets(schema.name.clone()));
                    }
                }
                last_offset = Some(field.byte_offset);
            }
        }
        Ok(())
    }
}

/// Read a NUL-separated string table: only NUL-terminated entries count.
fn read_string_table(payload: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    let mut current = Vec::new();
    for &byte in payload {
        if byte == 0 {
            names.push(String::from_utf8_lossy(&current).into_owned());
            current.clear();
        } else {
            current.push(byte);
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_table() {
        assert_eq!(read_string_table(b"Foo\0Bar\0"), vec!["Foo", "Bar"]);
        // A trailing unterminated run is not an entry.
        assert_eq!(read_string_table(b"Foo\0Bar"), vec!["Foo"]);
        assert!(read_string_table(b"").is_empty());
    }

    #[test]
    fn test_field_type_round_trip() {
        for raw in [
            0x0001u16, 0x0002, 0x0003, 0x0004, 0x0005, 0x0006, 0x0007, 0x0008,
            0x0009, 0x000A, 0x000B, 0x000C, 0x0010, 0x0011,
        ] {
            let ft = FieldType::from_u16(raw).unwrap();
            assert_eq!(ft as u16, raw);
        }
        assert!(FieldType::from_u16(0x0F00).is_none());
    }

    #[test]
    fn test_inline_sizes() {
        assert_eq!(FieldType::Bool.inline_size(), 1);
        assert_eq!(FieldType::UInt32.inline_size(), 4);
        assert_eq!(FieldType::Double.inline_size(), 8);
        assert_eq!(FieldType::String.inline_size(), 8);
        assert_eq!(FieldType::Pointer.inline_size(), 4);
    }
}
