//! Generic class instances materialized from DATA bytes.
//!
//! An [`Instance`] is a schema-typed, field-addressable value built by
//! walking DATA bytes against a [`TypeSchema`](crate::TypeSchema). Records
//! carry their flattened field set (inherited fields first), arrays carry
//! decoded elements, and pointers carry slot numbers bound to item entries
//! by the resolver.

use veles_common::BinaryReader;

use crate::error::{AccessError, DecodeError};
use crate::schema::{FieldType, TypeIndex, TypeRegistry};
use crate::tagfile::TagFile;

/// A primitive field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Str(String),
}

impl std::fmt::Display for Primitive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Primitive::Bool(v) => write!(f, "{}", v),
            Primitive::Int8(v) => write!(f, "{}", v),
            Primitive::Int16(v) => write!(f, "{}", v),
            Primitive::Int32(v) => write!(f, "{}", v),
            Primitive::Int64(v) => write!(f, "{}", v),
            Primitive::UInt8(v) => write!(f, "{}", v),
            Primitive::UInt16(v) => write!(f, "{}", v),
            Primitive::UInt32(v) => write!(f, "{}", v),
            Primitive::UInt64(v) => write!(f, "{}", v),
            Primitive::Float(v) => write!(f, "{}", v),
            Primitive::Double(v) => write!(f, "{}", v),
            Primitive::Str(v) => write!(f, "{}", v),
        }
    }
}

/// Handle to an item slot's materialized value.
///
/// References are indices into session-owned tables, so two pointers bound
/// to the same slot dereference to the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemRef {
    /// Slot number in the item table.
    pub slot: u32,
}

/// What a slot-numbered reference expects to find at its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefShape {
    /// A single object (or an array of records, bound whole).
    Object,
    /// String bytes, decoded with the NUL-or-max-length scan rule.
    String,
    /// An array of the given element kind.
    Array(FieldType),
}

/// A pointer-like field value: a slot number, lazily bound.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerValue {
    /// Slot number read from DATA. Slot 0 is the null pointer.
    pub slot: u32,
    /// Element count (strings: maximum length bound).
    pub count: u32,
    /// Expected shape of the target.
    pub shape: RefShape,
    /// Set by the resolver; `None` means null or unresolved.
    pub target: Option<ItemRef>,
}

/// A record instance: its schema's flattened field set, by name.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordValue {
    /// Schema type of this record.
    pub type_index: TypeIndex,
    /// (field name, value) pairs: inherited fields first, then own,
    /// in declaration order.
    pub fields: Vec<(String, Instance)>,
}

impl RecordValue {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Result<&Instance, AccessError> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| AccessError::UnknownField(name.to_string()))
    }

    /// Look up a field by name, mutably.
    pub fn field_mut(&mut self, name: &str) -> Result<&mut Instance, AccessError> {
        self.fields
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| AccessError::UnknownField(name.to_string()))
    }

    /// Iterate (name, value) pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Instance)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }
}

/// An array of decoded elements.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    /// Element kind.
    pub element: FieldType,
    /// Decoded elements, in order.
    pub elements: Vec<Instance>,
}

/// A generic, schema-typed value decoded from DATA.
#[derive(Debug, Clone, PartialEq)]
pub enum Instance {
    /// A primitive value.
    Primitive(Primitive),
    /// A record with named fields.
    Record(RecordValue),
    /// An array of values.
    Array(ArrayValue),
    /// A slot-numbered reference, lazily bound.
    Pointer(PointerValue),
}

impl Instance {
    /// Try to view this value as a record.
    pub fn as_record(&self) -> Option<&RecordValue> {
        match self {
            Instance::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Try to view this value as an array.
    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Instance::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Try to view this value as a pointer.
    pub fn as_pointer(&self) -> Option<&PointerValue> {
        match self {
            Instance::Pointer(p) => Some(p),
            _ => None,
        }
    }

    /// Try to get this value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Instance::Primitive(Primitive::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as an i64, widening smaller signed types.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Instance::Primitive(Primitive::Int8(v)) => Some(*v as i64),
            Instance::Primitive(Primitive::Int16(v)) => Some(*v as i64),
            Instance::Primitive(Primitive::Int32(v)) => Some(*v as i64),
            Instance::Primitive(Primitive::Int64(v)) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as an i32.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Instance::Primitive(Primitive::Int8(v)) => Some(*v as i32),
            Instance::Primitive(Primitive::Int16(v)) => Some(*v as i32),
            Instance::Primitive(Primitive::Int32(v)) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as a u64, widening smaller unsigned types.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Instance::Primitive(Primitive::UInt8(v)) => Some(*v as u64),
            Instance::Primitive(Primitive::UInt16(v)) => Some(*v as u64),
            Instance::Primitive(Primitive::UInt32(v)) => Some(*v as u64),
            Instance::Primitive(Primitive::UInt64(v)) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as a u32.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Instance::Primitive(Primitive::UInt8(v)) => Some(*v as u32),
            Instance::Primitive(Primitive::UInt16(v)) => Some(*v as u32),
            Instance::Primitive(Primitive::UInt32(v)) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as an f32.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Instance::Primitive(Primitive::Float(v)) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Instance::Primitive(Primitive::Float(v)) => Some(*v as f64),
            Instance::Primitive(Primitive::Double(v)) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Instance::Primitive(Primitive::Str(v)) => Some(v),
            _ => None,
        }
    }
}

/// Materialize one record of `type_index` from DATA bytes at `base`.
///
/// Walks the flattened field list (inherited fields occupy the base of the
/// byte range) reading each field at its absolute byte offset. Pointer,
/// string, and array fields are left as unresolved [`PointerValue`]s for
/// the resolver pass; patch-added fields take their stored default without
/// touching DATA.
pub(crate) fn materialize_record(
    data: &[u8],
    base: usize,
    type_index: TypeIndex,
    registry: &TypeRegistry,
) -> Result<Instance, DecodeError> {
    let mut fields = Vec::new();

    for spec in registry.flattened_fields(type_index) {
        let value = if let Some(raw) = spec.synthetic_default {
            Instance::Primitive(primitive_from_raw(spec.field_type, raw))
        } else {
            let mut reader = BinaryReader::new_at(data, base + spec.byte_offset as usize);
            read_field(data, base, spec, &mut reader, registry)?
        };
        fields.push((spec.name.clone(), value));
    }

    Ok(Instance::Record(RecordValue { type_index, fields }))
}

fn read_field(
    data: &[u8],
    base: usize,
    spec: &crate::schema::FieldSpec,
    reader: &mut BinaryReader<'_>,
    registry: &TypeRegistry,
) -> Result<Instance, DecodeError> {
    if spec.is_array {
        let slot = reader.read_u32()?;
        let count = reader.read_u32()?;
        return Ok(Instance::Pointer(PointerValue {
            slot,
            count,
            shape: RefShape::Array(spec.field_type),
            target: None,
        }));
    }

    Ok(match spec.field_type {
        FieldType::Bool => Instance::Primitive(Primitive::Bool(reader.read_bool()?)),
        FieldType::Int8 => Instance::Primitive(Primitive::Int8(reader.read_i8()?)),
        FieldType::Int16 => Instance::Primitive(Primitive::Int16(reader.read_i16()?)),
        FieldType::Int32 => Instance::Primitive(Primitive::Int32(reader.read_i32()?)),
        FieldType::Int64 => Instance::Primitive(Primitive::Int64(reader.read_i64()?)),
        FieldType::UInt8 => Instance::Primitive(Primitive::UInt8(reader.read_u8()?)),
        FieldType::UInt16 => Instance::Primitive(Primitive::UInt16(reader.read_u16()?)),
        FieldType::UInt32 => Instance::Primitive(Primitive::UInt32(reader.read_u32()?)),
        FieldType::UInt64 => Instance::Primitive(Primitive::UInt64(reader.read_u64()?)),
        FieldType::Float => Instance::Primitive(Primitive::Float(reader.read_f32()?)),
        FieldType::Double => Instance::Primitive(Primitive::Double(reader.read_f64()?)),
        FieldType::String => {
            let slot = reader.read_u32()?;
            let count = reader.read_u32()?;
            Instance::Pointer(PointerValue {
                slot,
                count,
                shape: RefShape::String,
                target: None,
            })
        }
        FieldType::Pointer => {
            let slot = reader.read_u32()?;
            Instance::Pointer(PointerValue {
                slot,
                count: 1,
                shape: RefShape::Object,
                target: None,
            })
        }
        FieldType::Record => {
            // Nested record, laid out inline at the field's offset.
            materialize_record(
                data,
                base + spec.byte_offset as usize,
                spec.elem_type,
                registry,
            )?
        }
    })
}

/// Decode one primitive element of `element` kind at the reader's position.
pub(crate) fn read_primitive_element(
    element: FieldType,
    reader: &mut BinaryReader<'_>,
) -> Result<Primitive, DecodeError> {
    Ok(match element {
        FieldType::Bool => Primitive::Bool(reader.read_bool()?),
        FieldType::Int8 => Primitive::Int8(reader.read_i8()?),
        FieldType::Int16 => Primitive::Int16(reader.read_i16()?),
        FieldType::Int32 => Primitive::Int32(reader.read_i32()?),
        FieldType::Int64 => Primitive::Int64(reader.read_i64()?),
        FieldType::UInt8 => Primitive::UInt8(reader.read_u8()?),
        FieldType::UInt16 => Primitive::UInt16(reader.read_u16()?),
        FieldType::UInt32 => Primitive::UInt32(reader.read_u32()?),
        FieldType::UInt64 => Primitive::UInt64(reader.read_u64()?),
        FieldType::Float => Primitive::Float(reader.read_f32()?),
        FieldType::Double => Primitive::Double(reader.read_f64()?),
        // Non-primitive kinds never reach this path; the resolver binds them.
        FieldType::String | FieldType::Record | FieldType::Pointer => {
            Primitive::UInt64(reader.read_u64()?)
        }
    })
}

fn primitive_from_raw(field_type: FieldType, raw: u64) -> Primitive {
    match field_type {
        FieldType::Bool => Primitive::Bool(raw != 0),
        FieldType::Int8 => Primitive::Int8(raw as i8),
        FieldType::Int16 => Primitive::Int16(raw as i16),
        FieldType::Int32 => Primitive::Int32(raw as i32),
        FieldType::Int64 => Primitive::Int64(raw as i64),
        FieldType::UInt8 => Primitive::UInt8(raw as u8),
        FieldType::UInt16 => Primitive::UInt16(raw as u16),
        FieldType::UInt32 => Primitive::UInt32(raw as u32),
        FieldType::UInt64 => Primitive::UInt64(raw),
        FieldType::Float => Primitive::Float(f32::from_bits(raw as u32)),
        FieldType::Double => Primitive::Double(f64::from_bits(raw)),
        FieldType::String => Primitive::Str(String::new()),
        FieldType::Record | FieldType::Pointer => Primitive::UInt64(raw),
    }
}

/// A session-bound view over an instance with typed convenience accessors.
#[derive(Clone, Copy)]
pub struct InstanceView<'a> {
    file: &'a TagFile,
    instance: &'a Instance,
}

impl<'a> InstanceView<'a> {
    pub(crate) fn new(file: &'a TagFile, instance: &'a Instance) -> Self {
        Self { file, instance }
    }

    /// The underlying instance.
    pub fn instance(&self) -> &'a Instance {
        self.instance
    }

    /// The schema type name, for record instances.
    pub fn type_name(&self) -> Option<&'a str> {
        let record = self.instance.as_record()?;
        self.file.registry().type_name(record.type_index)
    }

    /// Get a field value by name.
    pub fn get(&self, name: &str) -> Option<&'a Instance> {
        self.instance.as_record()?.field(name).ok()
    }

    /// Get a string field value.
    pub fn get_str(&self, name: &str) -> Option<&'a str> {
        self.get(name)?.as_str()
    }

    /// Get a boolean field value.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name)?.as_bool()
    }

    /// Get an integer field value.
    pub fn get_i32(&self, name: &str) -> Option<i32> {
        self.get(name)?.as_i32()
    }

    /// Get an integer field value.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name)?.as_i64()
    }

    /// Get an unsigned integer field value.
    pub fn get_u32(&self, name: &str) -> Option<u32> {
        self.get(name)?.as_u32()
    }

    /// Get a float field value.
    pub fn get_f32(&self, name: &str) -> Option<f32> {
        self.get(name)?.as_f32()
    }

    /// Get a double field value.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name)?.as_f64()
    }

    /// Get a nested view by field name, following pointers through the
    /// item table and into inline records.
    pub fn get_view(&self, name: &str) -> Option<InstanceView<'a>> {
        match self.get(name)? {
            record @ Instance::Record(_) => Some(InstanceView::new(self.file, record)),
            Instance::Pointer(ptr) => {
                let target = self.file.deref(ptr)?;
                Some(InstanceView::new(self.file, target))
            }
            _ => None,
        }
    }

    /// Get the elements of an array field, whether decoded inline or bound
    /// to an item slot.
    pub fn elements(&self, name: &str) -> Option<&'a [Instance]> {
        match self.get(name)? {
            Instance::Array(array) => Some(&array.elements),
            Instance::Pointer(ptr) => self.file.deref_all(ptr),
            _ => None,
        }
    }
}
