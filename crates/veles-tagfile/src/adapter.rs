//! Typed adapter contract.
//!
//! Each generated per-class adapter projects a generic [`Instance`] into a
//! strongly-typed structure and back. The type-name check runs before any
//! field is touched, so a mismatched projection performs no partial writes.
//! Inherited fields are delegated to the parent type's adapter first: a
//! record's flattened field set puts the parent's fields at the front, and
//! the parent adapter reads exactly its own declared names from the same
//! record.

use crate::instance::{Instance, PointerValue, RecordValue};
use crate::tagfile::TagFile;
use crate::AdapterError;

/// Contract implemented by every generated per-class adapter.
pub trait TagClass: Default {
    /// The schema type name this adapter projects.
    const TYPE_NAME: &'static str;

    /// Static template parameter metadata: (param name, argument type name).
    fn template_args() -> &'static [(&'static str, &'static str)] {
        &[]
    }

    /// Read this adapter's own declared fields from a record whose type
    /// has already been verified. Implementations delegate to the parent
    /// adapter first.
    fn read_fields(&mut self, file: &TagFile, record: &RecordValue) -> Result<(), AdapterError>;

    /// Write this adapter's own declared fields back into the record's
    /// field map. Implementations delegate to the parent adapter first.
    fn write_fields(&self, record: &mut RecordValue) -> Result<(), AdapterError>;

    /// Project a generic instance into this concrete type.
    fn from_instance(file: &TagFile, instance: &Instance) -> Result<Self, AdapterError> {
        let record = expect_record(file, instance, Self::TYPE_NAME)?;
        let mut value = Self::default();
        value.read_fields(file, record)?;
        Ok(value)
    }

    /// Write this concrete value back into a generic instance.
    fn to_instance(&self, file: &TagFile, instance: &mut Instance) -> Result<(), AdapterError> {
        match instance {
            Instance::Record(record) => {
                let actual = file
                    .registry()
                    .type_name(record.type_index)
                    .unwrap_or("")
                    .to_string();
                if actual != Self::TYPE_NAME {
                    return Err(AdapterError::TypeNameMismatch {
                        expected: Self::TYPE_NAME,
                        actual,
                    });
                }
                self.write_fields(record)
            }
            _ => Err(AdapterError::NotARecord),
        }
    }
}

/// Verify an instance is a record of the expected type name.
pub fn expect_record<'a>(
    file: &TagFile,
    instance: &'a Instance,
    expected: &'static str,
) -> Result<&'a RecordValue, AdapterError> {
    let record = instance.as_record().ok_or(AdapterError::NotARecord)?;
    let actual = file.registry().type_name(record.type_index).unwrap_or("");
    if actual != expected {
        return Err(AdapterError::TypeNameMismatch {
            expected,
            actual: actual.to_string(),
        });
    }
    Ok(record)
}

/// Read a u16 field into its native representation.
pub fn field_u16(record: &RecordValue, name: &str) -> Result<u16, AdapterError> {
    record
        .field(name)?
        .as_u32()
        .and_then(|v| u16::try_from(v).ok())
        .ok_or_else(|| AdapterError::FieldType {
            field: name.to_string(),
            expected: "u16",
        })
}

/// Read a u32 field into its native representation.
pub fn field_u32(record: &RecordValue, name: &str) -> Result<u32, AdapterError> {
    record
        .field(name)?
        .as_u32()
        .ok_or_else(|| AdapterError::FieldType {
            field: name.to_string(),
            expected: "u32",
        })
}

/// Read an i32 field into its native representation.
pub fn field_i32(record: &RecordValue, name: &str) -> Result<i32, AdapterError> {
    record
        .field(name)?
        .as_i32()
        .ok_or_else(|| AdapterError::FieldType {
            field: name.to_string(),
            expected: "i32",
        })
}

/// Read an f32 field into its native representation.
pub fn field_f32(record: &RecordValue, name: &str) -> Result<f32, AdapterError> {
    record
        .field(name)?
        .as_f32()
        .ok_or_else(|| AdapterError::FieldType {
            field: name.to_string(),
            expected: "f32",
        })
}

/// Read a resolved string field as an owned value.
pub fn field_string(record: &RecordValue, name: &str) -> Result<String, AdapterError> {
    record
        .field(name)?
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| AdapterError::FieldType {
            field: name.to_string(),
            expected: "string",
        })
}

/// Read a pointer field's value.
pub fn field_pointer(record: &RecordValue, name: &str) -> Result<PointerValue, AdapterError> {
    record
        .field(name)?
        .as_pointer()
        .cloned()
        .ok_or_else(|| AdapterError::FieldType {
            field: name.to_string(),
            expected: "pointer",
        })
}
