//! Base object classes at the root of the Havok inheritance chain.

use crate::adapter::{field_u16, TagClass};
use crate::instance::{Primitive, Instance, RecordValue};
use crate::tagfile::TagFile;
use crate::AdapterError;

/// `hkBaseObject`: the vtable placeholder at the root of the hierarchy.
/// Declares no fields of its own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HkBaseObject;

impl TagClass for HkBaseObject {
    const TYPE_NAME: &'static str = "hkBaseObject";

    fn read_fields(&mut self, _file: &TagFile, _record: &RecordValue) -> Result<(), AdapterError> {
        Ok(())
    }

    fn write_fields(&self, _record: &mut RecordValue) -> Result<(), AdapterError> {
        Ok(())
    }
}

/// `hkReferencedObject`: reference-counted base of most Havok classes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HkReferencedObject {
    pub parent: HkBaseObject,
    pub mem_size_and_flags: u16,
    pub ref_count: u16,
}

impl TagClass for HkReferencedObject {
    const TYPE_NAME: &'static str = "hkReferencedObject";

    fn read_fields(&mut self, file: &TagFile, record: &RecordValue) -> Result<(), AdapterError> {
        self.parent.read_fields(file, record)?;
        self.mem_size_and_flags = field_u16(record, "memSizeAndFlags")?;
        self.ref_count = field_u16(record, "refCount")?;
        Ok(())
    }

    fn write_fields(&self, record: &mut RecordValue) -> Result<(), AdapterError> {
        self.parent.write_fields(record)?;
        *record.field_mut("memSizeAndFlags")? =
            Instance::Primitive(Primitive::UInt16(self.mem_size_and_flags));
        *record.field_mut("refCount")? = Instance::Primitive(Primitive::UInt16(self.ref_count));
        Ok(())
    }
}
