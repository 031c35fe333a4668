//! `hkRootLevelContainer` and its named variants.

use crate::adapter::{expect_record, field_pointer, field_string, TagClass};
use crate::instance::{Instance, Primitive, PointerValue, RecordValue};
use crate::tagfile::TagFile;
use crate::AdapterError;

/// One named variant inside a root level container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HkRootLevelContainerNamedVariant {
    pub name: String,
    pub class_name: String,
    /// Pointer to the variant object; adapt it with the class named by
    /// `class_name`.
    pub variant: Option<PointerValue>,
}

impl TagClass for HkRootLevelContainerNamedVariant {
    const TYPE_NAME: &'static str = "hkRootLevelContainer::NamedVariant";

    fn read_fields(&mut self, _file: &TagFile, record: &RecordValue) -> Result<(), AdapterError> {
        self.name = field_string(record, "name")?;
        self.class_name = field_string(record, "className")?;
        self.variant = Some(field_pointer(record, "variant")?);
        Ok(())
    }

    fn write_fields(&self, record: &mut RecordValue) -> Result<(), AdapterError> {
        *record.field_mut("name")? = Instance::Primitive(Primitive::Str(self.name.clone()));
        *record.field_mut("className")? =
            Instance::Primitive(Primitive::Str(self.class_name.clone()));
        if let Some(variant) = &self.variant {
            *record.field_mut("variant")? = Instance::Pointer(variant.clone());
        }
        Ok(())
    }
}

/// `hkRootLevelContainer`: the top-level object of most Havok assets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HkRootLevelContainer {
    pub named_variants: Vec<HkRootLevelContainerNamedVariant>,
}

impl TagClass for HkRootLevelContainer {
    const TYPE_NAME: &'static str = "hkRootLevelContainer";

    fn read_fields(&mut self, file: &TagFile, record: &RecordValue) -> Result<(), AdapterError> {
        let pointer = field_pointer(record, "namedVariants")?;
        self.named_variants.clear();

        let Some(elements) = file.deref_all(&pointer) else {
            // Null or unresolved variant array: an empty container.
            return Ok(());
        };
        for element in elements {
            let variant_record =
                expect_record(file, element, HkRootLevelContainerNamedVariant::TYPE_NAME)?;
            let mut variant = HkRootLevelContainerNamedVariant::default();
            variant.read_fields(file, variant_record)?;
            self.named_variants.push(variant);
        }
        Ok(())
    }

    fn write_fields(&self, _record: &mut RecordValue) -> Result<(), AdapterError> {
        // The variant array lives in item storage, which a record-level
        // write cannot reach.
        Ok(())
    }
}
