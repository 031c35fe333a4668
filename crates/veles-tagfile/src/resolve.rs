//! Index/item reference resolution.
//!
//! Runs once, after every item has been materialized. Pointer fields are
//! bound to the one value already materialized for their slot (reuse, never
//! re-decode, so shared references stay reference-equal through the item
//! table); string and primitive-array references are decoded in place from
//! the target item's byte range. A slot with no matching entry leaves the
//! field unbound and is collected into the session report.

use veles_common::BinaryReader;

use crate::instance::{
    read_primitive_element, ArrayValue, Instance, ItemRef, PointerValue, Primitive, RefShape,
};
use crate::item::ItemTable;
use crate::schema::FieldType;
use crate::tagfile::SessionReport;
use crate::ResolveError;

pub(crate) struct ResolveContext<'a> {
    pub data: &'a [u8],
    pub data_base: usize,
    pub items: &'a ItemTable,
}

/// Resolve every pointer field across all materialized item values.
pub(crate) fn resolve_references(
    cx: &ResolveContext<'_>,
    values: &mut [Vec<Instance>],
    report: &mut SessionReport,
) {
    for slot in 0..values.len() {
        let mut instances = std::mem::take(&mut values[slot]);
        for (index, instance) in instances.iter_mut().enumerate() {
            let mut path = format!("slot{}[{}]", slot, index);
            walk(instance, &mut path, cx, report);
        }
        values[slot] = instances;
    }
}

fn walk(
    instance: &mut Instance,
    path: &mut String,
    cx: &ResolveContext<'_>,
    report: &mut SessionReport,
) {
    match instance {
        Instance::Primitive(_) => {}
        Instance::Record(record) => {
            for (name, value) in record.fields.iter_mut() {
                let saved = path.len();
                path.push('.');
                path.push_str(name);
                walk(value, path, cx, report);
                path.truncate(saved);
            }
        }
        Instance::Array(array) => {
            for (index, element) in array.elements.iter_mut().enumerate() {
                let saved = path.len();
                path.push_str(&format!("[{}]", index));
                walk(element, path, cx, report);
                path.truncate(saved);
            }
        }
        Instance::Pointer(_) => {
            if let Some(replacement) = bind_pointer(instance, path, cx, report) {
                *instance = replacement;
                // The replacement may itself carry unresolved pointers.
                walk(instance, path, cx, report);
            }
        }
    }
}

/// Bind one pointer. Returns a replacement instance when the reference
/// decodes in place (strings, primitive arrays); `None` when the pointer
/// stays a pointer (bound or left null).
fn bind_pointer(
    instance: &mut Instance,
    path: &str,
    cx: &ResolveContext<'_>,
    report: &mut SessionReport,
) -> Option<Instance> {
    let Instance::Pointer(ptr) = instance else {
        return None;
    };

    // Slot 0 is the null pointer, not an error.
    if ptr.slot == 0 {
        return None;
    }

    let Some(entry) = cx.items.get(ptr.slot) else {
        report.resolve_errors.push(ResolveError::UnresolvedSlot {
            slot: ptr.slot,
            path: path.to_string(),
        });
        return None;
    };

    let base = cx.data_base + entry.data_offset as usize;

    match ptr.shape {
        RefShape::Object => {
            ptr.target = Some(ItemRef { slot: ptr.slot });
            None
        }
        RefShape::String => {
            // Scan rule: until NUL or the bound, whichever comes first. The
            // field's count bounds the scan; the item cannot supply more
            // bytes than it holds.
            let max = (ptr.count.min(entry.count)) as usize;
            let mut reader = BinaryReader::new_at(cx.data, base);
            match reader.read_str_bounded(max) {
                Ok(text) => Some(Instance::Primitive(Primitive::Str(text.to_string()))),
                Err(_) => {
                    report.resolve_errors.push(ResolveError::UnresolvedSlot {
                        slot: ptr.slot,
                        path: path.to_string(),
                    });
                    None
                }
            }
        }
        RefShape::Array(element) => match element {
            // Record arrays bind to the item's already-materialized values.
            FieldType::Record => {
                ptr.target = Some(ItemRef { slot: ptr.slot });
                None
            }
            FieldType::Pointer => {
                let mut reader = BinaryReader::new_at(cx.data, base);
                let mut elements = Vec::with_capacity(entry.count as usize);
                for _ in 0..entry.count {
                    match reader.read_u32() {
                        Ok(slot) => elements.push(Instance::Pointer(PointerValue {
                            slot,
                            count: 1,
                            shape: RefShape::Object,
                            target: None,
                        })),
                        Err(_) => {
                            report.resolve_errors.push(ResolveError::UnresolvedSlot {
                                slot: ptr.slot,
                                path: path.to_string(),
                            });
                            return None;
                        }
                    }
                }
                Some(Instance::Array(ArrayValue { element, elements }))
            }
            _ => {
                let mut reader = BinaryReader::new_at(cx.data, base);
                let mut elements = Vec::with_capacity(entry.count as usize);
                for _ in 0..entry.count {
                    match read_primitive_element(element, &mut reader) {
                        Ok(value) => elements.push(Instance::Primitive(value)),
                        Err(_) => {
                            report.resolve_errors.push(ResolveError::UnresolvedSlot {
                                slot: ptr.slot,
                                path: path.to_string(),
                            });
                            return None;
                        }
                    }
                }
                Some(Instance::Array(ArrayValue { element, elements }))
            }
        },
    }
}
