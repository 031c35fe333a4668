//! Patch engine: reconciles version-hash mismatches in the type registry.
//!
//! PTCH chunks carry per-type edit records keyed by an (old hash, new hash)
//! pair. Patches run once, after the registry is built and before any
//! instance is materialized. A type whose hash already equals the new hash
//! is a no-op, which makes reapplication idempotent; a type matching
//! neither hash is reported and marked degraded, and the session continues.

use veles_common::BinaryReader;

use crate::schema::{FieldSpec, FieldType, TypeRegistry};
use crate::tagfile::SessionReport;
use crate::{PatchError, SchemaError};

/// One field edit within a patch record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEdit {
    /// Rename a field in place.
    Rename { from: String, to: String },
    /// Change a field's element kind (and so its read width) at the same
    /// offset.
    Resize { field: String, field_type: FieldType },
    /// Append a field the old layout never wrote; instances take the
    /// default instead of reading DATA bytes.
    Add {
        field: String,
        field_type: FieldType,
        is_array: bool,
        default: u64,
    },
    /// Drop a field; offsets are absolute, successors keep theirs.
    Remove { field: String },
}

/// One patch record targeting a single type.
#[derive(Debug, Clone)]
pub struct PatchRecord {
    /// Target type name, from the TST1 table.
    pub type_name: String,
    /// Hash the target must currently carry for the edits to apply.
    pub old_hash: u32,
    /// Hash the target carries after application.
    pub new_hash: u32,
    /// Edits, applied in order.
    pub edits: Vec<FieldEdit>,
}

/// Parse the records of one PTCH chunk payload.
///
/// Layout per record: `u32 target_name_index, u32 old_hash, u32 new_hash,
/// u32 edit_count`, then per edit a `u8` opcode and its operands. Records
/// repeat until the payload is exhausted.
pub fn parse_patch_chunk(
    payload: &[u8],
    registry: &TypeRegistry,
) -> Result<Vec<PatchRecord>, SchemaError> {
    let mut reader = BinaryReader::new(payload);
    let mut records = Vec::new();

    while !reader.is_empty() {
        let name_index = reader.read_u32()?;
        let type_name = registry
            .type_name_table()
            .get(name_index as usize)
            .cloned()
            .ok_or(SchemaError::DanglingNameRef {
                index: name_index,
                count: registry.type_name_table().len(),
            })?;

        let old_hash = reader.read_u32()?;
        let new_hash = reader.read_u32()?;
        let edit_count = reader.read_u32()? as usize;

        let mut edits = Vec::with_capacity(edit_count);
        for _ in 0..edit_count {
            let opcode = reader.read_u8()?;
            let edit = match opcode {
                1 => {
                    let from = read_field_name(&mut reader, registry)?;
                    let to = read_field_name(&mut reader, registry)?;
                    FieldEdit::Rename { from, to }
                }
                2 => {
                    let field = read_field_name(&mut reader, registry)?;
                    let raw = reader.read_u16()?;
                    let field_type = FieldType::from_u16(raw)
                        .ok_or(SchemaError::InvalidFieldType(raw))?;
                    FieldEdit::Resize { field, field_type }
                }
                3 => {
                    let field = read_field_name(&mut reader, registry)?;
                    let raw = reader.read_u16()?;
                    let field_type = FieldType::from_u16(raw)
                        .ok_or(SchemaError::InvalidFieldType(raw))?;
                    let flags = reader.read_u16()?;
                    let default = reader.read_u64()?;
                    FieldEdit::Add {
                        field,
                        field_type,
                        is_array: flags & 0x0001 != 0,
                        default,
                    }
                }
                4 => {
                    let field = read_field_name(&mut reader, registry)?;
                    FieldEdit::Remove { field }
                }
                other => return Err(SchemaError::InvalidPatchOpcode(other)),
            };
            edits.push(edit);
        }

        records.push(PatchRecord {
            type_name,
            old_hash,
            new_hash,
            edits,
        });
    }

    Ok(records)
}

fn read_field_name(
    reader: &mut BinaryReader<'_>,
    registry: &TypeRegistry,
) -> Result<String, SchemaError> {
    let index = reader.read_u32()?;
    registry
        .field_name_table()
        .get(index as usize)
        .cloned()
        .ok_or(SchemaError::DanglingNameRef {
            index,
            count: registry.field_name_table().len(),
        })
}

/// Apply patch records, in file order, to the registry.
///
/// Hash mismatches and unknown targets are pushed into the report and the
/// affected type is marked degraded; other types continue. Chained patches
/// (a later record targeting an already-patched type) are allowed.
pub fn apply_patches(
    registry: &mut TypeRegistry,
    records: &[PatchRecord],
    report: &mut SessionReport,
) {
    for record in records {
        let Some(index) = registry.index_of(&record.type_name) else {
            report
                .patch_errors
                .push(PatchError::UnknownType(record.type_name.clone()));
            continue;
        };

        let schema = registry.schema_mut(index).expect("index from registry");

        // A type with no THSH entry has no revision to reconcile against;
        // editing it on a zero old_hash would be a silent layout change.
        let Some(current) = schema.hash else {
            schema.degraded = true;
            report.degraded_types.push(schema.name.clone());
            report
                .patch_errors
                .push(PatchError::UnhashedType(schema.name.clone()));
            continue;
        };

        if current == record.new_hash {
            // Already at the target revision: idempotent no-op.
            continue;
        }
        if current != record.old_hash {
            schema.degraded = true;
            report.degraded_types.push(schema.name.clone());
            report.patch_errors.push(PatchError::UnexpectedHash {
                type_name: schema.name.clone(),
                found: current,
                old: record.old_hash,
                new: record.new_hash,
            });
            continue;
        }

        for edit in &record.edits {
            if let Err(err) = apply_edit(schema, edit) {
                report.patch_errors.push(err);
            }
        }
        schema.hash = Some(record.new_hash);
    }
}

fn apply_edit(
    schema: &mut crate::schema::TypeSchema,
    edit: &FieldEdit,
) -> Result<(), PatchError> {
    let unknown_field = |field: &str| PatchError::UnknownField {
        type_name: schema.name.clone(),
        field: field.to_string(),
    };

    match edit {
        FieldEdit::Rename { from, to } => {
            let spec = find_field(&mut schema.fields, from).ok_or_else(|| unknown_field(from))?;
            spec.name = to.clone();
        }
        FieldEdit::Resize { field, field_type } => {
            let spec =
                find_field(&mut schema.fields, field).ok_or_else(|| unknown_field(field))?;
            spec.field_type = *field_type;
        }
        FieldEdit::Add {
            field,
            field_type,
            is_array,
            default,
        } => {
            let offset = schema
                .fields
                .iter()
                .map(|f| f.byte_offset + field_width(f))
                .max()
                .unwrap_or(schema.byte_size);
            schema.fields.push(FieldSpec {
                name: field.clone(),
                field_type: *field_type,
                is_array: *is_array,
                elem_type: 0,
                byte_offset: offset,
                synthetic_default: Some(*default),
            });
        }
        FieldEdit::Remove { field } => {
            let position = schema
                .fields
                .iter()
                .position(|f| f.name == *field)
                .ok_or_else(|| unknown_field(field))?;
            schema.fields.remove(position);
        }
    }
    Ok(())
}

fn find_field<'a>(fields: &'a mut [FieldSpec], name: &str) -> Option<&'a mut FieldSpec> {
    fields.iter_mut().find(|f| f.name == name)
}

fn field_width(field: &FieldSpec) -> u32 {
    if field.is_array || field.field_type == FieldType::String {
        8
    } else {
        field.field_type.inline_size() as u32
    }
}
