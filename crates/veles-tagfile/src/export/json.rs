//! JSON projection of the decoded instance graph.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::instance::{Instance, Primitive};
use crate::tagfile::TagFile;

/// Summary of a session report, serialized alongside dumps so partially
/// reconstructed graphs are never presented as clean.
#[derive(Debug, Serialize)]
struct ReportSummary<'a> {
    degraded_types: &'a [String],
    patch_errors: Vec<String>,
    unresolved: Vec<String>,
}

/// Projects instances into `serde_json::Value` trees.
///
/// Records become objects carrying a `$type` key, arrays become arrays,
/// bound pointers become `{"$ref": slot}` so shared references and cycles
/// stay representable, and primitives become JSON scalars.
pub struct JsonDumper<'a> {
    file: &'a TagFile,
}

impl<'a> JsonDumper<'a> {
    /// Create a dumper over a decoded tagfile.
    pub fn new(file: &'a TagFile) -> Self {
        Self { file }
    }

    /// Dump one instance.
    pub fn dump_instance(&self, instance: &Instance) -> Value {
        match instance {
            Instance::Primitive(p) => dump_primitive(p),
            Instance::Record(record) => {
                let mut object = Map::new();
                let type_name = self
                    .file
                    .registry()
                    .type_name(record.type_index)
                    .unwrap_or("?");
                object.insert("$type".to_string(), Value::from(type_name));
                for (name, value) in record.iter() {
                    object.insert(name.to_string(), self.dump_instance(value));
                }
                Value::Object(object)
            }
            Instance::Array(array) => Value::Array(
                array
                    .elements
                    .iter()
                    .map(|e| self.dump_instance(e))
                    .collect(),
            ),
            Instance::Pointer(pointer) => match pointer.target {
                Some(target) => json!({ "$ref": target.slot }),
                None => Value::Null,
            },
        }
    }

    /// Dump the instances of one item slot.
    pub fn dump_slot(&self, slot: u32) -> Value {
        match self.file.item(slot) {
            Some(instances) => Value::Array(
                instances.iter().map(|i| self.dump_instance(i)).collect(),
            ),
            None => Value::Null,
        }
    }

    /// Dump the root instances plus the session report.
    pub fn dump(&self) -> Value {
        let report = self.file.report();
        let summary = ReportSummary {
            degraded_types: &report.degraded_types,
            patch_errors: report.patch_errors.iter().map(|e| e.to_string()).collect(),
            unresolved: report
                .resolve_errors
                .iter()
                .map(|e| e.to_string())
                .collect(),
        };

        json!({
            "sdk_version": self.file.sdk_version(),
            "roots": self.file.roots().iter().map(|i| self.dump_instance(i)).collect::<Vec<_>>(),
            "report": serde_json::to_value(&summary).unwrap_or(Value::Null),
        })
    }
}

fn dump_primitive(primitive: &Primitive) -> Value {
    match primitive {
        Primitive::Bool(v) => Value::from(*v),
        Primitive::Int8(v) => Value::from(*v),
        Primitive::Int16(v) => Value::from(*v),
        Primitive::Int32(v) => Value::from(*v),
        Primitive::Int64(v) => Value::from(*v),
        Primitive::UInt8(v) => Value::from(*v),
        Primitive::UInt16(v) => Value::from(*v),
        Primitive::UInt32(v) => Value::from(*v),
        Primitive::UInt64(v) => Value::from(*v),
        Primitive::Float(v) => Value::from(*v),
        Primitive::Double(v) => Value::from(*v),
        Primitive::Str(v) => Value::from(v.as_str()),
    }
}
