//! End-to-end decode sessions over synthetic tagfile buffers.

use veles_tagfile::{
    field_i32, field_string, ChunkKind, DecodeError, Error, Instance, PatchError, Primitive,
    RecordValue, SchemaError, TagClass, TagFile,
};

/// Emit one chunk: big-endian size word (header included), 4-byte tag,
/// payload.
fn chunk(tag: &[u8; 4], leaf: bool, payload: &[u8]) -> Vec<u8> {
    let size = (payload.len() + 8) as u32;
    let word = size | if leaf { 0x4000_0000 } else { 0 };
    let mut out = word.to_be_bytes().to_vec();
    out.extend_from_slice(tag);
    out.extend_from_slice(payload);
    out
}

fn concat(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.iter().flatten().copied().collect()
}

struct Payload(Vec<u8>);

impl Payload {
    fn new() -> Self {
        Self(Vec::new())
    }
    fn u8(mut self, v: u8) -> Self {
        self.0.push(v);
        self
    }
    fn u16(mut self, v: u16) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }
    fn u32(mut self, v: u32) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }
    fn u64(mut self, v: u64) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }
    fn i32(mut self, v: i32) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }
    fn bytes(mut self, v: &[u8]) -> Self {
        self.0.extend_from_slice(v);
        self
    }
}

/// An item entry: type index, DATA-relative offset, count.
fn item(type_index: u32, data_offset: u32, count: u32) -> Payload {
    Payload::new().u32(type_index).u32(data_offset).u32(count)
}

/// A complete fixture: one root object with a string, an int, a primitive
/// array, a null pointer, and a templated type with no body.
///
/// Types: 1 = hkRootLevelContainer (the fixture repurposes the well-known
/// name for a simple layout), 2 = char, 3 = hkArray<tT=char>.
fn fixture() -> Vec<u8> {
    let tst1 = b"hkRootLevelContainer\0char\0hkArray\0tT\0";
    let fst1 = b"name\0value\0nums\0next\0";

    let tna1 = Payload::new()
        .u32(3)
        // hkRootLevelContainer, no templates
        .u32(0)
        .u32(0)
        // char, no templates
        .u32(1)
        .u32(0)
        // hkArray, one template: tT = char (type 2)
        .u32(2)
        .u32(1)
        .u32(3)
        .u32(2);

    let tbdy = Payload::new()
        // type 1: parent 0, 24 bytes, 4 fields
        .u32(1)
        .u32(0)
        .u32(24)
        .u32(4)
        // name: String at 0
        .u32(0)
        .u16(0x000C)
        .u16(0)
        .u32(0)
        .u32(0)
        // value: Int32 at 8
        .u32(1)
        .u16(0x0004)
        .u16(0)
        .u32(0)
        .u32(8)
        // nums: Int32 array at 12
        .u32(2)
        .u16(0x0004)
        .u16(0x0001)
        .u32(0)
        .u32(12)
        // next: Pointer at 20
        .u32(3)
        .u16(0x0011)
        .u16(0)
        .u32(1)
        .u32(20)
        // type 2: char, 1 byte, no fields
        .u32(2)
        .u32(0)
        .u32(1)
        .u32(0);

    let items = Payload::new()
        .bytes(&item(0, 0, 0).0)
        .bytes(&item(1, 0, 1).0) // slot 1: the root record
        .bytes(&item(2, 24, 6).0) // slot 2: "Hello\0" bytes
        .bytes(&item(0, 30, 3).0); // slot 3: three i32 elements

    let data = Payload::new()
        // record at 0: name -> slot 2 (max 6), value 42, nums -> slot 3,
        // next -> null
        .u32(2)
        .u32(6)
        .i32(42)
        .u32(3)
        .u32(3)
        .u32(0)
        // string bytes at 24
        .bytes(b"Hello\0")
        // array elements at 30
        .i32(10)
        .i32(20)
        .i32(30);

    let type_chunk = chunk(
        b"TYPE",
        false,
        &concat(&[
            chunk(b"TST1", true, tst1),
            chunk(b"FST1", true, fst1),
            chunk(b"TNA1", true, &tna1.0),
            chunk(b"TBDY", true, &tbdy.0),
        ]),
    );
    let indx = chunk(b"INDX", false, &chunk(b"ITEM", true, &items.0));

    chunk(
        b"TAG0",
        false,
        &concat(&[
            chunk(b"SDKV", true, b"20210101"),
            type_chunk,
            indx,
            chunk(b"DATA", true, &data.0),
        ]),
    )
}

#[test]
fn test_full_session() {
    let file = TagFile::parse(&fixture()).unwrap();

    assert_eq!(file.sdk_version(), Some("20210101"));
    assert!(file.report().is_clean());
    assert_eq!(file.registry().len(), 3);
    assert_eq!(
        file.registry().type_name_table(),
        ["hkRootLevelContainer", "char", "hkArray", "tT"]
    );

    let roots = file.roots();
    assert_eq!(roots.len(), 1);

    let view = file.view(&roots[0]);
    assert_eq!(view.type_name(), Some("hkRootLevelContainer"));
    assert_eq!(view.get_str("name"), Some("Hello"));
    assert_eq!(view.get_i32("value"), Some(42));

    let nums = view.elements("nums").unwrap();
    let decoded: Vec<i32> = nums.iter().filter_map(|e| e.as_i32()).collect();
    assert_eq!(decoded, vec![10, 20, 30]);

    // Slot 0 is the null pointer: no target, no report entry.
    let next = view.get("next").unwrap().as_pointer().unwrap();
    assert_eq!(next.slot, 0);
    assert!(next.target.is_none());
}

#[test]
fn test_template_args() {
    let file = TagFile::parse(&fixture()).unwrap();

    let index = file.registry().index_of("hkArray").unwrap();
    assert_eq!(file.registry().template_args(index), vec![("tT", "char")]);
    let root = file.registry().index_of("hkRootLevelContainer").unwrap();
    assert!(file.registry().template_args(root).is_empty());
}

#[test]
fn test_missing_root() {
    // A stream with no TAG0 decodes structurally but is not a tagfile.
    let data = chunk(b"SDKV", true, b"20210101");
    match TagFile::parse(&data) {
        Err(Error::Decode(DecodeError::MissingRoot)) => {}
        other => panic!("expected MissingRoot, got {:?}", other.err()),
    }
}

#[test]
fn test_truncated_stream() {
    let mut data = fixture();
    data.truncate(data.len() - 4);
    match TagFile::parse(&data) {
        Err(Error::Decode(DecodeError::Truncated { .. })) => {}
        other => panic!("expected Truncated, got {:?}", other.err()),
    }
}

#[test]
fn test_unknown_chunk_retained() {
    // An unrecognized tag inside TAG0 is kept opaque and does not disturb
    // its siblings.
    let body = concat(&[
        chunk(b"XYZZ", true, b"opaque bytes"),
        chunk(b"SDKV", true, b"20210101"),
    ]);
    let data = chunk(b"TAG0", false, &body);

    let file = TagFile::parse(&data).unwrap();
    assert_eq!(file.sdk_version(), Some("20210101"));

    let unknown = &file.root().children[0];
    assert_eq!(unknown.kind, ChunkKind::Unknown);
    assert_eq!(&unknown.tag, b"XYZZ");
    assert_eq!(file.chunk_payload(unknown), b"opaque bytes");
}

#[test]
fn test_unresolved_slot_reported() {
    // One type with a single pointer field aimed at a slot that does not
    // exist. The field stays unbound; the session still succeeds.
    let tna1 = Payload::new().u32(1).u32(0).u32(0);
    let tbdy = Payload::new()
        .u32(1)
        .u32(0)
        .u32(4)
        .u32(1)
        .u32(0)
        .u16(0x0011)
        .u16(0)
        .u32(0)
        .u32(0);
    let items = Payload::new().bytes(&item(0, 0, 0).0).bytes(&item(1, 0, 1).0);
    let data = Payload::new().u32(99);

    let buffer = chunk(
        b"TAG0",
        false,
        &concat(&[
            chunk(
                b"TYPE",
                false,
                &concat(&[
                    chunk(b"TST1", true, b"Foo\0"),
                    chunk(b"FST1", true, b"bad\0"),
                    chunk(b"TNA1", true, &tna1.0),
                    chunk(b"TBDY", true, &tbdy.0),
                ]),
            ),
            chunk(b"INDX", false, &chunk(b"ITEM", true, &items.0)),
            chunk(b"DATA", true, &data.0),
        ]),
    );

    let file = TagFile::parse(&buffer).unwrap();
    assert!(file.sdk_version().is_none());
    assert!(!file.report().is_clean());
    assert_eq!(file.report().resolve_errors.len(), 1);

    let pointer = file.roots()[0]
        .as_record()
        .unwrap()
        .field("bad")
        .unwrap()
        .as_pointer()
        .unwrap()
        .clone();
    assert_eq!(pointer.slot, 99);
    assert!(pointer.target.is_none());
}

/// Fixture for patch scenarios: type Foo { a: Int32, b: Int32 } carrying
/// `hash` (no THSH chunk when `None`), one instance in slot 1, plus the
/// given PTCH payloads.
fn patch_fixture(hash: Option<u32>, patches: &[Vec<u8>]) -> Vec<u8> {
    let tna1 = Payload::new().u32(1).u32(0).u32(0);
    let tbdy = Payload::new()
        .u32(1)
        .u32(0)
        .u32(8)
        .u32(2)
        .u32(0)
        .u16(0x0004)
        .u16(0)
        .u32(0)
        .u32(0)
        .u32(1)
        .u16(0x0004)
        .u16(0)
        .u32(0)
        .u32(4);
    let items = Payload::new().bytes(&item(0, 0, 0).0).bytes(&item(1, 0, 1).0);
    let data = Payload::new().u32(0xDEAD_BEEF).i32(-5);

    let mut type_children = vec![
        chunk(b"TST1", true, b"Foo\0"),
        chunk(b"FST1", true, b"a\0b\0c\0renamed\0"),
        chunk(b"TNA1", true, &tna1.0),
        chunk(b"TBDY", true, &tbdy.0),
    ];
    if let Some(hash) = hash {
        let thsh = Payload::new().u32(1).u32(hash);
        type_children.push(chunk(b"THSH", true, &thsh.0));
    }

    let mut parts = vec![
        chunk(b"TYPE", false, &concat(&type_children)),
        chunk(b"INDX", false, &chunk(b"ITEM", true, &items.0)),
    ];
    for patch in patches {
        parts.push(chunk(b"PTCH", true, patch));
    }
    parts.push(chunk(b"DATA", true, &data.0));

    chunk(b"TAG0", false, &concat(&parts))
}

#[test]
fn test_patch_edits_apply_before_materialization() {
    // One record: resize a to UInt32, remove b, add c with a default.
    let patch = Payload::new()
        .u32(0) // target: Foo
        .u32(0x1111)
        .u32(0x2222)
        .u32(3)
        .u8(2) // resize a -> UInt32
        .u32(0)
        .u16(0x0008)
        .u8(4) // remove b
        .u32(1)
        .u8(3) // add c: UInt16, default 7
        .u32(2)
        .u16(0x0007)
        .u16(0)
        .u64(7);

    let file = TagFile::parse(&patch_fixture(Some(0x1111), &[patch.0])).unwrap();
    assert!(file.report().is_clean());

    let schema = file.registry().schema(1).unwrap();
    assert_eq!(schema.hash, Some(0x2222));
    assert!(!schema.degraded);

    let record = file.roots()[0].as_record().unwrap();
    // a now reads as unsigned at the same offset.
    assert_eq!(record.field("a").unwrap().as_u32(), Some(0xDEAD_BEEF));
    // b is gone; its bytes were never read.
    assert!(record.field("b").is_err());
    // c never touches DATA: it takes the patch default.
    assert_eq!(record.field("c").unwrap().as_u32(), Some(7));
}

#[test]
fn test_patch_reapplication_is_idempotent() {
    let rename = Payload::new()
        .u32(0)
        .u32(0x1111)
        .u32(0x2222)
        .u32(1)
        .u8(1) // rename a -> renamed
        .u32(0)
        .u32(3);

    // The same record twice: the second sees the new hash and is a no-op.
    let file =
        TagFile::parse(&patch_fixture(Some(0x1111), &[rename.0.clone(), rename.0])).unwrap();
    assert!(file.report().is_clean());

    let schema = file.registry().schema(1).unwrap();
    assert_eq!(schema.hash, Some(0x2222));
    assert_eq!(schema.fields[0].name, "renamed");
    // A single rename happened: "renamed" was not re-targeted.
    assert!(schema.fields.iter().filter(|f| f.name == "renamed").count() == 1);
}

#[test]
fn test_patch_hash_mismatch_degrades_type() {
    let rename = Payload::new()
        .u32(0)
        .u32(0x1111)
        .u32(0x2222)
        .u32(1)
        .u8(1)
        .u32(0)
        .u32(3);

    // The type carries a hash matching neither side of the patch.
    let file = TagFile::parse(&patch_fixture(Some(0x9999), &[rename.0])).unwrap();

    assert!(!file.report().is_clean());
    assert_eq!(file.report().degraded_types, vec!["Foo".to_string()]);
    assert_eq!(file.report().patch_errors.len(), 1);

    // The type is untouched: hash kept, no edit applied, instances still
    // materialize from the unpatched layout.
    let schema = file.registry().schema(1).unwrap();
    assert_eq!(schema.hash, Some(0x9999));
    assert!(schema.degraded);
    assert_eq!(schema.fields[0].name, "a");

    let record = file.roots()[0].as_record().unwrap();
    assert_eq!(record.field("b").unwrap().as_i32(), Some(-5));
}

#[test]
fn test_unpatched_type_keeps_hash() {
    // Two hashed types; the patch targets only Foo. Bar keeps its THSH
    // value untouched.
    let tna1 = Payload::new().u32(2).u32(0).u32(0).u32(1).u32(0);
    let tbdy = Payload::new()
        .u32(1)
        .u32(0)
        .u32(4)
        .u32(1)
        .u32(0)
        .u16(0x0004)
        .u16(0)
        .u32(0)
        .u32(0)
        .u32(2)
        .u32(0)
        .u32(4)
        .u32(1)
        .u32(1)
        .u16(0x0004)
        .u16(0)
        .u32(0)
        .u32(0);
    let thsh = Payload::new().u32(1).u32(0x1111).u32(2).u32(0x3333);
    let items = Payload::new()
        .bytes(&item(0, 0, 0).0)
        .bytes(&item(1, 0, 1).0)
        .bytes(&item(2, 4, 1).0);
    let data = Payload::new().i32(7).i32(8);
    let patch = Payload::new()
        .u32(0) // target: Foo
        .u32(0x1111)
        .u32(0x2222)
        .u32(1)
        .u8(1) // rename a -> renamed
        .u32(0)
        .u32(2);

    let buffer = chunk(
        b"TAG0",
        false,
        &concat(&[
            chunk(
                b"TYPE",
                false,
                &concat(&[
                    chunk(b"TST1", true, b"Foo\0Bar\0"),
                    chunk(b"FST1", true, b"a\0b\0renamed\0"),
                    chunk(b"TNA1", true, &tna1.0),
                    chunk(b"TBDY", true, &tbdy.0),
                    chunk(b"THSH", true, &thsh.0),
                ]),
            ),
            chunk(b"INDX", false, &chunk(b"ITEM", true, &items.0)),
            chunk(b"PTCH", true, &patch.0),
            chunk(b"DATA", true, &data.0),
        ]),
    );

    let file = TagFile::parse(&buffer).unwrap();
    assert!(file.report().is_clean());

    let foo = file.registry().schema(1).unwrap();
    assert_eq!(foo.hash, Some(0x2222));
    assert_eq!(foo.fields[0].name, "renamed");

    let bar = file.registry().schema(2).unwrap();
    assert_eq!(bar.hash, Some(0x3333));
    assert!(!bar.degraded);
    assert_eq!(bar.fields[0].name, "b");
}

#[test]
fn test_dangling_template_arg_rejected() {
    // A template argument naming a type beyond the table is fatal.
    let tna1 = Payload::new()
        .u32(1)
        .u32(0) // Foo
        .u32(1) // one template
        .u32(1) // param: tT
        .u32(99); // argument type: out of bounds

    let buffer = chunk(
        b"TAG0",
        false,
        &concat(&[chunk(
            b"TYPE",
            false,
            &concat(&[
                chunk(b"TST1", true, b"Foo\0tT\0"),
                chunk(b"TNA1", true, &tna1.0),
            ]),
        )]),
    );

    match TagFile::parse(&buffer) {
        Err(Error::Schema(SchemaError::DanglingTypeRef { index: 99, .. })) => {}
        other => panic!("expected DanglingTypeRef, got {:?}", other.err()),
    }
}

#[test]
fn test_unknown_patch_opcode_rejected() {
    let bad = Payload::new()
        .u32(0)
        .u32(0x1111)
        .u32(0x2222)
        .u32(1)
        .u8(9); // no such edit op

    match TagFile::parse(&patch_fixture(Some(0x1111), &[bad.0])) {
        Err(Error::Schema(SchemaError::InvalidPatchOpcode(9))) => {}
        other => panic!("expected InvalidPatchOpcode, got {:?}", other.err()),
    }
}

#[test]
fn test_patch_against_unhashed_type_degrades() {
    // No THSH entry: a zero old_hash must not silently match. The type is
    // degraded and left unedited.
    let rename = Payload::new()
        .u32(0)
        .u32(0) // old_hash 0, aimed at the absent-hash gap
        .u32(0x2222)
        .u32(1)
        .u8(1)
        .u32(0)
        .u32(3);

    let file = TagFile::parse(&patch_fixture(None, &[rename.0])).unwrap();

    assert!(!file.report().is_clean());
    assert_eq!(file.report().degraded_types, vec!["Foo".to_string()]);
    assert!(matches!(
        file.report().patch_errors[0],
        PatchError::UnhashedType(_)
    ));

    let schema = file.registry().schema(1).unwrap();
    assert!(schema.degraded);
    assert_eq!(schema.hash, None);
    assert_eq!(schema.fields[0].name, "a");
}

/// Fixture with an inheritance chain: Child extends Parent, and Parent's
/// fields occupy the base of every Child instance.
fn inheritance_fixture() -> Vec<u8> {
    let tna1 = Payload::new().u32(2).u32(0).u32(0).u32(1).u32(0);
    let tbdy = Payload::new()
        // Parent: 4 bytes, field a at 0
        .u32(1)
        .u32(0)
        .u32(4)
        .u32(1)
        .u32(0)
        .u16(0x0004)
        .u16(0)
        .u32(0)
        .u32(0)
        // Child: parent 1, 8 bytes, field b at 4
        .u32(2)
        .u32(1)
        .u32(8)
        .u32(1)
        .u32(1)
        .u16(0x0004)
        .u16(0)
        .u32(0)
        .u32(4);
    let items = Payload::new().bytes(&item(0, 0, 0).0).bytes(&item(2, 0, 2).0);
    // Two Child instances, stride 8.
    let data = Payload::new().i32(1).i32(2).i32(3).i32(4);

    chunk(
        b"TAG0",
        false,
        &concat(&[
            chunk(
                b"TYPE",
                false,
                &concat(&[
                    chunk(b"TST1", true, b"Parent\0Child\0"),
                    chunk(b"FST1", true, b"a\0b\0"),
                    chunk(b"TNA1", true, &tna1.0),
                    chunk(b"TBDY", true, &tbdy.0),
                ]),
            ),
            chunk(b"INDX", false, &chunk(b"ITEM", true, &items.0)),
            chunk(b"DATA", true, &data.0),
        ]),
    )
}

#[test]
fn test_inherited_fields_prefix_instances() {
    let file = TagFile::parse(&inheritance_fixture()).unwrap();
    assert!(file.report().is_clean());

    let child = file.registry().index_of("Child").unwrap();
    let fields: Vec<&str> = file
        .registry()
        .flattened_fields(child)
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(fields, vec!["a", "b"]);

    let instances = file.roots();
    assert_eq!(instances.len(), 2);

    let first = instances[0].as_record().unwrap();
    assert_eq!(first.fields[0].0, "a");
    assert_eq!(first.field("a").unwrap().as_i32(), Some(1));
    assert_eq!(first.field("b").unwrap().as_i32(), Some(2));

    let second = instances[1].as_record().unwrap();
    assert_eq!(second.field("a").unwrap().as_i32(), Some(3));
    assert_eq!(second.field("b").unwrap().as_i32(), Some(4));
}

#[derive(Debug, Default)]
struct RootEntry {
    name: String,
    value: i32,
}

impl TagClass for RootEntry {
    const TYPE_NAME: &'static str = "hkRootLevelContainer";

    fn read_fields(
        &mut self,
        _file: &TagFile,
        record: &RecordValue,
    ) -> Result<(), veles_tagfile::AdapterError> {
        self.name = field_string(record, "name")?;
        self.value = field_i32(record, "value")?;
        Ok(())
    }

    fn write_fields(&self, record: &mut RecordValue) -> Result<(), veles_tagfile::AdapterError> {
        *record.field_mut("name")? = Instance::Primitive(Primitive::Str(self.name.clone()));
        *record.field_mut("value")? = Instance::Primitive(Primitive::Int32(self.value));
        Ok(())
    }
}

#[derive(Debug, Default)]
struct WrongClass {
    value: i32,
}

impl TagClass for WrongClass {
    const TYPE_NAME: &'static str = "hkWrongType";

    fn read_fields(
        &mut self,
        _file: &TagFile,
        record: &RecordValue,
    ) -> Result<(), veles_tagfile::AdapterError> {
        self.value = field_i32(record, "value")?;
        Ok(())
    }

    fn write_fields(&self, record: &mut RecordValue) -> Result<(), veles_tagfile::AdapterError> {
        *record.field_mut("value")? = Instance::Primitive(Primitive::Int32(self.value));
        Ok(())
    }
}

#[test]
fn test_adapter_round_trip() {
    let file = TagFile::parse(&fixture()).unwrap();

    let mut entry = RootEntry::from_instance(&file, &file.roots()[0]).unwrap();
    assert_eq!(entry.name, "Hello");
    assert_eq!(entry.value, 42);

    entry.value = 7;
    let mut instance = file.roots()[0].clone();
    entry.to_instance(&file, &mut instance).unwrap();
    assert_eq!(
        instance.as_record().unwrap().field("value").unwrap().as_i32(),
        Some(7)
    );
}

#[test]
fn test_adapter_type_mismatch_writes_nothing() {
    let file = TagFile::parse(&fixture()).unwrap();

    // The name check runs before any field access, so a mismatched write
    // leaves the instance untouched.
    let original = file.roots()[0].clone();
    let mut instance = original.clone();
    let wrong = WrongClass { value: 999 };
    match wrong.to_instance(&file, &mut instance) {
        Err(veles_tagfile::AdapterError::TypeNameMismatch { expected, actual }) => {
            assert_eq!(expected, "hkWrongType");
            assert_eq!(actual, "hkRootLevelContainer");
        }
        other => panic!("expected TypeNameMismatch, got {:?}", other),
    }
    assert_eq!(instance, original);
}

#[cfg(feature = "json-export")]
#[test]
fn test_json_dump() {
    use veles_tagfile::JsonDumper;

    let file = TagFile::parse(&fixture()).unwrap();
    let dump = JsonDumper::new(&file).dump();

    assert_eq!(dump["sdk_version"], "20210101");
    let root = &dump["roots"][0];
    assert_eq!(root["$type"], "hkRootLevelContainer");
    assert_eq!(root["name"], "Hello");
    assert_eq!(root["value"], 42);
    assert_eq!(root["nums"][1], 20);
    assert!(root["next"].is_null());
    assert_eq!(dump["report"]["degraded_types"].as_array().unwrap().len(), 0);
}
