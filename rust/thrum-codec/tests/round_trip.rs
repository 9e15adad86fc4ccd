//! Property tests: every format decodes what it encoded.

use proptest::collection::{btree_map, btree_set, vec};
use proptest::option;
use proptest::prelude::*;
use thrum_codec::{
    EncodeError, Format, MAX_DEPTH, RecordValue, RequestEnvelope, Value, decode, decode_request,
    encode, encode_request,
};
use thrum_schema::{FieldDef, RecordId, Schema, SchemaBuilder, Type};

struct Fixture {
    schema: Schema,
    everything: RecordId,
}

fn fixture() -> Fixture {
    let mut builder = SchemaBuilder::new("PropertyService");
    let color = builder
        .add_enum("Color", [("RED", 1), ("GREEN", 2), ("BLUE", 3)])
        .unwrap();
    let everything = builder.declare_record("Everything").unwrap();
    builder
        .define_record(
            everything,
            vec![
                FieldDef::new(1, "flag", Type::Bool),
                FieldDef::new(2, "small", Type::Byte),
                FieldDef::new(3, "short", Type::I16),
                FieldDef::new(4, "int", Type::I32),
                FieldDef::new(5, "long", Type::I64),
                FieldDef::new(6, "ratio", Type::Double),
                FieldDef::new(7, "name", Type::String),
                FieldDef::new(8, "color", Type::Enum(color)),
                FieldDef::new(9, "tags", Type::list(Type::String)),
                FieldDef::new(10, "ids", Type::set(Type::I64)),
                FieldDef::new(11, "scores", Type::map(Type::String, Type::Double)),
                FieldDef::new(12, "palette", Type::map(Type::I32, Type::Enum(color))),
                FieldDef::new(13, "child", Type::Record(everything)).optional(),
                FieldDef::new(14, "children", Type::list(Type::Record(everything))),
            ],
        )
        .unwrap();
    builder
        .add_method(
            "store",
            vec![
                FieldDef::new(1, "item", Type::Record(everything)),
                FieldDef::new(2, "colors", Type::list(Type::Enum(color))),
            ],
            Type::Bool,
        )
        .unwrap();
    Fixture {
        schema: builder.build().unwrap(),
        everything,
    }
}

fn double() -> impl Strategy<Value = f64> {
    prop_oneof![
        8 => -1e12f64..1e12f64,
        1 => Just(f64::INFINITY),
        1 => Just(f64::NEG_INFINITY),
    ]
}

fn color() -> impl Strategy<Value = i32> {
    prop_oneof![Just(1), Just(2), Just(3)]
}

fn scalar_fields() -> impl Strategy<Value = RecordValue> {
    (
        option::of(any::<bool>()),
        option::of(any::<i8>()),
        option::of(any::<i16>()),
        option::of(any::<i32>()),
        option::of(any::<i64>()),
        option::of(double()),
        option::of(".{0,12}"),
        option::of(color()),
        option::of(vec(".{0,6}", 0..4)),
        option::of(btree_set(any::<i64>(), 0..4)),
        option::of(btree_map("[a-z]{0,6}", double(), 0..4)),
        option::of(btree_map(any::<i32>(), color(), 0..4)),
    )
        .prop_map(
            |(flag, small, short, int, long, ratio, name, color, tags, ids, scores, palette)| {
                let mut record = RecordValue::new();
                if let Some(v) = flag {
                    record.insert(1, Value::Bool(v));
                }
                if let Some(v) = small {
                    record.insert(2, Value::Byte(v));
                }
                if let Some(v) = short {
                    record.insert(3, Value::I16(v));
                }
                if let Some(v) = int {
                    record.insert(4, Value::I32(v));
                }
                if let Some(v) = long {
                    record.insert(5, Value::I64(v));
                }
                if let Some(v) = ratio {
                    record.insert(6, Value::Double(v));
                }
                if let Some(v) = name {
                    record.insert(7, Value::String(v));
                }
                if let Some(v) = color {
                    record.insert(8, Value::Enum(v));
                }
                if let Some(v) = tags {
                    record.insert(9, Value::List(v.into_iter().map(Value::String).collect()));
                }
                if let Some(v) = ids {
                    record.insert(10, Value::Set(v.into_iter().map(Value::I64).collect()));
                }
                if let Some(v) = scores {
                    let entries = v
                        .into_iter()
                        .map(|(k, s)| (Value::String(k), Value::Double(s)))
                        .collect();
                    record.insert(11, Value::Map(entries));
                }
                if let Some(v) = palette {
                    let entries = v
                        .into_iter()
                        .map(|(k, c)| (Value::I32(k), Value::Enum(c)))
                        .collect();
                    record.insert(12, Value::Map(entries));
                }
                record
            },
        )
}

fn everything() -> impl Strategy<Value = RecordValue> {
    scalar_fields().prop_recursive(3, 24, 3, |inner| {
        (scalar_fields(), option::of(inner.clone()), vec(inner, 0..3)).prop_map(
            |(mut record, child, children)| {
                if let Some(child) = child {
                    record.insert(13, Value::Record(child));
                }
                record.insert(
                    14,
                    Value::List(children.into_iter().map(Value::Record).collect()),
                );
                record
            },
        )
    })
}

fn format() -> impl Strategy<Value = Format> {
    prop_oneof![
        Just(Format::Binary),
        Just(Format::Compact),
        Just(Format::Json),
        Just(Format::Text),
    ]
}

proptest! {
    #[test]
    fn values_round_trip(record in everything(), format in format()) {
        let fx = fixture();
        let ty = Type::Record(fx.everything);
        let value = Value::Record(record);
        let bytes = encode(&fx.schema, &ty, &value, format).unwrap();
        prop_assert_eq!(decode(&fx.schema, &ty, &bytes, format).unwrap(), value);
    }

    #[test]
    fn requests_round_trip(
        record in everything(),
        colors in vec(color(), 0..5),
        seqid in any::<i32>(),
        format in format(),
    ) {
        let fx = fixture();
        let args = RecordValue::new()
            .with(1, Value::Record(record))
            .with(2, Value::List(colors.into_iter().map(Value::Enum).collect()));
        let request = RequestEnvelope::new("store", seqid, args);
        let bytes = encode_request(&fx.schema, &request, format).unwrap();
        prop_assert_eq!(decode_request(&fx.schema, &bytes, format).unwrap(), request);
    }

    #[test]
    fn arbitrary_bytes_never_panic(bytes in vec(any::<u8>(), 0..256), format in format()) {
        let fx = fixture();
        let _ = decode_request(&fx.schema, &bytes, format);
        let _ = decode(&fx.schema, &Type::Record(fx.everything), &bytes, format);
    }
}

#[test]
fn enum_outside_member_set_rejected_everywhere() {
    let fx = fixture();
    let ty = Type::Record(fx.everything);
    let value = Value::Record(RecordValue::new().with(8, Value::Enum(4)));
    for format in Format::ALL {
        assert!(encode(&fx.schema, &ty, &value, format).is_err(), "{format}");
    }

    // binary record with field 8 (i32) = 4
    let bytes = [8, 0, 8, 0, 0, 0, 4, 0];
    assert!(decode(&fx.schema, &ty, &bytes, Format::Binary).is_err());
}

#[test]
fn empty_containers_round_trip() {
    let fx = fixture();
    let ty = Type::Record(fx.everything);
    let value = Value::Record(
        RecordValue::new()
            .with(9, Value::List(vec![]))
            .with(10, Value::Set(vec![]))
            .with(11, Value::Map(vec![]))
            .with(12, Value::Map(vec![]))
            .with(14, Value::List(vec![])),
    );
    for format in Format::ALL {
        let bytes = encode(&fx.schema, &ty, &value, format).unwrap();
        assert_eq!(decode(&fx.schema, &ty, &bytes, format).unwrap(), value, "{format}");
    }
}

fn node_schema() -> (Schema, RecordId) {
    let mut builder = SchemaBuilder::new("ChainService");
    let node = builder.declare_record("Node").unwrap();
    builder
        .define_record(
            node,
            vec![
                FieldDef::new(1, "label", Type::String),
                FieldDef::new(2, "next", Type::Record(node)).optional(),
            ],
        )
        .unwrap();
    builder
        .add_method("push", vec![FieldDef::new(1, "head", Type::Record(node))], Type::Bool)
        .unwrap();
    (builder.build().unwrap(), node)
}

fn chain(len: usize) -> Value {
    let mut value = Value::Record(RecordValue::new().with(1, "tail"));
    for i in 0..len {
        value = Value::Record(RecordValue::new().with(1, format!("n{i}")).with(2, value));
    }
    value
}

/// Longest chain `encode` accepts, with its bytes.
fn deepest_encodable(
    mut encode: impl FnMut(&Value) -> Result<Vec<u8>, EncodeError>,
) -> (Value, Vec<u8>) {
    let mut deepest = None;
    for len in 0..=MAX_DEPTH + 1 {
        let value = chain(len);
        match encode(&value) {
            Ok(bytes) => deepest = Some((value, bytes)),
            Err(EncodeError::DepthLimitExceeded(_)) => break,
            Err(err) => panic!("chain of {len}: {err}"),
        }
    }
    deepest.unwrap()
}

#[test]
fn deepest_encodable_value_decodes() {
    let (schema, node) = node_schema();
    let ty = Type::Record(node);
    for format in Format::ALL {
        let (value, bytes) = deepest_encodable(|value| encode(&schema, &ty, value, format));
        assert_eq!(decode(&schema, &ty, &bytes, format).unwrap(), value, "{format}");
    }
}

#[test]
fn deepest_encodable_request_decodes() {
    let (schema, _) = node_schema();
    for format in Format::ALL {
        let (value, bytes) = deepest_encodable(|value| {
            let args = RecordValue::new().with(1, value.clone());
            encode_request(&schema, &RequestEnvelope::new("push", 5, args), format)
        });
        let expected = RequestEnvelope::new("push", 5, RecordValue::new().with(1, value));
        assert_eq!(decode_request(&schema, &bytes, format).unwrap(), expected, "{format}");
    }
}

/// The same `Item` record at two schema versions: the newer one has fields
/// the older one has never heard of, placed before and after a known field.
fn item_schemas() -> (Schema, Schema, Type, Type) {
    let mut wide = SchemaBuilder::new("ItemService");
    let inner = wide.declare_record("Inner").unwrap();
    wide.define_record(
        inner,
        vec![
            FieldDef::new(1, "count", Type::I32),
            FieldDef::new(2, "note", Type::String),
            FieldDef::new(3, "on", Type::Bool),
        ],
    )
    .unwrap();
    let item = wide.declare_record("Item").unwrap();
    wide.define_record(
        item,
        vec![
            FieldDef::new(1, "name", Type::String),
            FieldDef::new(2, "flag", Type::Bool),
            FieldDef::new(3, "inner", Type::Record(inner)),
            FieldDef::new(4, "bits", Type::map(Type::String, Type::list(Type::Bool))),
            FieldDef::new(5, "last", Type::Bool),
            FieldDef::new(41, "done", Type::Bool),
        ],
    )
    .unwrap();
    wide.add_method("put", vec![FieldDef::new(1, "item", Type::Record(item))], Type::Bool)
        .unwrap();

    let mut narrow = SchemaBuilder::new("ItemService");
    let old_item = narrow.declare_record("Item").unwrap();
    narrow
        .define_record(
            old_item,
            vec![
                FieldDef::new(1, "name", Type::String),
                FieldDef::new(41, "done", Type::Bool),
            ],
        )
        .unwrap();
    narrow
        .add_method("put", vec![FieldDef::new(1, "item", Type::Record(old_item))], Type::Bool)
        .unwrap();

    (
        wide.build().unwrap(),
        narrow.build().unwrap(),
        Type::Record(item),
        Type::Record(old_item),
    )
}

fn wide_item() -> RecordValue {
    let inner = RecordValue::new().with(1, 7).with(2, "seven").with(3, true);
    let bits = Value::Map(vec![
        (Value::from("a"), Value::List(vec![Value::Bool(true), Value::Bool(false)])),
        (Value::from("b"), Value::List(vec![])),
    ]);
    RecordValue::new()
        .with(1, "hi")
        .with(2, true)
        .with(3, inner)
        .with(4, bits)
        .with(5, true)
        .with(41, false)
}

#[test]
fn unknown_fields_are_skipped() {
    let (wide, narrow, wide_ty, narrow_ty) = item_schemas();
    let expected = RecordValue::new().with(1, "hi").with(41, false);
    for format in Format::ALL {
        let bytes = encode(&wide, &wide_ty, &Value::Record(wide_item()), format).unwrap();
        let decoded = decode(&narrow, &narrow_ty, &bytes, format).unwrap();
        assert_eq!(decoded, Value::Record(expected.clone()), "{format}");

        let request = RequestEnvelope::new("put", 11, RecordValue::new().with(1, wide_item()));
        let bytes = encode_request(&wide, &request, format).unwrap();
        let decoded = decode_request(&narrow, &bytes, format).unwrap();
        assert_eq!(
            decoded,
            RequestEnvelope::new("put", 11, RecordValue::new().with(1, expected.clone())),
            "{format}"
        );
    }
}
