//! JSON protocol: structs are objects keyed by field id, every field value is
//! wrapped in a one-entry object naming its type (`{"1":{"str":"ID"}}`).

use serde_json::{Map as JsonMap, Number, Value as Json, json};
use thrum_schema::{FieldDef, Schema, Type};

use crate::error::{DecodeError, EncodeError};
use crate::value::{RecordValue, Value};
use crate::wire::{
    BodyShape, MessageHeader, MessageType, check_enum_member, check_record_for_encode,
    check_required_decoded, descend_decode, descend_encode, enum_for_decode, enum_for_encode,
    record_for_decode, record_for_encode,
};

const VERSION: i64 = 1;

/// Deepest array/object nesting serde_json will parse back.
pub(crate) const MAX_NESTING: usize = 127;

fn type_tag(ty: &Type) -> &'static str {
    match ty {
        Type::Bool => "tf",
        Type::Byte => "i8",
        Type::I16 => "i16",
        Type::I32 | Type::Enum(_) => "i32",
        Type::I64 => "i64",
        Type::Double => "dbl",
        Type::String => "str",
        Type::Record(_) => "rec",
        Type::Map(_, _) => "map",
        Type::List(_) => "lst",
        Type::Set(_) => "set",
    }
}

pub(crate) fn encode_double(v: f64) -> Json {
    match Number::from_f64(v) {
        Some(n) => Json::Number(n),
        None if v.is_nan() => Json::from("NaN"),
        None if v > 0.0 => Json::from("Infinity"),
        None => Json::from("-Infinity"),
    }
}

pub(crate) fn decode_double(json: &Json) -> Result<f64, DecodeError> {
    match json {
        Json::Number(n) => n
            .as_f64()
            .ok_or_else(|| DecodeError::mismatch("double", n.to_string())),
        Json::String(s) => match s.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            _ => Err(DecodeError::mismatch("double", json_kind(json))),
        },
        _ => Err(DecodeError::mismatch("double", json_kind(json))),
    }
}

/// Integer with a range check against the declared width.
pub(crate) fn decode_int(
    json: &Json,
    ty: &'static str,
    min: i64,
    max: i64,
) -> Result<i64, DecodeError> {
    let Json::Number(n) = json else {
        return Err(DecodeError::mismatch(ty, json_kind(json)));
    };
    match n.as_i64() {
        Some(v) if (min..=max).contains(&v) => Ok(v),
        _ => Err(DecodeError::IntegerOutOfRange {
            ty,
            value: n.to_string(),
        }),
    }
}

pub(crate) fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "json bool",
        Json::Number(_) => "json number",
        Json::String(_) => "json string",
        Json::Array(_) => "json array",
        Json::Object(_) => "json object",
    }
}

/// Map keys must be JSON strings. String keys are used as-is; other keys are
/// written as their JSON text, or their string content when they encode to a
/// JSON string.
pub(crate) fn key_to_string(key: Json) -> Result<String, EncodeError> {
    match key {
        Json::String(s) => Ok(s),
        other => Ok(serde_json::to_string(&other)?),
    }
}

pub(crate) fn key_from_string(ty: &Type, key: &str) -> Json {
    if matches!(ty, Type::String) {
        return Json::from(key);
    }
    serde_json::from_str(key).unwrap_or_else(|_| Json::from(key))
}

pub(crate) fn encode_value(
    schema: &Schema,
    ty: &Type,
    value: &Value,
    depth: usize,
) -> Result<Json, EncodeError> {
    Ok(match (ty, value) {
        (Type::Bool, Value::Bool(v)) => Json::from(*v as i32),
        (Type::Byte, Value::Byte(v)) => Json::from(*v),
        (Type::I16, Value::I16(v)) => Json::from(*v),
        (Type::I32, Value::I32(v)) => Json::from(*v),
        (Type::I64, Value::I64(v)) => Json::from(*v),
        (Type::Double, Value::Double(v)) => encode_double(*v),
        (Type::String, Value::String(v)) => Json::from(v.as_str()),
        (Type::Enum(id), Value::Enum(v)) => {
            enum_for_encode(schema, *id, *v)?;
            Json::from(*v)
        }
        (Type::Record(id), Value::Record(record)) => {
            let depth = descend_encode(depth)?;
            let def = record_for_encode(schema, *id)?;
            encode_struct(schema, &def.name, &def.fields, record, depth)?
        }
        (Type::List(elem), Value::List(items)) | (Type::Set(elem), Value::Set(items)) => {
            let depth = descend_encode(depth)?;
            let mut out = Vec::with_capacity(items.len() + 2);
            out.push(Json::from(type_tag(elem)));
            out.push(Json::from(items.len()));
            for item in items {
                out.push(encode_value(schema, elem, item, depth)?);
            }
            Json::Array(out)
        }
        (Type::Map(key_ty, value_ty), Value::Map(entries)) => {
            let depth = descend_encode(depth)?;
            let mut object = JsonMap::new();
            for (k, v) in entries {
                let key = key_to_string(encode_value(schema, key_ty, k, depth)?)?;
                object.insert(key, encode_value(schema, value_ty, v, depth)?);
            }
            json!([type_tag(key_ty), type_tag(value_ty), entries.len(), object])
        }
        (ty, value) => {
            return Err(EncodeError::TypeMismatch {
                expected: schema.type_name(ty),
                found: value.kind(),
            });
        }
    })
}

pub(crate) fn encode_struct(
    schema: &Schema,
    owner: &str,
    fields: &[FieldDef],
    record: &RecordValue,
    depth: usize,
) -> Result<Json, EncodeError> {
    check_record_for_encode(owner, fields, record)?;
    let mut object = JsonMap::new();
    for field in fields {
        if let Some(value) = record.get(field.id) {
            let mut typed = JsonMap::new();
            typed.insert(
                type_tag(&field.ty).to_string(),
                encode_value(schema, &field.ty, value, depth)?,
            );
            object.insert(field.id.to_string(), Json::Object(typed));
        }
    }
    Ok(Json::Object(object))
}

pub(crate) fn decode_value(
    schema: &Schema,
    ty: &Type,
    json: &Json,
    depth: usize,
) -> Result<Value, DecodeError> {
    Ok(match ty {
        Type::Bool => match json {
            Json::Bool(b) => Value::Bool(*b),
            _ => Value::Bool(decode_int(json, "bool", 0, 1)? == 1),
        },
        Type::Byte => Value::Byte(decode_int(json, "byte", i8::MIN as i64, i8::MAX as i64)? as i8),
        Type::I16 => Value::I16(decode_int(json, "i16", i16::MIN as i64, i16::MAX as i64)? as i16),
        Type::I32 => Value::I32(decode_int(json, "i32", i32::MIN as i64, i32::MAX as i64)? as i32),
        Type::I64 => Value::I64(decode_int(json, "i64", i64::MIN, i64::MAX)?),
        Type::Double => Value::Double(decode_double(json)?),
        Type::String => match json {
            Json::String(s) => Value::String(s.clone()),
            _ => return Err(DecodeError::mismatch("string", json_kind(json))),
        },
        Type::Enum(id) => {
            let def = enum_for_decode(schema, *id)?;
            let v = decode_int(json, "i32", i32::MIN as i64, i32::MAX as i64)? as i32;
            check_enum_member(def, v)?;
            Value::Enum(v)
        }
        Type::Record(id) => {
            let depth = descend_decode(depth)?;
            let def = record_for_decode(schema, *id)?;
            Value::Record(decode_struct(schema, &def.name, &def.fields, json, depth)?)
        }
        Type::List(elem) => {
            let depth = descend_decode(depth)?;
            Value::List(decode_elements(schema, elem, json, depth)?)
        }
        Type::Set(elem) => {
            let depth = descend_decode(depth)?;
            Value::Set(decode_elements(schema, elem, json, depth)?)
        }
        Type::Map(key_ty, value_ty) => {
            let depth = descend_decode(depth)?;
            let parts = as_array(json, "map")?;
            let [key_tag, value_tag, count, object] = parts else {
                return Err(DecodeError::Malformed(format!(
                    "map needs 4 elements, found {}",
                    parts.len()
                )));
            };
            expect_tag(key_ty, key_tag)?;
            expect_tag(value_ty, value_tag)?;
            let Json::Object(object) = object else {
                return Err(DecodeError::mismatch("json object", json_kind(object)));
            };
            expect_count(count, object.len())?;
            let mut entries = Vec::with_capacity(object.len());
            for (k, v) in object {
                let key = decode_value(schema, key_ty, &key_from_string(key_ty, k), depth)?;
                entries.push((key, decode_value(schema, value_ty, v, depth)?));
            }
            Value::Map(entries)
        }
    })
}

fn decode_elements(
    schema: &Schema,
    elem: &Type,
    json: &Json,
    depth: usize,
) -> Result<Vec<Value>, DecodeError> {
    let parts = as_array(json, "list")?;
    let [tag, count, items @ ..] = parts else {
        return Err(DecodeError::Malformed(
            "list needs a type tag and a count".into(),
        ));
    };
    expect_tag(elem, tag)?;
    expect_count(count, items.len())?;
    items
        .iter()
        .map(|item| decode_value(schema, elem, item, depth))
        .collect()
}

fn as_array<'a>(json: &'a Json, what: &str) -> Result<&'a [Json], DecodeError> {
    match json {
        Json::Array(items) => Ok(items),
        _ => Err(DecodeError::mismatch(what, json_kind(json))),
    }
}

fn expect_tag(ty: &Type, tag: &Json) -> Result<(), DecodeError> {
    let expected = type_tag(ty);
    match tag.as_str() {
        Some(found) if found == expected => Ok(()),
        Some(found) => Err(DecodeError::mismatch(expected, found)),
        None => Err(DecodeError::mismatch("type tag", json_kind(tag))),
    }
}

fn expect_count(count: &Json, actual: usize) -> Result<(), DecodeError> {
    match count.as_u64() {
        Some(n) if n == actual as u64 => Ok(()),
        _ => Err(DecodeError::Malformed(format!(
            "declared count {count} does not match {actual} elements"
        ))),
    }
}

pub(crate) fn decode_struct(
    schema: &Schema,
    owner: &str,
    fields: &[FieldDef],
    json: &Json,
    depth: usize,
) -> Result<RecordValue, DecodeError> {
    let Json::Object(object) = json else {
        return Err(DecodeError::mismatch("json object", json_kind(json)));
    };
    let mut record = RecordValue::new();
    for (key, typed) in object {
        let id: i16 = key
            .parse()
            .map_err(|_| DecodeError::Malformed(format!("field key `{key}` is not an i16")))?;
        let Some(field) = thrum_schema::field_by_id(fields, id) else {
            tracing::debug!(owner, field_id = id, "skipping unknown field");
            continue;
        };
        let Json::Object(typed) = typed else {
            return Err(DecodeError::mismatch("typed field object", json_kind(typed)));
        };
        let mut entries = typed.iter();
        let (Some((tag, inner)), None) = (entries.next(), entries.next()) else {
            return Err(DecodeError::Malformed(format!(
                "field {id} of `{owner}` must have exactly one type tag"
            )));
        };
        expect_tag(&field.ty, &Json::from(tag.as_str()))?;
        record.insert(id, decode_value(schema, &field.ty, inner, depth)?);
    }
    check_required_decoded(owner, fields, &record)?;
    Ok(record)
}

pub(crate) fn write_message(
    schema: &Schema,
    header: &MessageHeader,
    body: &BodyShape,
    values: &RecordValue,
) -> Result<Vec<u8>, EncodeError> {
    let body = encode_struct(schema, &body.owner, &body.fields, values, 0)?;
    let message = json!([VERSION, header.name, header.kind as i32, header.seqid, body]);
    to_bytes(&message)
}

/// Serialize `tree`, refusing documents nested too deeply to decode again.
pub(crate) fn to_bytes(tree: &Json) -> Result<Vec<u8>, EncodeError> {
    if nesting(tree) > MAX_NESTING {
        return Err(EncodeError::DepthLimitExceeded(MAX_NESTING));
    }
    Ok(serde_json::to_vec(tree)?)
}

fn nesting(tree: &Json) -> usize {
    let mut deepest = 0;
    let mut pending = vec![(tree, 0)];
    while let Some((json, level)) = pending.pop() {
        match json {
            Json::Array(items) => {
                deepest = deepest.max(level + 1);
                pending.extend(items.iter().map(|item| (item, level + 1)));
            }
            Json::Object(object) => {
                deepest = deepest.max(level + 1);
                pending.extend(object.values().map(|item| (item, level + 1)));
            }
            _ => {}
        }
    }
    deepest
}

pub(crate) fn read_message<F>(
    bytes: &[u8],
    schema: &Schema,
    shape: F,
) -> Result<(MessageHeader, RecordValue), DecodeError>
where
    F: FnOnce(&MessageHeader) -> Result<Option<BodyShape>, DecodeError>,
{
    let message: Json = serde_json::from_slice(bytes)?;
    let parts = as_array(&message, "message array")?;
    let [version, name, kind, seqid, body, ..] = parts else {
        return Err(DecodeError::Malformed(format!(
            "message needs 5 elements, found {}",
            parts.len()
        )));
    };
    if version.as_i64() != Some(VERSION) {
        return Err(DecodeError::Malformed(format!("unsupported json version {version}")));
    }
    let name = name
        .as_str()
        .ok_or_else(|| DecodeError::mismatch("method name", json_kind(name)))?;
    let kind = MessageType::try_from(decode_int(kind, "message type", 0, i64::MAX)?)?;
    let seqid = decode_int(seqid, "seqid", i32::MIN as i64, i32::MAX as i64)? as i32;
    let header = MessageHeader::new(name, kind, seqid);

    let values = match shape(&header)? {
        Some(shape) => decode_struct(schema, &shape.owner, &shape.fields, body, 0)?,
        None => RecordValue::new(),
    };
    Ok((header, values))
}
