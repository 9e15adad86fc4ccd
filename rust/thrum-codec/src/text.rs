//! Text protocol: plain JSON keyed by field name, enums by member name.
//!
//! ```json
//! {"method":"simpleCall","type":"CALL","seqid":1,"args":{"id":"ID"}}
//! ```

use serde_json::{Map as JsonMap, Value as Json, json};
use thrum_schema::{FieldDef, Schema, Type};

use crate::error::{DecodeError, EncodeError};
use crate::json::{
    decode_double, decode_int, encode_double, json_kind, key_from_string, key_to_string, to_bytes,
};
use crate::value::{RecordValue, Value};
use crate::wire::{
    BodyShape, MessageHeader, MessageType, check_enum_member, check_record_for_encode,
    check_required_decoded, descend_decode, descend_encode, enum_for_decode, enum_for_encode,
    record_for_decode, record_for_encode,
};

pub(crate) fn encode_value(
    schema: &Schema,
    ty: &Type,
    value: &Value,
    depth: usize,
) -> Result<Json, EncodeError> {
    Ok(match (ty, value) {
        (Type::Bool, Value::Bool(v)) => Json::Bool(*v),
        (Type::Byte, Value::Byte(v)) => Json::from(*v),
        (Type::I16, Value::I16(v)) => Json::from(*v),
        (Type::I32, Value::I32(v)) => Json::from(*v),
        (Type::I64, Value::I64(v)) => Json::from(*v),
        (Type::Double, Value::Double(v)) => encode_double(*v),
        (Type::String, Value::String(v)) => Json::from(v.as_str()),
        (Type::Enum(id), Value::Enum(v)) => {
            let def = enum_for_encode(schema, *id, *v)?;
            match def.name_of(*v) {
                Some(name) => Json::from(name),
                None => Json::from(*v),
            }
        }
        (Type::Record(id), Value::Record(record)) => {
            let depth = descend_encode(depth)?;
            let def = record_for_encode(schema, *id)?;
            encode_struct(schema, &def.name, &def.fields, record, depth)?
        }
        (Type::List(elem), Value::List(items)) | (Type::Set(elem), Value::Set(items)) => {
            let depth = descend_encode(depth)?;
            Json::Array(
                items
                    .iter()
                    .map(|item| encode_value(schema, elem, item, depth))
                    .collect::<Result<_, _>>()?,
            )
        }
        (Type::Map(key_ty, value_ty), Value::Map(entries)) => {
            let depth = descend_encode(depth)?;
            let mut object = JsonMap::new();
            for (k, v) in entries {
                let key = key_to_string(encode_value(schema, key_ty, k, depth)?)?;
                object.insert(key, encode_value(schema, value_ty, v, depth)?);
            }
            Json::Object(object)
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
            object.insert(field.name.clone(), encode_value(schema, &field.ty, value, depth)?);
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
            _ => return Err(DecodeError::mismatch("bool", json_kind(json))),
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
            match json {
                Json::String(name) => {
                    let v = def.value_of(name).ok_or_else(|| DecodeError::UnknownEnumName {
                        enum_name: def.name.clone(),
                        name: name.clone(),
                    })?;
                    Value::Enum(v)
                }
                _ => {
                    let v = decode_int(json, "i32", i32::MIN as i64, i32::MAX as i64)? as i32;
                    check_enum_member(def, v)?;
                    Value::Enum(v)
                }
            }
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
            let Json::Object(object) = json else {
                return Err(DecodeError::mismatch("map object", json_kind(json)));
            };
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
    let Json::Array(items) = json else {
        return Err(DecodeError::mismatch("array", json_kind(json)));
    };
    items
        .iter()
        .map(|item| decode_value(schema, elem, item, depth))
        .collect()
}

/// Decode an object keyed by field name. Unknown names are skipped.
pub(crate) fn decode_struct(
    schema: &Schema,
    owner: &str,
    fields: &[FieldDef],
    json: &Json,
    depth: usize,
) -> Result<RecordValue, DecodeError> {
    let Json::Object(object) = json else {
        return Err(DecodeError::mismatch("object", json_kind(json)));
    };
    let mut record = RecordValue::new();
    for (name, value) in object {
        match thrum_schema::field_by_name(fields, name) {
            Some(field) => {
                record.insert(field.id, decode_value(schema, &field.ty, value, depth)?);
            }
            None => tracing::debug!(owner, field = %name, "skipping unknown field"),
        }
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
    let args = encode_struct(schema, &body.owner, &body.fields, values, 0)?;
    let message = json!({
        "method": header.name,
        "type": header.kind.as_str(),
        "seqid": header.seqid,
        "args": args,
    });
    to_bytes(&message)
}

pub(crate) fn read_message<F>(
    bytes: &[u8],
    schema: &Schema,
    shape: F,
) -> Result<(MessageHeader, RecordValue), DecodeError>
where
    F: FnOnce(&MessageHeader) -> Result<Option<BodyShape>, DecodeError>,
{
    let message: JsonMap<String, Json> = serde_json::from_slice(bytes)?;
    let name = message
        .get("method")
        .and_then(Json::as_str)
        .ok_or_else(|| DecodeError::Malformed("missing \"method\"".into()))?;
    let kind = message
        .get("type")
        .and_then(Json::as_str)
        .ok_or_else(|| DecodeError::Malformed("missing \"type\"".into()))?;
    let kind = MessageType::from_name(kind)
        .ok_or_else(|| DecodeError::Malformed(format!("unknown message type `{kind}`")))?;
    let seqid = match message.get("seqid") {
        Some(seqid) => decode_int(seqid, "seqid", i32::MIN as i64, i32::MAX as i64)? as i32,
        None => 0,
    };
    let header = MessageHeader::new(name, kind, seqid);

    let empty = Json::Object(JsonMap::new());
    let args = message.get("args").unwrap_or(&empty);
    let values = match shape(&header)? {
        Some(shape) => decode_struct(schema, &shape.owner, &shape.fields, args, 0)?,
        None => RecordValue::new(),
    };
    Ok((header, values))
}
