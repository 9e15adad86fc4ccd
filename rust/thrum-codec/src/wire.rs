//! Shared model of the field-tagged binary protocols.
//!
//! [`ProtocolWriter`] and [`ProtocolReader`] are the primitive operations of
//! a field-tagged protocol. The schema-driven walkers in this module turn a
//! [`Value`] into a sequence of those operations and back, so the binary and
//! compact protocols only implement byte layout.

use std::fmt;

use thrum_schema::{EnumDef, EnumId, FieldDef, RecordDef, RecordId, Requiredness, Schema, Type};

use crate::error::{DecodeError, EncodeError};
use crate::value::{RecordValue, Value};

/// Maximum nesting of records and containers, on both encode and decode.
pub const MAX_DEPTH: usize = 64;

/// Wire type ids of the binary protocol.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TType {
    Stop = 0,
    Bool = 2,
    Byte = 3,
    Double = 4,
    I16 = 6,
    I32 = 8,
    I64 = 10,
    String = 11,
    Struct = 12,
    Map = 13,
    Set = 14,
    List = 15,
}

impl TType {
    /// Wire type that carries values of `ty`. Enums travel as i32.
    pub fn of(ty: &Type) -> TType {
        match ty {
            Type::Bool => TType::Bool,
            Type::Byte => TType::Byte,
            Type::I16 => TType::I16,
            Type::I32 | Type::Enum(_) => TType::I32,
            Type::I64 => TType::I64,
            Type::Double => TType::Double,
            Type::String => TType::String,
            Type::Record(_) => TType::Struct,
            Type::List(_) => TType::List,
            Type::Set(_) => TType::Set,
            Type::Map(_, _) => TType::Map,
        }
    }
}

impl TryFrom<u8> for TType {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Ok(match v {
            0 => TType::Stop,
            2 => TType::Bool,
            3 => TType::Byte,
            4 => TType::Double,
            6 => TType::I16,
            8 => TType::I32,
            10 => TType::I64,
            11 => TType::String,
            12 => TType::Struct,
            13 => TType::Map,
            14 => TType::Set,
            15 => TType::List,
            _ => return Err(DecodeError::UnknownWireType(v)),
        })
    }
}

impl fmt::Display for TType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TType::Stop => "stop",
            TType::Bool => "bool",
            TType::Byte => "byte",
            TType::Double => "double",
            TType::I16 => "i16",
            TType::I32 => "i32",
            TType::I64 => "i64",
            TType::String => "string",
            TType::Struct => "struct",
            TType::Map => "map",
            TType::Set => "set",
            TType::List => "list",
        };
        f.write_str(name)
    }
}

/// Kind of message in an envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageType {
    /// A request that expects a reply.
    Call = 1,
    /// A handler's return value.
    Reply = 2,
    /// A failure reported instead of a reply.
    Exception = 3,
    /// A request with no reply.
    Oneway = 4,
}

impl MessageType {
    /// Upper-case name used by the text format.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Call => "CALL",
            MessageType::Reply => "REPLY",
            MessageType::Exception => "EXCEPTION",
            MessageType::Oneway => "ONEWAY",
        }
    }

    pub fn from_name(name: &str) -> Option<MessageType> {
        match name.to_ascii_uppercase().as_str() {
            "CALL" => Some(MessageType::Call),
            "REPLY" => Some(MessageType::Reply),
            "EXCEPTION" => Some(MessageType::Exception),
            "ONEWAY" => Some(MessageType::Oneway),
            _ => None,
        }
    }
}

impl TryFrom<i64> for MessageType {
    type Error = DecodeError;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(MessageType::Call),
            2 => Ok(MessageType::Reply),
            3 => Ok(MessageType::Exception),
            4 => Ok(MessageType::Oneway),
            _ => Err(DecodeError::InvalidMessageType(v)),
        }
    }
}

/// Method name, message type and sequence id of an envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageHeader {
    pub name: String,
    pub kind: MessageType,
    pub seqid: i32,
}

impl MessageHeader {
    pub fn new(name: impl Into<String>, kind: MessageType, seqid: i32) -> Self {
        MessageHeader {
            name: name.into(),
            kind,
            seqid,
        }
    }
}

/// Struct layout a message body is read or written against.
#[derive(Clone, Debug)]
pub(crate) struct BodyShape {
    pub owner: String,
    pub fields: Vec<FieldDef>,
}

pub(crate) trait ProtocolWriter {
    fn write_message_begin(&mut self, header: &MessageHeader);
    fn write_struct_begin(&mut self) {}
    fn write_struct_end(&mut self) {}
    fn write_field_begin(&mut self, ttype: TType, id: i16);
    fn write_field_stop(&mut self);
    fn write_list_begin(&mut self, elem: TType, len: usize);
    fn write_set_begin(&mut self, elem: TType, len: usize) {
        self.write_list_begin(elem, len);
    }
    fn write_map_begin(&mut self, key: TType, value: TType, len: usize);
    fn write_bool(&mut self, v: bool);
    fn write_byte(&mut self, v: i8);
    fn write_i16(&mut self, v: i16);
    fn write_i32(&mut self, v: i32);
    fn write_i64(&mut self, v: i64);
    fn write_double(&mut self, v: f64);
    fn write_string(&mut self, v: &str);
    fn into_bytes(self) -> Vec<u8>;
}

pub(crate) trait ProtocolReader {
    fn read_message_begin(&mut self) -> Result<MessageHeader, DecodeError>;
    fn read_struct_begin(&mut self) -> Result<(), DecodeError> {
        Ok(())
    }
    fn read_struct_end(&mut self) -> Result<(), DecodeError> {
        Ok(())
    }
    /// `None` at the end of a struct.
    fn read_field_begin(&mut self) -> Result<Option<(TType, i16)>, DecodeError>;
    fn read_list_begin(&mut self) -> Result<(TType, usize), DecodeError>;
    fn read_set_begin(&mut self) -> Result<(TType, usize), DecodeError> {
        self.read_list_begin()
    }
    /// Key and value types are unspecified when the map is empty.
    fn read_map_begin(&mut self) -> Result<(TType, TType, usize), DecodeError>;
    fn read_bool(&mut self) -> Result<bool, DecodeError>;
    fn read_byte(&mut self) -> Result<i8, DecodeError>;
    fn read_i16(&mut self) -> Result<i16, DecodeError>;
    fn read_i32(&mut self) -> Result<i32, DecodeError>;
    fn read_i64(&mut self) -> Result<i64, DecodeError>;
    fn read_double(&mut self) -> Result<f64, DecodeError>;
    fn read_string(&mut self) -> Result<String, DecodeError>;
    fn skip_binary(&mut self) -> Result<(), DecodeError>;
}

/// Validate a wire element count against the bytes left in the input.
pub(crate) fn checked_count(
    count: i64,
    min_elem_bytes: usize,
    remaining: usize,
) -> Result<usize, DecodeError> {
    let n = usize::try_from(count).map_err(|_| DecodeError::InvalidLength(count))?;
    if n.saturating_mul(min_elem_bytes) > remaining {
        return Err(DecodeError::InvalidLength(count));
    }
    Ok(n)
}

pub(crate) fn checked_len(len: usize) -> Result<usize, EncodeError> {
    if len > i32::MAX as usize {
        return Err(EncodeError::TooLong(len));
    }
    Ok(len)
}

pub(crate) fn descend_encode(depth: usize) -> Result<usize, EncodeError> {
    if depth >= MAX_DEPTH {
        return Err(EncodeError::DepthLimitExceeded(MAX_DEPTH));
    }
    Ok(depth + 1)
}

pub(crate) fn descend_decode(depth: usize) -> Result<usize, DecodeError> {
    if depth >= MAX_DEPTH {
        return Err(DecodeError::DepthLimitExceeded(MAX_DEPTH));
    }
    Ok(depth + 1)
}

pub(crate) fn record_for_encode(schema: &Schema, id: RecordId) -> Result<&RecordDef, EncodeError> {
    schema
        .record(id)
        .ok_or_else(|| EncodeError::UnknownType(id.to_string()))
}

pub(crate) fn record_for_decode(schema: &Schema, id: RecordId) -> Result<&RecordDef, DecodeError> {
    schema
        .record(id)
        .ok_or_else(|| DecodeError::UnknownType(id.to_string()))
}

pub(crate) fn enum_for_encode(
    schema: &Schema,
    id: EnumId,
    value: i32,
) -> Result<&EnumDef, EncodeError> {
    let def = schema
        .enum_def(id)
        .ok_or_else(|| EncodeError::UnknownType(id.to_string()))?;
    if !def.contains(value) {
        return Err(EncodeError::InvalidEnumValue {
            enum_name: def.name.clone(),
            value,
        });
    }
    Ok(def)
}

pub(crate) fn enum_for_decode(schema: &Schema, id: EnumId) -> Result<&EnumDef, DecodeError> {
    schema
        .enum_def(id)
        .ok_or_else(|| DecodeError::UnknownType(id.to_string()))
}

pub(crate) fn check_enum_member(def: &EnumDef, value: i32) -> Result<(), DecodeError> {
    if def.contains(value) {
        Ok(())
    } else {
        Err(DecodeError::InvalidEnumValue {
            enum_name: def.name.clone(),
            value,
        })
    }
}

/// Every field of `record` must be declared, every required field present.
pub(crate) fn check_record_for_encode(
    owner: &str,
    fields: &[FieldDef],
    record: &RecordValue,
) -> Result<(), EncodeError> {
    if let Some((id, _)) = record
        .iter()
        .find(|(id, _)| thrum_schema::field_by_id(fields, *id).is_none())
    {
        return Err(EncodeError::UnknownField {
            owner: owner.to_string(),
            id,
        });
    }
    if let Some(field) = fields
        .iter()
        .find(|f| f.requiredness == Requiredness::Required && !record.contains(f.id))
    {
        return Err(EncodeError::MissingRequiredField {
            owner: owner.to_string(),
            field: field.name.clone(),
        });
    }
    Ok(())
}

pub(crate) fn check_required_decoded(
    owner: &str,
    fields: &[FieldDef],
    record: &RecordValue,
) -> Result<(), DecodeError> {
    match fields
        .iter()
        .find(|f| f.requiredness == Requiredness::Required && !record.contains(f.id))
    {
        Some(field) => Err(DecodeError::MissingRequiredField {
            owner: owner.to_string(),
            field: field.name.clone(),
        }),
        None => Ok(()),
    }
}

pub(crate) fn write_value<W: ProtocolWriter>(
    w: &mut W,
    schema: &Schema,
    ty: &Type,
    value: &Value,
    depth: usize,
) -> Result<(), EncodeError> {
    match (ty, value) {
        (Type::Bool, Value::Bool(v)) => w.write_bool(*v),
        (Type::Byte, Value::Byte(v)) => w.write_byte(*v),
        (Type::I16, Value::I16(v)) => w.write_i16(*v),
        (Type::I32, Value::I32(v)) => w.write_i32(*v),
        (Type::I64, Value::I64(v)) => w.write_i64(*v),
        (Type::Double, Value::Double(v)) => w.write_double(*v),
        (Type::String, Value::String(v)) => {
            checked_len(v.len())?;
            w.write_string(v);
        }
        (Type::Enum(id), Value::Enum(v)) => {
            enum_for_encode(schema, *id, *v)?;
            w.write_i32(*v);
        }
        (Type::Record(id), Value::Record(record)) => {
            let depth = descend_encode(depth)?;
            let def = record_for_encode(schema, *id)?;
            write_struct(w, schema, &def.name, &def.fields, record, depth)?;
        }
        (Type::List(elem), Value::List(items)) => {
            let depth = descend_encode(depth)?;
            w.write_list_begin(TType::of(elem), checked_len(items.len())?);
            for item in items {
                write_value(w, schema, elem, item, depth)?;
            }
        }
        (Type::Set(elem), Value::Set(items)) => {
            let depth = descend_encode(depth)?;
            w.write_set_begin(TType::of(elem), checked_len(items.len())?);
            for item in items {
                write_value(w, schema, elem, item, depth)?;
            }
        }
        (Type::Map(key_ty, value_ty), Value::Map(entries)) => {
            let depth = descend_encode(depth)?;
            w.write_map_begin(TType::of(key_ty), TType::of(value_ty), checked_len(entries.len())?);
            for (k, v) in entries {
                write_value(w, schema, key_ty, k, depth)?;
                write_value(w, schema, value_ty, v, depth)?;
            }
        }
        (ty, value) => {
            return Err(EncodeError::TypeMismatch {
                expected: schema.type_name(ty),
                found: value.kind(),
            });
        }
    }
    Ok(())
}

/// Write `record` as a struct, fields in declaration order.
pub(crate) fn write_struct<W: ProtocolWriter>(
    w: &mut W,
    schema: &Schema,
    owner: &str,
    fields: &[FieldDef],
    record: &RecordValue,
    depth: usize,
) -> Result<(), EncodeError> {
    check_record_for_encode(owner, fields, record)?;
    w.write_struct_begin();
    for field in fields {
        if let Some(value) = record.get(field.id) {
            w.write_field_begin(TType::of(&field.ty), field.id);
            write_value(w, schema, &field.ty, value, depth)?;
        }
    }
    w.write_field_stop();
    w.write_struct_end();
    Ok(())
}

pub(crate) fn read_value<R: ProtocolReader>(
    r: &mut R,
    schema: &Schema,
    ty: &Type,
    depth: usize,
) -> Result<Value, DecodeError> {
    Ok(match ty {
        Type::Bool => Value::Bool(r.read_bool()?),
        Type::Byte => Value::Byte(r.read_byte()?),
        Type::I16 => Value::I16(r.read_i16()?),
        Type::I32 => Value::I32(r.read_i32()?),
        Type::I64 => Value::I64(r.read_i64()?),
        Type::Double => Value::Double(r.read_double()?),
        Type::String => Value::String(r.read_string()?),
        Type::Enum(id) => {
            let def = enum_for_decode(schema, *id)?;
            let v = r.read_i32()?;
            check_enum_member(def, v)?;
            Value::Enum(v)
        }
        Type::Record(id) => {
            let depth = descend_decode(depth)?;
            let def = record_for_decode(schema, *id)?;
            Value::Record(read_struct(r, schema, &def.name, &def.fields, depth)?)
        }
        Type::List(elem) => {
            let depth = descend_decode(depth)?;
            let (wire, len) = r.read_list_begin()?;
            Value::List(read_elements(r, schema, elem, wire, len, depth)?)
        }
        Type::Set(elem) => {
            let depth = descend_decode(depth)?;
            let (wire, len) = r.read_set_begin()?;
            Value::Set(read_elements(r, schema, elem, wire, len, depth)?)
        }
        Type::Map(key_ty, value_ty) => {
            let depth = descend_decode(depth)?;
            let (key_wire, value_wire, len) = r.read_map_begin()?;
            if len > 0 {
                expect_wire(key_ty, key_wire)?;
                expect_wire(value_ty, value_wire)?;
            }
            let mut entries = Vec::with_capacity(len);
            for _ in 0..len {
                let k = read_value(r, schema, key_ty, depth)?;
                let v = read_value(r, schema, value_ty, depth)?;
                entries.push((k, v));
            }
            Value::Map(entries)
        }
    })
}

fn read_elements<R: ProtocolReader>(
    r: &mut R,
    schema: &Schema,
    elem: &Type,
    wire: TType,
    len: usize,
    depth: usize,
) -> Result<Vec<Value>, DecodeError> {
    if len > 0 {
        expect_wire(elem, wire)?;
    }
    let mut items = Vec::with_capacity(len);
    for _ in 0..len {
        items.push(read_value(r, schema, elem, depth)?);
    }
    Ok(items)
}

fn expect_wire(ty: &Type, found: TType) -> Result<(), DecodeError> {
    let expected = TType::of(ty);
    if expected != found {
        return Err(DecodeError::mismatch(expected.to_string(), found.to_string()));
    }
    Ok(())
}

/// Read a struct against `fields`. Unknown field ids are skipped.
pub(crate) fn read_struct<R: ProtocolReader>(
    r: &mut R,
    schema: &Schema,
    owner: &str,
    fields: &[FieldDef],
    depth: usize,
) -> Result<RecordValue, DecodeError> {
    r.read_struct_begin()?;
    let mut record = RecordValue::new();
    while let Some((wire, id)) = r.read_field_begin()? {
        match thrum_schema::field_by_id(fields, id) {
            Some(field) => {
                expect_wire(&field.ty, wire)?;
                let value = read_value(r, schema, &field.ty, depth)?;
                record.insert(id, value);
            }
            None => {
                tracing::debug!(owner, field_id = id, wire_type = %wire, "skipping unknown field");
                skip(r, wire, depth)?;
            }
        }
    }
    r.read_struct_end()?;
    check_required_decoded(owner, fields, &record)?;
    Ok(record)
}

/// Consume one value of wire type `wire` without interpreting it.
pub(crate) fn skip<R: ProtocolReader>(
    r: &mut R,
    wire: TType,
    depth: usize,
) -> Result<(), DecodeError> {
    match wire {
        TType::Stop => return Err(DecodeError::Malformed("stop is not a value type".into())),
        TType::Bool => {
            r.read_bool()?;
        }
        TType::Byte => {
            r.read_byte()?;
        }
        TType::I16 => {
            r.read_i16()?;
        }
        TType::I32 => {
            r.read_i32()?;
        }
        TType::I64 => {
            r.read_i64()?;
        }
        TType::Double => {
            r.read_double()?;
        }
        TType::String => r.skip_binary()?,
        TType::Struct => {
            let depth = descend_decode(depth)?;
            r.read_struct_begin()?;
            while let Some((field_wire, _)) = r.read_field_begin()? {
                skip(r, field_wire, depth)?;
            }
            r.read_struct_end()?;
        }
        TType::List | TType::Set => {
            let depth = descend_decode(depth)?;
            let (elem, len) = if wire == TType::List {
                r.read_list_begin()?
            } else {
                r.read_set_begin()?
            };
            for _ in 0..len {
                skip(r, elem, depth)?;
            }
        }
        TType::Map => {
            let depth = descend_decode(depth)?;
            let (key, value, len) = r.read_map_begin()?;
            for _ in 0..len {
                skip(r, key, depth)?;
                skip(r, value, depth)?;
            }
        }
    }
    Ok(())
}

/// Write a full message: header plus one struct body.
pub(crate) fn write_message<W: ProtocolWriter>(
    mut w: W,
    schema: &Schema,
    header: &MessageHeader,
    body: &BodyShape,
    values: &RecordValue,
) -> Result<Vec<u8>, EncodeError> {
    checked_len(header.name.len())?;
    w.write_message_begin(header);
    write_struct(&mut w, schema, &body.owner, &body.fields, values, 0)?;
    Ok(w.into_bytes())
}

/// Read a full message. `shape` picks the body layout from the header;
/// `None` skips the body and yields an empty record.
pub(crate) fn read_message<R, F>(
    mut r: R,
    schema: &Schema,
    shape: F,
) -> Result<(MessageHeader, RecordValue), DecodeError>
where
    R: ProtocolReader,
    F: FnOnce(&MessageHeader) -> Result<Option<BodyShape>, DecodeError>,
{
    let header = r.read_message_begin()?;
    let values = match shape(&header)? {
        Some(body) => read_struct(&mut r, schema, &body.owner, &body.fields, 0)?,
        None => {
            skip(&mut r, TType::Struct, 0)?;
            RecordValue::new()
        }
    };
    Ok((header, values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_type_ids_round_trip() {
        for t in [
            TType::Stop,
            TType::Bool,
            TType::Byte,
            TType::Double,
            TType::I16,
            TType::I32,
            TType::I64,
            TType::String,
            TType::Struct,
            TType::Map,
            TType::Set,
            TType::List,
        ] {
            assert_eq!(TType::try_from(t as u8).unwrap(), t);
        }
        assert!(matches!(TType::try_from(1), Err(DecodeError::UnknownWireType(1))));
        assert!(matches!(TType::try_from(16), Err(DecodeError::UnknownWireType(16))));
    }

    #[test]
    fn enums_travel_as_i32() {
        assert_eq!(TType::of(&Type::Enum(EnumId(0))), TType::I32);
        assert_eq!(TType::of(&Type::list(Type::Bool)), TType::List);
    }

    #[test]
    fn message_type_names() {
        assert_eq!(MessageType::Exception.as_str(), "EXCEPTION");
        assert_eq!(MessageType::from_name("reply"), Some(MessageType::Reply));
        assert_eq!(MessageType::from_name("bogus"), None);
        assert!(matches!(
            MessageType::try_from(9),
            Err(DecodeError::InvalidMessageType(9))
        ));
    }

    #[test]
    fn count_validation() {
        assert_eq!(checked_count(3, 1, 3).unwrap(), 3);
        assert!(matches!(checked_count(-1, 1, 100), Err(DecodeError::InvalidLength(-1))));
        assert!(matches!(checked_count(4, 2, 7), Err(DecodeError::InvalidLength(4))));
        assert!(checked_count(i32::MAX as i64, 1, 16).is_err());
    }

    #[test]
    fn depth_limit() {
        assert_eq!(descend_decode(0).unwrap(), 1);
        assert!(descend_decode(MAX_DEPTH - 1).is_ok());
        assert!(matches!(
            descend_decode(MAX_DEPTH),
            Err(DecodeError::DepthLimitExceeded(MAX_DEPTH))
        ));
        assert!(descend_encode(MAX_DEPTH).is_err());
    }
}
