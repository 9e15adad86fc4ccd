use thrum_schema::{Schema, Type};

use crate::binary::{BinaryReader, BinaryWriter};
use crate::compact::{CompactReader, CompactWriter};
use crate::error::{DecodeError, EncodeError};
use crate::format::Format;
use crate::value::Value;
use crate::wire::{ProtocolWriter, read_value, write_value};
use crate::{json, text};

/// Encode a bare value of type `ty`, without a message envelope.
pub fn encode(
    schema: &Schema,
    ty: &Type,
    value: &Value,
    format: Format,
) -> Result<Vec<u8>, EncodeError> {
    match format {
        Format::Binary => {
            let mut w = BinaryWriter::new();
            write_value(&mut w, schema, ty, value, 0)?;
            Ok(w.into_bytes())
        }
        Format::Compact => {
            let mut w = CompactWriter::new();
            write_value(&mut w, schema, ty, value, 0)?;
            Ok(w.into_bytes())
        }
        Format::Json => json::to_bytes(&json::encode_value(schema, ty, value, 0)?),
        Format::Text => json::to_bytes(&text::encode_value(schema, ty, value, 0)?),
    }
}

/// Decode a bare value of type `ty`.
pub fn decode(
    schema: &Schema,
    ty: &Type,
    bytes: &[u8],
    format: Format,
) -> Result<Value, DecodeError> {
    match format {
        Format::Binary => read_value(&mut BinaryReader::new(bytes), schema, ty, 0),
        Format::Compact => read_value(&mut CompactReader::new(bytes), schema, ty, 0),
        Format::Json => {
            let tree: serde_json::Value = serde_json::from_slice(bytes)?;
            json::decode_value(schema, ty, &tree, 0)
        }
        Format::Text => {
            let tree: serde_json::Value = serde_json::from_slice(bytes)?;
            text::decode_value(schema, ty, &tree, 0)
        }
    }
}
