//! Compact protocol: zigzag varints, field-id deltas packed with the type
//! into one byte, and bool field values folded into the field header.

use crate::error::DecodeError;
use crate::wire::{MessageHeader, MessageType, ProtocolReader, ProtocolWriter, TType, checked_count};

const PROTOCOL_ID: u8 = 0x82;
const VERSION: u8 = 1;
const VERSION_MASK: u8 = 0x1f;
const TYPE_SHIFT: u8 = 5;

const MAX_VARINT32_LEN: usize = 5;
const MAX_VARINT64_LEN: usize = 10;

const BOOL_TRUE: u8 = 1;
const BOOL_FALSE: u8 = 2;

fn compact_type(ttype: TType) -> u8 {
    match ttype {
        TType::Stop => 0,
        TType::Bool => BOOL_TRUE,
        TType::Byte => 3,
        TType::I16 => 4,
        TType::I32 => 5,
        TType::I64 => 6,
        TType::Double => 7,
        TType::String => 8,
        TType::List => 9,
        TType::Set => 10,
        TType::Map => 11,
        TType::Struct => 12,
    }
}

fn wire_type(nibble: u8) -> Result<TType, DecodeError> {
    Ok(match nibble {
        0 => TType::Stop,
        BOOL_TRUE | BOOL_FALSE => TType::Bool,
        3 => TType::Byte,
        4 => TType::I16,
        5 => TType::I32,
        6 => TType::I64,
        7 => TType::Double,
        8 => TType::String,
        9 => TType::List,
        10 => TType::Set,
        11 => TType::Map,
        12 => TType::Struct,
        _ => return Err(DecodeError::UnknownWireType(nibble)),
    })
}

fn zigzag32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

fn zigzag64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

fn unzigzag32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

fn unzigzag64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

#[derive(Default)]
pub(crate) struct CompactWriter {
    buf: Vec<u8>,
    last_field_id: i16,
    field_ids: Vec<i16>,
    pending_bool_field: Option<i16>,
}

impl CompactWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn write_varint(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    fn write_field_header(&mut self, type_nibble: u8, id: i16) {
        let delta = id.wrapping_sub(self.last_field_id);
        if id > self.last_field_id && delta <= 15 {
            self.buf.push(((delta as u8) << 4) | type_nibble);
        } else {
            self.buf.push(type_nibble);
            self.write_varint(zigzag32(id as i32) as u64);
        }
        self.last_field_id = id;
    }

    fn write_collection_begin(&mut self, elem: TType, len: usize) {
        if len <= 14 {
            self.buf.push(((len as u8) << 4) | compact_type(elem));
        } else {
            self.buf.push(0xf0 | compact_type(elem));
            self.write_varint(len as u64);
        }
    }
}

impl ProtocolWriter for CompactWriter {
    fn write_message_begin(&mut self, header: &MessageHeader) {
        self.buf.push(PROTOCOL_ID);
        self.buf
            .push((VERSION & VERSION_MASK) | ((header.kind as u8) << TYPE_SHIFT));
        self.write_varint(header.seqid as u32 as u64);
        self.write_string(&header.name);
    }

    fn write_struct_begin(&mut self) {
        self.field_ids.push(self.last_field_id);
        self.last_field_id = 0;
    }

    fn write_struct_end(&mut self) {
        self.last_field_id = self.field_ids.pop().unwrap_or_default();
    }

    fn write_field_begin(&mut self, ttype: TType, id: i16) {
        if ttype == TType::Bool {
            self.pending_bool_field = Some(id);
        } else {
            self.write_field_header(compact_type(ttype), id);
        }
    }

    fn write_field_stop(&mut self) {
        self.buf.push(0);
    }

    fn write_list_begin(&mut self, elem: TType, len: usize) {
        self.write_collection_begin(elem, len);
    }

    fn write_map_begin(&mut self, key: TType, value: TType, len: usize) {
        if len == 0 {
            self.buf.push(0);
        } else {
            self.write_varint(len as u64);
            self.buf
                .push((compact_type(key) << 4) | compact_type(value));
        }
    }

    fn write_bool(&mut self, v: bool) {
        let nibble = if v { BOOL_TRUE } else { BOOL_FALSE };
        match self.pending_bool_field.take() {
            Some(id) => self.write_field_header(nibble, id),
            None => self.buf.push(nibble),
        }
    }

    fn write_byte(&mut self, v: i8) {
        self.buf.push(v as u8);
    }

    fn write_i16(&mut self, v: i16) {
        self.write_varint(zigzag32(v as i32) as u64);
    }

    fn write_i32(&mut self, v: i32) {
        self.write_varint(zigzag32(v) as u64);
    }

    fn write_i64(&mut self, v: i64) {
        self.write_varint(zigzag64(v));
    }

    fn write_double(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_bits().to_le_bytes());
    }

    fn write_string(&mut self, v: &str) {
        self.write_varint(v.len() as u64);
        self.buf.extend_from_slice(v.as_bytes());
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

pub(crate) struct CompactReader<'a> {
    buf: &'a [u8],
    pos: usize,
    last_field_id: i16,
    field_ids: Vec<i16>,
    pending_bool: Option<bool>,
}

impl<'a> CompactReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        CompactReader {
            buf,
            pos: 0,
            last_field_id: 0,
            field_ids: Vec::new(),
            pending_bool: None,
        }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::UnexpectedEof);
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn read_varint(&mut self, max_len: usize) -> Result<u64, DecodeError> {
        let mut value: u64 = 0;
        let mut shift: u32 = 0;
        for _ in 0..max_len {
            let byte = self.read_u8()?;
            value |= ((byte & 0x7f) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
        Err(DecodeError::VarintTooLong)
    }

    fn read_varint32(&mut self) -> Result<u32, DecodeError> {
        let v = self.read_varint(MAX_VARINT32_LEN)?;
        u32::try_from(v).map_err(|_| DecodeError::IntegerOutOfRange {
            ty: "varint32",
            value: v.to_string(),
        })
    }

    fn read_len_prefixed(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.read_varint32()?;
        let len = checked_count(len as i64, 1, self.remaining())?;
        self.take(len)
    }
}

impl ProtocolReader for CompactReader<'_> {
    fn read_message_begin(&mut self) -> Result<MessageHeader, DecodeError> {
        let protocol_id = self.read_u8()?;
        if protocol_id != PROTOCOL_ID {
            return Err(DecodeError::BadVersion(protocol_id as u32));
        }
        let version_and_type = self.read_u8()?;
        if version_and_type & VERSION_MASK != VERSION {
            return Err(DecodeError::BadVersion(version_and_type as u32));
        }
        let kind = MessageType::try_from((version_and_type >> TYPE_SHIFT) as i64)?;
        let seqid = self.read_varint32()? as i32;
        let name = self.read_string()?;
        Ok(MessageHeader { name, kind, seqid })
    }

    fn read_struct_begin(&mut self) -> Result<(), DecodeError> {
        self.field_ids.push(self.last_field_id);
        self.last_field_id = 0;
        Ok(())
    }

    fn read_struct_end(&mut self) -> Result<(), DecodeError> {
        self.last_field_id = self.field_ids.pop().unwrap_or_default();
        Ok(())
    }

    fn read_field_begin(&mut self) -> Result<Option<(TType, i16)>, DecodeError> {
        let byte = self.read_u8()?;
        if byte == 0 {
            return Ok(None);
        }
        let nibble = byte & 0x0f;
        let ttype = wire_type(nibble)?;
        let delta = (byte >> 4) as i16;
        let id = if delta == 0 {
            let raw = unzigzag32(self.read_varint32()?);
            i16::try_from(raw).map_err(|_| DecodeError::IntegerOutOfRange {
                ty: "field id",
                value: raw.to_string(),
            })?
        } else {
            self.last_field_id.wrapping_add(delta)
        };
        if ttype == TType::Bool {
            self.pending_bool = Some(nibble == BOOL_TRUE);
        }
        self.last_field_id = id;
        Ok(Some((ttype, id)))
    }

    fn read_list_begin(&mut self) -> Result<(TType, usize), DecodeError> {
        let header = self.read_u8()?;
        let elem = wire_type(header & 0x0f)?;
        let short_len = header >> 4;
        let len = if short_len == 15 {
            self.read_varint32()? as i64
        } else {
            short_len as i64
        };
        Ok((elem, checked_count(len, 1, self.remaining())?))
    }

    fn read_map_begin(&mut self) -> Result<(TType, TType, usize), DecodeError> {
        let len = self.read_varint32()? as i64;
        if len == 0 {
            return Ok((TType::Stop, TType::Stop, 0));
        }
        let types = self.read_u8()?;
        let key = wire_type(types >> 4)?;
        let value = wire_type(types & 0x0f)?;
        Ok((key, value, checked_count(len, 2, self.remaining())?))
    }

    fn read_bool(&mut self) -> Result<bool, DecodeError> {
        match self.pending_bool.take() {
            Some(v) => Ok(v),
            None => Ok(self.read_u8()? == BOOL_TRUE),
        }
    }

    fn read_byte(&mut self) -> Result<i8, DecodeError> {
        Ok(self.read_u8()? as i8)
    }

    fn read_i16(&mut self) -> Result<i16, DecodeError> {
        let v = unzigzag32(self.read_varint32()?);
        i16::try_from(v).map_err(|_| DecodeError::IntegerOutOfRange {
            ty: "i16",
            value: v.to_string(),
        })
    }

    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(unzigzag32(self.read_varint32()?))
    }

    fn read_i64(&mut self) -> Result<i64, DecodeError> {
        Ok(unzigzag64(self.read_varint(MAX_VARINT64_LEN)?))
    }

    fn read_double(&mut self) -> Result<f64, DecodeError> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(f64::from_bits(u64::from_le_bytes(raw)))
    }

    fn read_string(&mut self) -> Result<String, DecodeError> {
        let bytes = self.read_len_prefixed()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }

    fn skip_binary(&mut self) -> Result<(), DecodeError> {
        self.read_len_prefixed().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zigzag() {
        let cases = [
            (0, 0),
            (-1, 1),
            (1, 2),
            (-2, 3),
            (i32::MAX, u32::MAX - 1),
            (i32::MIN, u32::MAX),
        ];
        for (n, z) in cases {
            assert_eq!(zigzag32(n), z);
            assert_eq!(unzigzag32(z), n);
        }
        assert_eq!(unzigzag64(zigzag64(i64::MIN)), i64::MIN);
        assert_eq!(unzigzag64(zigzag64(-300)), -300);
    }

    #[test]
    fn header_layout() {
        let mut w = CompactWriter::new();
        w.write_message_begin(&MessageHeader::new("ab", MessageType::Reply, 300));
        let bytes = w.into_bytes();
        assert_eq!(bytes, [0x82, 0x41, 0xac, 0x02, 0x02, b'a', b'b']);
        let header = CompactReader::new(&bytes).read_message_begin().unwrap();
        assert_eq!(header, MessageHeader::new("ab", MessageType::Reply, 300));
    }

    #[test]
    fn field_ids_use_deltas_then_long_form() {
        let mut w = CompactWriter::new();
        w.write_struct_begin();
        w.write_field_begin(TType::I32, 1);
        w.write_i32(0);
        w.write_field_begin(TType::I32, 16);
        w.write_i32(0);
        w.write_field_begin(TType::I32, 40);
        w.write_i32(0);
        w.write_field_begin(TType::I32, 2);
        w.write_i32(0);
        w.write_field_stop();
        w.write_struct_end();
        let bytes = w.into_bytes();
        assert_eq!(
            bytes,
            [
                0x15, 0x00, // delta 1
                0xf5, 0x00, // delta 15
                0x05, 0x50, 0x00, // delta 24: long form, zigzag(40) = 80
                0x05, 0x04, 0x00, // id went backwards: long form, zigzag(2) = 4
                0x00,
            ]
        );

        let mut r = CompactReader::new(&bytes);
        r.read_struct_begin().unwrap();
        let mut ids = Vec::new();
        while let Some((ttype, id)) = r.read_field_begin().unwrap() {
            assert_eq!(ttype, TType::I32);
            assert_eq!(r.read_i32().unwrap(), 0);
            ids.push(id);
        }
        assert_eq!(ids, vec![1, 16, 40, 2]);
    }

    #[test]
    fn bool_fields_fold_into_header() {
        let mut w = CompactWriter::new();
        w.write_struct_begin();
        w.write_field_begin(TType::Bool, 1);
        w.write_bool(true);
        w.write_field_begin(TType::Bool, 2);
        w.write_bool(false);
        w.write_field_stop();
        let bytes = w.into_bytes();
        assert_eq!(bytes, [0x11, 0x12, 0x00]);

        let mut r = CompactReader::new(&bytes);
        r.read_struct_begin().unwrap();
        assert_eq!(r.read_field_begin().unwrap(), Some((TType::Bool, 1)));
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_field_begin().unwrap(), Some((TType::Bool, 2)));
        assert!(!r.read_bool().unwrap());
        assert_eq!(r.read_field_begin().unwrap(), None);
    }

    #[test]
    fn nested_structs_restore_last_field_id() {
        let mut w = CompactWriter::new();
        w.write_struct_begin();
        w.write_field_begin(TType::Struct, 3);
        w.write_struct_begin();
        w.write_field_begin(TType::I32, 1);
        w.write_i32(5);
        w.write_field_stop();
        w.write_struct_end();
        w.write_field_begin(TType::I32, 4);
        w.write_i32(6);
        w.write_field_stop();
        w.write_struct_end();
        let bytes = w.into_bytes();
        // field 4 is a delta of 1 from field 3, not from the inner field 1
        assert_eq!(bytes, [0x3c, 0x15, 0x0a, 0x00, 0x15, 0x0c, 0x00]);
    }

    #[test]
    fn collection_headers() {
        let mut w = CompactWriter::new();
        w.write_list_begin(TType::String, 3);
        w.write_list_begin(TType::I32, 15);
        w.write_map_begin(TType::String, TType::Bool, 0);
        w.write_map_begin(TType::String, TType::Bool, 2);
        let bytes = w.into_bytes();
        assert_eq!(bytes, [0x38, 0xf5, 0x0f, 0x00, 0x02, 0x81]);
    }

    #[test]
    fn overlong_varint_rejected() {
        let bytes = [0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        assert!(matches!(
            CompactReader::new(&bytes).read_i32(),
            Err(DecodeError::VarintTooLong)
        ));
    }

    #[test]
    fn hostile_collection_length_rejected() {
        // list header claiming 2^28 elements with nothing after it
        let bytes = [0xf5, 0x80, 0x80, 0x80, 0x80, 0x01];
        assert!(matches!(
            CompactReader::new(&bytes).read_list_begin(),
            Err(DecodeError::InvalidLength(_))
        ));
    }

    #[test]
    fn doubles_are_little_endian() {
        let mut w = CompactWriter::new();
        w.write_double(1.0);
        let bytes = w.into_bytes();
        assert_eq!(bytes, [0, 0, 0, 0, 0, 0, 0xf0, 0x3f]);
        assert_eq!(CompactReader::new(&bytes).read_double().unwrap(), 1.0);
    }
}
