//! Binary protocol: big-endian fixed-width integers, `i32` length prefixes,
//! one type byte and an `i16` id per field.

use crate::error::DecodeError;
use crate::wire::{MessageHeader, MessageType, ProtocolReader, ProtocolWriter, TType, checked_count};

const VERSION_1: u32 = 0x8001_0000;
const VERSION_MASK: u32 = 0xffff_0000;

#[derive(Default)]
pub(crate) struct BinaryWriter {
    buf: Vec<u8>,
}

impl BinaryWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

impl ProtocolWriter for BinaryWriter {
    fn write_message_begin(&mut self, header: &MessageHeader) {
        self.write_i32((VERSION_1 | header.kind as u32) as i32);
        self.write_string(&header.name);
        self.write_i32(header.seqid);
    }

    fn write_field_begin(&mut self, ttype: TType, id: i16) {
        self.buf.push(ttype as u8);
        self.write_i16(id);
    }

    fn write_field_stop(&mut self) {
        self.buf.push(TType::Stop as u8);
    }

    fn write_list_begin(&mut self, elem: TType, len: usize) {
        self.buf.push(elem as u8);
        self.write_i32(len as i32);
    }

    fn write_map_begin(&mut self, key: TType, value: TType, len: usize) {
        self.buf.push(key as u8);
        self.buf.push(value as u8);
        self.write_i32(len as i32);
    }

    fn write_bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }

    fn write_byte(&mut self, v: i8) {
        self.buf.push(v as u8);
    }

    fn write_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn write_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn write_double(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_bits().to_be_bytes());
    }

    fn write_string(&mut self, v: &str) {
        self.write_i32(v.len() as i32);
        self.buf.extend_from_slice(v.as_bytes());
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

pub(crate) struct BinaryReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        BinaryReader { buf, pos: 0 }
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

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn read_ttype(&mut self) -> Result<TType, DecodeError> {
        TType::try_from(self.read_u8()?)
    }

    /// Length-prefixed byte run, validated against the remaining input.
    fn read_len_prefixed(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.read_i32()?;
        let len = checked_count(len as i64, 1, self.remaining())?;
        self.take(len)
    }
}

impl ProtocolReader for BinaryReader<'_> {
    /// Accepts the strict versioned header and the legacy header that starts
    /// with the name length.
    fn read_message_begin(&mut self) -> Result<MessageHeader, DecodeError> {
        let first = self.read_i32()?;
        if first < 0 {
            let word = first as u32;
            if word & VERSION_MASK != VERSION_1 {
                return Err(DecodeError::BadVersion(word));
            }
            let kind = MessageType::try_from((word & 0xff) as i64)?;
            let name = self.read_string()?;
            let seqid = self.read_i32()?;
            Ok(MessageHeader { name, kind, seqid })
        } else {
            let len = checked_count(first as i64, 1, self.remaining())?;
            let name = std::str::from_utf8(self.take(len)?)
                .map_err(|_| DecodeError::InvalidUtf8)?
                .to_string();
            let kind = MessageType::try_from(self.read_u8()? as i64)?;
            let seqid = self.read_i32()?;
            Ok(MessageHeader { name, kind, seqid })
        }
    }

    fn read_field_begin(&mut self) -> Result<Option<(TType, i16)>, DecodeError> {
        match self.read_ttype()? {
            TType::Stop => Ok(None),
            ttype => Ok(Some((ttype, self.read_i16()?))),
        }
    }

    fn read_list_begin(&mut self) -> Result<(TType, usize), DecodeError> {
        let elem = self.read_ttype()?;
        let len = self.read_i32()?;
        Ok((elem, checked_count(len as i64, 1, self.remaining())?))
    }

    fn read_map_begin(&mut self) -> Result<(TType, TType, usize), DecodeError> {
        let key = self.read_ttype()?;
        let value = self.read_ttype()?;
        let len = self.read_i32()?;
        Ok((key, value, checked_count(len as i64, 2, self.remaining())?))
    }

    fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_u8()? != 0)
    }

    fn read_byte(&mut self) -> Result<i8, DecodeError> {
        Ok(self.read_u8()? as i8)
    }

    fn read_i16(&mut self) -> Result<i16, DecodeError> {
        Ok(i16::from_be_bytes(self.take_array()?))
    }

    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    fn read_i64(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    fn read_double(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_bits(u64::from_be_bytes(self.take_array()?)))
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
    fn strict_header_layout() {
        let mut w = BinaryWriter::new();
        w.write_message_begin(&MessageHeader::new("ping", MessageType::Call, 7));
        let bytes = w.into_bytes();
        assert_eq!(
            bytes,
            [
                0x80, 0x01, 0x00, 0x01, // version | CALL
                0, 0, 0, 4, b'p', b'i', b'n', b'g', // name
                0, 0, 0, 7, // seqid
            ]
        );

        let header = BinaryReader::new(&bytes).read_message_begin().unwrap();
        assert_eq!(header, MessageHeader::new("ping", MessageType::Call, 7));
    }

    #[test]
    fn legacy_header_accepted() {
        let bytes = [0, 0, 0, 2, b'h', b'i', 2, 0, 0, 1, 0];
        let header = BinaryReader::new(&bytes).read_message_begin().unwrap();
        assert_eq!(header, MessageHeader::new("hi", MessageType::Reply, 256));
    }

    #[test]
    fn bad_version_rejected() {
        let bytes = [0x80, 0x02, 0x00, 0x01, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            BinaryReader::new(&bytes).read_message_begin(),
            Err(DecodeError::BadVersion(0x8002_0001))
        ));
    }

    #[test]
    fn hostile_lengths_rejected() {
        // string claiming 2 GiB with four bytes of input left
        let bytes = [0x7f, 0xff, 0xff, 0xff, b'a', b'b', b'c', b'd'];
        assert!(matches!(
            BinaryReader::new(&bytes).read_string(),
            Err(DecodeError::InvalidLength(_))
        ));

        let bytes = [0xff, 0xff, 0xff, 0xff];
        assert!(matches!(
            BinaryReader::new(&bytes).read_string(),
            Err(DecodeError::InvalidLength(-1))
        ));

        // list of one billion i32s
        let bytes = [TType::I32 as u8, 0x3b, 0x9a, 0xca, 0x00];
        assert!(matches!(
            BinaryReader::new(&bytes).read_list_begin(),
            Err(DecodeError::InvalidLength(1_000_000_000))
        ));
    }

    #[test]
    fn scalars_are_big_endian() {
        let mut w = BinaryWriter::new();
        w.write_i16(-2);
        w.write_i64(1);
        w.write_double(1.5);
        let bytes = w.into_bytes();
        assert_eq!(&bytes[..2], &[0xff, 0xfe]);
        assert_eq!(&bytes[2..10], &[0, 0, 0, 0, 0, 0, 0, 1]);

        let mut r = BinaryReader::new(&bytes);
        assert_eq!(r.read_i16().unwrap(), -2);
        assert_eq!(r.read_i64().unwrap(), 1);
        assert_eq!(r.read_double().unwrap(), 1.5);
        assert!(matches!(r.read_byte(), Err(DecodeError::UnexpectedEof)));
    }
}
