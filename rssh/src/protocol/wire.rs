//! A small, self-describing binary encoding for [`super::Message`] records.
//!
//! Every record is a type tag (`u16`) followed by its fields in a fixed
//! order. Byte strings are varint-length-prefixed; integers are fixed-width
//! big-endian; there is no schema negotiation, matching the fixed-suite
//! stance of the surrounding protocol.

use crate::error::{Error, Result};

/// Appends fields to an in-memory record.
#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write_u32(value as u32);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(value as u8);
    }

    /// Write a varint-length-prefixed byte string.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        write_varint(&mut self.buf, bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_str(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    /// Write an optional field as a presence bool followed by the value, if any.
    pub fn write_option<T>(&mut self, value: &Option<T>, write: impl FnOnce(&mut Self, &T)) {
        self.write_bool(value.is_some());
        if let Some(value) = value {
            write(self, value);
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Reads fields out of an in-memory record, left to right.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| Error::ProtocolError("truncated message record".into()))?;

        let slice = &self.buf[self.pos..end];
        self.pos = end;

        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::ProtocolError(format!(
                "expected a bool (0 or 1), got {other}"
            ))),
        }
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = read_varint(self)?;
        let len = usize::try_from(len)
            .map_err(|_| Error::ProtocolError("byte string length overflows usize".into()))?;

        Ok(self.take(len)?.to_vec())
    }

    pub fn read_str(&mut self) -> Result<String> {
        String::from_utf8(self.read_bytes()?)
            .map_err(|_| Error::ProtocolError("field is not valid utf-8".into()))
    }

    pub fn read_option<T>(&mut self, read: impl FnOnce(&mut Self) -> Result<T>) -> Result<Option<T>> {
        if self.read_bool()? {
            Ok(Some(read(self)?))
        } else {
            Ok(None)
        }
    }

    /// Errors if any bytes remain unconsumed: a conservative guard against
    /// malformed records carrying trailing garbage.
    pub fn finish(self) -> Result<()> {
        if self.pos == self.buf.len() {
            Ok(())
        } else {
            Err(Error::ProtocolError(format!(
                "{} trailing byte(s) after decoding a record",
                self.buf.len() - self.pos
            )))
        }
    }
}

fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;

        if value == 0 {
            buf.push(byte);
            break;
        }

        buf.push(byte | 0x80);
    }
}

fn read_varint(reader: &mut Reader) -> Result<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;

    loop {
        if shift >= 64 {
            return Err(Error::ProtocolError("varint too long".into()));
        }

        let byte = reader.read_u8()?;
        value |= u64::from(byte & 0x7f) << shift;

        if byte & 0x80 == 0 {
            return Ok(value);
        }

        shift += 7;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_scalar_fields() {
        let mut writer = Writer::new();
        writer.write_u8(7);
        writer.write_u16(300);
        writer.write_u32(70_000);
        writer.write_u64(u64::MAX);
        writer.write_i32(-42);
        writer.write_bool(true);

        let bytes = writer.into_bytes();
        let mut reader = Reader::new(&bytes);

        assert_eq!(reader.read_u8().unwrap(), 7);
        assert_eq!(reader.read_u16().unwrap(), 300);
        assert_eq!(reader.read_u32().unwrap(), 70_000);
        assert_eq!(reader.read_u64().unwrap(), u64::MAX);
        assert_eq!(reader.read_i32().unwrap(), -42);
        assert!(reader.read_bool().unwrap());
        reader.finish().unwrap();
    }

    #[test]
    fn round_trips_strings_and_byte_strings() {
        let mut writer = Writer::new();
        writer.write_str("hello world");
        writer.write_bytes(&[1, 2, 3, 4, 5]);
        writer.write_bytes(&[]);

        let bytes = writer.into_bytes();
        let mut reader = Reader::new(&bytes);

        assert_eq!(reader.read_str().unwrap(), "hello world");
        assert_eq!(reader.read_bytes().unwrap(), vec![1, 2, 3, 4, 5]);
        assert_eq!(reader.read_bytes().unwrap(), Vec::<u8>::new());
        reader.finish().unwrap();
    }

    #[test]
    fn round_trips_a_long_byte_string_through_the_varint_length() {
        let data = vec![0xabu8; 100_000];

        let mut writer = Writer::new();
        writer.write_bytes(&data);

        let bytes = writer.into_bytes();
        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.read_bytes().unwrap(), data);
    }

    #[test]
    fn round_trips_optional_fields() {
        let mut writer = Writer::new();
        writer.write_option(&Some("present".to_string()), |w, v| w.write_str(v));
        writer.write_option(&None::<String>, |w, v| w.write_str(v));

        let bytes = writer.into_bytes();
        let mut reader = Reader::new(&bytes);
        assert_eq!(
            reader.read_option(|r| r.read_str()).unwrap(),
            Some("present".to_string())
        );
        assert_eq!(reader.read_option(|r| r.read_str()).unwrap(), None);
    }

    #[test]
    fn rejects_truncated_records() {
        let mut writer = Writer::new();
        writer.write_u32(42);
        let mut bytes = writer.into_bytes();
        bytes.truncate(2);

        let mut reader = Reader::new(&bytes);
        assert!(reader.read_u32().is_err());
    }

    #[test]
    fn rejects_trailing_garbage() {
        let mut writer = Writer::new();
        writer.write_u8(1);
        let mut bytes = writer.into_bytes();
        bytes.push(0xff);

        let mut reader = Reader::new(&bytes);
        reader.read_u8().unwrap();
        assert!(reader.finish().is_err());
    }
}
