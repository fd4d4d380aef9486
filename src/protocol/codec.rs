//! Kafka wire primitives.
//!
//! Decoding works over a borrowed byte slice with explicit bounds checks;
//! encoding is provided as an extension trait on [`BufMut`].
//!
//! ```text
//! unsigned varint   7 bits per byte, low group first, high bit = continue
//! nullable string   int16 length (-1 = null) + bytes
//! compact string    varint (length + 1) + bytes, 0 = null
//! compact array     varint (count + 1) + elements, 0 = null
//! tagged fields     varint count, then { varint tag, varint size, bytes }
//! ```

use bytes::BufMut;
use std::fmt;

/// Longest encoding of a 32-bit unsigned varint.
const MAX_VARINT_BYTES: usize = 5;

/// Wire decoding errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Input ended before the field was complete
    UnexpectedEof { needed: usize, remaining: usize },
    /// Varint did not terminate within 5 bytes
    VarintTooLong,
    /// Negative or otherwise impossible length prefix
    InvalidLength(i64),
    /// Null where the field is not nullable
    UnexpectedNull(&'static str),
    /// String bytes are not valid UTF-8
    InvalidUtf8,
    /// Nullable-struct marker other than -1 or 1
    InvalidMarker(i8),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnexpectedEof { needed, remaining } => write!(
                f,
                "Unexpected end of input: needed {} bytes, {} remaining",
                needed, remaining
            ),
            DecodeError::VarintTooLong => write!(f, "Varint longer than {} bytes", MAX_VARINT_BYTES),
            DecodeError::InvalidLength(len) => write!(f, "Invalid length: {}", len),
            DecodeError::UnexpectedNull(field) => write!(f, "Unexpected null for {}", field),
            DecodeError::InvalidUtf8 => write!(f, "Invalid UTF-8 in string"),
            DecodeError::InvalidMarker(marker) => write!(f, "Invalid nullable marker: {}", marker),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Cursor over a request payload.
#[derive(Debug)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Decoder { buf, pos: 0 }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Consume exactly `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::UnexpectedEof {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_i8(&mut self) -> Result<i8, DecodeError> {
        Ok(i8::from_be_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, DecodeError> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    pub fn read_unsigned_varint(&mut self) -> Result<u32, DecodeError> {
        let mut value: u32 = 0;
        for i in 0..MAX_VARINT_BYTES {
            let byte = self.read_array::<1>()?[0];
            value |= u32::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(DecodeError::VarintTooLong)
    }

    /// Classic nullable string (int16 length, -1 = null).
    pub fn read_nullable_string(&mut self) -> Result<Option<String>, DecodeError> {
        let len = self.read_i16()?;
        if len == -1 {
            return Ok(None);
        }
        if len < 0 {
            return Err(DecodeError::InvalidLength(i64::from(len)));
        }
        self.read_utf8(len as usize).map(Some)
    }

    pub fn read_compact_nullable_string(&mut self) -> Result<Option<String>, DecodeError> {
        match self.read_unsigned_varint()? {
            0 => Ok(None),
            n => self.read_utf8((n - 1) as usize).map(Some),
        }
    }

    pub fn read_compact_string(&mut self, field: &'static str) -> Result<String, DecodeError> {
        self.read_compact_nullable_string()?
            .ok_or(DecodeError::UnexpectedNull(field))
    }

    /// Element count of a compact array, `None` for a null array.
    pub fn read_compact_array_len(&mut self) -> Result<Option<usize>, DecodeError> {
        match self.read_unsigned_varint()? {
            0 => Ok(None),
            n => {
                let count = (n - 1) as usize;
                // Every element takes at least one byte
                if count > self.remaining() {
                    return Err(DecodeError::InvalidLength(count as i64));
                }
                Ok(Some(count))
            }
        }
    }

    /// Skip a tagged-field section, returning how many fields it held.
    pub fn skip_tagged_fields(&mut self) -> Result<u32, DecodeError> {
        let count = self.read_unsigned_varint()?;
        for _ in 0..count {
            let _tag = self.read_unsigned_varint()?;
            let size = self.read_unsigned_varint()?;
            self.read_bytes(size as usize)?;
        }
        Ok(count)
    }

    fn read_utf8(&mut self, len: usize) -> Result<String, DecodeError> {
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8)
    }
}

/// Kafka encodings on top of [`BufMut`].
pub trait KafkaBufMut: BufMut {
    fn put_unsigned_varint(&mut self, mut value: u32) {
        while value >= 0x80 {
            self.put_u8((value & 0x7f) as u8 | 0x80);
            value >>= 7;
        }
        self.put_u8(value as u8);
    }

    fn put_compact_string(&mut self, s: &str) {
        self.put_unsigned_varint(s.len() as u32 + 1);
        self.put_slice(s.as_bytes());
    }

    fn put_compact_array_len(&mut self, len: usize) {
        self.put_unsigned_varint(len as u32 + 1);
    }

    fn put_empty_tagged_fields(&mut self) {
        self.put_u8(0);
    }
}

impl<B: BufMut + ?Sized> KafkaBufMut for B {}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_read_fixed_width() {
        let mut d = Decoder::new(&[0xff, 0x00, 0x12, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(d.read_i8().unwrap(), -1);
        assert_eq!(d.read_i16().unwrap(), 18);
        assert_eq!(d.read_i32().unwrap(), 256);
        assert!(d.is_empty());
    }

    #[test]
    fn test_unexpected_eof() {
        let mut d = Decoder::new(&[0x00, 0x01]);
        assert_eq!(
            d.read_i32(),
            Err(DecodeError::UnexpectedEof {
                needed: 4,
                remaining: 2
            })
        );
    }

    #[test]
    fn test_varint_multi_byte() {
        let mut d = Decoder::new(&[0xac, 0x02, 0x01]);
        assert_eq!(d.read_unsigned_varint().unwrap(), 300);
        assert_eq!(d.read_unsigned_varint().unwrap(), 1);

        let mut buf = BytesMut::new();
        buf.put_unsigned_varint(300);
        assert_eq!(&buf[..], &[0xac, 0x02]);
    }

    #[test]
    fn test_varint_too_long() {
        let mut d = Decoder::new(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]);
        assert_eq!(d.read_unsigned_varint(), Err(DecodeError::VarintTooLong));
    }

    #[test]
    fn test_nullable_string() {
        let mut d = Decoder::new(&[0xff, 0xff, 0x00, 0x03, b'c', b'l', b'i']);
        assert_eq!(d.read_nullable_string().unwrap(), None);
        assert_eq!(d.read_nullable_string().unwrap().as_deref(), Some("cli"));
    }

    #[test]
    fn test_compact_string() {
        let mut d = Decoder::new(&[0x04, b'f', b'o', b'o', 0x00]);
        assert_eq!(d.read_compact_string("name").unwrap(), "foo");
        assert_eq!(
            d.read_compact_string("name"),
            Err(DecodeError::UnexpectedNull("name"))
        );

        let mut buf = BytesMut::new();
        buf.put_compact_string("foo");
        assert_eq!(&buf[..], &[0x04, b'f', b'o', b'o']);
    }

    #[test]
    fn test_invalid_utf8() {
        let mut d = Decoder::new(&[0x03, 0xc3, 0x28]);
        assert_eq!(d.read_compact_string("name"), Err(DecodeError::InvalidUtf8));
    }

    #[test]
    fn test_compact_array_len() {
        let mut d = Decoder::new(&[0x00, 0x03, 0xaa, 0xbb]);
        assert_eq!(d.read_compact_array_len().unwrap(), None);
        assert_eq!(d.read_compact_array_len().unwrap(), Some(2));

        // Count larger than the bytes left
        let mut d = Decoder::new(&[0x0a, 0x01]);
        assert_eq!(d.read_compact_array_len(), Err(DecodeError::InvalidLength(9)));
    }

    #[test]
    fn test_skip_tagged_fields() {
        // Two fields: tag 0 with 2 bytes, tag 5 with 0 bytes, then a trailing byte
        let mut d = Decoder::new(&[0x02, 0x00, 0x02, 0xde, 0xad, 0x05, 0x00, 0x7f]);
        assert_eq!(d.skip_tagged_fields().unwrap(), 2);
        assert_eq!(d.read_i8().unwrap(), 0x7f);
    }

    #[test]
    fn test_skip_tagged_fields_truncated() {
        let mut d = Decoder::new(&[0x01, 0x00, 0x04, 0xde]);
        assert!(matches!(
            d.skip_tagged_fields(),
            Err(DecodeError::UnexpectedEof { .. })
        ));
    }
}
