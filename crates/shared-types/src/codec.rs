//! # State-History Binary Codec
//!
//! Cursor-based reader/writer for the node's wire primitives: fixed-width
//! little-endian integers, LEB128 `varuint32`, length-prefixed byte blobs,
//! base-32 packed account names and 32-byte checksums.
//!
//! The writer exists so tests and fixtures can build wire buffers without a
//! live node; production code only reads.

use thiserror::Error;

/// Errors raised while walking a wire buffer.
///
/// A codec error on the envelope itself is fatal for the connection (the
/// offset framing can no longer be trusted); a codec error inside a single
/// action payload is degradable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Ran past the end of the buffer.
    #[error("unexpected end of buffer at offset {offset} (wanted {wanted} bytes)")]
    UnexpectedEof { offset: usize, wanted: usize },

    /// A varuint32 did not terminate within 5 bytes.
    #[error("varuint32 overflow at offset {0}")]
    VaruintOverflow(usize),

    /// A string field contained invalid UTF-8.
    #[error("invalid utf-8 in string field at offset {0}")]
    InvalidUtf8(usize),

    /// An unknown variant tag was read where a known set was expected.
    #[error("unknown variant tag {tag} for {type_name}")]
    UnknownVariant { type_name: &'static str, tag: u32 },

    /// A type named by a schema has no decoder.
    #[error("unsupported type '{0}' in schema")]
    UnsupportedType(String),
}

const NAME_CHARS: &[u8; 32] = b".12345abcdefghijklmnopqrstuvwxyz";

fn char_to_symbol(c: u8) -> u64 {
    match c {
        b'a'..=b'z' => u64::from(c - b'a') + 6,
        b'1'..=b'5' => u64::from(c - b'1') + 1,
        _ => 0,
    }
}

/// Pack an account/action/table name into its u64 wire form.
///
/// Names longer than 13 characters are truncated, matching node behaviour.
#[must_use]
pub fn name_to_u64(name: &str) -> u64 {
    let bytes = name.as_bytes();
    let mut value: u64 = 0;
    for i in 0..12 {
        let c = if i < bytes.len() {
            char_to_symbol(bytes[i])
        } else {
            0
        };
        value |= (c & 0x1f) << (64 - 5 * (i as u64 + 1));
    }
    if bytes.len() > 12 {
        value |= char_to_symbol(bytes[12]) & 0x0f;
    }
    value
}

/// Unpack a u64 wire name back to its string form, trailing dots trimmed.
#[must_use]
pub fn u64_to_name(value: u64) -> String {
    let mut out = [b'.'; 13];
    let mut tmp = value;
    for i in (0..13).rev() {
        let idx = if i == 12 {
            (tmp & 0x0f) as usize
        } else {
            (tmp & 0x1f) as usize
        };
        out[i] = NAME_CHARS[idx];
        tmp >>= if i == 12 { 4 } else { 5 };
    }
    let s = String::from_utf8_lossy(&out).into_owned();
    s.trim_end_matches('.').to_string()
}

/// Cursor over a wire buffer.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current cursor offset, for error reporting.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left in the buffer.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::UnexpectedEof {
                offset: self.pos,
                wanted: n,
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        let b = self.take(8)?;
        let mut a = [0u8; 8];
        a.copy_from_slice(b);
        Ok(u64::from_le_bytes(a))
    }

    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        Ok(self.read_u64()? as i64)
    }

    /// LEB128 unsigned, capped at 32 bits.
    pub fn read_varuint32(&mut self) -> Result<u32, CodecError> {
        let start = self.pos;
        let mut result: u64 = 0;
        let mut shift = 0;
        loop {
            if shift >= 35 {
                return Err(CodecError::VaruintOverflow(start));
            }
            let byte = self.read_u8()?;
            result |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        Ok(result as u32)
    }

    /// varuint32-length-prefixed raw bytes.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        let len = self.read_varuint32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    /// varuint32-length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let start = self.pos;
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8(start))
    }

    /// Base-32 packed name, returned in string form.
    pub fn read_name(&mut self) -> Result<String, CodecError> {
        Ok(u64_to_name(self.read_u64()?))
    }

    /// 32-byte checksum, returned as lowercase hex.
    pub fn read_checksum256(&mut self) -> Result<String, CodecError> {
        Ok(hex::encode(self.take(32)?))
    }

    /// Optional-presence flag followed by the value when present.
    pub fn read_optional<T>(
        &mut self,
        read: impl FnOnce(&mut Self) -> Result<T, CodecError>,
    ) -> Result<Option<T>, CodecError> {
        if self.read_bool()? {
            Ok(Some(read(self)?))
        } else {
            Ok(None)
        }
    }
}

/// Mirror of [`ByteReader`] for building fixtures.
#[derive(Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn write_bool(&mut self, v: bool) -> &mut Self {
        self.write_u8(u8::from(v))
    }

    pub fn write_u16(&mut self, v: u16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn write_u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn write_u64(&mut self, v: u64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn write_i64(&mut self, v: i64) -> &mut Self {
        self.write_u64(v as u64)
    }

    pub fn write_varuint32(&mut self, mut v: u32) -> &mut Self {
        loop {
            let mut byte = (v & 0x7f) as u8;
            v >>= 7;
            if v != 0 {
                byte |= 0x80;
            }
            self.buf.push(byte);
            if v == 0 {
                break;
            }
        }
        self
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.write_varuint32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn write_string(&mut self, s: &str) -> &mut Self {
        self.write_bytes(s.as_bytes())
    }

    pub fn write_name(&mut self, name: &str) -> &mut Self {
        self.write_u64(name_to_u64(name))
    }

    /// Writes a 32-byte checksum from its hex form; short input is
    /// zero-padded so fixtures can use abbreviated digests.
    pub fn write_checksum256(&mut self, hex_digest: &str) -> &mut Self {
        let mut raw = hex::decode(hex_digest).unwrap_or_default();
        raw.resize(32, 0);
        self.buf.extend_from_slice(&raw);
        self
    }

    pub fn write_optional<T>(
        &mut self,
        value: Option<T>,
        write: impl FnOnce(&mut Self, T),
    ) -> &mut Self {
        match value {
            Some(v) => {
                self.write_bool(true);
                write(self, v);
            }
            None => {
                self.write_bool(false);
            }
        }
        self
    }
}
