//! Canonical CBOR subset used by the record format.
//!
//! Only the constructs the audit record format needs are supported:
//! unsigned and negative integers (shortest encoding), text strings, byte
//! strings, and definite-length maps. Indefinite-length items are never
//! produced and are rejected on read.

use bytes::{Buf, BufMut};

use crate::error::{CodecError, CodecResult};

/// CBOR major types (shifted into the initial byte's high bits).
const MAJOR_UNSIGNED: u8 = 0;
const MAJOR_NEGATIVE: u8 = 1;
const MAJOR_BYTES: u8 = 2;
const MAJOR_TEXT: u8 = 3;
const MAJOR_MAP: u8 = 5;

/// Additional-info value signalling indefinite length.
const INDEFINITE: u8 = 31;

/// Writer producing the canonical CBOR subset.
///
/// Every write is total: the writer appends to an in-memory buffer and
/// cannot fail.
#[derive(Debug, Default)]
pub struct CborWriter {
    buf: Vec<u8>,
}

impl CborWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the writer, returning the encoded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Writes an unsigned integer with shortest encoding.
    pub fn write_uint(&mut self, value: u64) {
        self.write_header(MAJOR_UNSIGNED, value);
    }

    /// Writes a signed integer (major type 0 or 1).
    pub fn write_int(&mut self, value: i64) {
        if value >= 0 {
            self.write_header(MAJOR_UNSIGNED, value as u64);
        } else {
            // CBOR negative: encodes -1 - n, which is the bitwise complement.
            self.write_header(MAJOR_NEGATIVE, !(value as u64));
        }
    }

    /// Writes a text string.
    pub fn write_text(&mut self, value: &str) {
        self.write_header(MAJOR_TEXT, value.len() as u64);
        self.buf.put_slice(value.as_bytes());
    }

    /// Writes a byte string.
    pub fn write_bytes(&mut self, value: &[u8]) {
        self.write_header(MAJOR_BYTES, value.len() as u64);
        self.buf.put_slice(value);
    }

    /// Writes a definite-length map header for `entries` key/value pairs.
    pub fn write_map_header(&mut self, entries: usize) {
        self.write_header(MAJOR_MAP, entries as u64);
    }

    fn write_header(&mut self, major: u8, value: u64) {
        let major = major << 5;
        match value {
            0..=23 => self.buf.put_u8(major | value as u8),
            24..=0xFF => {
                self.buf.put_u8(major | 24);
                self.buf.put_u8(value as u8);
            }
            0x100..=0xFFFF => {
                self.buf.put_u8(major | 25);
                self.buf.put_u16(value as u16);
            }
            0x1_0000..=0xFFFF_FFFF => {
                self.buf.put_u8(major | 26);
                self.buf.put_u32(value as u32);
            }
            _ => {
                self.buf.put_u8(major | 27);
                self.buf.put_u64(value);
            }
        }
    }
}

/// Reader over the canonical CBOR subset.
///
/// Each `read_*` method verifies the major type it expects and fails with a
/// descriptive error otherwise; nothing is skipped or recovered.
#[derive(Debug)]
pub struct CborReader<'a> {
    buf: &'a [u8],
}

impl<'a> CborReader<'a> {
    /// Creates a reader over `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { buf: data }
    }

    /// Returns true when all input has been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Reads an unsigned integer.
    pub fn read_uint(&mut self) -> CodecResult<u64> {
        let (major, value) = self.read_header()?;
        if major != MAJOR_UNSIGNED {
            return Err(CodecError::invalid_structure(format!(
                "expected unsigned integer, found major type {major}"
            )));
        }
        Ok(value)
    }

    /// Reads a signed integer (major type 0 or 1).
    pub fn read_int(&mut self) -> CodecResult<i64> {
        let (major, value) = self.read_header()?;
        match major {
            MAJOR_UNSIGNED => i64::try_from(value).map_err(|_| CodecError::IntegerOverflow),
            MAJOR_NEGATIVE => {
                let n = i64::try_from(value).map_err(|_| CodecError::IntegerOverflow)?;
                Ok(-1 - n)
            }
            other => Err(CodecError::invalid_structure(format!(
                "expected integer, found major type {other}"
            ))),
        }
    }

    /// Reads a text string.
    pub fn read_text(&mut self) -> CodecResult<String> {
        let (major, len) = self.read_header()?;
        if major != MAJOR_TEXT {
            return Err(CodecError::invalid_structure(format!(
                "expected text string, found major type {major}"
            )));
        }
        let raw = self.take(len)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8)
    }

    /// Reads a byte string.
    pub fn read_bytes(&mut self) -> CodecResult<Vec<u8>> {
        let (major, len) = self.read_header()?;
        if major != MAJOR_BYTES {
            return Err(CodecError::invalid_structure(format!(
                "expected byte string, found major type {major}"
            )));
        }
        Ok(self.take(len)?.to_vec())
    }

    /// Reads a definite-length map header, returning the entry count.
    pub fn read_map_header(&mut self) -> CodecResult<usize> {
        let (major, len) = self.read_header()?;
        if major != MAJOR_MAP {
            return Err(CodecError::invalid_structure(format!(
                "expected map, found major type {major}"
            )));
        }
        usize::try_from(len).map_err(|_| CodecError::IntegerOverflow)
    }

    fn take(&mut self, len: u64) -> CodecResult<&'a [u8]> {
        let len = usize::try_from(len).map_err(|_| CodecError::IntegerOverflow)?;
        if self.buf.remaining() < len {
            return Err(CodecError::UnexpectedEof);
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn read_header(&mut self) -> CodecResult<(u8, u64)> {
        if !self.buf.has_remaining() {
            return Err(CodecError::UnexpectedEof);
        }
        let initial = self.buf.get_u8();
        let major = initial >> 5;
        let info = initial & 0x1f;

        let value = match info {
            0..=23 => u64::from(info),
            24 => {
                if self.buf.remaining() < 1 {
                    return Err(CodecError::UnexpectedEof);
                }
                let v = u64::from(self.buf.get_u8());
                self.check_shortest(v, 24)?;
                v
            }
            25 => {
                if self.buf.remaining() < 2 {
                    return Err(CodecError::UnexpectedEof);
                }
                let v = u64::from(self.buf.get_u16());
                self.check_shortest(v, 0x100)?;
                v
            }
            26 => {
                if self.buf.remaining() < 4 {
                    return Err(CodecError::UnexpectedEof);
                }
                let v = u64::from(self.buf.get_u32());
                self.check_shortest(v, 0x1_0000)?;
                v
            }
            27 => {
                if self.buf.remaining() < 8 {
                    return Err(CodecError::UnexpectedEof);
                }
                let v = self.buf.get_u64();
                self.check_shortest(v, 0x1_0000_0000)?;
                v
            }
            INDEFINITE => {
                return Err(CodecError::invalid_structure(
                    "indefinite-length items are forbidden",
                ))
            }
            _ => return Err(CodecError::invalid_structure("reserved additional info")),
        };

        Ok((major, value))
    }

    fn check_shortest(&self, value: u64, min: u64) -> CodecResult<()> {
        if value < min {
            return Err(CodecError::invalid_structure(
                "non-canonical: value could be encoded in fewer bytes",
            ));
        }
        Ok(())
    }
}
