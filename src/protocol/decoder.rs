//! Document Decoder
//!
//! Membaca document dari byte buffer tanpa copy buffer-nya.
//! `next()` bisa dipakai di atas stream yang belum lengkap: document yang
//! baru sebagian diterima menghasilkan `Ok(None)`.

use super::document::{Document, ElementType, Value, EMPTY_DOCUMENT_SIZE};
use super::error::DecodeError;

/// Maximum nesting of embedded documents and arrays below the top level.
pub const MAX_DEPTH: usize = 100;

/// Decoder over a borrowed buffer holding zero or more documents.
pub struct Decoder<'a> {
    buffer: &'a [u8],
    read_pos: usize,
}

impl<'a> Decoder<'a> {
    /// Membuat decoder dari buffer
    #[inline(always)]
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            read_pos: 0,
        }
    }

    /// Decode the next complete document.
    ///
    /// Returns `Ok(None)` if the buffer ends before the next document does;
    /// nothing is consumed in that case.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<Document>, DecodeError> {
        let rest = &self.buffer[self.read_pos..];
        let len = match frame_len(rest)? {
            Some(len) if len <= rest.len() => len,
            _ => return Ok(None),
        };

        let mut reader = Reader::new(&rest[..len]);
        let doc = reader.document(0)?;
        self.read_pos += len;
        Ok(Some(doc))
    }

    /// Bytes already consumed by decoded documents.
    #[inline(always)]
    pub fn consumed(&self) -> usize {
        self.read_pos
    }

    /// Remaining bytes
    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.read_pos)
    }
}

/// Peek at the length prefix of the document starting at `buf[0]`.
///
/// `Ok(None)` when fewer than 4 bytes are available.
pub fn frame_len(buf: &[u8]) -> Result<Option<usize>, DecodeError> {
    if buf.len() < 4 {
        return Ok(None);
    }
    let len = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if len < EMPTY_DOCUMENT_SIZE as i32 {
        return Err(DecodeError::InvalidLength(len));
    }
    Ok(Some(len as usize))
}

/// Decode exactly one document occupying the whole buffer.
pub fn decode(buf: &[u8]) -> Result<Document, DecodeError> {
    let mut reader = Reader::new(buf);
    let doc = reader.document(0)?;
    match buf.len() - reader.pos {
        0 => Ok(doc),
        extra => Err(DecodeError::TrailingBytes(extra)),
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(n).ok_or(DecodeError::UnexpectedEof)?;
        if end > self.data.len() {
            return Err(DecodeError::UnexpectedEof);
        }
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn i32_le(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    fn i64_le(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    fn f64_le(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    fn document(&mut self, depth: usize) -> Result<Document, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::TooDeep(MAX_DEPTH));
        }
        let start = self.pos;
        let len = self.i32_le()?;
        if len < EMPTY_DOCUMENT_SIZE as i32 {
            return Err(DecodeError::InvalidLength(len));
        }
        let end = start + len as usize;
        if end > self.data.len() {
            return Err(DecodeError::UnexpectedEof);
        }

        let mut doc = Document::new();
        // Terminator sits at end - 1.
        while self.pos < end - 1 {
            let tag = self.u8()?;
            if tag == 0 {
                return Err(DecodeError::MissingTerminator);
            }
            let key = self.cstring(end)?;
            let value = self.value(tag, depth)?;
            doc.insert(key, value);
        }
        if self.pos != end - 1 || self.u8()? != 0 {
            return Err(DecodeError::MissingTerminator);
        }
        Ok(doc)
    }

    fn cstring(&mut self, limit: usize) -> Result<String, DecodeError> {
        let rest = &self.data[self.pos..limit];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecodeError::UnexpectedEof)?;
        let s = std::str::from_utf8(&rest[..nul]).map_err(|_| DecodeError::InvalidUtf8)?;
        self.pos += nul + 1;
        Ok(s.to_string())
    }

    fn string(&mut self) -> Result<String, DecodeError> {
        let len = self.i32_le()?;
        if len < 1 {
            return Err(DecodeError::InvalidLength(len));
        }
        let bytes = self.take(len as usize)?;
        let (text, nul) = bytes.split_at(bytes.len() - 1);
        if nul[0] != 0 {
            return Err(DecodeError::MissingTerminator);
        }
        std::str::from_utf8(text)
            .map(str::to_string)
            .map_err(|_| DecodeError::InvalidUtf8)
    }

    fn value(&mut self, tag: u8, depth: usize) -> Result<Value, DecodeError> {
        let ty = ElementType::from_u8(tag).ok_or(DecodeError::UnsupportedType(tag))?;
        Ok(match ty {
            ElementType::Double => Value::Double(self.f64_le()?),
            ElementType::String => Value::String(self.string()?),
            ElementType::Document => Value::Document(self.document(depth + 1)?),
            ElementType::Array => {
                // Keys are "0", "1", ... in order; only the values matter.
                let doc = self.document(depth + 1)?;
                Value::Array(doc.iter().map(|(_, v)| v.clone()).collect())
            }
            ElementType::Binary => {
                let len = self.i32_le()?;
                if len < 0 {
                    return Err(DecodeError::InvalidLength(len));
                }
                let subtype = self.u8()?;
                let data = self.take(len as usize)?.to_vec();
                Value::Binary { subtype, data }
            }
            ElementType::Boolean => Value::Boolean(self.u8()? != 0),
            ElementType::Null => Value::Null,
            ElementType::Int32 => Value::Int32(self.i32_le()?),
            ElementType::Int64 => Value::Int64(self.i64_le()?),
        })
    }
}
