//! Document Encoder
//!
//! Encode langsung ke buffer internal yang bisa di-reuse.
//! Length prefix ditulis sebagai placeholder lalu di-patch setelah body selesai,
//! jadi nested document tidak butuh alokasi tambahan.

use super::document::{Document, Value};
use super::error::EncodeError;

/// Reusable encoder buffer
pub struct Encoder {
    buffer: Vec<u8>,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Encoder {
    /// Membuat encoder dengan kapasitas awal tertentu
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Reset encoder untuk reuse
    #[inline(always)]
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Encode a document, appending it after anything already in the buffer.
    ///
    /// Returns slice ke encoded document. On error the buffer is rolled back
    /// to where it was before the call.
    pub fn encode(&mut self, doc: &Document) -> Result<&[u8], EncodeError> {
        let start = self.buffer.len();
        if let Err(e) = self.write_document(doc.iter()) {
            self.buffer.truncate(start);
            return Err(e);
        }
        Ok(&self.buffer[start..])
    }

    /// Get current buffer content
    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    fn write_document<'a>(
        &mut self,
        fields: impl Iterator<Item = (&'a str, &'a Value)>,
    ) -> Result<(), EncodeError> {
        let start = self.buffer.len();
        self.buffer.extend_from_slice(&[0u8; 4]);
        for (key, value) in fields {
            self.write_element(key, value)?;
        }
        self.buffer.push(0);
        self.patch_len(start)
    }

    fn write_element(&mut self, key: &str, value: &Value) -> Result<(), EncodeError> {
        self.buffer.push(value.element_type() as u8);
        self.write_cstring(key)?;

        match value {
            Value::Double(f) => self.buffer.extend_from_slice(&f.to_le_bytes()),
            Value::String(s) => self.write_string(s)?,
            Value::Document(doc) => self.write_document(doc.iter())?,
            Value::Array(items) => {
                let keys: Vec<String> = (0..items.len()).map(|i| i.to_string()).collect();
                self.write_document(keys.iter().map(String::as_str).zip(items.iter()))?;
            }
            Value::Binary { subtype, data } => {
                let len = to_i32(data.len())?;
                self.buffer.extend_from_slice(&len.to_le_bytes());
                self.buffer.push(*subtype);
                self.buffer.extend_from_slice(data);
            }
            Value::Boolean(b) => self.buffer.push(u8::from(*b)),
            Value::Null => {}
            Value::Int32(i) => self.buffer.extend_from_slice(&i.to_le_bytes()),
            Value::Int64(i) => self.buffer.extend_from_slice(&i.to_le_bytes()),
        }
        Ok(())
    }

    /// NUL-terminated field name. An interior NUL cannot be represented.
    fn write_cstring(&mut self, s: &str) -> Result<(), EncodeError> {
        if s.as_bytes().contains(&0) {
            return Err(EncodeError::KeyContainsNul(s.to_string()));
        }
        self.buffer.extend_from_slice(s.as_bytes());
        self.buffer.push(0);
        Ok(())
    }

    /// i32 LE (byte_count + 1), UTF-8 bytes, NUL.
    fn write_string(&mut self, s: &str) -> Result<(), EncodeError> {
        let len = to_i32(s.len() + 1)?;
        self.buffer.extend_from_slice(&len.to_le_bytes());
        self.buffer.extend_from_slice(s.as_bytes());
        self.buffer.push(0);
        Ok(())
    }

    fn patch_len(&mut self, start: usize) -> Result<(), EncodeError> {
        let len = to_i32(self.buffer.len() - start)?;
        self.buffer[start..start + 4].copy_from_slice(&len.to_le_bytes());
        Ok(())
    }
}

#[inline(always)]
fn to_i32(len: usize) -> Result<i32, EncodeError> {
    i32::try_from(len).map_err(|_| EncodeError::TooLarge(len))
}

/// Encode a single document into a fresh buffer.
pub fn encode(doc: &Document) -> Result<Vec<u8>, EncodeError> {
    let mut encoder = Encoder::default();
    encoder.encode(doc)?;
    Ok(encoder.buffer)
}
