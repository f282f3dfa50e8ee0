//! Encode/decode error types for the document format.

use thiserror::Error;

/// A value the wire format cannot represent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Field names are written as NUL-terminated strings.
    #[error("field name {0:?} contains a NUL byte")]
    KeyContainsNul(String),
    /// Lengths are written as signed 32-bit integers.
    #[error("encoded size {0} exceeds the 32-bit length range")]
    TooLarge(usize),
}

/// Malformed input seen while decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("invalid length prefix: {0}")]
    InvalidLength(i32),
    #[error("document is missing its trailing terminator")]
    MissingTerminator,
    #[error("unsupported element type: 0x{0:02x}")]
    UnsupportedType(u8),
    #[error("invalid UTF-8")]
    InvalidUtf8,
    #[error("nesting exceeds {0} levels")]
    TooDeep(usize),
    #[error("{0} trailing bytes after document")]
    TrailingBytes(usize),
}
