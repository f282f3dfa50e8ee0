//! Protocol Layer: Binary Document Format
//!
//! Prinsip desain:
//! - Self-describing: setiap field membawa type tag sendiri
//! - Length-prefixed: ukuran document diketahui dari 4 byte pertama
//! - Little-endian untuk semua integer

pub mod decoder;
pub mod document;
pub mod encoder;
pub mod error;

pub use decoder::{decode, frame_len, Decoder, MAX_DEPTH};
pub use document::{sample_document, Document, ElementType, Value, EMPTY_DOCUMENT_SIZE};
pub use encoder::{encode, Encoder};
pub use error::{DecodeError, EncodeError};
