//! docwire - single-shot binary document exchange over TCP
//!
//! Arsitektur:
//! - Protocol: self-describing, length-prefixed binary documents
//! - Network: mio readiness loop dengan satu koneksi
//! - Error: satu taxonomy untuk seluruh exchange, tanpa retry

pub mod error;
pub mod network;
pub mod protocol;

pub use error::ExchangeError;
pub use network::{ClientConfig, ExchangeClient, ExchangeHandler, ExchangeOutcome, ExchangeState};
pub use protocol::{Document, Value};
