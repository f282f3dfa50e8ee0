//! Network Layer: Non-blocking Client I/O
//!
//! Menggunakan mio untuk readiness-driven I/O (epoll/kqueue/IOCP).
//!
//! Fitur:
//! - Satu koneksi outbound per exchange
//! - Pre-allocated read buffer
//! - Explicit state machine menggantikan callback chain

mod client;
mod connection;

pub use client::{
    send, ClientConfig, ConsoleHandler, ExchangeClient, ExchangeHandler, ExchangeOutcome,
    ExchangeState, DEFAULT_HOST, DEFAULT_PORT,
};
pub use connection::{Connection, ReadState};
