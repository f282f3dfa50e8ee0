//! Exchange error taxonomy.
//!
//! Every variant is fatal to the exchange; nothing is retried.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::EncodeError;

#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Resolution or TCP connect failed, including a connect that did not
    /// finish within the connect timeout.
    #[error("connection to {addr} failed: {source}")]
    Connection {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("document encoding failed: {0}")]
    Encoding(#[from] EncodeError),

    /// Write on a closed connection, or the socket write failed.
    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    /// Connected, but no response before the deadline.
    #[error("no response within {after:?}")]
    Timeout { after: Duration },

    /// Poll or socket read failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ExchangeError>;
