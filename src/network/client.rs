//! Exchange Client: satu koneksi, satu document, satu response
//!
//! State machine per koneksi:
//!
//! ```text
//! Unconnected -> Connecting -> Connected -> AwaitingResponse -> Closing -> Closed
//! ```
//!
//! `Closed` is terminal. The readiness loop runs on the calling thread with a
//! single registered socket; the connection value is owned by
//! [`ExchangeClient::exchange`] and closed on every exit path.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::{Duration, Instant};

use mio::{Events, Interest, Poll, Token};
use tracing::{debug, trace, warn};

use super::connection::{Connection, ReadState};
use crate::error::{ExchangeError, Result};
use crate::protocol::{encode, Document};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 17653;

const CLIENT_TOKEN: Token = Token(0);
const EVENTS_CAPACITY: usize = 16;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Batas waktu TCP handshake
    pub connect_timeout: Duration,
    /// Batas waktu dari connect sampai response pertama. `None` waits forever.
    pub response_timeout: Option<Duration>,
    /// Read buffer capacity; response bytes beyond this are dropped.
    pub max_response_bytes: usize,
    /// SO_RCVBUF override
    pub recv_buffer_size: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(5),
            response_timeout: Some(Duration::from_secs(30)),
            max_response_bytes: 64 * 1024,
            recv_buffer_size: Some(256 * 1024),
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn resolve(&self) -> io::Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Unconnected,
    Connecting,
    Connected,
    AwaitingResponse,
    Closing,
    Closed,
}

/// Callbacks fired by the exchange, in order:
/// `on_connect`, at most one `on_data`, then `on_close` once.
pub trait ExchangeHandler {
    fn on_connect(&mut self, _peer: SocketAddr) {}

    /// Response bytes, opaque. The connection is closed right after.
    fn on_data(&mut self, data: &[u8]);

    fn on_close(&mut self) {}
}

/// Prints the exchange to stdout.
#[derive(Debug, Default)]
pub struct ConsoleHandler;

impl ExchangeHandler for ConsoleHandler {
    fn on_connect(&mut self, _peer: SocketAddr) {
        println!("Connected");
    }

    fn on_data(&mut self, data: &[u8]) {
        println!("Received: {}", String::from_utf8_lossy(data));
    }

    fn on_close(&mut self) {
        println!("Connection closed");
    }
}

/// What one exchange produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeOutcome {
    pub bytes_sent: usize,
    /// `None` when the peer closed without answering.
    pub response: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Connect,
    Response,
}

struct Deadline {
    at: Instant,
    after: Duration,
    stage: Stage,
}

impl Deadline {
    fn new(stage: Stage, after: Duration) -> Self {
        Self {
            at: Instant::now() + after,
            after,
            stage,
        }
    }

    /// Sisa waktu, `None` kalau sudah lewat.
    fn remaining(&self) -> Option<Duration> {
        self.at.checked_duration_since(Instant::now()).filter(|d| !d.is_zero())
    }

    /// An unfinished connect is a connection failure; a missing answer is a timeout.
    fn expired(&self, peer: SocketAddr) -> ExchangeError {
        match self.stage {
            Stage::Connect => ExchangeError::Connection {
                addr: peer.to_string(),
                source: io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect timed out after {:?}", self.after),
                ),
            },
            Stage::Response => ExchangeError::Timeout { after: self.after },
        }
    }
}

/// One-shot exchange client
pub struct ExchangeClient {
    config: ClientConfig,
    state: ExchangeState,
}

impl ExchangeClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            state: ExchangeState::Unconnected,
        }
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run the exchange: encode, connect, send, await one response, close.
    ///
    /// The document is encoded before any socket is opened, so an
    /// `Encoding` error never touches the network. A client runs at most
    /// one exchange; later calls fail with `Write`.
    pub fn exchange<H: ExchangeHandler>(
        &mut self,
        doc: &Document,
        handler: &mut H,
    ) -> Result<ExchangeOutcome> {
        if self.state != ExchangeState::Unconnected {
            return Err(ExchangeError::Write(io::Error::new(
                io::ErrorKind::NotConnected,
                "exchange already finished",
            )));
        }

        let payload = encode(doc)?;
        let mut poll = Poll::new()?;

        let mut conn = match self.connect(&poll) {
            Ok(conn) => conn,
            Err(e) => {
                self.transition(ExchangeState::Closed);
                return Err(e);
            }
        };

        let result = self.drive(&mut poll, &mut conn, &payload, handler);
        self.close(&poll, &mut conn, handler);
        result
    }

    fn connect(&mut self, poll: &Poll) -> Result<Connection> {
        let connection_error = |source| ExchangeError::Connection {
            addr: self.config.addr(),
            source,
        };

        let peer = self.config.resolve().map_err(connection_error)?;
        self.transition(ExchangeState::Connecting);

        let mut conn = Connection::connect(peer, self.config.max_response_bytes)
            .map_err(|source| ExchangeError::Connection {
                addr: peer.to_string(),
                source,
            })?;

        if let Some(size) = self.config.recv_buffer_size {
            if let Err(e) = conn.set_recv_buffer_size(size) {
                warn!(error = %e, size, "failed to set SO_RCVBUF");
            }
        }

        conn.register(
            poll.registry(),
            CLIENT_TOKEN,
            Interest::READABLE | Interest::WRITABLE,
        )?;
        Ok(conn)
    }

    /// Event loop until a response arrives, the peer closes, or a deadline passes.
    fn drive<H: ExchangeHandler>(
        &mut self,
        poll: &mut Poll,
        conn: &mut Connection,
        payload: &[u8],
        handler: &mut H,
    ) -> Result<ExchangeOutcome> {
        let mut events = Events::with_capacity(EVENTS_CAPACITY);
        let mut deadline = Some(Deadline::new(Stage::Connect, self.config.connect_timeout));

        loop {
            let wait = match &deadline {
                Some(d) => Some(d.remaining().ok_or_else(|| d.expired(conn.peer_addr()))?),
                None => None,
            };

            match poll.poll(&mut events, wait) {
                Ok(()) => {}
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }

            for event in events.iter() {
                if event.token() != CLIENT_TOKEN {
                    continue;
                }
                trace!(?event, state = ?self.state, "readiness");

                if self.state == ExchangeState::Connecting {
                    let connected = conn.finish_connect().map_err(|source| {
                        ExchangeError::Connection {
                            addr: conn.peer_addr().to_string(),
                            source,
                        }
                    })?;
                    if !connected {
                        continue;
                    }

                    self.transition(ExchangeState::Connected);
                    handler.on_connect(conn.peer_addr());
                    deadline = self
                        .config
                        .response_timeout
                        .map(|after| Deadline::new(Stage::Response, after));

                    send(conn, payload)?;
                    self.after_flush(poll, conn)?;
                } else if self.state == ExchangeState::Connected && event.is_writable() {
                    conn.flush_write_buffer().map_err(ExchangeError::Write)?;
                    self.after_flush(poll, conn)?;
                }

                let can_read = matches!(
                    self.state,
                    ExchangeState::Connected | ExchangeState::AwaitingResponse
                );
                if can_read && (event.is_readable() || event.is_read_closed()) {
                    let read_state = conn.fill_read_buffer()?;
                    let data = conn.readable();

                    if !data.is_empty() {
                        if read_state == ReadState::Full {
                            warn!(
                                limit = self.config.max_response_bytes,
                                "response truncated at read buffer capacity"
                            );
                        }
                        handler.on_data(data);
                        return Ok(ExchangeOutcome {
                            bytes_sent: payload.len(),
                            response: Some(data.to_vec()),
                        });
                    }
                    if read_state == ReadState::Eof {
                        debug!(peer = %conn.peer_addr(), "peer closed without response");
                        return Ok(ExchangeOutcome {
                            bytes_sent: payload.len(),
                            response: None,
                        });
                    }
                }
            }
        }
    }

    /// Once the write queue drains, only read readiness matters.
    fn after_flush(&mut self, poll: &Poll, conn: &mut Connection) -> Result<()> {
        if conn.write_pending() == 0 {
            conn.reregister(poll.registry(), CLIENT_TOKEN, Interest::READABLE)?;
            self.transition(ExchangeState::AwaitingResponse);
        }
        Ok(())
    }

    fn close<H: ExchangeHandler>(&mut self, poll: &Poll, conn: &mut Connection, handler: &mut H) {
        let was_connected = matches!(
            self.state,
            ExchangeState::Connected | ExchangeState::AwaitingResponse
        );
        if was_connected {
            self.transition(ExchangeState::Closing);
        }

        if let Err(e) = conn.deregister(poll.registry()) {
            debug!(error = %e, "deregister failed");
        }
        conn.close();
        self.transition(ExchangeState::Closed);

        if was_connected {
            handler.on_close();
        }
    }

    fn transition(&mut self, next: ExchangeState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "exchange state");
            self.state = next;
        }
    }
}

/// Queue bytes and push as much as the socket accepts.
///
/// Fails with `Write` if the connection is already closed.
pub fn send(conn: &mut Connection, bytes: &[u8]) -> Result<()> {
    conn.queue_write(bytes).map_err(ExchangeError::Write)?;
    conn.flush_write_buffer().map_err(ExchangeError::Write)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::sample_document;

    struct NoopHandler;

    impl ExchangeHandler for NoopHandler {
        fn on_data(&mut self, _data: &[u8]) {}
    }

    #[test]
    fn test_default_config_targets_fixed_loopback() {
        let config = ClientConfig::default();
        assert_eq!(config.addr(), "127.0.0.1:17653");
        assert!(config.response_timeout.is_some());
    }

    #[test]
    fn test_unresolvable_host_is_connection_error() {
        let mut client = ExchangeClient::new(ClientConfig::new("host.invalid", 1));
        let err = client
            .exchange(&sample_document(), &mut NoopHandler)
            .unwrap_err();

        assert!(matches!(err, ExchangeError::Connection { .. }));
        assert_eq!(client.state(), ExchangeState::Closed);
    }

    #[test]
    fn test_encoding_error_before_connect() {
        let mut client = ExchangeClient::new(ClientConfig::new("127.0.0.1", 1));
        let doc = Document::new().with("bad\0", 1i64);
        let err = client.exchange(&doc, &mut NoopHandler).unwrap_err();

        assert!(matches!(err, ExchangeError::Encoding(_)));
        assert_eq!(client.state(), ExchangeState::Unconnected);
    }

    #[test]
    fn test_expired_response_deadline_is_timeout() {
        let peer: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let deadline = Deadline::new(Stage::Response, Duration::ZERO);
        assert_eq!(deadline.remaining(), None);

        match deadline.expired(peer) {
            ExchangeError::Timeout { after } => assert_eq!(after, Duration::ZERO),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_expired_connect_deadline_is_connection_error() {
        let peer: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let deadline = Deadline::new(Stage::Connect, Duration::from_millis(5));

        match deadline.expired(peer) {
            ExchangeError::Connection { addr, source } => {
                assert_eq!(addr, "127.0.0.1:9");
                assert_eq!(source.kind(), io::ErrorKind::TimedOut);
            }
            other => panic!("expected connection error, got {:?}", other),
        }
    }
}
