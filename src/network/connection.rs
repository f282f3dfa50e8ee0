//! Connection handling dengan buffered non-blocking I/O
//!
//! Satu `mio::net::TcpStream` dengan read buffer pre-allocated dan write queue.
//! Readiness dilaporkan oleh `mio::Poll` milik pemanggil.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr};

use mio::net::TcpStream;
use mio::{Interest, Registry, Token};

/// Result of draining the socket into the read buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    /// Socket drained, peer still open.
    Open,
    /// Peer closed its write half.
    Eof,
    /// Read buffer is full; remaining bytes stay in the socket.
    Full,
}

/// Outbound connection wrapper
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    read_buffer: Box<[u8]>,
    read_len: usize,
    write_buffer: Vec<u8>,
    written: usize,
    closed: bool,
}

impl Connection {
    /// Start a non-blocking connect.
    ///
    /// The connect completes asynchronously; call [`finish_connect`](Self::finish_connect)
    /// when the stream reports writable.
    pub fn connect(peer: SocketAddr, read_buffer_size: usize) -> io::Result<Self> {
        let stream = TcpStream::connect(peer)?;

        Ok(Self {
            stream,
            peer,
            read_buffer: vec![0u8; read_buffer_size].into_boxed_slice(),
            read_len: 0,
            write_buffer: Vec::new(),
            written: 0,
            closed: false,
        })
    }

    pub fn register(
        &mut self,
        registry: &Registry,
        token: Token,
        interest: Interest,
    ) -> io::Result<()> {
        registry.register(&mut self.stream, token, interest)
    }

    pub fn reregister(
        &mut self,
        registry: &Registry,
        token: Token,
        interest: Interest,
    ) -> io::Result<()> {
        registry.reregister(&mut self.stream, token, interest)
    }

    pub fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        registry.deregister(&mut self.stream)
    }

    /// Cek apakah connect sudah selesai.
    ///
    /// `Ok(false)` while the handshake is still in flight, `Err` if it failed.
    pub fn finish_connect(&mut self) -> io::Result<bool> {
        if let Some(err) = self.stream.take_error()? {
            return Err(err);
        }
        match self.stream.peer_addr() {
            Ok(_) => {
                // Disable Nagle's algorithm, payload dikirim sekali
                self.stream.set_nodelay(true)?;
                Ok(true)
            }
            Err(ref e)
                if e.kind() == io::ErrorKind::NotConnected
                    || e.kind() == io::ErrorKind::WouldBlock =>
            {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Set SO_RCVBUF on the underlying socket.
    #[cfg(unix)]
    pub fn set_recv_buffer_size(&self, size: usize) -> io::Result<()> {
        use std::os::unix::io::AsRawFd;

        let fd = self.stream.as_raw_fd();
        let optval = libc::c_int::try_from(size)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "buffer size too large"))?;
        let rc = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_RCVBUF,
                &optval as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn set_recv_buffer_size(&self, _size: usize) -> io::Result<()> {
        Ok(())
    }

    /// Read dari socket sampai WouldBlock, EOF, atau buffer penuh.
    ///
    /// Readiness is edge-triggered, so the socket must be drained here.
    pub fn fill_read_buffer(&mut self) -> io::Result<ReadState> {
        while self.read_len < self.read_buffer.len() {
            match self.stream.read(&mut self.read_buffer[self.read_len..]) {
                Ok(0) => return Ok(ReadState::Eof),
                Ok(n) => self.read_len += n,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(ReadState::Open)
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(ReadState::Full)
    }

    /// Bytes received so far
    #[inline(always)]
    pub fn readable(&self) -> &[u8] {
        &self.read_buffer[..self.read_len]
    }

    /// Queue data untuk write
    pub fn queue_write(&mut self, data: &[u8]) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection already closed",
            ));
        }
        self.write_buffer.extend_from_slice(data);
        Ok(())
    }

    /// Flush write buffer ke socket
    ///
    /// Stops at WouldBlock; the rest goes out on the next writable event.
    pub fn flush_write_buffer(&mut self) -> io::Result<()> {
        while self.written < self.write_buffer.len() {
            match self.stream.write(&self.write_buffer[self.written..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write to socket",
                    ));
                }
                Ok(n) => self.written += n,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }

        self.write_buffer.clear();
        self.written = 0;
        Ok(())
    }

    /// Bytes pending in write buffer
    #[inline(always)]
    pub fn write_pending(&self) -> usize {
        self.write_buffer.len() - self.written
    }

    /// Shut down both halves. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            if e.kind() != io::ErrorKind::NotConnected {
                tracing::debug!(peer = %self.peer, error = %e, "shutdown failed");
            }
        }
    }

    #[inline(always)]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_write_after_close_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut conn = Connection::connect(listener.local_addr().unwrap(), 1024).unwrap();

        conn.close();
        assert!(conn.is_closed());

        let err = conn.queue_write(b"late").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert_eq!(conn.write_pending(), 0);
    }

    #[test]
    fn test_close_is_idempotent() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut conn = Connection::connect(listener.local_addr().unwrap(), 1024).unwrap();
        conn.close();
        conn.close();
        assert!(conn.is_closed());
    }
}
