//! Echo Server - peer lokal untuk mencoba `docwire`
//!
//! Menerima koneksi, decode document yang masuk, lalu membalas dengan
//! document `{ok: true, fields: <jumlah field>}`.
//!
//! Usage:
//!   cargo run --example echo_server -- [--bind 127.0.0.1:17653] [--verbose]

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docwire::protocol::{frame_len, Decoder, Document, Encoder, Value};

/// Server configuration
struct ServerConfig {
    bind_addr: String,
    verbose: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:17653".to_string(),
            verbose: false,
        }
    }
}

/// Max document accepted from a client
const MAX_DOCUMENT_SIZE: usize = 16 * 1024 * 1024;

fn handle_client(mut stream: TcpStream, addr: SocketAddr, config: &ServerConfig) -> io::Result<()> {
    stream.set_nodelay(true)?;

    let mut read_buffer = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];
    let mut encoder = Encoder::new(256);

    loop {
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            info!(%addr, "client disconnected");
            return Ok(());
        }
        read_buffer.extend_from_slice(&chunk[..n]);

        match frame_len(&read_buffer) {
            Ok(Some(len)) if len > MAX_DOCUMENT_SIZE => {
                warn!(%addr, len, "document too large, closing");
                return Ok(());
            }
            Err(e) => {
                warn!(%addr, error = %e, "bad length prefix, closing");
                return Ok(());
            }
            _ => {}
        }

        let mut decoder = Decoder::new(&read_buffer);
        loop {
            let doc = match decoder.next() {
                Ok(Some(doc)) => doc,
                Ok(None) => break,
                Err(e) => {
                    warn!(%addr, error = %e, "malformed document, closing");
                    return Ok(());
                }
            };

            if config.verbose {
                for (key, value) in doc.iter() {
                    info!(%addr, key, value = ?value, "field");
                }
            }
            info!(%addr, fields = doc.len(), "document received");

            let reply = Document::new()
                .with("ok", true)
                .with("fields", Value::Int32(doc.len() as i32));
            encoder.reset();
            match encoder.encode(&reply) {
                Ok(bytes) => stream.write_all(bytes)?,
                Err(e) => error!(error = %e, "failed to encode reply"),
            }
        }

        let consumed = decoder.consumed();
        read_buffer.drain(..consumed);
    }
}

fn parse_args() -> ServerConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ServerConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    config.bind_addr = args[i + 1].clone();
                    i += 1;
                }
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--help" => {
                println!("Echo server for docwire\n");
                println!("Usage: echo_server [OPTIONS]\n");
                println!("Options:");
                println!("  -b, --bind <ADDR>   Listen address (default: 127.0.0.1:17653)");
                println!("  -v, --verbose       Log every decoded field");
                println!("      --help          Show this help");
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = parse_args();
    let listener = TcpListener::bind(&config.bind_addr)?;
    info!(addr = %config.bind_addr, "echo server listening");

    // Satu client pada satu waktu, cukup untuk demo
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };
        // Peer bisa reset sebelum sempat dibaca alamatnya
        let addr = match stream.peer_addr() {
            Ok(addr) => addr,
            Err(e) => {
                warn!(error = %e, "peer_addr failed, dropping connection");
                continue;
            }
        };
        info!(%addr, "new connection");

        if let Err(e) = handle_client(stream, addr, &config) {
            warn!(%addr, error = %e, "client error");
        }
    }

    Ok(())
}
