//! docwire - kirim satu document ke server lokal dan tampilkan response-nya
//!
//! Usage:
//!
//! ```text
//! cargo run --release
//! ```
//!
//! Target tetap `127.0.0.1:17653`; tidak ada argumen command-line.
//! `RUST_LOG` mengatur log diagnostik (default: warn).

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docwire::network::{ClientConfig, ConsoleHandler, ExchangeClient};
use docwire::protocol::sample_document;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ClientConfig::default();
    let addr = config.addr();
    let mut client = ExchangeClient::new(config);

    client
        .exchange(&sample_document(), &mut ConsoleHandler)
        .with_context(|| format!("exchange with {} failed", addr))?;

    Ok(())
}

/// Log ke stderr supaya stdout hanya berisi output exchange.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
