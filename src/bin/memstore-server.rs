//! memstore Server Binary
//!
//! Ten in-memory databases of strings, lists and streams served over RESP.

use clap::Parser;
use memstore::server::{Config, Server};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// memstore Server - In-Memory Key-Value Store
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Port number
    #[arg(short, long, default_value_t = 8090)]
    port: u16,

    /// Background expiry interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    reap_interval_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .init();

    let args = Args::parse();

    let config = Config::default()
        .with_bind(&args.bind)
        .with_port(args.port)
        .with_reap_interval_ms(args.reap_interval_ms);

    info!("Starting memstore server on {}", config.addr());

    let server = Server::new(config)?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}

/// `RUST_LOG` when set and valid, otherwise `memstore=info`
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("memstore=info"))
}
