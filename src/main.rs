//! Edge nonce proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌───────────────────────────────────────────────┐
//!                         │                  NONCE EDGE                    │
//!                         │                                                │
//!   Client Request        │  ┌────────┐   ┌──────────┐   ┌────────────┐   │
//!   ──────────────────────┼─▶│  http  │──▶│ pipeline │──▶│   origin   │───┼──▶ Origin
//!                         │  │ server │   │  nonce   │   │   client   │   │    Server
//!                         │  └────────┘   └────┬─────┘   └────────────┘   │
//!                         │                    │                          │
//!                         │                    ▼                          │
//!   Client Response       │             ┌──────────────┐                  │
//!   ◀─────────────────────┼─────────────│    policy    │                  │
//!                         │             │ classify     │                  │
//!                         │             │ rewrite HTML │                  │
//!                         │             │ build headers│                  │
//!                         │             └──────────────┘                  │
//!                         │                                                │
//!                         │  config (+ hot reload) · observability ·       │
//!                         │  lifecycle · security                          │
//!                         └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use nonce_edge::config::{load_config, watcher::ConfigWatcher, EdgeConfig};
use nonce_edge::observability::{logging, metrics};
use nonce_edge::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "nonce-edge")]
#[command(about = "Edge proxy adding CSP nonces, security headers and cache policy", long_about = None)]
struct Cli {
    /// TOML configuration file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the response policy when the configuration file changes.
    #[arg(short, long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => EdgeConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "nonce-edge starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        origin = %config.origin.url,
        max_connections = config.listener.max_connections,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, config_updates) = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        _ => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
