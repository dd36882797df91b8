//! Chunkpad Server Binary
//!
//! Starts the WebSocket server for Chunkpad.

use chunkpad::network::Server;
use chunkpad::Config;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

/// Chunkpad Server
#[derive(Parser, Debug)]
#[command(name = "chunkpad-server")]
#[command(about = "Real-time collaborative plain-text editing backend")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./chunkpad_data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Chunk size in bytes
    #[arg(short, long, default_value = "4096")]
    chunk_size: usize,

    /// Seconds a chunk may sit idle before it is evicted to disk
    #[arg(long, default_value = "10")]
    evict_after_secs: u64,

    /// Seconds between consolidation passes
    #[arg(long, default_value = "30")]
    consolidate_secs: u64,

    /// Seconds a session may sit with no clients before it is reclaimed
    #[arg(long, default_value = "10")]
    reclaim_grace_secs: u64,

    /// Frames queued for a slow client before it is disconnected
    #[arg(long, default_value = "256")]
    outbox_capacity: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,chunkpad=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let args = Args::parse();

    tracing::info!("Chunkpad Server v{}", chunkpad::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    // Build config from args
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .chunk_size(args.chunk_size)
        .evict_after_ms(args.evict_after_secs * 1000)
        .consolidate_interval_ms(args.consolidate_secs * 1000)
        .reclaim_grace_ms(args.reclaim_grace_secs * 1000)
        .outbox_capacity(args.outbox_capacity)
        .build();

    // Every session, timer and connection shares one cooperative loop
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(serve(config)) {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}

/// Run until a fatal storage failure or Ctrl+C
async fn serve(config: Config) -> chunkpad::Result<()> {
    let server = Server::bind(config).await?;
    let registry = server.registry();

    tokio::select! {
        outcome = server.run() => outcome,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, flushing {} sessions...", registry.session_count());
            registry.flush_all()
        }
    }
}
