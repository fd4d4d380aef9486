//! kafka-starter: a minimal Kafka wire protocol server
//!
//! Speaks just enough of the Kafka protocol for a client to discover the
//! broker's api versions and ask about topics:
//! - ApiVersions (key 18, v0-v4)
//! - DescribeTopicPartitions (key 75, v0), which reports every topic as unknown
//!
//! There is no broker state: nothing is stored, no topics exist.
//! Configuration via CLI arguments, environment variables or a TOML file.

mod config;
mod handlers;
mod protocol;
mod server;

use config::Config;
use server::Server;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        max_connections = config.max_connections,
        max_frame_size = config.max_frame_size,
        "Starting kafka-starter server"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let server = Server::new(config);
    runtime.block_on(server.run(shutdown_signal()))?;
    Ok(())
}

/// Resolves on Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal handler the server runs until killed
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
