//! TCP Chat Relay - Entry Point
//!
//! Parses the command line, validates the configuration and runs the
//! relay event loop until Ctrl-C.

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_relay::cli::Args;
use chat_relay::RelayServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG overrides the default, e.g. RUST_LOG=chat_relay=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_relay=info")),
        )
        .init();

    let config = match Args::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Refusing to start: {}", e);
            std::process::exit(1);
        }
    };

    let server = RelayServer::bind(config).await?;
    info!("Chat relay listening on {}", server.local_addr()?);

    server.run_until_ctrl_c().await;

    Ok(())
}
