//! Command-line interface

use std::time::Duration;

use clap::Parser;

use crate::config::{ServerConfig, DEFAULT_MAX_PENDING, DEFAULT_OUTBOUND_BUFFER, DEFAULT_PORT};
use crate::error::ConfigError;

/// TCP chat relay server
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address to listen on. Empty means all interfaces.
    #[arg(short = 'a', long = "address", default_value = "")]
    pub address: String,

    /// Port to listen on (1025 to 65534)
    #[arg(short = 'p', long = "port", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Maximum simultaneous connections (unbounded if omitted)
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Maximum queued broadcast payloads before the oldest is dropped
    #[arg(long, default_value_t = DEFAULT_MAX_PENDING)]
    pub max_pending: usize,

    /// Upper bound in milliseconds on each loop iteration's accept wait
    #[arg(long, default_value_t = 1000)]
    pub accept_wait_ms: u64,
}

impl Args {
    /// Build and validate the server configuration
    pub fn into_config(self) -> Result<ServerConfig, ConfigError> {
        let config = ServerConfig {
            listen_address: self.address,
            listen_port: self.port,
            accept_wait: Duration::from_millis(self.accept_wait_ms),
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            max_pending: Some(self.max_pending),
            max_connections: self.max_connections,
        };
        config.validate()?;
        Ok(config)
    }
}
