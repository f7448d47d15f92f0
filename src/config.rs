//! Server configuration
//!
//! Plain settings struct with defaults, plus the startup validation that
//! must pass before the listener is bound.

use std::time::Duration;

use crate::error::ConfigError;

/// Default listening port
pub const DEFAULT_PORT: u16 = 7777;

/// Default bound on the accept wait of each loop iteration
pub const DEFAULT_ACCEPT_WAIT: Duration = Duration::from_secs(1);

/// Default per-connection outbound buffer (messages)
pub const DEFAULT_OUTBOUND_BUFFER: usize = 32;

/// Default limit on pending broadcast payloads
pub const DEFAULT_MAX_PENDING: usize = 1024;

/// Relay settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Listen address; empty means all interfaces
    pub listen_address: String,
    /// Listen port, must lie in (1024, 65535)
    pub listen_port: u16,
    /// Upper bound on how long one iteration waits for activity
    pub accept_wait: Duration,
    /// Messages buffered per connection before it counts as not writable
    pub outbound_buffer: usize,
    /// Limit on queued broadcast payloads; `None` is unbounded
    pub max_pending: Option<usize>,
    /// Limit on simultaneous connections; `None` is unbounded
    pub max_connections: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: String::new(),
            listen_port: DEFAULT_PORT,
            accept_wait: DEFAULT_ACCEPT_WAIT,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            max_pending: Some(DEFAULT_MAX_PENDING),
            max_connections: None,
        }
    }
}

impl ServerConfig {
    /// Check every setting, returning the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_port(self.listen_port)?;
        if self.accept_wait.is_zero() {
            return Err(ConfigError::ZeroLimit("accept_wait"));
        }
        if self.outbound_buffer == 0 {
            return Err(ConfigError::ZeroLimit("outbound_buffer"));
        }
        if self.max_pending == Some(0) {
            return Err(ConfigError::ZeroLimit("max_pending"));
        }
        if self.max_connections == Some(0) {
            return Err(ConfigError::ZeroLimit("max_connections"));
        }
        Ok(())
    }

    /// `host:port` string suitable for `TcpListener::bind`
    pub fn bind_address(&self) -> String {
        let host = if self.listen_address.is_empty() {
            "0.0.0.0"
        } else {
            self.listen_address.as_str()
        };
        format!("{}:{}", host, self.listen_port)
    }
}

/// Accept only ports strictly between 1024 and 65535
pub fn validate_port(port: u16) -> Result<u16, ConfigError> {
    if port > 1024 && port < 65535 {
        Ok(port)
    } else {
        Err(ConfigError::PortOutOfRange(port))
    }
}
