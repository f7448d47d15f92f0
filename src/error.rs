//! Error types for the chat relay
//!
//! Splits failures along the lines the event loop cares about:
//! protocol errors are answered with a 400 and the connection stays open,
//! codec and delivery errors close the connection, configuration errors
//! are fatal at startup. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors (top level of the binary)
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error while binding or accepting (fatal at startup)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid startup configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Failures reading or writing one structured message
///
/// Every variant is a transport error: the connection it happened on
/// is closed and removed from the registry.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Peer closed the stream (possibly in the middle of a message)
    #[error("Connection closed by peer")]
    Closed,

    /// Line exceeded the maximum message length
    #[error("Message exceeds {limit} bytes")]
    TooLarge { limit: usize },

    /// Bytes did not form a JSON object
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// Underlying socket error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::Malformed(err.to_string())
    }
}

/// Structural protocol violations
///
/// All of these are answered with `{response: 400, error: "Bad Request"}`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A required field is absent
    #[error("Missing field '{0}'")]
    MissingField(&'static str),

    /// A field is present but has the wrong JSON type
    #[error("Field '{0}' has an invalid type")]
    InvalidField(&'static str),

    /// `account_name` is an empty string
    #[error("Empty account name")]
    EmptyAccountName,

    /// `message` action without `message_text`
    #[error("Message action without message_text")]
    MissingMessageText,

    /// Any action other than `presence` or `message`
    #[error("Unsupported action '{0}'")]
    UnsupportedAction(String),
}

/// Startup configuration errors (fatal)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Port outside the open interval (1024, 65535)
    #[error("Port {0} is out of range; allowed ports are 1025 to 65534")]
    PortOutOfRange(u16),

    /// A size setting that must be positive was zero
    #[error("'{0}' must be greater than zero")]
    ZeroLimit(&'static str),
}

/// Non-blocking delivery errors for one recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Outbound buffer is full; the recipient is not writable right now
    #[error("Outbound buffer full")]
    Full,

    /// Writer side has gone away (peer disconnected or write failed)
    #[error("Connection closed")]
    Closed,
}
