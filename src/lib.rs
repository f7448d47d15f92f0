//! TCP Chat Relay Library
//!
//! A single-process chat relay: clients connect over TCP, exchange
//! newline-delimited JSON requests with the server, and every chat
//! message is fanned out to all connected clients.
//!
//! # Protocol
//! - `{"action": "presence", "time": T, "account_name": "alice"}` → `{"response": 200}`
//! - `{"action": "message", "time": T, "account_name": "alice", "message_text": "hi"}`
//!   → no reply; everyone receives
//!   `{"action": "message", "sender": "alice", "time": T2, "message_text": "hi"}`
//! - anything else → `{"response": 400, "error": "Bad Request"}`
//!
//! # Architecture
//! `RelayServer` is the single coordinator owning all state:
//! - the `ConnectionRegistry` of live connections
//! - the `BroadcastQueue` of pending chat payloads
//! - the inbound `mpsc` channel fed by per-connection reader tasks
//!
//! No locks needed - connection tasks only talk to the server through channels.
//!
//! # Example
//! ```ignore
//! use chat_relay::{RelayServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = RelayServer::bind(ServerConfig::default()).await.unwrap();
//!     server.run().await;
//! }
//! ```

pub mod cli;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod processor;
pub mod queue;
pub mod registry;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use config::ServerConfig;
pub use connection::{Connection, Inbound};
pub use error::{AppError, CodecError, ConfigError, DeliveryError, ProtocolError};
pub use message::{Request, ServerMessage, StructuredMessage};
pub use processor::{process_request, Outcome};
pub use queue::{BroadcastQueue, PendingChat};
pub use registry::ConnectionRegistry;
pub use server::RelayServer;
pub use types::ConnectionId;
