//! RelayServer event loop
//!
//! The single coordinator that owns the listener, the connection registry,
//! the broadcast queue and the inbound event channel. Connection tasks only
//! talk to it through `mpsc`, so no state is shared and nothing is locked.
//!
//! One iteration ([`RelayServer::step`]):
//! 1. wait, bounded by `accept_wait`, for a new connection or the first
//!    inbound event
//! 2. collect every inbound event available right now, without waiting
//! 3. dispatch each event to the request processor
//! 4. fan queued chat payloads out to every writable connection

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use chrono::Utc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::connection::{Connection, Inbound};
use crate::error::{AppError, DeliveryError};
use crate::message::ServerMessage;
use crate::processor::{process_request, Outcome};
use crate::queue::BroadcastQueue;
use crate::registry::ConnectionRegistry;
use crate::types::ConnectionId;

/// Inbound channel capacity, and the most events handled per iteration
const INBOUND_BUFFER: usize = 256;

/// The chat relay event loop
pub struct RelayServer {
    listener: TcpListener,
    registry: ConnectionRegistry,
    queue: BroadcastQueue,
    inbound_tx: mpsc::Sender<Inbound>,
    inbound_rx: mpsc::Receiver<Inbound>,
    config: ServerConfig,
}

impl RelayServer {
    /// Validate the configuration and bind the listening socket
    pub async fn bind(config: ServerConfig) -> Result<Self, AppError> {
        config.validate()?;
        let listener = TcpListener::bind(config.bind_address()).await?;
        Ok(Self::from_listener(listener, config))
    }

    /// Build a server around an already bound listener
    pub fn from_listener(listener: TcpListener, config: ServerConfig) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
        Self {
            listener,
            registry: ConnectionRegistry::new(config.max_connections),
            queue: BroadcastQueue::new(config.max_pending),
            inbound_tx,
            inbound_rx,
            config,
        }
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Live connections
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Payloads waiting for broadcast
    pub fn queue(&self) -> &BroadcastQueue {
        &self.queue
    }

    /// Run forever
    pub async fn run(self) {
        self.run_until(std::future::pending()).await;
    }

    /// Run until `shutdown` resolves
    ///
    /// Remaining connections are closed when the server is dropped.
    pub async fn run_until<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!("RelayServer started");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = self.step() => {}
            }
        }

        info!(
            "RelayServer shutting down, closing {} connections",
            self.registry.len()
        );
    }

    /// Run until Ctrl-C
    pub async fn run_until_ctrl_c(self) {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to install Ctrl-C handler: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;
    }

    /// One accept / poll / dispatch / broadcast iteration
    pub async fn step(&mut self) {
        let mut ready = Vec::new();

        // Only this wait is an await point, so cancelling a step never
        // loses a half-processed event.
        tokio::select! {
            accepted = self.listener.accept() => self.handle_accept(accepted),
            Some(event) = self.inbound_rx.recv() => ready.push(event),
            _ = tokio::time::sleep(self.config.accept_wait) => {}
        }

        while ready.len() < INBOUND_BUFFER {
            match self.inbound_rx.try_recv() {
                Ok(event) => ready.push(event),
                Err(_) => break,
            }
        }

        for event in ready {
            self.dispatch(event);
        }

        self.drain_broadcasts();
    }

    fn handle_accept(&mut self, accepted: io::Result<(TcpStream, SocketAddr)>) {
        let (stream, peer) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                return;
            }
        };

        let connection = Connection::spawn(
            stream,
            peer,
            self.inbound_tx.clone(),
            self.config.outbound_buffer,
        );
        let id = connection.id;

        match self.registry.add(connection) {
            Ok(()) => {
                info!("Connection {} accepted from {}", id, peer);
                debug!("Total connections: {}", self.registry.len());
            }
            Err(rejected) => {
                warn!(
                    "Connection limit reached ({}), rejecting {}",
                    self.registry.len(),
                    rejected.peer
                );
            }
        }
    }

    fn dispatch(&mut self, event: Inbound) {
        match event {
            Inbound::Failed { id, error } => self.remove_connection(id, error),
            Inbound::Request { id, request } => {
                let Some(connection) = self.registry.get(id) else {
                    debug!("Ignoring request from removed connection {}", id);
                    return;
                };
                info!("Received message from {}: {:?}", connection.peer, request);

                match process_request(request, &mut self.queue) {
                    Outcome::Reply(reply) => self.reply(id, reply),
                    Outcome::Enqueued => {}
                }
            }
        }
    }

    /// Best-effort: a reply that finds the outbound buffer full is dropped
    /// and logged, and the connection stays open.
    fn reply(&mut self, id: ConnectionId, reply: ServerMessage) {
        let Some(connection) = self.registry.get(id) else {
            return;
        };

        let kind = reply.kind();
        match connection.try_deliver(reply) {
            Ok(()) => {}
            Err(DeliveryError::Full) => {
                warn!(
                    "Outbound buffer of {} full, {} dropped",
                    connection.peer, kind
                );
            }
            Err(e @ DeliveryError::Closed) => self.remove_connection(id, e),
        }
    }

    /// Deliver queued payloads, oldest first, to every writable connection
    ///
    /// A payload is dequeued before delivery and never re-queued. A failed
    /// recipient is removed; a recipient whose buffer fills up misses the
    /// rest of this iteration's payloads.
    fn drain_broadcasts(&mut self) {
        let mut writable = self.registry.writable();
        let mut failed = Vec::new();

        while !writable.is_empty() {
            let Some(chat) = self.queue.dequeue() else {
                break;
            };
            let msg = ServerMessage::broadcast(chat.sender, chat.text, epoch_seconds());

            writable.retain(|id| {
                let Some(connection) = self.registry.get(*id) else {
                    return false;
                };
                match connection.try_deliver(msg.clone()) {
                    Ok(()) => true,
                    Err(DeliveryError::Full) => {
                        debug!("{} not writable, skipping broadcast", connection.peer);
                        false
                    }
                    Err(DeliveryError::Closed) => {
                        failed.push(*id);
                        false
                    }
                }
            });

            for id in failed.drain(..) {
                self.remove_connection(id, DeliveryError::Closed);
            }
        }
    }

    fn remove_connection(&mut self, id: ConnectionId, reason: impl std::fmt::Display) {
        if let Some(connection) = self.registry.remove(id) {
            info!("Client {} disconnected: {}", connection.peer, reason);
            debug!("Total connections: {}", self.registry.len());
        }
    }
}

/// Current time as fractional epoch seconds
fn epoch_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
