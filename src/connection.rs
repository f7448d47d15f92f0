//! Per-connection plumbing
//!
//! Each accepted socket is split into a reader task and a writer task.
//! The reader decodes requests and forwards them to the event loop; the
//! writer drains a bounded outbound channel into the socket. The event
//! loop only ever holds a [`Connection`] handle and never blocks on a
//! socket itself.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::codec::{read_message, write_message};
use crate::error::{CodecError, DeliveryError, ProtocolError};
use crate::message::{Request, ServerMessage};
use crate::types::ConnectionId;

/// How long a removed connection's writer may keep flushing queued messages
pub const FLUSH_GRACE: Duration = Duration::from_secs(2);

/// Events flowing from connection tasks into the event loop
#[derive(Debug)]
pub enum Inbound {
    /// One complete message was read and validated (or failed validation)
    Request {
        id: ConnectionId,
        request: Result<Request, ProtocolError>,
    },
    /// Reading or writing failed; the connection is dead
    Failed { id: ConnectionId, error: CodecError },
}

impl Inbound {
    /// Connection this event came from
    pub fn connection_id(&self) -> ConnectionId {
        match self {
            Inbound::Request { id, .. } | Inbound::Failed { id, .. } => *id,
        }
    }
}

/// Handle to one accepted client, owned by the registry
#[derive(Debug)]
pub struct Connection {
    /// Unique identifier for this connection
    pub id: ConnectionId,
    /// Remote address, for diagnostics
    pub peer: SocketAddr,
    outbound: mpsc::Sender<ServerMessage>,
    reader: Option<AbortHandle>,
    writer: Option<AbortHandle>,
    flush_grace: Duration,
}

impl Connection {
    /// Spawn reader and writer tasks for an accepted stream
    pub fn spawn(
        stream: TcpStream,
        peer: SocketAddr,
        inbound: mpsc::Sender<Inbound>,
        outbound_buffer: usize,
    ) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self::from_parts(
            peer,
            read_half,
            write_half,
            inbound,
            outbound_buffer,
            FLUSH_GRACE,
        )
    }

    fn from_parts<R, W>(
        peer: SocketAddr,
        read_half: R,
        write_half: W,
        inbound: mpsc::Sender<Inbound>,
        outbound_buffer: usize,
        flush_grace: Duration,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let id = ConnectionId::new();
        let (outbound_tx, outbound_rx) = mpsc::channel(outbound_buffer);

        let reader = tokio::spawn(read_loop(id, read_half, inbound.clone()));
        let writer = tokio::spawn(write_loop(id, write_half, outbound_rx, inbound));

        Self {
            id,
            peer,
            outbound: outbound_tx,
            reader: Some(reader.abort_handle()),
            writer: Some(writer.abort_handle()),
            flush_grace,
        }
    }

    /// Build a connection around an existing outbound channel, with no socket tasks
    pub fn detached(
        id: ConnectionId,
        peer: SocketAddr,
        outbound: mpsc::Sender<ServerMessage>,
    ) -> Self {
        Self {
            id,
            peer,
            outbound,
            reader: None,
            writer: None,
            flush_grace: FLUSH_GRACE,
        }
    }

    /// Whether this peer is ready for a write attempt
    ///
    /// A closed peer reports ready, like a dead socket in a readiness poll:
    /// the attempt then fails and the connection gets removed.
    pub fn is_writable(&self) -> bool {
        self.outbound.is_closed() || self.outbound.capacity() > 0
    }

    /// Queue a message without waiting
    pub fn try_deliver(&self, msg: ServerMessage) -> Result<(), DeliveryError> {
        self.outbound.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        // The writer exits on its own once `outbound` is dropped and the
        // queue is flushed. A peer that stops reading would block it forever,
        // so it is cut off after `flush_grace` either way.
        if let Some(writer) = self.writer.take() {
            let grace = self.flush_grace;
            match Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        tokio::time::sleep(grace).await;
                        writer.abort();
                    });
                }
                Err(_) => writer.abort(),
            }
        }
    }
}

/// Socket → event loop
async fn read_loop<R>(id: ConnectionId, read_half: R, inbound: mpsc::Sender<Inbound>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(read_half);
    loop {
        let event = match read_message(&mut reader).await {
            Ok(fields) => Inbound::Request {
                id,
                request: Request::try_from(fields),
            },
            Err(error) => {
                let _ = inbound.send(Inbound::Failed { id, error }).await;
                break;
            }
        };

        if inbound.send(event).await.is_err() {
            debug!("Event loop closed, ending read task for {}", id);
            break;
        }
    }
    debug!("Read task ended for {}", id);
}

/// Event loop → socket
async fn write_loop<W>(
    id: ConnectionId,
    mut write_half: W,
    mut outbound: mpsc::Receiver<ServerMessage>,
    inbound: mpsc::Sender<Inbound>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = outbound.recv().await {
        if let Err(error) = write_message(&mut write_half, &msg).await {
            debug!("Write to {} failed: {}", id, error);
            let _ = inbound.send(Inbound::Failed { id, error }).await;
            break;
        }
    }
    debug!("Write task ended for {}", id);
}
