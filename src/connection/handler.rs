//! Connection Handler Module
//!
//! This module handles individual client connections to the bank server.
//! Each client gets its own handler task that runs in a loop, reading
//! one message per socket read and answering it.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! Connected ──> Active ──> Closed
//!                 │  ▲
//!                 │  │ read one message
//!                 │  │ merge server clock with its timestamp
//!                 │  │ decode + dispatch
//!                 │  │ write the response
//!                 └──┘
//! ```
//!
//! Login is not a separate state: it is an ordinary request and the
//! client decides whether to carry on after the response.
//!
//! ## Framing
//!
//! The protocol has no length prefix or terminator. Each read of up to
//! [`MAX_MESSAGE_SIZE`] bytes is taken as exactly one message; clients
//! keep a single request in flight, which is what makes that hold.
//!
//! ## Idle Polling
//!
//! Reads are bounded by a poll interval. When it elapses with nothing to
//! read the handler simply polls again; only a closed or failed socket
//! ends the connection. The ledger lock is never held while waiting.
//!
//! ## Blocking Work
//!
//! Dispatching takes the ledger's `std::sync::Mutex` and may read, write
//! and fsync account files. It runs on tokio's blocking pool so a slow
//! store never stalls the async workers that accept connections and poll
//! idle sockets.

use crate::commands::OperationDispatcher;
use crate::protocol::{extract_timestamp, Response, MAX_MESSAGE_SIZE};
use bytes::{BufMut, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::task;
use tracing::{debug, info, trace, warn};

/// How long a read may block before the handler polls again
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total messages answered
    pub messages_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn message_processed(&self) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket accepted, handler task started
    Connected,
    /// Serving requests
    Active,
    /// Socket released; terminal
    Closed,
}

/// Handles a single client connection.
pub struct ConnectionHandler {
    /// The TCP stream for this connection
    stream: BufWriter<TcpStream>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for the message being read
    buffer: BytesMut,

    /// The dispatcher (shares the ledger with every other connection)
    dispatcher: OperationDispatcher,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,

    poll_interval: Duration,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The TCP stream for this connection
    /// * `addr` - The client's socket address
    /// * `dispatcher` - Executes decoded requests against the ledger
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        dispatcher: OperationDispatcher,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(MAX_MESSAGE_SIZE),
            dispatcher,
            stats,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overrides the idle poll interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Runs the connection until the peer leaves or the socket fails.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        self.log_state(ConnectionState::Connected);
        info!(client = %self.addr, "Client connected");
        self.log_state(ConnectionState::Active);

        let result = self.main_loop().await;
        self.log_state(ConnectionState::Closed);

        match &result {
            Ok(()) | Err(ConnectionError::PeerDisconnected) => {
                info!(client = %self.addr, "Client disconnected")
            }
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    fn log_state(&self, state: ConnectionState) {
        trace!(client = %self.addr, state = ?state, "Connection state change");
    }

    /// The read-dispatch-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            let Some(message) = self.read_message().await? else {
                continue;
            };

            let response = self.process_message(message).await?;
            self.send_response(&response).await?;
        }
    }

    /// Reads one message, or `None` if the poll interval elapsed first.
    async fn read_message(&mut self) -> Result<Option<String>, ConnectionError> {
        self.buffer.clear();

        let read = tokio::time::timeout(
            self.poll_interval,
            self.stream
                .get_mut()
                .read_buf(&mut (&mut self.buffer).limit(MAX_MESSAGE_SIZE)),
        )
        .await;

        let n = match read {
            Ok(result) => result?,
            Err(_) => {
                trace!(client = %self.addr, "Idle, polling again");
                return Ok(None);
            }
        };

        if n == 0 {
            return Err(ConnectionError::PeerDisconnected);
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read message");

        Ok(Some(String::from_utf8_lossy(&self.buffer).into_owned()))
    }

    /// Merges the server clock with the message, then dispatches it on
    /// the blocking pool.
    async fn process_message(&self, message: String) -> Result<Response, ConnectionError> {
        let dispatcher = self.dispatcher.clone();
        let addr = self.addr;
        let response = task::spawn_blocking(move || respond(&dispatcher, addr, &message)).await?;

        self.stats.message_processed();
        debug!(client = %self.addr, response = %response, "Answered request");
        Ok(response)
    }

    /// Sends a response to the client.
    async fn send_response(&mut self, response: &Response) -> Result<(), ConnectionError> {
        let bytes = response.encode().into_bytes();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(client = %self.addr, bytes = bytes.len(), "Sent response");
        Ok(())
    }
}

/// Merges the server clock with one message and executes it.
///
/// Takes the ledger lock and may touch the disk, so it must not run on
/// an async worker.
fn respond(dispatcher: &OperationDispatcher, addr: SocketAddr, message: &str) -> Response {
    match extract_timestamp(message) {
        Ok(remote) => {
            if let Err(e) = dispatcher.ledger().merge_clock(remote) {
                debug!(client = %addr, error = %e, "Timestamp refused, clock not merged");
            }
        }
        Err(e) => {
            debug!(client = %addr, error = %e, "Message has no timestamp, clock not merged")
        }
    }

    dispatcher.execute_line(message)
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The dispatch task panicked or was cancelled
    #[error("dispatch task failed: {0}")]
    Dispatch(#[from] task::JoinError),

    /// The peer closed its side of the socket
    #[error("Peer disconnected")]
    PeerDisconnected,
}

/// Handles a client connection.
///
/// Creates a [`ConnectionHandler`] and runs it to completion. Errors only
/// end this connection; they are logged and swallowed here.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    dispatcher: OperationDispatcher,
    stats: Arc<ConnectionStats>,
    poll_interval: Duration,
) {
    let handler =
        ConnectionHandler::new(stream, addr, dispatcher, stats).with_poll_interval(poll_interval);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::PeerDisconnected => {}
            ConnectionError::Io(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}
