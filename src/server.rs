//! Bank Server
//!
//! Owns the listening socket, the shared [`Ledger`] (server clock plus
//! account store behind one lock) and the connection statistics. Each
//! accepted connection runs in its own tokio task.
//!
//! Shutdown only stops accepting: the listener is dropped, and tasks
//! already serving clients keep going until their sockets close.

use crate::commands::OperationDispatcher;
use crate::connection::{handle_connection, ConnectionStats, DEFAULT_POLL_INTERVAL};
use crate::storage::{AccountStore, FileStore, Ledger, StoreError};
use std::future::Future;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Directory holding one JSON file per account
    pub data_dir: PathBuf,
    /// Idle read timeout before a connection polls again
    pub poll_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: crate::DEFAULT_HOST.to_string(),
            port: crate::DEFAULT_PORT,
            data_dir: PathBuf::from(crate::DEFAULT_DATA_DIR),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ServerConfig {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Errors that stop the server before it accepts anything.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Another process already holds the port
    #[error("port {port} is already in use")]
    PortInUse { port: u16 },

    /// Binding failed for another reason
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The account store could not be opened
    #[error("failed to open account store: {0}")]
    Store(#[from] StoreError),
}

/// A bound, not yet running, bank server.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    ledger: Arc<Ledger>,
    stats: Arc<ConnectionStats>,
    poll_interval: Duration,
}

impl Server {
    /// Opens the file store from `config.data_dir` and binds.
    pub async fn open(config: &ServerConfig) -> Result<Self, ServerError> {
        let store = FileStore::open(&config.data_dir)?;
        Self::bind(config, store).await
    }

    /// Binds the listener over the given store.
    ///
    /// Fails with [`ServerError::PortInUse`] if the port is taken.
    pub async fn bind(
        config: &ServerConfig,
        store: impl AccountStore + 'static,
    ) -> Result<Self, ServerError> {
        let addr = config.bind_address();
        let listener = TcpListener::bind(&addr).await.map_err(|source| {
            if source.kind() == ErrorKind::AddrInUse {
                ServerError::PortInUse { port: config.port }
            } else {
                ServerError::Bind { addr, source }
            }
        })?;

        Ok(Self {
            listener,
            ledger: Arc::new(Ledger::new(store)),
            stats: Arc::new(ConnectionStats::new()),
            poll_interval: config.poll_interval,
        })
    }

    /// Returns the address actually bound.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Returns the shared ledger.
    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Returns the shared connection statistics.
    pub fn stats(&self) -> &Arc<ConnectionStats> {
        &self.stats
    }

    /// Accepts connections until `shutdown` resolves, then closes the listener.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) {
        if let Ok(addr) = self.local_addr() {
            info!("Listening on {}", addr);
        }

        tokio::select! {
            _ = self.accept_loop() => {}
            _ = shutdown => {
                info!("Shutdown requested, no longer accepting connections");
            }
        }

        info!(
            connections = self.stats.connections_accepted.load(Ordering::Relaxed),
            messages = self.stats.messages_processed.load(Ordering::Relaxed),
            clock = self.ledger.clock_value(),
            "Listener closed"
        );
    }

    /// Accepts connections forever.
    pub async fn run(self) {
        self.run_until(std::future::pending()).await
    }

    /// Main loop that accepts incoming connections
    async fn accept_loop(&self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    // Each connection gets its own dispatcher over the shared ledger
                    let dispatcher = OperationDispatcher::new(Arc::clone(&self.ledger));
                    let stats = Arc::clone(&self.stats);
                    let poll_interval = self.poll_interval;

                    tokio::spawn(async move {
                        handle_connection(stream, addr, dispatcher, stats, poll_interval).await;
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}
