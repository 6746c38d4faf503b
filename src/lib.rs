//! # Lamport Bank - A Distributed Banking Service with Logical Clocks
//!
//! A central server accepts many concurrent client connections, each one an
//! account holder, and runs balance, withdraw, deposit and transfer
//! operations against persisted account records. The server and every
//! client keep a Lamport logical clock; every message carries a timestamp
//! and receiving it pulls the receiver's clock forward.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              Bank Server                                │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐             │
//! │  │ TCP Server  │───>│ Connection  │───>│ Operation        │             │
//! │  │ (Listener)  │    │  Handler    │    │ Dispatcher       │             │
//! │  └─────────────┘    └──────┬──────┘    └────────┬─────────┘             │
//! │                            │                    │                       │
//! │                            │ merge clock        ▼                       │
//! │  ┌─────────────┐           │   ┌──────────────────────────────────────┐ │
//! │  │   Wire      │           └──>│               Ledger                 │ │
//! │  │   Codec     │               │  one Mutex over:                     │ │
//! │  │             │               │   LamportClock + AccountStore        │ │
//! │  └─────────────┘               └──────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//!          ▲
//!          │ t:<time>|op:<code>|...
//!          │
//!   ┌──────┴────────┐
//!   │ ClientSession │  private LamportClock, one request in flight
//!   └───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use lamport_bank::server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = Server::open(&ServerConfig::default()).await?;
//!     server.run_until(async { tokio::signal::ctrl_c().await.ok(); }).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Operations
//!
//! | Code | Operation | Wire form                                        |
//! |------|-----------|--------------------------------------------------|
//! | 1    | Balance   | `t:<t>\|op:1\|rg:<id>`                           |
//! | 2    | Withdraw  | `t:<t>\|op:2\|rg:<id>\|valor:<amount>`           |
//! | 3    | Deposit   | `t:<t>\|op:3\|rg:<id>\|valor:<amount>`           |
//! | 4    | Transfer  | `t:<t>\|op:4\|rg_origem:<id>\|rg_destino:<id>\|valor:<amount>` |
//! | 6    | Login     | `t:<t>\|op:6\|rg:<id>`                           |
//!
//! Responses are `t:<t>|s:0|resposta:<text>` (success) or
//! `t:<t>|s:1|resposta:<text>` (error).
//!
//! ## Module Overview
//!
//! - [`clock`]: Lamport logical clock
//! - [`protocol`]: wire message types, encoding and decoding
//! - [`storage`]: account records, stores and the ledger lock
//! - [`commands`]: operation dispatch and transfer logic
//! - [`connection`]: per-connection read/dispatch/respond loop
//! - [`server`]: listener and lifecycle
//! - [`client`]: client session
//!
//! ## Design Highlights
//!
//! ### One Lock
//!
//! Every clock update and every load-mutate-persist sequence runs under
//! a single mutex. All account activity is serialized server-wide, which
//! makes every operation linearizable at the cost of throughput.
//!
//! ### No Cache
//!
//! Accounts are read from the store at the start of each operation and
//! written back before the response is sent.
//!
//! ### Exact Amounts
//!
//! Amounts are `rust_decimal::Decimal`, so `0.1 + 0.2` is `0.3` on both
//! ends of the wire.

pub mod client;
pub mod clock;
pub mod commands;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use client::{ClientConfig, ClientError, ClientSession};
pub use clock::{ClockError, LamportClock, Timestamp, MAX_TIMESTAMP};
pub use commands::{OperationDispatcher, OperationError};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{DecodeError, Request, Response};
pub use server::{Server, ServerConfig, ServerError};
pub use storage::{Account, AccountStore, FileStore, Ledger, MemoryStore};

/// The default port the bank server listens on
pub const DEFAULT_PORT: u16 = 5000;

/// The default host the bank server binds to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// The default directory for account records
pub const DEFAULT_DATA_DIR: &str = "accounts";

/// Version of the bank service
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
