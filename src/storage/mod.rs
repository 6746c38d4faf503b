//! Account Storage Module
//!
//! This module owns everything the server keeps about accounts: the
//! record type, the persistence contract, two stores that satisfy it,
//! and the [`Ledger`] that serializes every access to them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Ledger                             │
//! │               Mutex<LedgerState> (one lock)                 │
//! │  ┌──────────────────┐      ┌──────────────────────────────┐ │
//! │  │  LamportClock    │      │  Box<dyn AccountStore>       │ │
//! │  │  (server clock)  │      │  FileStore / MemoryStore     │ │
//! │  └──────────────────┘      └──────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no account cache. Every operation loads the records it needs,
//! mutates them and writes them back while holding the ledger lock.
//!
//! ## Example
//!
//! ```
//! use lamport_bank::storage::{Account, AccountStore, MemoryStore};
//! use rust_decimal::Decimal;
//!
//! let mut store = MemoryStore::new();
//! store.put(&Account::new("1001", "Ana", Decimal::new(10000, 2))).unwrap();
//!
//! let account = store.get("1001").unwrap().unwrap();
//! assert_eq!(account.balance.to_string(), "100.00");
//! assert!(store.get("9999").unwrap().is_none());
//! ```

pub mod account;
pub mod file;
pub mod ledger;
pub mod memory;

// Re-export commonly used types
pub use account::Account;
pub use file::FileStore;
pub use ledger::{Ledger, LedgerState};
pub use memory::MemoryStore;

use thiserror::Error;

/// Errors raised by an [`AccountStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored record could not be read or written as JSON
    #[error("corrupt record for account '{id}': {source}")]
    Corrupt {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// The id cannot name a record in this store
    #[error("invalid account id '{0}'")]
    InvalidId(String),
}

/// Persistence contract for account records.
///
/// One record per account id. `get` returns `Ok(None)` when no record
/// exists; `put` must be durable by the time it returns, because the
/// response for the operation is sent right after.
///
/// Stores are only ever used from inside the [`Ledger`] lock, so they
/// need `Send` but not `Sync`.
pub trait AccountStore: Send {
    /// Loads the record for `id`.
    fn get(&self, id: &str) -> Result<Option<Account>, StoreError>;

    /// Creates or overwrites the record for `account.id`.
    fn put(&mut self, account: &Account) -> Result<(), StoreError>;
}
