//! Operation Dispatch Module
//!
//! This module turns decoded requests into account operations and
//! builds the response for each one.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌──────────────────────┐
//! │  Wire decoder        │  (protocol module)
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │ OperationDispatcher  │  (this module)
//! │                      │
//! │  - Validate          │
//! │  - Mutate + persist  │
//! │  - Tick clock        │
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │ Ledger               │  (storage module)
//! └──────────────────────┘
//! ```
//!
//! ## Operations
//!
//! - `Balance` (op 1) - report the current balance
//! - `Withdraw` (op 2) - debit if funds allow
//! - `Deposit` (op 3) - credit
//! - `Transfer` (op 4) - debit one account and credit another, both or neither
//! - `Login` (op 6) - existence check, no session is created

pub mod error;
pub mod handler;

// Re-export the dispatcher and its error type
pub use error::OperationError;
pub use handler::OperationDispatcher;
