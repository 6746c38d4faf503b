//! Domain errors.
//!
//! None of these abort anything. Each one becomes an Error response whose
//! text is the `Display` form below, and the connection stays open.

use crate::storage::StoreError;
use thiserror::Error;

/// Why an operation was refused.
///
/// Every check runs before any record is written, so a refused operation
/// has mutated nothing.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("account not found")]
    AccountNotFound,

    #[error("source account not found")]
    SourceNotFound,

    #[error("destination account not found")]
    DestinationNotFound,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("cannot transfer to same account")]
    SameAccountTransfer,

    #[error("invalid operation")]
    UnrecognizedOperation,

    /// The resulting balance would not be representable
    #[error("invalid amount")]
    InvalidAmount,

    /// The store failed while loading or saving
    #[error("storage failure")]
    Storage(#[from] StoreError),
}
