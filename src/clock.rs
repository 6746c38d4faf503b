//! Lamport Logical Clock
//!
//! Every participant (the server and each client) owns one of these.
//! The clock is advanced on every local event and pulled forward on
//! every received message, which gives all messages a causal order
//! without any wall-clock agreement.
//!
//! ## Rules
//!
//! ```text
//! local event / send:   value = value + 1
//! receive(remote):      value = max(value, remote) + 1
//! ```
//!
//! If event A happened-before event B, then `time(A) < time(B)`.
//!
//! ## Range
//!
//! Remote timestamps above [`MAX_TIMESTAMP`] are refused by
//! [`LamportClock::merge`] and never reach the clock. That leaves `2^63`
//! local events of headroom, so `value + 1` cannot overflow.

use thiserror::Error;
use tracing::debug;

/// A logical timestamp.
pub type Timestamp = u64;

/// Largest timestamp a clock will accept from a peer.
pub const MAX_TIMESTAMP: Timestamp = i64::MAX as Timestamp;

/// Errors raised by [`LamportClock::merge`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ClockError {
    /// The remote timestamp is above [`MAX_TIMESTAMP`]
    #[error("timestamp {0} is out of range")]
    OutOfRange(Timestamp),
}

/// A Lamport logical clock.
///
/// The clock itself is not synchronized. The server keeps its single
/// instance inside the [`Ledger`](crate::storage::Ledger) lock; clients
/// own theirs outright.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LamportClock {
    value: Timestamp,
}

impl LamportClock {
    /// Creates a clock starting at zero.
    pub fn new() -> Self {
        Self { value: 0 }
    }

    /// Creates a clock starting at the given value, capped at [`MAX_TIMESTAMP`].
    pub fn starting_at(value: Timestamp) -> Self {
        Self {
            value: value.min(MAX_TIMESTAMP),
        }
    }

    /// Returns the current value without advancing.
    #[inline]
    pub fn value(&self) -> Timestamp {
        self.value
    }

    /// Records a local event and returns the new value.
    pub fn tick(&mut self) -> Timestamp {
        self.value += 1;
        debug!(clock = self.value, "Logical clock ticked");
        self.value
    }

    /// Records receipt of a message stamped with `remote`.
    ///
    /// The returned value is strictly greater than both the previous
    /// local value and `remote`. A `remote` above [`MAX_TIMESTAMP`] is
    /// refused and the clock is left untouched.
    pub fn merge(&mut self, remote: Timestamp) -> Result<Timestamp, ClockError> {
        if remote > MAX_TIMESTAMP {
            return Err(ClockError::OutOfRange(remote));
        }
        self.value = self.value.max(remote) + 1;
        debug!(clock = self.value, remote, "Logical clock merged");
        Ok(self.value)
    }
}
