//! The Ledger: one lock over the server clock and the account store.
//!
//! Every clock update and every load-mutate-persist sequence, for every
//! operation type, runs while holding this single mutex. Operations are
//! therefore linearizable regardless of which accounts they touch.
//!
//! The lock is a `std::sync::Mutex`: the critical section never awaits,
//! and socket reads happen outside it.

use crate::clock::{ClockError, LamportClock, Timestamp};
use crate::storage::{Account, AccountStore, StoreError};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Everything guarded by the ledger lock.
pub struct LedgerState {
    /// The server's logical clock
    pub clock: LamportClock,
    /// Account persistence
    pub store: Box<dyn AccountStore>,
}

/// Shared server state behind a single coarse-grained lock.
///
/// Wrap in an `Arc` and hand a clone to every connection.
pub struct Ledger {
    state: Mutex<LedgerState>,
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("clock", &self.clock_value())
            .finish()
    }
}

impl Ledger {
    /// Creates a ledger with a zeroed clock.
    pub fn new(store: impl AccountStore + 'static) -> Self {
        Self::with_clock(store, LamportClock::new())
    }

    /// Creates a ledger whose clock starts from `clock`.
    pub fn with_clock(store: impl AccountStore + 'static, clock: LamportClock) -> Self {
        Self {
            state: Mutex::new(LedgerState {
                clock,
                store: Box::new(store),
            }),
        }
    }

    /// Enters the critical section.
    ///
    /// A poisoned lock is recovered: records are only written after every
    /// check has passed, so a panic inside the section leaves nothing
    /// half-validated behind.
    pub fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merges the server clock with a received timestamp.
    ///
    /// An out-of-range timestamp leaves the clock untouched.
    pub fn merge_clock(&self, remote: Timestamp) -> Result<Timestamp, ClockError> {
        self.lock().clock.merge(remote)
    }

    /// Advances the server clock for a local event.
    pub fn tick_clock(&self) -> Timestamp {
        self.lock().clock.tick()
    }

    /// Reads the server clock.
    pub fn clock_value(&self) -> Timestamp {
        self.lock().clock.value()
    }

    /// Loads an account under the lock.
    pub fn account(&self, id: &str) -> Result<Option<Account>, StoreError> {
        self.lock().store.get(id)
    }
}
