//! Account record.

use crate::protocol::Amount;
use serde::{Deserialize, Serialize};

/// A persisted account. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub balance: Amount,
}

impl Account {
    pub fn new(id: impl Into<String>, name: impl Into<String>, balance: Amount) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            balance,
        }
    }

    /// Returns true if the balance covers `amount`.
    #[inline]
    pub fn can_cover(&self, amount: Amount) -> bool {
        self.balance >= amount
    }

    /// Adds `amount` to the balance.
    ///
    /// Returns `None` and leaves the balance alone if the result would
    /// not fit in an [`Amount`].
    #[must_use]
    pub fn credit(&mut self, amount: Amount) -> Option<Amount> {
        self.balance = self.balance.checked_add(amount)?;
        Some(self.balance)
    }

    /// Subtracts `amount` from the balance.
    ///
    /// Callers check [`can_cover`](Self::can_cover) first; this only
    /// guards against overflow.
    #[must_use]
    pub fn debit(&mut self, amount: Amount) -> Option<Amount> {
        self.balance = self.balance.checked_sub(amount)?;
        Some(self.balance)
    }
}
