//! In-memory account store.

use crate::storage::{Account, AccountStore, StoreError};
use std::collections::HashMap;

/// A `HashMap`-backed store. Nothing survives a restart.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    accounts: HashMap<String, Account>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `accounts`.
    pub fn with_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        Self {
            accounts: accounts
                .into_iter()
                .map(|account| (account.id.clone(), account))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl AccountStore for MemoryStore {
    fn get(&self, id: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.get(id).cloned())
    }

    fn put(&mut self, account: &Account) -> Result<(), StoreError> {
        self.accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }
}
