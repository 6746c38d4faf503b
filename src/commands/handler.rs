//! Operation Dispatcher
//!
//! Executes one request against the ledger and returns the response
//! to send back.
//!
//! ## Critical Section
//!
//! ```text
//! lock ledger
//!   ├─ load account(s)        (fresh from the store, no cache)
//!   ├─ validate               (existence, funds)
//!   ├─ mutate + persist
//!   └─ tick server clock      (stamps the response)
//! unlock
//! ```
//!
//! Same-account transfers and undecodable lines are refused without
//! loading anything; they only take the lock to tick the clock.

use crate::clock::Timestamp;
use crate::commands::OperationError;
use crate::protocol::{decode_request, Amount, Request, Response};
use crate::storage::{Account, AccountStore, Ledger};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Outcome of a single operation: the success text or the refusal.
type Outcome = Result<String, OperationError>;

/// Dispatches requests to their handlers.
///
/// Cheap to clone; every connection gets its own clone sharing one
/// [`Ledger`].
#[derive(Debug, Clone)]
pub struct OperationDispatcher {
    ledger: Arc<Ledger>,
}

impl OperationDispatcher {
    /// Creates a dispatcher over the given ledger.
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }

    /// Returns the shared ledger.
    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Decodes a raw line and executes it.
    ///
    /// A line that matches no request yields an "invalid operation"
    /// error response.
    pub fn execute_line(&self, line: &str) -> Response {
        match decode_request(line) {
            Ok(request) => self.execute(request),
            Err(e) => {
                debug!(line, error = %e, "Rejecting undecodable request");
                self.refuse(OperationError::UnrecognizedOperation)
            }
        }
    }

    /// Executes a decoded request.
    pub fn execute(&self, request: Request) -> Response {
        debug!(op = ?request.op_code(), time = request.time(), "Dispatching request");

        if let Request::Transfer { from_id, to_id, .. } = &request {
            if from_id == to_id {
                return self.refuse(OperationError::SameAccountTransfer);
            }
        }

        let mut state = self.ledger.lock();
        let outcome = apply(state.store.as_mut(), &request);
        let time = state.clock.tick();
        drop(state);

        build_response(time, outcome)
    }

    /// Builds an error response that touched no account.
    fn refuse(&self, err: OperationError) -> Response {
        let time = self.ledger.tick_clock();
        build_response(time, Err(err))
    }
}

fn apply(store: &mut dyn AccountStore, request: &Request) -> Outcome {
    match request {
        Request::Balance { account_id, .. } => balance(&*store, account_id),
        Request::Withdraw {
            account_id, amount, ..
        } => withdraw(store, account_id, *amount),
        Request::Deposit {
            account_id, amount, ..
        } => deposit(store, account_id, *amount),
        Request::Transfer {
            from_id,
            to_id,
            amount,
            ..
        } => transfer(store, from_id, to_id, *amount),
        Request::Login { account_id, .. } => login(&*store, account_id),
    }
}

fn build_response(time: Timestamp, outcome: Outcome) -> Response {
    match outcome {
        Ok(text) => Response::success(time, text),
        Err(e) => {
            if let OperationError::Storage(ref source) = e {
                warn!(error = %source, "Operation failed in the account store");
            }
            Response::error(time, e.to_string())
        }
    }
}

fn load(store: &dyn AccountStore, id: &str) -> Result<Account, OperationError> {
    store.get(id)?.ok_or(OperationError::AccountNotFound)
}

fn balance(store: &dyn AccountStore, id: &str) -> Outcome {
    let account = load(store, id)?;
    Ok(format!("balance: {}", account.balance))
}

fn withdraw(store: &mut dyn AccountStore, id: &str, amount: Amount) -> Outcome {
    let mut account = load(&*store, id)?;
    if !account.can_cover(amount) {
        return Err(OperationError::InsufficientFunds);
    }
    account.debit(amount).ok_or(OperationError::InvalidAmount)?;
    store.put(&account)?;
    Ok("withdrawal succeeded".to_string())
}

fn deposit(store: &mut dyn AccountStore, id: &str, amount: Amount) -> Outcome {
    let mut account = load(&*store, id)?;
    account.credit(amount).ok_or(OperationError::InvalidAmount)?;
    store.put(&account)?;
    Ok("deposit succeeded".to_string())
}

/// Moves `amount` between two distinct accounts.
///
/// Both records are written or, if the second write fails, the first is
/// restored before the failure is reported.
fn transfer(store: &mut dyn AccountStore, from_id: &str, to_id: &str, amount: Amount) -> Outcome {
    let mut from = store.get(from_id)?.ok_or(OperationError::SourceNotFound)?;
    let mut to = store.get(to_id)?.ok_or(OperationError::DestinationNotFound)?;

    if !from.can_cover(amount) {
        return Err(OperationError::InsufficientFunds);
    }

    // Both new balances are computed before either record is written
    let original = from.clone();
    from.debit(amount).ok_or(OperationError::InvalidAmount)?;
    to.credit(amount).ok_or(OperationError::InvalidAmount)?;

    store.put(&from)?;
    if let Err(e) = store.put(&to) {
        if let Err(rollback) = store.put(&original) {
            error!(
                account = %original.id,
                error = %rollback,
                "Failed to restore source account after partial transfer"
            );
        }
        return Err(e.into());
    }

    Ok("transfer succeeded".to_string())
}

fn login(store: &dyn AccountStore, id: &str) -> Outcome {
    load(store, id)?;
    Ok("login succeeded".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, StoreError};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn create_dispatcher(accounts: Vec<Account>) -> OperationDispatcher {
        let ledger = Arc::new(Ledger::new(MemoryStore::with_accounts(accounts)));
        OperationDispatcher::new(ledger)
    }

    fn balance_of(dispatcher: &OperationDispatcher, id: &str) -> Amount {
        dispatcher.ledger().account(id).unwrap().unwrap().balance
    }

    /// Counts every load so tests can prove nothing was read.
    #[derive(Clone)]
    struct CountingStore {
        inner: MemoryStore,
        gets: Arc<AtomicUsize>,
    }

    impl AccountStore for CountingStore {
        fn get(&self, id: &str) -> Result<Option<Account>, StoreError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.inner.get(id)
        }

        fn put(&mut self, account: &Account) -> Result<(), StoreError> {
            self.inner.put(account)
        }
    }

    /// Refuses to save one particular account.
    struct FailingStore {
        inner: MemoryStore,
        fail_on: String,
    }

    impl AccountStore for FailingStore {
        fn get(&self, id: &str) -> Result<Option<Account>, StoreError> {
            self.inner.get(id)
        }

        fn put(&mut self, account: &Account) -> Result<(), StoreError> {
            if account.id == self.fail_on {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            self.inner.put(account)
        }
    }

    #[test]
    fn test_scenario() {
        let dispatcher = create_dispatcher(vec![
            Account::new("A", "Ana", dec!(100.00)),
            Account::new("B", "Bo", dec!(0.00)),
        ]);

        let response = dispatcher.execute(Request::Deposit {
            time: 1,
            account_id: "A".into(),
            amount: dec!(50.00),
        });
        assert_eq!(response.text(), "deposit succeeded");
        assert_eq!(balance_of(&dispatcher, "A"), dec!(150.00));

        let response = dispatcher.execute(Request::Withdraw {
            time: 2,
            account_id: "A".into(),
            amount: dec!(200.00),
        });
        assert!(response.is_error());
        assert_eq!(response.text(), "insufficient funds");
        assert_eq!(balance_of(&dispatcher, "A"), dec!(150.00));

        let response = dispatcher.execute(Request::Transfer {
            time: 3,
            from_id: "A".into(),
            to_id: "B".into(),
            amount: dec!(50.00),
        });
        assert_eq!(response, Response::success(response.time(), "transfer succeeded"));
        assert_eq!(balance_of(&dispatcher, "A"), dec!(100.00));
        assert_eq!(balance_of(&dispatcher, "B"), dec!(50.00));

        let response = dispatcher.execute(Request::Balance {
            time: 4,
            account_id: "A".into(),
        });
        assert!(!response.is_error());
        assert!(response.text().contains("100.00"));

        let response = dispatcher.execute(Request::Login {
            time: 5,
            account_id: "Z".into(),
        });
        assert_eq!(response, Response::error(response.time(), "account not found"));
    }

    #[test]
    fn test_balance_text() {
        let dispatcher = create_dispatcher(vec![Account::new("1", "Ana", dec!(12.50))]);
        let response = dispatcher.execute_line("t:1|op:1|rg:1");
        assert_eq!(response.text(), "balance: 12.50");
    }

    #[test]
    fn test_unknown_account_everywhere() {
        let dispatcher = create_dispatcher(vec![]);
        for line in [
            "t:1|op:1|rg:9",
            "t:1|op:2|rg:9|valor:1",
            "t:1|op:3|rg:9|valor:1",
            "t:1|op:6|rg:9",
        ] {
            let response = dispatcher.execute_line(line);
            assert_eq!(response.text(), "account not found", "line {line}");
            assert!(response.is_error());
        }
    }

    #[test]
    fn test_login_success() {
        let dispatcher = create_dispatcher(vec![Account::new("1", "Ana", dec!(0))]);
        let response = dispatcher.execute_line("t:1|op:6|rg:1");
        assert_eq!(response.text(), "login succeeded");
        assert!(!response.is_error());
    }

    #[test]
    fn test_invalid_operation() {
        let dispatcher = create_dispatcher(vec![]);
        for line in ["", "PING", "t:1|op:5|rg:1", "t:1|op:1"] {
            let response = dispatcher.execute_line(line);
            assert_eq!(response, Response::error(response.time(), "invalid operation"));
        }
    }

    #[test]
    fn test_withdraw_exact_balance() {
        let dispatcher = create_dispatcher(vec![Account::new("1", "Ana", dec!(10.00))]);
        let response = dispatcher.execute_line("t:1|op:2|rg:1|valor:10.00");
        assert_eq!(response.text(), "withdrawal succeeded");
        assert_eq!(balance_of(&dispatcher, "1"), dec!(0));
    }

    #[test]
    fn test_transfer_insufficient_leaves_both_unchanged() {
        let dispatcher = create_dispatcher(vec![
            Account::new("1", "Ana", dec!(10)),
            Account::new("2", "Bo", dec!(5)),
        ]);
        let response = dispatcher.execute_line("t:1|op:4|rg_origem:1|rg_destino:2|valor:10.01");
        assert_eq!(response.text(), "insufficient funds");
        assert_eq!(balance_of(&dispatcher, "1"), dec!(10));
        assert_eq!(balance_of(&dispatcher, "2"), dec!(5));
    }

    #[test]
    fn test_transfer_names_missing_side() {
        let dispatcher = create_dispatcher(vec![Account::new("1", "Ana", dec!(10))]);

        let response = dispatcher.execute_line("t:1|op:4|rg_origem:9|rg_destino:1|valor:1");
        assert_eq!(response.text(), "source account not found");

        let response = dispatcher.execute_line("t:1|op:4|rg_origem:1|rg_destino:9|valor:1");
        assert_eq!(response.text(), "destination account not found");
        assert_eq!(balance_of(&dispatcher, "1"), dec!(10));
    }

    #[test]
    fn test_same_account_transfer_loads_nothing() {
        let gets = Arc::new(AtomicUsize::new(0));
        let store = CountingStore {
            inner: MemoryStore::with_accounts([Account::new("1", "Ana", dec!(10))]),
            gets: Arc::clone(&gets),
        };
        let dispatcher = OperationDispatcher::new(Arc::new(Ledger::new(store)));

        let response = dispatcher.execute_line("t:1|op:4|rg_origem:1|rg_destino:1|valor:1");
        assert_eq!(response.text(), "cannot transfer to same account");
        assert_eq!(gets.load(Ordering::SeqCst), 0);
        assert_eq!(dispatcher.ledger().clock_value(), 1);
    }

    #[test]
    fn test_transfer_restores_source_when_destination_save_fails() {
        let store = FailingStore {
            inner: MemoryStore::with_accounts([
                Account::new("1", "Ana", dec!(10)),
                Account::new("2", "Bo", dec!(0)),
            ]),
            fail_on: "2".to_string(),
        };
        let dispatcher = OperationDispatcher::new(Arc::new(Ledger::new(store)));

        let response = dispatcher.execute_line("t:1|op:4|rg_origem:1|rg_destino:2|valor:4");
        assert_eq!(response.text(), "storage failure");
        assert!(response.is_error());
        assert_eq!(balance_of(&dispatcher, "1"), dec!(10));
        assert_eq!(balance_of(&dispatcher, "2"), dec!(0));
    }

    #[test]
    fn test_negative_amount_is_not_rejected() {
        // Amounts are not sign-checked at the protocol layer
        let dispatcher = create_dispatcher(vec![Account::new("1", "Ana", dec!(10))]);
        let response = dispatcher.execute_line("t:1|op:3|rg:1|valor:-3");
        assert!(!response.is_error());
        assert_eq!(balance_of(&dispatcher, "1"), dec!(7));
    }

    #[test]
    fn test_overflowing_amounts_are_refused() {
        let dispatcher = create_dispatcher(vec![
            Account::new("1", "Ana", dec!(1)),
            Account::new("2", "Bo", Amount::MAX),
        ]);

        let response =
            dispatcher.execute_line("t:1|op:3|rg:1|valor:79228162514264337593543950335");
        assert_eq!(response, Response::error(response.time(), "invalid amount"));
        assert_eq!(balance_of(&dispatcher, "1"), dec!(1));

        // a huge negative withdrawal passes the funds check but cannot be applied
        let response =
            dispatcher.execute_line("t:2|op:2|rg:1|valor:-79228162514264337593543950335");
        assert_eq!(response.text(), "invalid amount");
        assert_eq!(balance_of(&dispatcher, "1"), dec!(1));

        // destination would overflow: neither side is written
        let response = dispatcher.execute_line(
            "t:3|op:4|rg_origem:2|rg_destino:1|valor:79228162514264337593543950335",
        );
        assert_eq!(response.text(), "invalid amount");
        assert_eq!(balance_of(&dispatcher, "1"), dec!(1));
        assert_eq!(balance_of(&dispatcher, "2"), Amount::MAX);

        // the connection's dispatcher keeps working afterwards
        let response = dispatcher.execute_line("t:4|op:3|rg:1|valor:1");
        assert_eq!(response.text(), "deposit succeeded");
        assert_eq!(balance_of(&dispatcher, "1"), dec!(2));
    }

    #[test]
    fn test_overflowing_transfer_writes_nothing() {
        let store = FailingStore {
            inner: MemoryStore::with_accounts([
                Account::new("1", "Ana", Amount::MAX),
                Account::new("2", "Bo", dec!(1)),
            ]),
            // any write at all would surface as a storage failure
            fail_on: "1".to_string(),
        };
        let dispatcher = OperationDispatcher::new(Arc::new(Ledger::new(store)));

        let response = dispatcher.execute_line(
            "t:1|op:4|rg_origem:1|rg_destino:2|valor:79228162514264337593543950335",
        );
        assert_eq!(response.text(), "invalid amount");
        assert_eq!(balance_of(&dispatcher, "1"), Amount::MAX);
        assert_eq!(balance_of(&dispatcher, "2"), dec!(1));
    }

    #[test]
    fn test_every_response_ticks_clock() {
        let dispatcher = create_dispatcher(vec![Account::new("1", "Ana", dec!(10))]);
        let ledger = Arc::clone(dispatcher.ledger());

        let request_time = 40;
        ledger.merge_clock(request_time).unwrap();
        let response = dispatcher.execute_line("t:40|op:1|rg:1");
        assert!(response.time() >= request_time + 2);

        let before = ledger.clock_value();
        let response = dispatcher.execute_line("garbage");
        assert_eq!(response.time(), before + 1);
    }

    #[test]
    fn test_concurrent_deposits_are_not_lost() {
        const CLIENTS: usize = 16;
        const DEPOSITS: usize = 25;

        let dispatcher = create_dispatcher(vec![Account::new("1", "Ana", dec!(100.00))]);
        let mut handles = vec![];

        for _ in 0..CLIENTS {
            let dispatcher = dispatcher.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..DEPOSITS {
                    let response = dispatcher.execute_line("t:1|op:3|rg:1|valor:0.10");
                    assert!(!response.is_error());
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let expected = dec!(100.00) + dec!(0.10) * Amount::from(CLIENTS * DEPOSITS);
        assert_eq!(balance_of(&dispatcher, "1"), expected);
        assert_eq!(
            dispatcher.ledger().clock_value(),
            (CLIENTS * DEPOSITS) as u64
        );
    }

    #[test]
    fn test_concurrent_transfers_conserve_money() {
        let dispatcher = create_dispatcher(vec![
            Account::new("1", "Ana", dec!(500)),
            Account::new("2", "Bo", dec!(500)),
        ]);
        let mut handles = vec![];

        for i in 0..8 {
            let dispatcher = dispatcher.clone();
            let line = if i % 2 == 0 {
                "t:1|op:4|rg_origem:1|rg_destino:2|valor:7"
            } else {
                "t:1|op:4|rg_origem:2|rg_destino:1|valor:3"
            };
            handles.push(thread::spawn(move || {
                for _ in 0..50 {
                    dispatcher.execute_line(line);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let total = balance_of(&dispatcher, "1") + balance_of(&dispatcher, "2");
        assert_eq!(total, dec!(1000));
        assert!(balance_of(&dispatcher, "1") >= dec!(0));
        assert!(balance_of(&dispatcher, "2") >= dec!(0));
    }
}
