//! Client Session Module
//!
//! The account holder's side of the protocol. A session owns a private
//! Lamport clock and keeps exactly one request in flight:
//!
//! ```text
//! tick clock ──> send request ──> await response ──> merge clock
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use lamport_bank::client::ClientSession;
//! use rust_decimal::Decimal;
//!
//! let mut session = ClientSession::connect("127.0.0.1:5000").await?;
//! session.login("1001").await?;
//! let response = session.deposit(Decimal::new(5000, 2)).await?;
//! println!("{}", response.text());
//! ```

pub mod session;

pub use session::{ClientConfig, ClientError, ClientSession};
