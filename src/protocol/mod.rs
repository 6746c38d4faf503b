//! Bank Wire Protocol
//!
//! This module implements the pipe-delimited text protocol spoken between
//! clients and the bank server.
//!
//! ## Overview
//!
//! Each message is one line of `key:value` fields separated by `|`. The
//! first field is always the sender's Lamport timestamp, so a receiver
//! can advance its clock before it knows what the rest of the message is.
//!
//! ## Modules
//!
//! - `types`: `Request`, `Response`, operation and status codes, encoding
//! - `parser`: decoding and timestamp extraction
//!
//! ## Example
//!
//! ```
//! use lamport_bank::protocol::{decode_request, extract_timestamp, Request};
//!
//! let line = "t:3|op:1|rg:1001";
//! assert_eq!(extract_timestamp(line), Ok(3));
//!
//! let request = decode_request(line).unwrap();
//! assert_eq!(request, Request::Balance { time: 3, account_id: "1001".into() });
//! assert_eq!(request.encode(), line);
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{
    decode_request, decode_response, extract_timestamp, is_valid_account_id, DecodeError,
    DecodeResult,
};
pub use types::{Amount, OpCode, Request, Response, Status};

/// Maximum number of bytes taken from the socket as one message.
pub const MAX_MESSAGE_SIZE: usize = 1024;
