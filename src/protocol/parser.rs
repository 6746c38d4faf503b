//! Wire Message Decoder
//!
//! Turns a received line back into a [`Request`] or [`Response`].
//!
//! ## Decoding Order
//!
//! 1. The timestamp is pulled out first with [`extract_timestamp`]. The
//!    receiver merges its clock with it even when the rest of the
//!    message turns out to be garbage.
//! 2. The second field (`op:` for requests, `s:` for responses) selects
//!    the variant directly.
//! 3. The remaining fields must match that variant's field list exactly.
//!    Anything else is an [`DecodeError::UnrecognizedOperation`] for
//!    requests or a [`DecodeError::MalformedResponse`] for responses.
//!
//! The decoder never guesses: a line is either exactly one variant or
//! it is rejected.

use crate::clock::{Timestamp, MAX_TIMESTAMP};
use crate::protocol::types::{key, Amount, OpCode, Request, Response, Status, SEPARATOR};
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur while decoding a wire message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The line does not start with a `t:<digits>` field
    #[error("missing or invalid timestamp")]
    MissingTimestamp,

    /// The line is not any known request
    #[error("invalid operation")]
    UnrecognizedOperation,

    /// The line is neither a success nor an error response
    #[error("malformed response: {0:?}")]
    MalformedResponse(String),
}

/// Result type for decoding operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Reads the sender's timestamp from the first field of a message.
///
/// This only looks at the `t:` field, so it succeeds for messages whose
/// remaining fields will later be rejected. Values above
/// [`MAX_TIMESTAMP`] are treated as missing.
pub fn extract_timestamp(line: &str) -> DecodeResult<Timestamp> {
    let line = strip_line_ending(line);
    line.split(SEPARATOR)
        .next()
        .and_then(|f| value_of(f, key::TIME))
        .and_then(parse_timestamp)
        .ok_or(DecodeError::MissingTimestamp)
}

/// Decodes a request line.
pub fn decode_request(line: &str) -> DecodeResult<Request> {
    parse_request(strip_line_ending(line)).ok_or(DecodeError::UnrecognizedOperation)
}

/// Decodes a response line.
pub fn decode_response(line: &str) -> DecodeResult<Response> {
    let line = strip_line_ending(line);
    parse_response(line).ok_or_else(|| DecodeError::MalformedResponse(line.to_string()))
}

fn parse_request(line: &str) -> Option<Request> {
    let fields: Vec<&str> = line.split(SEPARATOR).collect();
    if fields.len() < 2 {
        return None;
    }

    let time = value_of(fields[0], key::TIME).and_then(parse_timestamp)?;
    let op = value_of(fields[1], key::OP)
        .and_then(parse_digits)
        .and_then(|code| u8::try_from(code).ok())
        .and_then(OpCode::from_code)?;
    let args = &fields[2..];

    match op {
        OpCode::Balance => {
            let [account] = args else { return None };
            Some(Request::Balance {
                time,
                account_id: account_field(account, key::ACCOUNT)?,
            })
        }
        OpCode::Withdraw => {
            let [account, amount] = args else { return None };
            Some(Request::Withdraw {
                time,
                account_id: account_field(account, key::ACCOUNT)?,
                amount: amount_field(amount)?,
            })
        }
        OpCode::Deposit => {
            let [account, amount] = args else { return None };
            Some(Request::Deposit {
                time,
                account_id: account_field(account, key::ACCOUNT)?,
                amount: amount_field(amount)?,
            })
        }
        OpCode::Transfer => {
            let [from, to, amount] = args else { return None };
            Some(Request::Transfer {
                time,
                from_id: account_field(from, key::FROM)?,
                to_id: account_field(to, key::TO)?,
                amount: amount_field(amount)?,
            })
        }
        OpCode::Login => {
            let [account] = args else { return None };
            Some(Request::Login {
                time,
                account_id: account_field(account, key::ACCOUNT)?,
            })
        }
        // Known codes that no handler serves
        OpCode::Exit | OpCode::SyncClock => None,
    }
}

fn parse_response(line: &str) -> Option<Response> {
    // The text is the tail of the line and may itself contain separators.
    let mut fields = line.splitn(3, SEPARATOR);
    let time = value_of(fields.next()?, key::TIME).and_then(parse_timestamp)?;
    let status = value_of(fields.next()?, key::STATUS)?;
    let text = value_of(fields.next()?, key::TEXT)?.to_string();

    match Status::from_field(status)? {
        Status::Success => Some(Response::Success { time, text }),
        Status::Error => Some(Response::Error { time, text }),
    }
}

/// Returns the value of a `key:value` field if the key matches.
#[inline]
fn value_of<'a>(field: &'a str, key: &str) -> Option<&'a str> {
    field.strip_prefix(key)?.strip_prefix(':')
}

/// Parses a non-empty run of ASCII digits.
fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn parse_timestamp(s: &str) -> Option<Timestamp> {
    parse_digits(s).filter(|&t| t <= MAX_TIMESTAMP)
}

fn account_field(field: &str, key: &str) -> Option<String> {
    let id = value_of(field, key)?;
    is_valid_account_id(id).then(|| id.to_string())
}

fn amount_field(field: &str) -> Option<Amount> {
    let raw = value_of(field, key::AMOUNT)?;
    if raw.is_empty() {
        return None;
    }
    Amount::from_str(raw).ok()
}

/// Account ids are non-empty and free of separators and whitespace.
pub fn is_valid_account_id(id: &str) -> bool {
    !id.is_empty() && !id.contains(SEPARATOR) && !id.chars().any(char::is_whitespace)
}

/// Tolerates a trailing line ending from line-oriented peers.
#[inline]
fn strip_line_ending(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}
