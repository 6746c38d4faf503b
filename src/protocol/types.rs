//! Bank Wire Message Types
//!
//! Every message is a single line of ASCII text made of `|`-separated
//! `key:value` fields. The first field is always the sender's logical
//! timestamp.
//!
//! ## Requests
//!
//! ```text
//! t:<time>|op:1|rg:<id>                                   Balance
//! t:<time>|op:2|rg:<id>|valor:<amount>                    Withdraw
//! t:<time>|op:3|rg:<id>|valor:<amount>                    Deposit
//! t:<time>|op:4|rg_origem:<id>|rg_destino:<id>|valor:<n>  Transfer
//! t:<time>|op:6|rg:<id>                                   Login
//! ```
//!
//! ## Responses
//!
//! ```text
//! t:<time>|s:0|resposta:<text>   Success
//! t:<time>|s:1|resposta:<text>   Error
//! ```
//!
//! Messages carry no terminator; each socket read is expected to hold
//! exactly one message.

use crate::clock::Timestamp;
use rust_decimal::Decimal;
use std::fmt;

/// Monetary amounts and balances.
pub type Amount = Decimal;

/// Field separator.
pub const SEPARATOR: char = '|';

/// Field keys used on the wire.
pub mod key {
    pub const TIME: &str = "t";
    pub const OP: &str = "op";
    pub const STATUS: &str = "s";
    pub const ACCOUNT: &str = "rg";
    pub const AMOUNT: &str = "valor";
    pub const FROM: &str = "rg_origem";
    pub const TO: &str = "rg_destino";
    pub const TEXT: &str = "resposta";
}

/// Operation codes carried in the `op` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// Client-local exit command. Never sent over the wire.
    Exit = 0,
    Balance = 1,
    Withdraw = 2,
    Deposit = 3,
    Transfer = 4,
    /// Reserved for clock synchronization; no handler accepts it.
    SyncClock = 5,
    Login = 6,
}

impl OpCode {
    /// Maps a numeric code to an operation.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(OpCode::Exit),
            1 => Some(OpCode::Balance),
            2 => Some(OpCode::Withdraw),
            3 => Some(OpCode::Deposit),
            4 => Some(OpCode::Transfer),
            5 => Some(OpCode::SyncClock),
            6 => Some(OpCode::Login),
            _ => None,
        }
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Response status codes carried in the `s` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Success = 0,
    Error = 1,
}

impl Status {
    /// Maps the raw `s` field value to a status.
    pub fn from_field(raw: &str) -> Option<Self> {
        match raw {
            "0" => Some(Status::Success),
            "1" => Some(Status::Error),
            _ => None,
        }
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// A client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Login {
        time: Timestamp,
        account_id: String,
    },
    Balance {
        time: Timestamp,
        account_id: String,
    },
    Withdraw {
        time: Timestamp,
        account_id: String,
        amount: Amount,
    },
    Deposit {
        time: Timestamp,
        account_id: String,
        amount: Amount,
    },
    Transfer {
        time: Timestamp,
        from_id: String,
        to_id: String,
        amount: Amount,
    },
}

impl Request {
    /// Returns the sender's timestamp.
    pub fn time(&self) -> Timestamp {
        match self {
            Request::Login { time, .. }
            | Request::Balance { time, .. }
            | Request::Withdraw { time, .. }
            | Request::Deposit { time, .. }
            | Request::Transfer { time, .. } => *time,
        }
    }

    /// Returns the operation code of this request.
    pub fn op_code(&self) -> OpCode {
        match self {
            Request::Login { .. } => OpCode::Login,
            Request::Balance { .. } => OpCode::Balance,
            Request::Withdraw { .. } => OpCode::Withdraw,
            Request::Deposit { .. } => OpCode::Deposit,
            Request::Transfer { .. } => OpCode::Transfer,
        }
    }

    /// Encodes the request into its wire form.
    pub fn encode(&self) -> String {
        let op = self.op_code().code();
        match self {
            Request::Login { time, account_id } | Request::Balance { time, account_id } => {
                format!("t:{time}|op:{op}|rg:{account_id}")
            }
            Request::Withdraw {
                time,
                account_id,
                amount,
            }
            | Request::Deposit {
                time,
                account_id,
                amount,
            } => format!("t:{time}|op:{op}|rg:{account_id}|valor:{amount}"),
            Request::Transfer {
                time,
                from_id,
                to_id,
                amount,
            } => format!("t:{time}|op:{op}|rg_origem:{from_id}|rg_destino:{to_id}|valor:{amount}"),
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// A server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Success { time: Timestamp, text: String },
    Error { time: Timestamp, text: String },
}

impl Response {
    pub fn success(time: Timestamp, text: impl Into<String>) -> Self {
        Response::Success {
            time,
            text: text.into(),
        }
    }

    pub fn error(time: Timestamp, text: impl Into<String>) -> Self {
        Response::Error {
            time,
            text: text.into(),
        }
    }

    /// Returns the responder's timestamp.
    pub fn time(&self) -> Timestamp {
        match self {
            Response::Success { time, .. } | Response::Error { time, .. } => *time,
        }
    }

    /// Returns the human-readable response text.
    pub fn text(&self) -> &str {
        match self {
            Response::Success { text, .. } | Response::Error { text, .. } => text,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Response::Success { .. } => Status::Success,
            Response::Error { .. } => Status::Error,
        }
    }

    /// Returns true if this is an error response.
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }

    /// Encodes the response into its wire form.
    pub fn encode(&self) -> String {
        format!(
            "t:{}|s:{}|resposta:{}",
            self.time(),
            self.status().code(),
            self.text()
        )
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_balance_encode() {
        let req = Request::Balance {
            time: 3,
            account_id: "1001".to_string(),
        };
        assert_eq!(req.encode(), "t:3|op:1|rg:1001");
    }

    #[test]
    fn test_withdraw_encode() {
        let req = Request::Withdraw {
            time: 9,
            account_id: "1001".to_string(),
            amount: dec!(25.50),
        };
        assert_eq!(req.encode(), "t:9|op:2|rg:1001|valor:25.50");
    }

    #[test]
    fn test_deposit_encode() {
        let req = Request::Deposit {
            time: 1,
            account_id: "7".to_string(),
            amount: dec!(0.1),
        };
        assert_eq!(req.encode(), "t:1|op:3|rg:7|valor:0.1");
    }

    #[test]
    fn test_transfer_encode() {
        let req = Request::Transfer {
            time: 12,
            from_id: "1".to_string(),
            to_id: "2".to_string(),
            amount: dec!(50.00),
        };
        assert_eq!(req.encode(), "t:12|op:4|rg_origem:1|rg_destino:2|valor:50.00");
    }

    #[test]
    fn test_login_encode() {
        let req = Request::Login {
            time: 1,
            account_id: "42".to_string(),
        };
        assert_eq!(req.encode(), "t:1|op:6|rg:42");
        assert_eq!(req.op_code(), OpCode::Login);
    }

    #[test]
    fn test_response_encode() {
        assert_eq!(
            Response::success(5, "login succeeded").encode(),
            "t:5|s:0|resposta:login succeeded"
        );
        assert_eq!(
            Response::error(6, "account not found").encode(),
            "t:6|s:1|resposta:account not found"
        );
    }

    #[test]
    fn test_op_code_mapping() {
        for code in 0..=6u8 {
            let op = OpCode::from_code(code).unwrap();
            assert_eq!(op.code(), code);
        }
        assert_eq!(OpCode::from_code(7), None);
    }
}
