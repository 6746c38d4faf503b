//! Client session: login handshake and synchronous request/response.

use crate::clock::{LamportClock, Timestamp};
use crate::protocol::{
    decode_response, extract_timestamp, Amount, Request, Response, MAX_MESSAGE_SIZE,
};
use bytes::{BufMut, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, trace};

/// Where the client connects.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: crate::DEFAULT_PORT,
        }
    }
}

impl ClientConfig {
    /// Returns the server address as a string
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Errors seen by a client session.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server could not be reached
    #[error("could not connect to server at {addr}: {source}")]
    ConnectionRefused {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The server closed the connection
    #[error("server closed the connection")]
    Disconnected,

    /// The server sent something that is neither a success nor an error
    #[error("malformed response: {0:?}")]
    MalformedResponse(String),

    /// Login was answered with an error response
    #[error("login rejected: {0}")]
    LoginRejected(String),

    /// An account operation was attempted before a successful login
    #[error("not logged in")]
    NotLoggedIn,

    /// I/O error on an established connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A connection to the bank server on behalf of one account holder.
///
/// Generic over the transport so it can run over any async byte stream.
pub struct ClientSession<S = TcpStream> {
    stream: S,
    clock: LamportClock,
    account_id: Option<String>,
    buffer: BytesMut,
}

impl ClientSession<TcpStream> {
    /// Connects to the server at `addr`.
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientError::ConnectionRefused {
                addr: addr.to_string(),
                source,
            })?;
        info!(server = addr, "Connected to server");
        Ok(Self::new(stream))
    }
}

impl<S> ClientSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an established stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            clock: LamportClock::new(),
            account_id: None,
            buffer: BytesMut::with_capacity(MAX_MESSAGE_SIZE),
        }
    }

    /// Current value of the session's logical clock.
    pub fn clock(&self) -> Timestamp {
        self.clock.value()
    }

    /// The account this session logged in as, if any.
    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    /// Logs in as `account_id`.
    ///
    /// An error response is terminal for the session: it is returned as
    /// [`ClientError::LoginRejected`] and the caller is expected to stop.
    pub async fn login(&mut self, account_id: &str) -> Result<String, ClientError> {
        let id = account_id.to_string();
        let response = self
            .submit(|time| Request::Login {
                time,
                account_id: id,
            })
            .await?;

        match response {
            Response::Success { text, .. } => {
                info!(account = account_id, "Logged in");
                self.account_id = Some(account_id.to_string());
                Ok(text)
            }
            Response::Error { text, .. } => Err(ClientError::LoginRejected(text)),
        }
    }

    /// Sends one request stamped with a fresh tick and waits for its response.
    pub async fn submit<F>(&mut self, build: F) -> Result<Response, ClientError>
    where
        F: FnOnce(Timestamp) -> Request,
    {
        let time = self.clock.tick();
        let request = build(time);
        self.send(&request).await?;
        self.receive().await
    }

    /// Queries the logged-in account's balance.
    pub async fn balance(&mut self) -> Result<Response, ClientError> {
        let account_id = self.require_login()?;
        self.submit(|time| Request::Balance { time, account_id })
            .await
    }

    /// Withdraws from the logged-in account.
    pub async fn withdraw(&mut self, amount: Amount) -> Result<Response, ClientError> {
        let account_id = self.require_login()?;
        self.submit(|time| Request::Withdraw {
            time,
            account_id,
            amount,
        })
        .await
    }

    /// Deposits into the logged-in account.
    pub async fn deposit(&mut self, amount: Amount) -> Result<Response, ClientError> {
        let account_id = self.require_login()?;
        self.submit(|time| Request::Deposit {
            time,
            account_id,
            amount,
        })
        .await
    }

    /// Transfers from the logged-in account to `to_id`.
    pub async fn transfer(&mut self, to_id: &str, amount: Amount) -> Result<Response, ClientError> {
        let from_id = self.require_login()?;
        let to_id = to_id.to_string();
        self.submit(|time| Request::Transfer {
            time,
            from_id,
            to_id,
            amount,
        })
        .await
    }

    fn require_login(&self) -> Result<String, ClientError> {
        self.account_id.clone().ok_or(ClientError::NotLoggedIn)
    }

    async fn send(&mut self, request: &Request) -> Result<(), ClientError> {
        let line = request.encode();
        trace!(request = %line, "Sending request");
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Reads one response, merging the clock before decoding the rest.
    async fn receive(&mut self) -> Result<Response, ClientError> {
        self.buffer.clear();
        let n = self
            .stream
            .read_buf(&mut (&mut self.buffer).limit(MAX_MESSAGE_SIZE))
            .await?;
        if n == 0 {
            return Err(ClientError::Disconnected);
        }

        let line = String::from_utf8_lossy(&self.buffer).into_owned();
        let merged = extract_timestamp(&line)
            .ok()
            .and_then(|remote| self.clock.merge(remote).ok())
            .ok_or_else(|| ClientError::MalformedResponse(line.clone()))?;
        trace!(clock = merged, "Merged response timestamp");

        let response =
            decode_response(&line).map_err(|_| ClientError::MalformedResponse(line.clone()))?;
        debug!(clock = self.clock.value(), response = %response, "Received response");
        Ok(response)
    }
}
