//! Console command transport over the Source RCON protocol.
//!
//! Every call opens a fresh connection, authenticates, issues a single
//! command and drops the socket. There is no pooling and no retry.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

const TYPE_AUTH: i32 = 3;
const TYPE_EXEC: i32 = 2;
const TYPE_RESPONSE: i32 = 0;

/// Largest packet the protocol allows in either direction.
const MAX_PACKET_LEN: i32 = 4110;

/// Errors produced by the RCON transport.
#[derive(Debug, thiserror::Error)]
pub enum RconError {
    /// The server could not be reached or the connection broke.
    #[error("rcon transport failed: {0}")]
    Io(#[from] std::io::Error),
    /// The password was rejected.
    #[error("rcon authentication rejected")]
    AuthRejected,
    /// The exchange did not complete in time.
    #[error("rcon timed out after {seconds}s")]
    Timeout {
        /// Timeout budget in seconds.
        seconds: u64,
    },
    /// The server sent something the protocol does not allow.
    #[error("rcon protocol error: {0}")]
    Protocol(String),
}

/// Something that can run a privileged command on the observed server.
#[async_trait]
pub trait ConsoleCommandSink: Send + Sync {
    /// Execute `command` and return the server's textual reply.
    async fn execute(&self, command: &str) -> Result<String, RconError>;
}

/// One RCON packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Client-chosen request id, echoed by the server.
    pub id: i32,
    /// Packet type.
    pub kind: i32,
    /// ASCII payload.
    pub body: String,
}

impl Packet {
    /// Encode as `len | id | type | body\0 | \0`, integers little-endian.
    ///
    /// # Errors
    ///
    /// Returns [`RconError::Protocol`] if the body exceeds the packet limit.
    pub fn encode(&self) -> Result<Vec<u8>, RconError> {
        let payload_len = self
            .body
            .len()
            .checked_add(10)
            .and_then(|n| i32::try_from(n).ok())
            .filter(|n| *n <= MAX_PACKET_LEN)
            .ok_or_else(|| RconError::Protocol("command too long".to_owned()))?;

        let mut out = Vec::with_capacity(self.body.len().saturating_add(14));
        out.extend_from_slice(&payload_len.to_le_bytes());
        out.extend_from_slice(&self.id.to_le_bytes());
        out.extend_from_slice(&self.kind.to_le_bytes());
        out.extend_from_slice(self.body.as_bytes());
        out.extend_from_slice(&[0, 0]);
        Ok(out)
    }

    /// Read and decode one packet.
    ///
    /// # Errors
    ///
    /// Returns an error on EOF or an impossible length field.
    pub async fn read<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Self, RconError> {
        let len = reader.read_i32_le().await?;
        if !(10..=MAX_PACKET_LEN).contains(&len) {
            return Err(RconError::Protocol(format!("invalid packet length {len}")));
        }
        let id = reader.read_i32_le().await?;
        let kind = reader.read_i32_le().await?;

        let body_len = usize::try_from(len.saturating_sub(8))
            .map_err(|_| RconError::Protocol("negative body length".to_owned()))?;
        let mut body = vec![0_u8; body_len];
        reader.read_exact(&mut body).await?;
        while body.last() == Some(&0) {
            body.pop();
        }

        Ok(Self {
            id,
            kind,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

/// RCON client bound to one server.
#[derive(Clone)]
pub struct RconClient {
    host: String,
    port: u16,
    password: String,
    timeout: Duration,
}

impl std::fmt::Debug for RconClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RconClient")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RconClient {
    /// Create a client for `host:port`.
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            password: password.into(),
            timeout,
        }
    }

    async fn exchange(&self, command: &str) -> Result<String, RconError> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        authenticate(&mut stream, &self.password).await?;
        run_command(&mut stream, command).await
    }
}

#[async_trait]
impl ConsoleCommandSink for RconClient {
    async fn execute(&self, command: &str) -> Result<String, RconError> {
        debug!(host = %self.host, port = self.port, "opening rcon connection");
        match tokio::time::timeout(self.timeout, self.exchange(command)).await {
            Ok(result) => result,
            Err(_) => Err(RconError::Timeout {
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}

/// Log in on an open stream.
///
/// # Errors
///
/// Returns [`RconError::AuthRejected`] when the server answers with id -1.
pub async fn authenticate<S: AsyncRead + AsyncWrite + Unpin>(stream: &mut S, password: &str) -> Result<(), RconError> {
    let request = Packet {
        id: 1,
        kind: TYPE_AUTH,
        body: password.to_owned(),
    };
    stream.write_all(&request.encode()?).await?;
    stream.flush().await?;

    // Some servers send an empty RESPONSE_VALUE before the auth response.
    loop {
        let reply = Packet::read(stream).await?;
        if reply.id == -1 {
            return Err(RconError::AuthRejected);
        }
        if reply.kind == TYPE_EXEC && reply.id == request.id {
            return Ok(());
        }
        if reply.kind != TYPE_RESPONSE {
            return Err(RconError::Protocol(format!("unexpected auth reply type {}", reply.kind)));
        }
    }
}

/// Issue one command on an authenticated stream and return the reply body.
///
/// # Errors
///
/// Returns an error if the reply is missing or belongs to another request.
pub async fn run_command<S: AsyncRead + AsyncWrite + Unpin>(stream: &mut S, command: &str) -> Result<String, RconError> {
    let request = Packet {
        id: 2,
        kind: TYPE_EXEC,
        body: command.to_owned(),
    };
    stream.write_all(&request.encode()?).await?;
    stream.flush().await?;

    let reply = Packet::read(stream).await?;
    if reply.id != request.id || reply.kind != TYPE_RESPONSE {
        return Err(RconError::Protocol(format!(
            "unexpected reply (id {}, type {})",
            reply.id, reply.kind
        )));
    }
    Ok(reply.body)
}
