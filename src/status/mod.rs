//! Live status probing of the observed server.
//!
//! Two protocols are supported: the UDP query protocol, which reports the
//! full player roster but must be enabled server-side (`enable-query`), and
//! the TCP server list ping, which always works but only returns a sample of
//! online players.

pub mod ping;
pub mod query;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::snapshot::{ProbeOutcome, StatusSnapshot};

/// Errors produced by the status wire protocols.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// Socket-level failure, including refused connections.
    #[error("status transport failed: {0}")]
    Io(#[from] std::io::Error),
    /// The server replied with something the protocol does not allow.
    #[error("malformed status reply: {0}")]
    Protocol(String),
    /// The server list ping JSON document could not be decoded.
    #[error("invalid status document: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProbeError {
    /// Whether this error just means "nobody is listening".
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::AddrNotAvailable
            ),
            Self::Protocol(_) | Self::Json(_) => false,
        }
    }
}

/// Anything that can report the observed server's live state.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Probe the server once. Unreachability is [`ProbeOutcome::Empty`],
    /// never an error.
    async fn probe(&self) -> ProbeOutcome<StatusSnapshot>;
}

/// Which protocol the prober speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMode {
    /// UDP query protocol with an exhaustive roster.
    Query,
    /// TCP server list ping with a sampled roster.
    Ping,
}

/// Probes a Minecraft server over the network.
#[derive(Debug, Clone)]
pub struct StatusProber {
    host: String,
    port: u16,
    query_port: u16,
    mode: ProbeMode,
    timeout: Duration,
}

impl StatusProber {
    /// Create a prober for `host:port`.
    ///
    /// `query_port` is only used in [`ProbeMode::Query`].
    pub fn new(host: impl Into<String>, port: u16, query_port: u16, mode: ProbeMode, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            query_port,
            mode,
            timeout,
        }
    }

    /// Protocol in use.
    pub fn mode(&self) -> ProbeMode {
        self.mode
    }

    async fn probe_once(&self) -> Result<StatusSnapshot, ProbeError> {
        match self.mode {
            ProbeMode::Query => {
                let stat = query::full_stat(&self.host, self.query_port).await?;
                Ok(StatusSnapshot::online(
                    stat.version,
                    stat.num_players,
                    stat.max_players,
                    stat.players,
                ))
            }
            ProbeMode::Ping => {
                let status = ping::ping(&self.host, self.port).await?;
                Ok(StatusSnapshot::online(
                    status.version.name,
                    status.players.online_count(),
                    status.players.max_count(),
                    status.players.sample_names(),
                ))
            }
        }
    }
}

#[async_trait]
impl StatusSource for StatusProber {
    async fn probe(&self) -> ProbeOutcome<StatusSnapshot> {
        match tokio::time::timeout(self.timeout, self.probe_once()).await {
            Ok(Ok(snapshot)) => {
                debug!(
                    players = snapshot.player_count,
                    version = %snapshot.version,
                    "server status probed"
                );
                ProbeOutcome::Success(snapshot)
            }
            Ok(Err(e)) if e.is_unreachable() => {
                debug!(error = %e, "server unreachable");
                ProbeOutcome::Empty
            }
            Ok(Err(e)) => {
                error!(error = %e, mode = ?self.mode, "status probe failed");
                ProbeOutcome::TransientFailure(e.to_string())
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "status probe timed out");
                ProbeOutcome::Empty
            }
        }
    }
}
