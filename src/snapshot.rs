//! Point-in-time samples of server status and log content.
//!
//! Snapshots are created fresh every tick, compared against the previous
//! tick's snapshots, and then either dropped or promoted to "previous" by
//! the observation loop. Equality ignores the sampling time.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

/// Result of probing an external source.
///
/// Distinguishes a real value from the two expected non-values so callers
/// can branch without inspecting log text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome<T> {
    /// The source answered with a value.
    Success(T),
    /// The source is offline or absent. This is an expected steady state.
    Empty,
    /// The source answered but something went wrong along the way.
    TransientFailure(String),
}

impl<T> ProbeOutcome<T> {
    /// Returns the value if the probe succeeded.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Empty | Self::TransientFailure(_) => None,
        }
    }

    /// Returns `true` for [`ProbeOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Live server state at one probe instant.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    /// When the probe completed.
    pub taken_at: DateTime<Utc>,
    /// Whether the server answered the probe.
    pub online: bool,
    /// Reported number of connected players.
    pub player_count: u32,
    /// Reported player slot limit.
    pub player_limit: u32,
    /// Names of online players. Exhaustive only under the query protocol;
    /// the ping protocol reports a sample.
    pub player_names: BTreeSet<String>,
    /// Server version string.
    pub version: String,
}

impl StatusSnapshot {
    /// Build an offline snapshot stamped with the current time.
    pub fn offline() -> Self {
        Self {
            taken_at: Utc::now(),
            online: false,
            player_count: 0,
            player_limit: 0,
            player_names: BTreeSet::new(),
            version: String::new(),
        }
    }

    /// Build an online snapshot stamped with the current time.
    pub fn online<I, S>(version: impl Into<String>, player_count: u32, player_limit: u32, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            taken_at: Utc::now(),
            online: true,
            player_count,
            player_limit,
            player_names: names.into_iter().map(Into::into).collect(),
            version: version.into(),
        }
    }
}

impl PartialEq for StatusSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.online == other.online
            && self.player_count == other.player_count
            && self.player_limit == other.player_limit
            && self.player_names == other.player_names
            && self.version == other.version
    }
}

impl Eq for StatusSnapshot {}

/// Ordered log lines read at one probe instant.
#[derive(Debug, Clone)]
pub struct LogSnapshot {
    /// When the read completed.
    pub taken_at: DateTime<Utc>,
    /// Raw lines in file order, without line terminators.
    pub lines: Vec<String>,
}

impl LogSnapshot {
    /// Wrap lines read just now.
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            taken_at: Utc::now(),
            lines,
        }
    }

    fn line_counts(&self) -> HashMap<&str, usize> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for line in &self.lines {
            let count = counts.entry(line.as_str()).or_insert(0);
            *count = count.saturating_add(1);
        }
        counts
    }
}

/// Two log snapshots are equal when they hold the same lines the same
/// number of times, regardless of order.
impl PartialEq for LogSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.lines.len() == other.lines.len() && self.line_counts() == other.line_counts()
    }
}

impl Eq for LogSnapshot {}

/// One status sample paired with one log sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Status half of the observation.
    pub status: StatusSnapshot,
    /// Log half of the observation.
    pub logs: LogSnapshot,
}
