//! Display sinks: where status and log updates are shown.
//!
//! The chat surface only needs to implement two small traits. Batching,
//! size limits, retries and status rendering live here so every surface
//! behaves the same way.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::snapshot::StatusSnapshot;

/// Largest outbound unit a log sink accepts, in characters.
pub const MAX_MESSAGE_LEN: usize = 2000;

/// Largest reply to a private console command, in characters.
pub const MAX_REPLY_LEN: usize = 200;

/// A single, pre-existing message that is edited to show live status.
#[async_trait]
pub trait StatusDisplay: Send + Sync {
    /// Replace the status message content.
    async fn edit(&self, content: &str) -> anyhow::Result<()>;
}

/// A channel that log text is appended to.
#[async_trait]
pub trait LogDisplay: Send + Sync {
    /// Post one unit of at most [`MAX_MESSAGE_LEN`] characters.
    async fn send(&self, unit: &str) -> anyhow::Result<()>;
}

/// What happened to one batch of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Units the batch was condensed into.
    pub units: usize,
    /// Units that failed even after a retry.
    pub failed: usize,
}

impl DispatchReport {
    /// Whether every unit was delivered.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Edit the status message to show `status`.
///
/// Returns `true` on success. Failures are logged.
pub async fn dispatch_status(display: &dyn StatusDisplay, status: &StatusSnapshot) -> bool {
    let content = render_status(status);
    match display.edit(&content).await {
        Ok(()) => {
            debug!(online = status.online, "status display updated");
            true
        }
        Err(e) => {
            warn!(error = %e, "failed to update status display");
            false
        }
    }
}

/// Condense `lines` into units and post them in order.
///
/// Each unit is retried once. A unit that still fails is logged and
/// skipped; the remaining units are still sent.
pub async fn dispatch_lines(display: &dyn LogDisplay, lines: &[String], label: &str) -> DispatchReport {
    let units = condense(lines, MAX_MESSAGE_LEN);
    let mut report = DispatchReport {
        units: units.len(),
        failed: 0,
    };

    for (index, unit) in units.iter().enumerate() {
        if let Err(first) = display.send(unit).await {
            debug!(sink = label, unit = index, error = %first, "send failed, retrying once");
            if let Err(e) = display.send(unit).await {
                warn!(sink = label, unit = index, error = %e, "failed to send log unit");
                report.failed = report.failed.saturating_add(1);
            }
        }
    }

    debug!(sink = label, units = report.units, failed = report.failed, "log batch dispatched");
    report
}

/// Pack lines into as few newline-joined units as possible, each at most
/// `max_len` characters. A line longer than `max_len` is split across
/// several units.
pub fn condense(lines: &[String], max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut units = Vec::new();
    let mut current = String::new();
    let mut current_len: usize = 0;

    for line in lines {
        for piece in split_chunks(line, max_len) {
            let piece_len = piece.chars().count();
            let joined_len = if current.is_empty() {
                piece_len
            } else {
                current_len.saturating_add(1).saturating_add(piece_len)
            };

            if joined_len > max_len && !current.is_empty() {
                units.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if !current.is_empty() {
                current.push('\n');
                current_len = current_len.saturating_add(1);
            }
            current.push_str(&piece);
            current_len = current_len.saturating_add(piece_len);
        }
    }

    if !current.is_empty() {
        units.push(current);
    }
    units
}

/// Split `text` into pieces of at most `max_len` characters, on character
/// boundaries. Empty text yields one empty piece.
pub fn split_chunks(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars.chunks(max_len).map(|chunk| chunk.iter().collect()).collect()
}

/// Render the status message as Telegram HTML.
pub fn render_status(status: &StatusSnapshot) -> String {
    if !status.online {
        return "Server Status: <b>Offline</b> \u{1f6ab}".to_owned();
    }

    let mut text = format!(
        "Server Status: <b>Online</b> \u{2705}\nVersion: {}\n\nPlayers Currently Online:\n",
        escape_html(&status.version)
    );

    if status.player_names.is_empty() {
        if status.player_count == 0 {
            text.push_str("Nobody is online...");
        } else {
            text.push_str(&format!("{} players", status.player_count));
        }
        return text;
    }

    let names: Vec<String> = status
        .player_names
        .iter()
        .map(|name| format!("<b>{}</b>", escape_html(name)))
        .collect();
    text.push_str(&names.join("\n"));

    let listed = u32::try_from(status.player_names.len()).unwrap_or(u32::MAX);
    if status.player_count > listed {
        text.push_str(&format!("\n...and {} more", status.player_count.saturating_sub(listed)));
    }
    text
}

/// Escape HTML special characters for Telegram.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
