//! Reading the observed server's line-oriented log.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, error};

use crate::snapshot::ProbeOutcome;

/// Source of the full current contents of a log.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Read every complete line currently in the log, in order, without
    /// terminators.
    ///
    /// A missing log is [`ProbeOutcome::Empty`]; any other read problem is
    /// [`ProbeOutcome::TransientFailure`].
    async fn read(&self) -> ProbeOutcome<Vec<String>>;
}

/// Reads a log file from the local filesystem (typically `logs/latest.log`).
#[derive(Debug, Clone)]
pub struct FileLogSource {
    path: PathBuf,
}

impl FileLogSource {
    /// Create a reader for the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path being read.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LogSource for FileLogSource {
    async fn read(&self) -> ProbeOutcome<Vec<String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                // Server logs occasionally carry non-UTF-8 bytes from mods.
                let text = String::from_utf8_lossy(&bytes);
                let mut lines: Vec<String> = text.lines().map(str::to_owned).collect();
                // A last line without a terminator is still being written.
                if !text.is_empty() && !text.ends_with('\n') {
                    lines.pop();
                }
                debug!(path = %self.path.display(), lines = lines.len(), "log read");
                ProbeOutcome::Success(lines)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                error!(path = %self.path.display(), "server log file not found");
                ProbeOutcome::Empty
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "failed to read server log");
                ProbeOutcome::TransientFailure(format!("failed to read {}: {e}", self.path.display()))
            }
        }
    }
}
