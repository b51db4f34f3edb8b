//! Durable record of the last dispatched log content.
//!
//! Plain text, one raw log line per record, newline-terminated, rewritten
//! whole on every change. The observation loop is the only writer.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info, warn};

/// Flat-file checkpoint of the last dispatched log snapshot.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    path: PathBuf,
}

impl Checkpoint {
    /// Checkpoint stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the checkpoint file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored lines.
    ///
    /// A missing or unreadable checkpoint yields no lines; the next tick
    /// then treats the whole log as new.
    pub async fn load(&self) -> Vec<String> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let lines: Vec<String> = String::from_utf8_lossy(&bytes)
                    .lines()
                    .map(str::to_owned)
                    .collect();
                debug!(path = %self.path.display(), lines = lines.len(), "checkpoint loaded");
                lines
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no checkpoint found, starting fresh");
                Vec::new()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read checkpoint");
                Vec::new()
            }
        }
    }

    /// Overwrite the checkpoint with `lines`.
    ///
    /// Written to a sibling temp file and renamed into place, so a crash
    /// mid-write leaves the previous checkpoint intact.
    ///
    /// # Errors
    ///
    /// Returns an error if the temp file cannot be written or renamed.
    pub async fn save(&self, lines: &[String]) -> anyhow::Result<()> {
        let mut contents = String::new();
        for line in lines {
            contents.push_str(line);
            contents.push('\n');
        }

        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, contents.as_bytes())
            .await
            .with_context(|| format!("failed to write checkpoint temp file {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("failed to move checkpoint into {}", self.path.display()))?;

        debug!(path = %self.path.display(), lines = lines.len(), "checkpoint saved");
        Ok(())
    }
}
