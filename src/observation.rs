//! The observation loop.
//!
//! A single task that, every tick, probes status and reads the log in
//! parallel, works out what is new, and fans the results out to the three
//! display sinks. It exclusively owns the previous observation and the
//! checkpoint, so nothing here needs a lock.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::checkpoint::Checkpoint;
use crate::classifier::{self, redact_addresses};
use crate::diff;
use crate::display::{self, LogDisplay, StatusDisplay};
use crate::logsource::LogSource;
use crate::snapshot::{LogSnapshot, Observation, ProbeOutcome, StatusSnapshot};
use crate::status::StatusSource;

/// The three places results are shown.
#[derive(Clone)]
pub struct Sinks {
    /// Live status message.
    pub status: Arc<dyn StatusDisplay>,
    /// Full-fidelity (address-redacted) log dump.
    pub raw_log: Arc<dyn LogDisplay>,
    /// Chat-worthy lines only.
    pub chat_log: Arc<dyn LogDisplay>,
}

/// Cadence settings.
#[derive(Debug, Clone, Copy)]
pub struct LoopTiming {
    /// Minimum time between tick starts.
    pub interval: Duration,
    /// Upper bound on each concurrent branch of a tick.
    pub branch_timeout: Duration,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Whether the status display was edited successfully.
    pub status_dispatched: bool,
    /// Lines new since the previous tick (or the checkpoint).
    pub raw_lines: usize,
    /// Of those, lines that were shown in chat.
    pub chat_lines: usize,
    /// Log units across both log sinks not confirmed delivered.
    pub failed_units: usize,
    /// Whether the observation or the log order changed and the checkpoint
    /// was rewritten.
    pub checkpoint_written: bool,
}

/// Periodic observer of one server.
pub struct ObservationLoop {
    status_source: Arc<dyn StatusSource>,
    log_source: Arc<dyn LogSource>,
    checkpoint: Checkpoint,
    sinks: Sinks,
    timing: LoopTiming,
    previous: Option<Observation>,
    known_players: HashSet<String>,
}

impl ObservationLoop {
    /// Create a loop with no previous observation. The first tick diffs
    /// against the checkpoint.
    pub fn new(
        status_source: Arc<dyn StatusSource>,
        log_source: Arc<dyn LogSource>,
        checkpoint: Checkpoint,
        sinks: Sinks,
        timing: LoopTiming,
    ) -> Self {
        Self {
            status_source,
            log_source,
            checkpoint,
            sinks,
            timing,
            previous: None,
            known_players: HashSet::new(),
        }
    }

    /// The observation promoted by the most recent changed tick.
    pub fn previous(&self) -> Option<&Observation> {
        self.previous.as_ref()
    }

    /// Every player name seen this session.
    pub fn known_players(&self) -> &HashSet<String> {
        &self.known_players
    }

    /// Tick until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// Shutdown is checked between ticks, so a tick in flight always
    /// finishes. A failing tick is logged and the next one runs as usual.
    pub async fn run(mut self, shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = u64::try_from(self.timing.interval.as_millis()).unwrap_or(u64::MAX),
            "observation loop started"
        );

        while !*shutdown.borrow() && shutdown.has_changed().is_ok() {
            match self.tick().await {
                Ok(report) => debug!(?report, "tick complete"),
                Err(e) => error!(error = %e, "observation tick failed"),
            }
        }

        info!("observation loop stopped");
    }

    /// Run one full cycle: probe, diff, classify, dispatch, promote.
    ///
    /// Takes at least one interval, longer if dispatch is slow.
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint cannot be written. The in-memory
    /// observation has already been promoted at that point.
    pub async fn tick(&mut self) -> anyhow::Result<TickReport> {
        let (status, log_outcome) = tokio::join!(self.probe_status(), self.read_logs());

        let loaded;
        let baseline: &[String] = match &self.previous {
            Some(previous) => &previous.logs.lines,
            None => {
                loaded = self.checkpoint.load().await;
                &loaded
            }
        };

        let (logs, raw_new, reordered) = match log_outcome {
            ProbeOutcome::Success(lines) => {
                let new = diff::new_lines(&lines, baseline);
                let reordered = lines.as_slice() != baseline;
                (LogSnapshot::new(lines), new, reordered)
            }
            // Keep the baseline so a read hiccup never re-shows old lines.
            ProbeOutcome::Empty | ProbeOutcome::TransientFailure(_) => {
                (LogSnapshot::new(baseline.to_vec()), Vec::new(), false)
            }
        };

        self.known_players.extend(status.player_names.iter().cloned());
        let classification = classifier::classify(&raw_new, &self.known_players);
        self.known_players
            .extend(classification.players_seen.iter().cloned());

        let raw_display: Vec<String> = raw_new
            .iter()
            .map(|line| redact_addresses(line).into_owned())
            .collect();
        let status_changed = self
            .previous
            .as_ref()
            .is_none_or(|previous| previous.status != status);

        let (_, status_dispatched, raw_failed, chat_failed) = tokio::join!(
            tokio::time::sleep(self.timing.interval),
            self.dispatch_status(status_changed, &status),
            self.dispatch_log(self.sinks.raw_log.as_ref(), &raw_display, "raw_log"),
            self.dispatch_log(self.sinks.chat_log.as_ref(), &classification.lines, "chat_log"),
        );

        let mut report = TickReport {
            status_dispatched,
            raw_lines: raw_new.len(),
            chat_lines: classification.lines.len(),
            failed_units: raw_failed.saturating_add(chat_failed),
            checkpoint_written: false,
        };

        // Log equality ignores order but the diff does not, so a reordered
        // log must still move the baseline.
        let observation = Observation { status, logs };
        if reordered || self.previous.as_ref() != Some(&observation) {
            let lines = observation.logs.lines.clone();
            self.previous = Some(observation);
            self.checkpoint
                .save(&lines)
                .await
                .context("failed to persist checkpoint")?;
            report.checkpoint_written = true;
        }

        Ok(report)
    }

    async fn probe_status(&self) -> StatusSnapshot {
        match tokio::time::timeout(self.timing.branch_timeout, self.status_source.probe()).await {
            Ok(ProbeOutcome::Success(snapshot)) => snapshot,
            Ok(ProbeOutcome::Empty) => StatusSnapshot::offline(),
            Ok(ProbeOutcome::TransientFailure(reason)) => {
                warn!(reason = %reason, "status probe failed, reporting offline");
                StatusSnapshot::offline()
            }
            Err(_) => {
                warn!("status probe exceeded tick timeout, reporting offline");
                StatusSnapshot::offline()
            }
        }
    }

    async fn read_logs(&self) -> ProbeOutcome<Vec<String>> {
        match tokio::time::timeout(self.timing.branch_timeout, self.log_source.read()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("log read exceeded tick timeout");
                ProbeOutcome::TransientFailure("log read timed out".to_owned())
            }
        }
    }

    async fn dispatch_status(&self, changed: bool, status: &StatusSnapshot) -> bool {
        if !changed {
            return false;
        }
        let edit = display::dispatch_status(self.sinks.status.as_ref(), status);
        match tokio::time::timeout(self.timing.branch_timeout, edit).await {
            Ok(done) => done,
            Err(_) => {
                warn!("status dispatch exceeded tick timeout");
                false
            }
        }
    }

    /// Post `lines` to `sink` and return how many units were not delivered.
    async fn dispatch_log(&self, sink: &dyn LogDisplay, lines: &[String], label: &str) -> usize {
        if lines.is_empty() {
            return 0;
        }
        let send = display::dispatch_lines(sink, lines, label);
        match tokio::time::timeout(self.timing.branch_timeout, send).await {
            Ok(report) => report.failed,
            Err(_) => {
                let units = display::condense(lines, display::MAX_MESSAGE_LEN).len();
                warn!(sink = label, units, "log dispatch exceeded tick timeout");
                units
            }
        }
    }
}
