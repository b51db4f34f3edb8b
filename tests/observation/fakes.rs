//! In-memory collaborators for driving the observation loop.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use observer::display::{LogDisplay, StatusDisplay};
use observer::logsource::LogSource;
use observer::snapshot::{ProbeOutcome, StatusSnapshot};
use observer::status::StatusSource;

/// Status source returning whatever was last set.
pub struct FakeStatus {
    outcome: Mutex<ProbeOutcome<StatusSnapshot>>,
}

impl FakeStatus {
    pub fn new(outcome: ProbeOutcome<StatusSnapshot>) -> Self {
        Self {
            outcome: Mutex::new(outcome),
        }
    }

    pub fn set(&self, outcome: ProbeOutcome<StatusSnapshot>) {
        *self.outcome.lock().expect("status lock") = outcome;
    }
}

#[async_trait]
impl StatusSource for FakeStatus {
    async fn probe(&self) -> ProbeOutcome<StatusSnapshot> {
        let outcome = self.outcome.lock().expect("status lock").clone();
        // Fresh timestamp on every probe, like a real prober.
        match outcome {
            ProbeOutcome::Success(mut snapshot) => {
                snapshot.taken_at = chrono::Utc::now();
                ProbeOutcome::Success(snapshot)
            }
            other => other,
        }
    }
}

/// Log source returning whatever was last set.
pub struct FakeLog {
    outcome: Mutex<ProbeOutcome<Vec<String>>>,
}

impl FakeLog {
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            outcome: Mutex::new(ProbeOutcome::Success(lines)),
        }
    }

    pub fn set_lines(&self, lines: Vec<String>) {
        *self.outcome.lock().expect("log lock") = ProbeOutcome::Success(lines);
    }

    pub fn set(&self, outcome: ProbeOutcome<Vec<String>>) {
        *self.outcome.lock().expect("log lock") = outcome;
    }
}

#[async_trait]
impl LogSource for FakeLog {
    async fn read(&self) -> ProbeOutcome<Vec<String>> {
        self.outcome.lock().expect("log lock").clone()
    }
}

/// Status display that records every edit.
#[derive(Default)]
pub struct RecordingStatus {
    pub edits: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl RecordingStatus {
    pub fn edits(&self) -> Vec<String> {
        self.edits.lock().expect("edits lock").clone()
    }
}

#[async_trait]
impl StatusDisplay for RecordingStatus {
    async fn edit(&self, content: &str) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("edit rejected");
        }
        self.edits.lock().expect("edits lock").push(content.to_owned());
        Ok(())
    }
}

/// Log display that records every delivered unit and counts attempts.
#[derive(Default)]
pub struct RecordingLog {
    pub units: Mutex<Vec<String>>,
    pub attempts: AtomicUsize,
    pub fail: AtomicBool,
}

impl RecordingLog {
    pub fn units(&self) -> Vec<String> {
        self.units.lock().expect("units lock").clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LogDisplay for RecordingLog {
    async fn send(&self, unit: &str) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("send rejected");
        }
        self.units.lock().expect("units lock").push(unit.to_owned());
        Ok(())
    }
}
