//! Status rendering and single-retry dispatch.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use observer::display::{dispatch_lines, render_status, LogDisplay};
use observer::snapshot::StatusSnapshot;

#[test]
fn offline_status() {
    assert_eq!(render_status(&StatusSnapshot::offline()), "Server Status: <b>Offline</b> \u{1f6ab}");
}

#[test]
fn empty_server() {
    let text = render_status(&StatusSnapshot::online("1.20.4", 0, 20, Vec::<String>::new()));
    assert!(text.starts_with("Server Status: <b>Online</b>"));
    assert!(text.contains("Version: 1.20.4"));
    assert!(text.ends_with("Nobody is online..."));
}

#[test]
fn players_are_sorted_and_bold() {
    let text = render_status(&StatusSnapshot::online("1.20.4", 2, 20, ["zed", "Alice"]));
    assert!(text.ends_with("<b>Alice</b>\n<b>zed</b>"));
}

#[test]
fn partial_sample_notes_the_rest() {
    let text = render_status(&StatusSnapshot::online("1.20.4", 14, 20, ["Alice"]));
    assert!(text.ends_with("<b>Alice</b>\n...and 13 more"));
}

#[test]
fn version_is_escaped() {
    let text = render_status(&StatusSnapshot::online("<modded>", 0, 20, Vec::<String>::new()));
    assert!(text.contains("Version: &lt;modded&gt;"));
}

/// Fails the first `failures` sends.
struct Flaky {
    failures: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl LogDisplay for Flaky {
    async fn send(&self, _unit: &str) -> anyhow::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            anyhow::bail!("flaky");
        }
        Ok(())
    }
}

#[tokio::test]
async fn one_failure_is_retried() {
    let sink = Flaky {
        failures: 1,
        calls: AtomicUsize::new(0),
    };
    let report = dispatch_lines(&sink, &["a".to_owned()], "test").await;
    assert!(report.is_success());
    assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn second_failure_skips_the_unit_and_continues() {
    let sink = Flaky {
        failures: 2,
        calls: AtomicUsize::new(0),
    };
    let lines = vec!["a".repeat(1500), "b".repeat(1500)];
    let report = dispatch_lines(&sink, &lines, "test").await;
    assert_eq!(report.units, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
}
