//! Chat classification of raw server log lines.
//!
//! Turns newly appended log lines into the subset that is safe and
//! interesting to show in a public chat. Fails closed: anything that is not
//! positively recognised as chat-worthy is dropped.

pub mod rules;

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use self::rules::{ALLOW_RULES, DENY_RULES};

/// Replacement for any IPv4-shaped substring.
pub const ADDRESS_PLACEHOLDER: &str = "###.###.###.###";

static IPV4: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}").ok());

static RECORD: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^\[(?P<time>[^\]]*)\]\s+\[(?P<thread>[^\]]+)/(?P<level>[A-Z]+)\]:\s?(?P<body>.*)$")
        .ok()
});

/// A log line split at its structural header boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord<'a> {
    /// Timestamp field, whatever its format.
    pub time: &'a str,
    /// Emitting thread name, e.g. `Server thread`.
    pub thread: &'a str,
    /// Log level, e.g. `INFO`.
    pub level: &'a str,
    /// Everything after the header.
    pub body: &'a str,
}

impl<'a> LogRecord<'a> {
    /// Parse `[time] [thread/LEVEL]: body`. Returns `None` for anything else.
    pub fn parse(line: &'a str) -> Option<Self> {
        let record = RECORD.as_ref()?;
        let line = line.trim_end_matches(['\r', '\n']);
        let captures = record.captures(line)?;
        Some(Self {
            time: captures.name("time")?.as_str(),
            thread: captures.name("thread")?.as_str(),
            level: captures.name("level")?.as_str(),
            body: captures.name("body")?.as_str(),
        })
    }

    /// Whether this is an ordinary informational record from the threads
    /// that carry gameplay messages.
    pub fn is_gameplay_info(&self) -> bool {
        self.level == "INFO"
            && (self.thread == "Server thread" || self.thread.starts_with("Async Chat Thread"))
    }
}

/// Replace every IPv4-dotted-quad-shaped substring with
/// [`ADDRESS_PLACEHOLDER`].
pub fn redact_addresses(text: &str) -> Cow<'_, str> {
    match IPV4.as_ref() {
        Some(pattern) => pattern.replace_all(text, ADDRESS_PLACEHOLDER),
        // Without the pattern nothing can be vouched for.
        None => Cow::Owned(ADDRESS_PLACEHOLDER.to_owned()),
    }
}

/// Output of one classification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Redacted message bodies to show in chat, in input order.
    pub lines: Vec<String>,
    /// Player names seen as the subject of accepted lines.
    pub players_seen: Vec<String>,
}

/// Filter and redact new log lines into chat-display-safe messages.
///
/// `known_players` should hold every name observed this session; death and
/// emote lines are only accepted when their subject is in it. A name seen
/// earlier in the same batch counts as known for the lines after it.
pub fn classify(new_lines: &[String], known_players: &HashSet<String>) -> Classification {
    let mut out = Classification::default();
    let mut known = Cow::Borrowed(known_players);

    for line in new_lines {
        let Some(record) = LogRecord::parse(line) else {
            continue;
        };
        if !record.is_gameplay_info() {
            continue;
        }

        let body = redact_addresses(record.body);

        if let Some(rule) = DENY_RULES
            .iter()
            .find(|rule| rule.matches(&body, &known).is_some())
        {
            trace!(rule = rule.name, "line denied");
            continue;
        }

        let accepted = ALLOW_RULES
            .iter()
            .find_map(|rule| rule.matches(&body, &known).map(|player| (rule.name, player)));

        if let Some((rule, player)) = accepted {
            trace!(rule, "line allowed");
            if let Some(player) = player {
                if !known.contains(&player) {
                    known.to_mut().insert(player.clone());
                }
                if !out.players_seen.contains(&player) {
                    out.players_seen.push(player);
                }
            }
            out.lines.push(body.into_owned());
        }
    }

    out
}
