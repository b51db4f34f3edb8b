//! Ordered deny and allow tables for chat classification.
//!
//! Every pattern is matched against the message body (everything after the
//! `[time] [thread/LEVEL]: ` header) and is anchored at the start of the
//! body, so a player typing a denied phrase in chat still reaches the allow
//! table.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Characters allowed in a player name token.
const NAME: &str = r"[A-Za-z0-9_.]{1,16}";

/// A single named entry in a classification table.
#[derive(Debug)]
pub struct Rule {
    /// Stable identifier, used in logs and tests.
    pub name: &'static str,
    pattern: Regex,
    requires_known_player: bool,
}

impl Rule {
    fn new(name: &'static str, pattern: &str) -> Option<Self> {
        Some(Self {
            name,
            pattern: Regex::new(pattern).ok()?,
            requires_known_player: false,
        })
    }

    /// A rule that only matches when its `player` capture is a known name.
    fn with_known_player(name: &'static str, pattern: &str) -> Option<Self> {
        let mut rule = Self::new(name, pattern)?;
        rule.requires_known_player = true;
        Some(rule)
    }

    /// Test this rule against a message body.
    ///
    /// Returns `Some(player)` on a match, where `player` is the subject name
    /// if the pattern captured one.
    pub fn matches(&self, body: &str, known_players: &HashSet<String>) -> Option<Option<String>> {
        let captures = self.pattern.captures(body)?;
        let player = captures.name("player").map(|m| m.as_str().to_owned());
        if self.requires_known_player {
            match player {
                Some(ref name) if known_players.contains(name) => {}
                _ => return None,
            }
        }
        Some(player)
    }
}

/// Noise categories. A match here excludes the line.
pub static DENY_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    [
        Rule::new("lost_connection", &format!(r"^{NAME} lost connection: ")),
        Rule::new("login_entity", &format!(r"^{NAME}\[.*\] logged in with entity id ")),
        Rule::new("uuid_announce", r"^UUID of player \S+ is "),
        Rule::new("disconnecting", r"^(Disconnecting |com\.mojang\.authlib)"),
        Rule::new("player_count", r"^There are \d+ of a max of \d+ players online"),
        Rule::new(
            "startup_banner",
            r"^(Starting minecraft server version|Loading properties|Default game type:|Generating keypair|Starting Minecraft server on|Using \S+ channel type|Preparing level|Preparing start region|Time elapsed:|Done \(.*\)! For help, type|Starting GS4 status listener|Thread Query Listener started|Query running on|Starting remote control listener|Thread RCON Listener started|RCON running on)",
        ),
        Rule::new(
            "shutdown_and_save",
            r"^(Stopping the server|Stopping server|Saving players|Saving worlds|Saving chunks for level|ThreadedAnvilChunkStorage|All dimensions are saved|All chunks are saved|Saved the game|Saving the game|Automatic saving is now (enabled|disabled))",
        ),
        Rule::new("rcon_client", r"^(Thread RCON Client|Rcon connection from)"),
        Rule::new("command_echo", r"^\[[^\]<>]+: .*\]$"),
        Rule::new("command_error", r"^(Unknown or incomplete command|[^<].*<--\[HERE\]$)"),
        Rule::new("dynmap", r"^\[Dynmap\] "),
    ]
    .into_iter()
    .flatten()
    .collect()
});

/// Chat-worthy categories. A line must match one of these to be shown.
pub static ALLOW_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    let deaths = DEATH_PHRASES
        .iter()
        .map(|phrase| regex::escape(phrase))
        .collect::<Vec<_>>()
        .join("|");

    [
        Rule::new("chat", &format!(r"^<(?P<player>{NAME})> .+")),
        Rule::new("join_leave", &format!(r"^(?P<player>{NAME}) (joined|left) the game$")),
        Rule::new(
            "advancement",
            &format!(
                r"^(?P<player>{NAME}) has (made the advancement|reached the goal|completed the challenge) \[.+\]$"
            ),
        ),
        Rule::with_known_player("death", &format!(r"^(?P<player>{NAME}) ({deaths})")),
        Rule::with_known_player("emote", &format!(r"^\* (?P<player>{NAME}) .+")),
        Rule::new("broadcast", r"^\[Server\] .+"),
    ]
    .into_iter()
    .flatten()
    .collect()
});

/// Vanilla death message fragments that follow the victim's name.
const DEATH_PHRASES: &[&str] = &[
    "was shot by",
    "was pummeled by",
    "was pricked to death",
    "walked into a cactus",
    "drowned",
    "experienced kinetic energy",
    "blew up",
    "was blown up by",
    "was killed by",
    "hit the ground too hard",
    "fell from a high place",
    "fell off a ladder",
    "fell off some vines",
    "fell off some weeping vines",
    "fell off some twisting vines",
    "fell off scaffolding",
    "fell while climbing",
    "was doomed to fall",
    "was impaled on a stalagmite",
    "was squashed by",
    "was skewered by",
    "went up in flames",
    "walked into fire",
    "burned to death",
    "was burnt to a crisp",
    "went off with a bang",
    "tried to swim in lava",
    "was struck by lightning",
    "discovered the floor was lava",
    "walked into the danger zone",
    "froze to death",
    "was frozen to death by",
    "was slain by",
    "was fireballed by",
    "was stung to death",
    "was shot by a skull from",
    "starved to death",
    "suffocated in a wall",
    "was squished too much",
    "was poked to death by",
    "was impaled by",
    "fell out of the world",
    "didn't want to live in the same world as",
    "withered away",
    "died from dehydration",
    "was roasted in dragon breath",
    "was obliterated by a sonically-charged shriek",
    "left the confines of this world",
    "died",
];
