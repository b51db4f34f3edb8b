//! Configuration loading and validation.
//!
//! Loads `./observer.toml` (or `$OBSERVER_CONFIG`). Every section has
//! defaults, so a missing or empty file is valid.
//!
//! Precedence: process env > `.env` file > config file > defaults.
//!
//! Secrets never live in the TOML file. The file names the environment
//! variable that holds each one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Variable naming the config file.
pub const CONFIG_PATH_VAR: &str = "OBSERVER_CONFIG";

/// Variable naming the `.env` file.
pub const ENV_FILE_VAR: &str = "OBSERVER_ENV_FILE";

// ── Environment ─────────────────────────────────────────────────

/// Variable lookup over the process environment with a `.env` fallback.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    dotenv: HashMap<String, String>,
}

impl Environment {
    /// Read the `.env` file named by `$OBSERVER_ENV_FILE`, or `./.env`.
    ///
    /// A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let path = std::env::var(ENV_FILE_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".env"));
        Self::from_file(&path)
    }

    /// Read a specific `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let entries = match dotenvy::from_path_iter(path) {
            Ok(entries) => entries,
            Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no .env file");
                return Ok(Self::default());
            }
            Err(e) => return Err(anyhow::anyhow!("failed to open {}: {e}", path.display())),
        };

        let mut dotenv = HashMap::new();
        for entry in entries {
            let (key, value) = entry.with_context(|| format!("failed to parse {}", path.display()))?;
            dotenv.insert(key, value);
        }
        tracing::info!(path = %path.display(), vars = dotenv.len(), "loaded .env file");
        Ok(Self { dotenv })
    }

    /// Build from explicit pairs (for testing).
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            dotenv: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Look up `key`, process environment first.
    pub fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().or_else(|| self.dotenv.get(key).cloned())
    }

    /// Look up a secret that must be present and non-empty.
    ///
    /// # Errors
    ///
    /// Returns an error naming the variable if it is unset or blank.
    pub fn secret(&self, key: &str) -> Result<String> {
        match self.var(key) {
            Some(v) if !v.trim().is_empty() => Ok(v),
            _ => anyhow::bail!("{key} is not set"),
        }
    }
}

// ── Top-level config ────────────────────────────────────────────

/// Top-level bridge configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// The observed server.
    pub server: ServerConfig,
    /// Console command transport.
    pub rcon: RconConfig,
    /// Server log and checkpoint locations.
    pub logs: LogsConfig,
    /// Loop cadence.
    pub observation: ObservationConfig,
    /// Chat surface.
    pub telegram: TelegramConfig,
    /// Where the bridge writes its own files.
    pub paths: PathsConfig,
}

impl ObserverConfig {
    /// Load with precedence: env > TOML file > defaults, then validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// result fails [`validate`](Self::validate).
    pub fn load(env: &Environment) -> Result<Self> {
        let path = Self::config_path_with(|key| env.var(key));
        let mut config = Self::load_from_file(&path)?;
        config.apply_overrides(|key| env.var(key));
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file only, no env overrides.
    fn load_from_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!("failed to read config file {}: {e}", path.display())),
        }
    }

    /// Resolve the config path using a custom env resolver.
    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        env(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("observer.toml"))
    }

    /// Apply environment variable overrides.
    ///
    /// Takes a resolver function so tests never touch the process env.
    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        // Server.
        if let Some(v) = env("OBSERVER_SERVER_HOST") {
            self.server.host = v;
        }
        override_parsed(&env, "OBSERVER_SERVER_PORT", &mut self.server.port);
        override_parsed(&env, "OBSERVER_QUERY_ENABLED", &mut self.server.query_enabled);
        if let Some(port) = parsed(&env, "OBSERVER_QUERY_PORT") {
            self.server.query_port = Some(port);
        }

        // RCON.
        if let Some(v) = env("OBSERVER_RCON_HOST") {
            self.rcon.host = Some(v);
        }
        override_parsed(&env, "OBSERVER_RCON_PORT", &mut self.rcon.port);

        // Logs.
        if let Some(v) = env("OBSERVER_LATEST_LOG") {
            self.logs.latest_log = PathBuf::from(v);
        }
        if let Some(v) = env("OBSERVER_CHECKPOINT") {
            self.logs.checkpoint = PathBuf::from(v);
        }

        // Observation.
        override_parsed(&env, "OBSERVER_INTERVAL_SECS", &mut self.observation.interval_secs);

        // Telegram.
        override_parsed(&env, "OBSERVER_STATUS_CHAT_ID", &mut self.telegram.status_chat_id);
        override_parsed(&env, "OBSERVER_STATUS_MESSAGE_ID", &mut self.telegram.status_message_id);
        override_parsed(&env, "OBSERVER_LOG_CHAT_ID", &mut self.telegram.log_chat_id);
        override_parsed(&env, "OBSERVER_CHAT_CHAT_ID", &mut self.telegram.chat_chat_id);
        if let Some(id) = parsed(&env, "OBSERVER_ADMIN_USER_ID") {
            self.telegram.admin_user_id = Some(id);
        }
    }

    /// Parse a TOML string into config.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid TOML or mistyped fields.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).context("failed to parse config TOML")
    }

    /// Reject settings the bridge cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            anyhow::bail!("server.host must not be empty");
        }
        if self.server.port == 0 {
            anyhow::bail!("server.port must be non-zero");
        }
        if self.server.query_port == Some(0) {
            anyhow::bail!("server.query_port must be non-zero");
        }
        if self.rcon.port == 0 {
            anyhow::bail!("rcon.port must be non-zero");
        }
        if self.observation.interval_secs == 0 {
            anyhow::bail!("observation.interval_secs must be at least 1");
        }
        if self.observation.tick_timeout_secs == 0 {
            anyhow::bail!("observation.tick_timeout_secs must be at least 1");
        }
        if self.server.probe_timeout_secs == 0 || self.rcon.timeout_secs == 0 {
            anyhow::bail!("timeouts must be at least 1 second");
        }
        Ok(())
    }
}

/// Override `target` with a parsed env value, ignoring unparsable input.
fn override_parsed<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str, target: &mut T) {
    if let Some(v) = parsed(env, key) {
        *target = v;
    }
}

fn parsed<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = env(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = key, value = %raw, "ignoring invalid env override");
            None
        }
    }
}

// ── Server ──────────────────────────────────────────────────────

/// Where the observed server listens.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Hostname or address.
    pub host: String,
    /// Game (Server List Ping) port.
    pub port: u16,
    /// Use the UDP query protocol instead of ping.
    pub query_enabled: bool,
    /// Query port; the game port when unset.
    pub query_port: Option<u16>,
    /// Timeout for one status probe.
    pub probe_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 25565,
            query_enabled: false,
            query_port: None,
            probe_timeout_secs: 5,
        }
    }
}

impl ServerConfig {
    /// Query port to use.
    pub fn effective_query_port(&self) -> u16 {
        self.query_port.unwrap_or(self.port)
    }

    /// Probe timeout as a duration.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

// ── RCON ────────────────────────────────────────────────────────

/// Console command transport settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RconConfig {
    /// RCON host; the server host when unset.
    pub host: Option<String>,
    /// RCON port.
    pub port: u16,
    /// Name of the variable holding the password.
    pub password_env: String,
    /// Timeout for one command exchange.
    pub timeout_secs: u64,
}

impl Default for RconConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 25575,
            password_env: "OBSERVER_RCON_PASSWORD".to_owned(),
            timeout_secs: 5,
        }
    }
}

impl RconConfig {
    /// Host to connect to, given the server section.
    pub fn effective_host<'a>(&'a self, server: &'a ServerConfig) -> &'a str {
        self.host.as_deref().unwrap_or(&server.host)
    }

    /// Command timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ── Logs ────────────────────────────────────────────────────────

/// Server log and checkpoint files.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    /// The server's current log file.
    pub latest_log: PathBuf,
    /// Last observed log lines, rewritten on change.
    pub checkpoint: PathBuf,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            latest_log: PathBuf::from("logs/latest.log"),
            checkpoint: PathBuf::from("saved.log"),
        }
    }
}

// ── Observation ─────────────────────────────────────────────────

/// Loop cadence.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservationConfig {
    /// Minimum seconds between tick starts.
    pub interval_secs: u64,
    /// Upper bound for each concurrent branch of a tick.
    pub tick_timeout_secs: u64,
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            interval_secs: 1,
            tick_timeout_secs: 30,
        }
    }
}

// ── Telegram ────────────────────────────────────────────────────

/// Chat surface identifiers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Name of the variable holding the bot token.
    pub bot_token_env: String,
    /// Chat containing the status message.
    pub status_chat_id: i64,
    /// The message edited to show status.
    pub status_message_id: i32,
    /// Chat receiving the raw log.
    pub log_chat_id: i64,
    /// Chat receiving game chat, and whose messages are relayed in game.
    pub chat_chat_id: i64,
    /// User allowed to run console commands in a private chat.
    pub admin_user_id: Option<u64>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token_env: "OBSERVER_TELEGRAM_TOKEN".to_owned(),
            status_chat_id: 0,
            status_message_id: 0,
            log_chat_id: 0,
            chat_chat_id: 0,
            admin_user_id: None,
        }
    }
}

impl TelegramConfig {
    /// Check that every chat the bridge writes to is configured.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first unset identifier.
    pub fn validate(&self) -> Result<()> {
        if self.status_chat_id == 0 || self.status_message_id == 0 {
            anyhow::bail!("telegram.status_chat_id and telegram.status_message_id must be set");
        }
        if self.log_chat_id == 0 {
            anyhow::bail!("telegram.log_chat_id must be set");
        }
        if self.chat_chat_id == 0 {
            anyhow::bail!("telegram.chat_chat_id must be set");
        }
        Ok(())
    }
}

// ── Paths ───────────────────────────────────────────────────────

/// Where the bridge writes its own files.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory for the bridge's rotating logs.
    pub logs_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            logs_dir: PathBuf::from("observer-logs"),
        }
    }
}
