//! Config parsing, defaults, validation and `.env` handling.

use std::path::PathBuf;

use observer::config::{Environment, ObserverConfig, CONFIG_PATH_VAR};

#[test]
fn test_empty_toml_uses_defaults() {
    let config = ObserverConfig::from_toml("").expect("empty config is valid");

    assert_eq!(config.server.host, "localhost");
    assert_eq!(config.server.port, 25565);
    assert!(!config.server.query_enabled);
    assert_eq!(config.server.effective_query_port(), 25565);
    assert_eq!(config.rcon.port, 25575);
    assert_eq!(config.rcon.effective_host(&config.server), "localhost");
    assert_eq!(config.rcon.password_env, "OBSERVER_RCON_PASSWORD");
    assert_eq!(config.logs.latest_log, PathBuf::from("logs/latest.log"));
    assert_eq!(config.logs.checkpoint, PathBuf::from("saved.log"));
    assert_eq!(config.observation.interval_secs, 1);
    assert_eq!(config.observation.tick_timeout_secs, 30);
    assert_eq!(config.telegram.bot_token_env, "OBSERVER_TELEGRAM_TOKEN");
    assert!(config.telegram.admin_user_id.is_none());
    assert_eq!(config.paths.logs_dir, PathBuf::from("observer-logs"));
    assert!(config.validate().is_ok());
}

#[test]
fn test_parse_full_toml() {
    let toml_str = r#"
[server]
host = "mc.example.net"
port = 25570
query_enabled = true
query_port = 25580
probe_timeout_secs = 3

[rcon]
host = "10.0.0.5"
port = 25590
password_env = "MC_RCON"

[logs]
latest_log = "/srv/mc/logs/latest.log"
checkpoint = "/var/lib/observer/saved.log"

[observation]
interval_secs = 2
tick_timeout_secs = 10

[telegram]
bot_token_env = "TG_TOKEN"
status_chat_id = -1001
status_message_id = 17
log_chat_id = -1002
chat_chat_id = -1003
admin_user_id = 424242
"#;
    let config = ObserverConfig::from_toml(toml_str).expect("should parse");

    assert_eq!(config.server.effective_query_port(), 25580);
    assert_eq!(config.rcon.effective_host(&config.server), "10.0.0.5");
    assert_eq!(config.rcon.password_env, "MC_RCON");
    assert_eq!(config.observation.interval_secs, 2);
    assert_eq!(config.telegram.status_message_id, 17);
    assert_eq!(config.telegram.admin_user_id, Some(424_242));
    assert!(config.validate().is_ok());
    assert!(config.telegram.validate().is_ok());
}

#[test]
fn test_zero_interval_is_rejected() {
    let config = ObserverConfig::from_toml("[observation]\ninterval_secs = 0\n").expect("should parse");
    assert!(config.validate().is_err());
}

#[test]
fn test_zero_port_is_rejected() {
    let config = ObserverConfig::from_toml("[rcon]\nport = 0\n").expect("should parse");
    assert!(config.validate().is_err());
}

#[test]
fn test_unset_telegram_ids_are_rejected() {
    let config = ObserverConfig::default();
    assert!(config.telegram.validate().is_err());
}

#[test]
fn test_invalid_toml_returns_error() {
    assert!(ObserverConfig::from_toml("[server\nport = 1").is_err());
    assert!(ObserverConfig::from_toml("[server]\nport = \"high\"").is_err());
}

#[test]
fn test_load_reads_file_named_by_env() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = tmp.path().join("observer.toml");
    std::fs::write(&path, "[server]\nhost = \"from-file\"\n").expect("write config");

    let env = Environment::from_pairs([(CONFIG_PATH_VAR, path.display().to_string())]);
    let config = ObserverConfig::load(&env).expect("should load");
    assert_eq!(config.server.host, "from-file");
}

#[test]
fn test_load_applies_dotenv_overrides() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = tmp.path().join("missing.toml");

    let env = Environment::from_pairs([
        (CONFIG_PATH_VAR.to_owned(), path.display().to_string()),
        ("OBSERVER_LOG_CHAT_ID".to_owned(), "-55".to_owned()),
    ]);
    let config = ObserverConfig::load(&env).expect("missing file means defaults");
    assert_eq!(config.telegram.log_chat_id, -55);
}

#[test]
fn test_env_file_is_parsed() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = tmp.path().join(".env");
    std::fs::write(&path, "OBSERVER_TEST_SECRET=s3cret\n# comment\nOBSERVER_TEST_BLANK=\n").expect("write env");

    let env = Environment::from_file(&path).expect("should parse");
    assert_eq!(env.secret("OBSERVER_TEST_SECRET").expect("present"), "s3cret");
    assert!(env.secret("OBSERVER_TEST_BLANK").is_err());
    assert!(env.secret("OBSERVER_TEST_ABSENT").is_err());
}

#[test]
fn test_missing_env_file_is_empty() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let env = Environment::from_file(&tmp.path().join(".env")).expect("missing is fine");
    assert!(env.var("OBSERVER_TEST_ABSENT").is_none());
}
