//! Chat and console relay over RCON.

use std::sync::Arc;
use std::time::Duration;

use observer::rcon::RconClient;
use observer::relay::{CommandOutcome, CommandRelay};

use crate::fake_rcon::{self, PASSWORD};

fn relay(port: u16, password: &str) -> CommandRelay {
    CommandRelay::new(Arc::new(RconClient::new(
        "127.0.0.1",
        port,
        password,
        Duration::from_secs(5),
    )))
}

#[tokio::test]
async fn chat_message_becomes_tellraw() {
    let server = fake_rcon::spawn("").await;
    assert!(relay(server.port, PASSWORD).send_chat_message("steve", "hi \"all\"").await);

    let commands = server.commands();
    assert_eq!(commands.len(), 1);
    let json = commands[0]
        .strip_prefix("tellraw @a ")
        .expect("tellraw prefix");
    let parsed: serde_json::Value = serde_json::from_str(json).expect("valid component");
    assert_eq!(parsed[1]["text"], "[steve] ");
    assert_eq!(parsed[2]["text"], "hi \"all\"");
}

#[tokio::test]
async fn chat_relay_failure_is_reported_not_raised() {
    let server = fake_rcon::spawn("").await;
    assert!(!relay(server.port, "wrong").send_chat_message("steve", "hi").await);
}

#[tokio::test]
async fn console_command_is_forwarded_verbatim() {
    let server = fake_rcon::spawn("Set the time to 1000").await;
    let outcome = relay(server.port, PASSWORD)
        .run_console_command("time set 1000\n")
        .await;

    assert_eq!(outcome, CommandOutcome::Delivered("Set the time to 1000".to_owned()));
    assert_eq!(server.commands(), vec!["time set 1000"]);
}

#[tokio::test]
async fn console_failure_carries_reason() {
    let server = fake_rcon::spawn("").await;
    let outcome = relay(server.port, "wrong").run_console_command("stop").await;
    assert!(!outcome.is_success());
    assert!(matches!(outcome, CommandOutcome::Failed(reason) if reason.contains("rejected")));
}
