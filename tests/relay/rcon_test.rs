//! RCON client against the fake server.

use std::time::Duration;

use tokio::net::TcpListener;

use observer::rcon::{ConsoleCommandSink, RconClient, RconError};

use crate::fake_rcon::{self, PASSWORD};

#[tokio::test]
async fn execute_returns_reply_body() {
    let server = fake_rcon::spawn("There are 0 of a max of 20 players online: ").await;
    let client = RconClient::new("127.0.0.1", server.port, PASSWORD, Duration::from_secs(5));

    let reply = client.execute("list").await.expect("command should run");
    assert_eq!(reply, "There are 0 of a max of 20 players online: ");
    assert_eq!(server.commands(), vec!["list"]);
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let server = fake_rcon::spawn("").await;
    let client = RconClient::new("127.0.0.1", server.port, "wrong", Duration::from_secs(5));

    let err = client.execute("list").await.expect_err("auth should fail");
    assert!(matches!(err, RconError::AuthRejected), "{err}");
    assert!(server.commands().is_empty());
}

#[tokio::test]
async fn closed_port_is_io_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("listener should bind");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);

    let client = RconClient::new("127.0.0.1", port, PASSWORD, Duration::from_secs(2));
    assert!(matches!(client.execute("list").await, Err(RconError::Io(_))));
}

#[tokio::test]
async fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("listener should bind");
    let port = listener.local_addr().expect("local addr").port();
    tokio::spawn(async move {
        let accepted = listener.accept().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(accepted);
    });

    let client = RconClient::new("127.0.0.1", port, PASSWORD, Duration::from_millis(200));
    assert!(matches!(
        client.execute("list").await,
        Err(RconError::Timeout { .. })
    ));
}

#[test]
fn debug_output_hides_password() {
    let client = RconClient::new("localhost", 25575, PASSWORD, Duration::from_secs(1));
    let rendered = format!("{client:?}");
    assert!(!rendered.contains(PASSWORD));
    assert!(rendered.contains("REDACTED"));
}
