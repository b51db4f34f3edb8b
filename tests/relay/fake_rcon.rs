//! Loopback RCON server.

use std::sync::{Arc, Mutex};

use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use observer::rcon::Packet;

pub const PASSWORD: &str = "hunter2";

/// Running fake server.
pub struct FakeRcon {
    pub port: u16,
    pub commands: Arc<Mutex<Vec<String>>>,
}

impl FakeRcon {
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().expect("commands lock").clone()
    }
}

/// Accept connections forever; answer each command with `reply`.
pub async fn spawn(reply: &'static str) -> FakeRcon {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("listener should bind");
    let port = listener.local_addr().expect("local addr").port();
    let commands = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&commands);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let seen = Arc::clone(&seen);
            tokio::spawn(async move {
                let Ok(auth) = Packet::read(&mut socket).await else {
                    return;
                };
                let accepted = auth.kind == 3 && auth.body == PASSWORD;
                // Vanilla sends an empty response before the auth result.
                let preamble = Packet {
                    id: auth.id,
                    kind: 0,
                    body: String::new(),
                };
                let result = Packet {
                    id: if accepted { auth.id } else { -1 },
                    kind: 2,
                    body: String::new(),
                };
                let mut out = preamble.encode().expect("encode");
                out.extend(result.encode().expect("encode"));
                if socket.write_all(&out).await.is_err() || !accepted {
                    return;
                }

                let Ok(exec) = Packet::read(&mut socket).await else {
                    return;
                };
                seen.lock().expect("commands lock").push(exec.body.clone());
                let response = Packet {
                    id: exec.id,
                    kind: 0,
                    body: reply.to_owned(),
                };
                let _ = socket.write_all(&response.encode().expect("encode")).await;
            });
        }
    });

    FakeRcon { port, commands }
}
