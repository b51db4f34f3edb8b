//! Forwarding chat messages and console commands to the observed server.
//!
//! Runs on demand from inbound chat events, independently of the
//! observation loop. Failures are logged and reported as values.

use std::sync::Arc;

use tracing::{error, info};

use crate::rcon::ConsoleCommandSink;

/// Colour of the sender tag shown in game.
const SENDER_COLOR: &str = "aqua";

/// Result of forwarding one console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The server accepted the command and replied with this text.
    Delivered(String),
    /// The command never reached the server.
    Failed(String),
}

impl CommandOutcome {
    /// Whether the command reached the server.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}

/// Relays chat-surface input to the server console.
#[derive(Clone)]
pub struct CommandRelay {
    console: Arc<dyn ConsoleCommandSink>,
}

impl CommandRelay {
    /// Create a relay over a console transport.
    pub fn new(console: Arc<dyn ConsoleCommandSink>) -> Self {
        Self { console }
    }

    /// Broadcast `text` in game, tagged with `sender_name`.
    ///
    /// Returns `true` if the server accepted the broadcast.
    pub async fn send_chat_message(&self, sender_name: &str, text: &str) -> bool {
        let command = tellraw_command(sender_name, text);
        match self.console.execute(&command).await {
            Ok(_) => {
                info!(sender = %sender_name, "chat message relayed");
                true
            }
            Err(e) => {
                error!(sender = %sender_name, error = %e, "failed to relay chat message");
                false
            }
        }
    }

    /// Forward a privileged command verbatim.
    pub async fn run_console_command(&self, text: &str) -> CommandOutcome {
        let command = text.trim();
        match self.console.execute(command).await {
            Ok(response) => {
                info!(command = %command, "console command executed");
                CommandOutcome::Delivered(response)
            }
            Err(e) => {
                error!(command = %command, error = %e, "failed to run console command");
                CommandOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Build the `tellraw` command that shows `[sender] text` to every player.
///
/// The JSON text component is produced by a serializer, so user text cannot
/// break out of its string.
pub fn tellraw_command(sender_name: &str, text: &str) -> String {
    let components = serde_json::json!([
        "",
        { "text": format!("[{sender_name}] "), "color": SENDER_COLOR },
        { "text": text },
    ]);
    format!("tellraw @a {components}")
}
