//! Telegram chat surface: display sinks and inbound event routing.
//!
//! Outbound, one message is edited in place for status and two chats
//! receive log text. Inbound, group chat is relayed into the game and the
//! admin's private messages are run as console commands.

use std::sync::Arc;

use async_trait::async_trait;
use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode};
use teloxide::{ApiError, RequestError};
use tracing::{debug, info, warn};

use crate::display::{split_chunks, LogDisplay, StatusDisplay, MAX_REPLY_LEN};
use crate::relay::{CommandOutcome, CommandRelay};

/// Reply sent when a console command produced no output.
pub const EMPTY_REPLY: &str = "Command executed.";

// ---------------------------------------------------------------------------
// Display sinks
// ---------------------------------------------------------------------------

/// Edits one pre-existing message to show server status.
#[derive(Clone)]
pub struct TelegramStatusDisplay {
    bot: Bot,
    chat_id: ChatId,
    message_id: MessageId,
}

impl TelegramStatusDisplay {
    /// Target message `message_id` in chat `chat_id`.
    pub fn new(bot: Bot, chat_id: i64, message_id: i32) -> Self {
        Self {
            bot,
            chat_id: ChatId(chat_id),
            message_id: MessageId(message_id),
        }
    }
}

#[async_trait]
impl StatusDisplay for TelegramStatusDisplay {
    async fn edit(&self, content: &str) -> anyhow::Result<()> {
        let result = self
            .bot
            .edit_message_text(self.chat_id, self.message_id, content)
            .parse_mode(ParseMode::Html)
            .await;
        match result {
            Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Appends plain-text log units to a chat.
#[derive(Clone)]
pub struct TelegramLogDisplay {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramLogDisplay {
    /// Post to chat `chat_id`.
    pub fn new(bot: Bot, chat_id: i64) -> Self {
        Self {
            bot,
            chat_id: ChatId(chat_id),
        }
    }
}

#[async_trait]
impl LogDisplay for TelegramLogDisplay {
    async fn send(&self, unit: &str) -> anyhow::Result<()> {
        self.bot.send_message(self.chat_id, unit).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Inbound routing
// ---------------------------------------------------------------------------

/// Which inbound messages the bridge acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboundSettings {
    /// Group chat relayed into the game.
    pub chat_chat_id: i64,
    /// User whose private messages are console commands.
    pub admin_user_id: Option<u64>,
}

/// The parts of a Telegram message that routing looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundMessage {
    /// Chat the message arrived in.
    pub chat_id: i64,
    /// Whether that chat is a private conversation.
    pub is_private: bool,
    /// Sender id, if known.
    pub from_id: Option<u64>,
    /// Whether the sender is a bot.
    pub from_is_bot: bool,
    /// Sender's @username.
    pub username: Option<String>,
    /// Sender's first name.
    pub first_name: String,
    /// Message text.
    pub text: Option<String>,
}

impl InboundMessage {
    fn from_message(msg: &Message) -> Self {
        let user = msg.from.as_ref();
        Self {
            chat_id: msg.chat.id.0,
            is_private: msg.chat.is_private(),
            from_id: user.map(|u| u.id.0),
            from_is_bot: user.is_some_and(|u| u.is_bot),
            username: user.and_then(|u| u.username.clone()),
            first_name: user.map(|u| u.first_name.clone()).unwrap_or_default(),
            text: msg.text().map(str::to_owned),
        }
    }
}

/// What to do with one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundAction {
    /// Broadcast in game as `[sender] text`.
    RelayChat {
        /// Display name shown in game.
        sender: String,
        /// Message body.
        text: String,
    },
    /// Run as a console command.
    ConsoleCommand(String),
    /// Not for us.
    Ignore,
}

/// Decide how to handle an inbound message.
pub fn route(msg: &InboundMessage, settings: &InboundSettings) -> InboundAction {
    let Some(text) = msg.text.as_deref().filter(|t| !t.trim().is_empty()) else {
        return InboundAction::Ignore;
    };
    if msg.from_is_bot || msg.from_id.is_none() {
        return InboundAction::Ignore;
    }

    if msg.chat_id == settings.chat_chat_id {
        let sender = msg
            .username
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| msg.first_name.clone());
        return InboundAction::RelayChat {
            sender,
            text: text.to_owned(),
        };
    }

    if msg.is_private && settings.admin_user_id.is_some() && msg.from_id == settings.admin_user_id {
        return InboundAction::ConsoleCommand(text.to_owned());
    }

    InboundAction::Ignore
}

/// Turn a console command outcome into reply messages.
pub fn command_replies(outcome: &CommandOutcome) -> Vec<String> {
    match outcome {
        CommandOutcome::Delivered(response) if response.trim().is_empty() => vec![EMPTY_REPLY.to_owned()],
        CommandOutcome::Delivered(response) => split_chunks(response.trim(), MAX_REPLY_LEN),
        CommandOutcome::Failed(reason) => split_chunks(&format!("Command failed: {reason}"), MAX_REPLY_LEN),
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Shared dependencies injected into teloxide handlers via `dptree::deps!`.
#[derive(Clone)]
struct SharedState {
    relay: CommandRelay,
    settings: InboundSettings,
}

/// Run the inbound dispatcher until Ctrl+C.
pub async fn run_bot(bot: Bot, relay: CommandRelay, settings: InboundSettings) {
    let shared = Arc::new(SharedState { relay, settings });
    let handler = Update::filter_message().endpoint(handle_message);

    info!(chat_chat_id = settings.chat_chat_id, "telegram dispatcher starting");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![shared])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("telegram dispatcher stopped");
}

async fn handle_message(bot: Bot, msg: Message, state: Arc<SharedState>) -> ResponseResult<()> {
    let inbound = InboundMessage::from_message(&msg);

    match route(&inbound, &state.settings) {
        InboundAction::RelayChat { sender, text } => {
            if !state.relay.send_chat_message(&sender, &text).await {
                warn!(sender = %sender, "chat message not delivered to server");
            }
        }
        InboundAction::ConsoleCommand(command) => {
            let outcome = state.relay.run_console_command(&command).await;
            for reply in command_replies(&outcome) {
                bot.send_message(msg.chat.id, reply).await?;
            }
        }
        InboundAction::Ignore => {
            debug!(chat_id = inbound.chat_id, "ignoring telegram message");
        }
    }

    Ok(())
}
