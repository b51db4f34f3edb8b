//! Observer CLI entry point.
//!
//! Provides `start`, `check`, and `rcon` subcommands for running the
//! bridge, taking a one-off reading, or sending a single console command.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use teloxide::Bot;
use tokio::sync::watch;
use tracing::{info, warn};

use observer::checkpoint::Checkpoint;
use observer::config::{Environment, ObserverConfig};
use observer::logsource::{FileLogSource, LogSource};
use observer::observation::{LoopTiming, ObservationLoop, Sinks};
use observer::rcon::{ConsoleCommandSink, RconClient};
use observer::relay::CommandRelay;
use observer::snapshot::ProbeOutcome;
use observer::status::{ProbeMode, StatusProber, StatusSource};
use observer::telegram::{self, InboundSettings, TelegramLogDisplay, TelegramStatusDisplay};
use observer::{classifier, diff, display, logging};

/// Observer: Minecraft server to Telegram bridge.
#[derive(Parser)]
#[command(name = "observer", version, about)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Run the bridge until Ctrl+C.
    Start,
    /// Probe status and count new log lines once, without sending anything.
    Check,
    /// Run one console command and print the reply.
    Rcon {
        /// Command words, joined with spaces.
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Start => handle_start().await,
        Command::Check => handle_check().await,
        Command::Rcon { command } => handle_rcon(&command.join(" ")).await,
    }
}

/// Load the `.env` file and the validated config.
fn load_config() -> anyhow::Result<(Environment, ObserverConfig)> {
    let env = Environment::load()?;
    let config = ObserverConfig::load(&env).context("failed to load configuration")?;
    Ok((env, config))
}

fn build_prober(config: &ObserverConfig) -> StatusProber {
    let mode = if config.server.query_enabled {
        ProbeMode::Query
    } else {
        ProbeMode::Ping
    };
    StatusProber::new(
        config.server.host.clone(),
        config.server.port,
        config.server.effective_query_port(),
        mode,
        config.server.probe_timeout(),
    )
}

fn build_rcon(env: &Environment, config: &ObserverConfig) -> anyhow::Result<RconClient> {
    let password = env
        .secret(&config.rcon.password_env)
        .context("RCON password missing")?;
    Ok(RconClient::new(
        config.rcon.effective_host(&config.server),
        config.rcon.port,
        password,
        config.rcon.timeout(),
    ))
}

/// Run the observation loop and the Telegram dispatcher together.
async fn handle_start() -> anyhow::Result<()> {
    let (env, config) = load_config()?;
    let _logging_guard = logging::init_production(&config.paths.logs_dir)?;

    config.telegram.validate()?;
    let bot_token = env
        .secret(&config.telegram.bot_token_env)
        .context("Telegram bot token missing")?;
    let bot = Bot::new(bot_token);

    let rcon: Arc<dyn ConsoleCommandSink> = Arc::new(build_rcon(&env, &config)?);
    let relay = CommandRelay::new(rcon);

    let sinks = Sinks {
        status: Arc::new(TelegramStatusDisplay::new(
            bot.clone(),
            config.telegram.status_chat_id,
            config.telegram.status_message_id,
        )),
        raw_log: Arc::new(TelegramLogDisplay::new(bot.clone(), config.telegram.log_chat_id)),
        chat_log: Arc::new(TelegramLogDisplay::new(bot.clone(), config.telegram.chat_chat_id)),
    };
    let timing = LoopTiming {
        interval: Duration::from_secs(config.observation.interval_secs),
        branch_timeout: Duration::from_secs(config.observation.tick_timeout_secs),
    };
    let observation = ObservationLoop::new(
        Arc::new(build_prober(&config)),
        Arc::new(FileLogSource::new(config.logs.latest_log.clone())),
        Checkpoint::new(config.logs.checkpoint.clone()),
        sinks,
        timing,
    );

    info!(
        server = %config.server.host,
        port = config.server.port,
        query = config.server.query_enabled,
        latest_log = %config.logs.latest_log.display(),
        "observer started"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let loop_handle = tokio::spawn(observation.run(shutdown_rx));

    let settings = InboundSettings {
        chat_chat_id: config.telegram.chat_chat_id,
        admin_user_id: config.telegram.admin_user_id,
    };
    telegram::run_bot(bot, relay, settings).await;

    info!("shutting down");
    if shutdown_tx.send(true).is_err() {
        warn!("observation loop already stopped");
    }
    if let Err(e) = loop_handle.await {
        warn!(error = %e, "observation loop task failed");
    }

    Ok(())
}

/// Take one reading without dispatching or touching the checkpoint.
async fn handle_check() -> anyhow::Result<()> {
    logging::init_cli();
    let (_env, config) = load_config()?;

    let prober = build_prober(&config);
    let via = match prober.mode() {
        ProbeMode::Query => "query",
        ProbeMode::Ping => "ping",
    };
    match prober.probe().await {
        ProbeOutcome::Success(status) => {
            println!("Server: online via {via} ({})", status.version);
            println!(
                "Players: {}/{} {}",
                status.player_count,
                status.player_limit,
                status.player_names.iter().cloned().collect::<Vec<_>>().join(", ")
            );
        }
        ProbeOutcome::Empty => println!("Server: offline"),
        ProbeOutcome::TransientFailure(reason) => println!("Server: offline (probe failed: {reason})"),
    }

    let source = FileLogSource::new(config.logs.latest_log.clone());
    let lines = match source.read().await {
        ProbeOutcome::Success(lines) => lines,
        ProbeOutcome::Empty | ProbeOutcome::TransientFailure(_) => Vec::new(),
    };
    let baseline = Checkpoint::new(config.logs.checkpoint.clone()).load().await;
    let new = diff::new_lines(&lines, &baseline);
    let chat = classifier::classify(&new, &HashSet::new());

    println!("Log: {} lines, {} new since checkpoint, {} for chat", lines.len(), new.len(), chat.lines.len());
    for unit in display::condense(&chat.lines, display::MAX_MESSAGE_LEN) {
        println!("{unit}");
    }

    Ok(())
}

/// Send one console command and print the reply.
async fn handle_rcon(command: &str) -> anyhow::Result<()> {
    logging::init_cli();
    let (env, config) = load_config()?;

    let client = build_rcon(&env, &config)?;
    let reply = client
        .execute(command)
        .await
        .with_context(|| format!("failed to run {command:?}"))?;

    if reply.trim().is_empty() {
        println!("{}", telegram::EMPTY_REPLY);
    } else {
        println!("{}", reply.trim_end());
    }
    Ok(())
}
