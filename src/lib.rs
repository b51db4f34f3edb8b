//! Observer: a bridge between a Minecraft server and Telegram.
//!
//! Watches the server's status and log, shows live status and chat in
//! Telegram, and relays Telegram chat and admin commands back over RCON.
//!
//! See `DESIGN.md` for the architecture.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod checkpoint;
pub mod classifier;
pub mod config;
pub mod diff;
pub mod display;
pub mod logging;
pub mod logsource;
pub mod observation;
pub mod rcon;
pub mod relay;
pub mod snapshot;
pub mod status;
pub mod telegram;
