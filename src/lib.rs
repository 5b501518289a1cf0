//! Playback synchronization core for watch-party rooms.
//!
//! One participant per room (the admin) publishes playback state through a
//! [`network::SyncChannel`]; everyone else reconciles their local player
//! against it. The admin also owns the video queue and is the only session
//! allowed through the [`client::PermissionGate`].

pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod network;
pub mod player;
pub mod session;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::commands::create_room;
pub use crate::config::SessionConfig;
pub use crate::error::{Error, Result};
pub use crate::session::{SessionEvent, WatchSession};
