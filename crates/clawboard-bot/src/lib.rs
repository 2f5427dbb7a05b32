//! # clawboard-bot
//!
//! The automation bot behind the Clawboard dashboard. [`client::BotClient`]
//! holds one relay connection at a time from a single supervisor loop:
//! it reports status, runs assigned tasks through a [`tasks::TaskProcessor`],
//! obeys restart/pause/resume commands, and reconnects a bounded number of
//! times after a disconnect. [`api::ApiClient`] talks to the dashboard's REST
//! API.

#![deny(unsafe_code)]

pub mod api;
pub mod client;
pub mod config;
pub mod errors;
pub mod tasks;

pub use client::{BotClient, RunOutcome};
pub use config::BotConfig;
pub use errors::BotError;
