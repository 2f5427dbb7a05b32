//! Bot client settings.

use serde::{Deserialize, Serialize};

/// Bot identity, endpoints and timings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BotSettings {
    /// Name reported in status updates; its presence claims the bot slot.
    pub name: String,
    /// Relay WebSocket URL.
    pub ws_url: String,
    /// Dashboard REST API base URL.
    pub api_url: String,
    /// Consecutive reconnect attempts before giving up.
    pub max_reconnect_attempts: u32,
    /// Fixed delay before each reconnect attempt.
    pub reconnect_interval_ms: u64,
    /// Delay before reconnecting after a `restart` command.
    pub restart_delay_ms: u64,
    /// How long a context update keeps the bot in `processing`.
    pub context_delay_ms: u64,
    /// Duration of the simulated task.
    pub task_duration_ms: u64,
    /// Interval between unsolicited status reports.
    pub heartbeat_interval_ms: u64,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            name: "OpenClaw Bot".to_string(),
            ws_url: "ws://localhost:3002".to_string(),
            api_url: "http://localhost:3002".to_string(),
            max_reconnect_attempts: 5,
            reconnect_interval_ms: 5000,
            restart_delay_ms: 2000,
            context_delay_ms: 1000,
            task_duration_ms: 2000,
            heartbeat_interval_ms: 30_000,
        }
    }
}
