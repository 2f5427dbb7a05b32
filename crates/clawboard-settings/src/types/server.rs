//! Relay server settings.

use serde::{Deserialize, Serialize};

/// Relay network and runtime settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// HTTP + WebSocket port.
    pub port: u16,
    /// Maximum concurrent socket peers.
    pub max_connections: usize,
    /// Interval between server pings, in seconds.
    pub heartbeat_interval_secs: u64,
    /// Disconnect a peer after this long without a pong, in seconds.
    pub heartbeat_timeout_secs: u64,
    /// Per-peer outbound queue depth.
    pub send_queue_size: usize,
    /// Reply with an error frame when `send_to_bot` finds no bot.
    pub notify_bot_missing: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3002,
            max_connections: 256,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 60,
            send_queue_size: 256,
            notify_bot_missing: false,
        }
    }
}
