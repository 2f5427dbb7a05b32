//! Relay server configuration.

use serde::{Deserialize, Serialize};

/// Configuration for [`RelayServer`](crate::server::RelayServer).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Upgrades beyond this many open sockets are refused with 503.
    pub max_connections: usize,
    /// Seconds between server pings.
    pub heartbeat_interval_secs: u64,
    /// Close a peer after this many seconds without a pong or frame.
    pub heartbeat_timeout_secs: u64,
    /// Max inbound frame size in bytes.
    pub max_message_size: usize,
    /// Outbound queue depth per peer.
    pub send_queue_size: usize,
    /// Send an error frame when `send_to_bot` finds no bot.
    pub notify_bot_missing: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 256,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 60,
            max_message_size: 1024 * 1024,
            send_queue_size: 256,
            notify_bot_missing: false,
        }
    }
}
