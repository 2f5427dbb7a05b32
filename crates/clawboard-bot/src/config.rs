//! Runtime configuration for [`BotClient`](crate::client::BotClient).

use std::time::Duration;

use clawboard_settings::BotSettings;

/// Bot identity, endpoint and timings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotConfig {
    /// Name sent with every status report.
    pub name: String,
    /// Relay socket URL.
    pub ws_url: String,
    /// Consecutive reconnect attempts after a disconnect before giving up.
    pub max_reconnect_attempts: u32,
    /// Delay before each reconnect attempt.
    pub reconnect_interval: Duration,
    /// Delay before reconnecting after a `restart` command.
    pub restart_delay: Duration,
    /// Time spent in `processing` per context update.
    pub context_delay: Duration,
    /// Interval between unsolicited status reports.
    pub heartbeat_interval: Duration,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self::from(&BotSettings::default())
    }
}

impl From<&BotSettings> for BotConfig {
    fn from(settings: &BotSettings) -> Self {
        Self {
            name: settings.name.clone(),
            ws_url: settings.ws_url.clone(),
            max_reconnect_attempts: settings.max_reconnect_attempts,
            reconnect_interval: Duration::from_millis(settings.reconnect_interval_ms),
            restart_delay: Duration::from_millis(settings.restart_delay_ms),
            context_delay: Duration::from_millis(settings.context_delay_ms),
            heartbeat_interval: Duration::from_millis(settings.heartbeat_interval_ms.max(1)),
        }
    }
}
