//! `/health` and `/ready` bodies.

use std::time::Instant;

use clawboard_core::timestamp_now;
use serde::Serialize;

/// `/health` response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"healthy"` while the server runs.
    pub status: &'static str,
    /// RFC 3339 time of the check.
    pub timestamp: String,
    /// Seconds since startup.
    pub uptime_secs: u64,
    /// Open socket count.
    pub connections: usize,
    /// Whether a bot holds the slot and is open.
    pub bot_connected: bool,
}

/// `/ready` response body.
#[derive(Debug, Clone, Serialize)]
pub struct ReadyResponse {
    /// Always `"ready"`.
    pub status: &'static str,
    /// RFC 3339 time of the check.
    pub timestamp: String,
}

/// Build a health response from live counters.
pub fn health_check(
    start_time: Instant,
    connections: usize,
    bot_connected: bool,
) -> HealthResponse {
    HealthResponse {
        status: "healthy",
        timestamp: timestamp_now(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        bot_connected,
    }
}

/// Build a readiness response.
pub fn ready_check() -> ReadyResponse {
    ReadyResponse {
        status: "ready",
        timestamp: timestamp_now(),
    }
}
