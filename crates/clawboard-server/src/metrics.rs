//! Prometheus recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global Prometheus recorder.
///
/// Returns the handle used by `/metrics`. Fails if a recorder is already
/// installed in this process.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// Socket connections opened (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Socket disconnections (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Open socket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Upgrades refused at the connection limit (counter).
pub const WS_CONNECTIONS_REFUSED_TOTAL: &str = "ws_connections_refused_total";
/// Connection lifetime (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Frames routed (counter, labels: type).
pub const RELAY_MESSAGES_TOTAL: &str = "relay_messages_total";
/// Frames rejected (counter, labels: code).
pub const RELAY_REJECTED_TOTAL: &str = "relay_rejected_total";
/// Frames handed to peers by fan-out (counter).
pub const RELAY_FANOUT_DELIVERIES_TOTAL: &str = "relay_fanout_deliveries_total";
/// Frames handed to the bot (counter, labels: source).
pub const BOT_DELIVERIES_TOTAL: &str = "bot_deliveries_total";
/// Frames for the bot that were dropped (counter, labels: source, reason).
pub const BOT_DROPS_TOTAL: &str = "bot_drops_total";
/// Whether a bot is connected (gauge, 1 or 0).
pub const BOT_CONNECTED: &str = "bot_connected";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_without_global_install() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = render(&handle);
        assert!(output.is_empty() || output.contains('\n'));
    }

    #[test]
    fn metric_names_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_CONNECTIONS_REFUSED_TOTAL,
            WS_CONNECTION_DURATION_SECONDS,
            RELAY_MESSAGES_TOTAL,
            RELAY_REJECTED_TOTAL,
            RELAY_FANOUT_DELIVERIES_TOTAL,
            BOT_DELIVERIES_TOTAL,
            BOT_DROPS_TOTAL,
            BOT_CONNECTED,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "{name} is not snake_case"
            );
        }
    }
}
