//! Decodes inbound frames and dispatches them.

use std::sync::Arc;

use clawboard_core::errors::BOT_NOT_CONNECTED;
use clawboard_core::protocol::{self, BotStatusReport, ClientMessage, RelayEvent, SendToBot};
use metrics::{counter, gauge};
use tracing::{debug, info, warn};

use super::connection::Peer;
use super::registry::{BotUnavailable, SessionRegistry};
use crate::metrics::{
    BOT_CONNECTED, BOT_DELIVERIES_TOTAL, BOT_DROPS_TOTAL, RELAY_FANOUT_DELIVERIES_TOTAL,
    RELAY_MESSAGES_TOTAL, RELAY_REJECTED_TOTAL,
};

/// What happened to one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Status normalized and fanned out.
    StatusBroadcast {
        /// Peers that accepted the frame.
        recipients: usize,
        /// Whether the sender now holds the bot slot.
        registered_bot: bool,
    },
    /// `task_update` relayed verbatim.
    TaskRelayed {
        /// Peers that accepted the frame.
        recipients: usize,
    },
    /// Command frame handed to the bot.
    DeliveredToBot,
    /// Command frame dropped.
    BotUnavailable(BotUnavailable),
    /// Unknown type, dropped.
    Ignored {
        /// The unrecognized tag.
        message_type: String,
    },
    /// Frame failed to decode; an error frame went back to the sender.
    Rejected {
        /// Error code sent to the sender.
        code: &'static str,
    },
}

/// Routes decoded peer messages through the registry.
pub struct MessageRouter {
    registry: Arc<SessionRegistry>,
    notify_bot_missing: bool,
}

impl MessageRouter {
    /// Create a router over `registry`.
    ///
    /// With `notify_bot_missing`, a `send_to_bot` that finds no bot gets a
    /// `BOT_NOT_CONNECTED` error frame back.
    pub fn new(registry: Arc<SessionRegistry>, notify_bot_missing: bool) -> Self {
        Self {
            registry,
            notify_bot_missing,
        }
    }

    /// Route one text frame from `sender`. Runs to completion without awaiting.
    pub fn route(&self, sender: &Peer, text: &str) -> RouteOutcome {
        let message = match ClientMessage::decode(text) {
            Ok(message) => message,
            Err(e) => {
                let code = e.code();
                warn!(peer_id = %sender.id, code, error = %e, "rejected inbound frame");
                counter!(RELAY_REJECTED_TOTAL, "code" => code).increment(1);
                let _ = sender.send_event(&RelayEvent::error(code, e.to_string()));
                return RouteOutcome::Rejected { code };
            }
        };

        counter!(RELAY_MESSAGES_TOTAL, "type" => metric_label(&message)).increment(1);
        debug!(peer_id = %sender.id, message_type = message.message_type(), "routing frame");

        match message {
            ClientMessage::BotStatusUpdate(report) => self.on_bot_status(sender, &report),
            ClientMessage::TaskUpdate(_) => {
                let recipients = self.registry.broadcast_except(&sender.id, text);
                counter!(RELAY_FANOUT_DELIVERIES_TOTAL).increment(recipients as u64);
                debug!(peer_id = %sender.id, recipients, "task update relayed");
                RouteOutcome::TaskRelayed { recipients }
            }
            ClientMessage::SendToBot(request) => self.on_send_to_bot(sender, &request),
            ClientMessage::Unknown { message_type } => {
                debug!(
                    peer_id = %sender.id,
                    message_type = %message_type,
                    "ignoring unknown message type"
                );
                RouteOutcome::Ignored { message_type }
            }
        }
    }

    fn on_bot_status(&self, sender: &Peer, report: &BotStatusReport) -> RouteOutcome {
        let registered_bot =
            report.bot_name().is_some() && self.registry.register_as_bot(&sender.id);
        if registered_bot {
            gauge!(BOT_CONNECTED).set(1.0);
        }

        let event = RelayEvent::status_from(report);
        let recipients = match serde_json::to_string(&event) {
            Ok(frame) => self.registry.broadcast_except(&sender.id, &frame),
            Err(e) => {
                warn!(error = %e, "failed to serialize bot status");
                0
            }
        };
        counter!(RELAY_FANOUT_DELIVERIES_TOTAL).increment(recipients as u64);
        info!(
            peer_id = %sender.id,
            bot = report.bot_name().unwrap_or(clawboard_core::DEFAULT_BOT_NAME),
            status = %report.status,
            recipients,
            "bot status update"
        );
        RouteOutcome::StatusBroadcast {
            recipients,
            registered_bot,
        }
    }

    fn on_send_to_bot(&self, sender: &Peer, request: &SendToBot) -> RouteOutcome {
        let frame = request.to_bot_frame().to_string();
        match self.registry.send_to_bot(&frame) {
            Ok(()) => {
                counter!(BOT_DELIVERIES_TOTAL, "source" => "socket").increment(1);
                debug!(
                    peer_id = %sender.id,
                    command = %request.command,
                    "command forwarded to bot"
                );
                RouteOutcome::DeliveredToBot
            }
            Err(reason) => {
                let label = match reason {
                    BotUnavailable::NotConnected => "not_connected",
                    BotUnavailable::QueueFull => "queue_full",
                };
                counter!(BOT_DROPS_TOTAL, "source" => "socket", "reason" => label).increment(1);
                warn!(
                    peer_id = %sender.id,
                    command = %request.command,
                    %reason,
                    "dropping command for bot"
                );
                if self.notify_bot_missing && reason == BotUnavailable::NotConnected {
                    let _ = sender.send_event(&RelayEvent::error(
                        BOT_NOT_CONNECTED,
                        "Bot nicht verbunden",
                    ));
                }
                RouteOutcome::BotUnavailable(reason)
            }
        }
    }
}

/// Bounded label set: unknown tags collapse to one value.
fn metric_label(message: &ClientMessage) -> &'static str {
    match message {
        ClientMessage::BotStatusUpdate(_) => protocol::BOT_STATUS_UPDATE,
        ClientMessage::TaskUpdate(_) => protocol::TASK_UPDATE,
        ClientMessage::SendToBot(_) => protocol::SEND_TO_BOT,
        ClientMessage::Unknown { .. } => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use clawboard_core::PeerId;
    use serde_json::{Value, json};
    use tokio::sync::mpsc;

    struct Fixture {
        registry: Arc<SessionRegistry>,
        router: MessageRouter,
    }

    impl Fixture {
        fn new(notify_bot_missing: bool) -> Self {
            let registry = Arc::new(SessionRegistry::new());
            let router = MessageRouter::new(registry.clone(), notify_bot_missing);
            Self { registry, router }
        }

        fn connect(&self, id: &str) -> (Arc<Peer>, mpsc::Receiver<Arc<String>>) {
            let (tx, rx) = mpsc::channel(16);
            let peer = Arc::new(Peer::new(PeerId::from(id), tx));
            self.registry.add(peer.clone());
            (peer, rx)
        }
    }

    fn next_json(rx: &mut mpsc::Receiver<Arc<String>>) -> Value {
        let frame = rx.try_recv().expect("expected a frame");
        serde_json::from_str(&frame).unwrap()
    }

    #[test]
    fn status_with_bot_registers_and_fans_out() {
        let fx = Fixture::new(false);
        let (bot, mut bot_rx) = fx.connect("bot");
        let (_ui, mut ui_rx) = fx.connect("ui");

        let outcome = fx.router.route(
            &bot,
            r#"{"type":"bot_status_update","bot":"B","status":"active","timestamp":"t"}"#,
        );
        assert_eq!(
            outcome,
            RouteOutcome::StatusBroadcast {
                recipients: 1,
                registered_bot: true
            }
        );
        assert_eq!(fx.registry.bot_id(), Some(PeerId::from("bot")));
        assert_eq!(
            next_json(&mut ui_rx),
            json!({"type":"bot_status_update","bot":"B","status":"active","timestamp":"t"})
        );
        assert!(bot_rx.try_recv().is_err());
    }

    #[test]
    fn status_without_bot_uses_default_name_and_does_not_register() {
        let fx = Fixture::new(false);
        let (ui, _ui_rx) = fx.connect("ui");
        let (_other, mut other_rx) = fx.connect("other");

        let outcome = fx
            .router
            .route(&ui, r#"{"type":"bot_status_update","status":"working"}"#);
        assert_matches!(
            outcome,
            RouteOutcome::StatusBroadcast {
                registered_bot: false,
                ..
            }
        );
        assert!(fx.registry.bot_id().is_none());
        let frame = next_json(&mut other_rx);
        assert_eq!(frame["bot"], "OpenClaw Bot");
        assert_eq!(frame["status"], "working");
    }

    #[test]
    fn empty_bot_name_does_not_claim_bot_slot() {
        let fx = Fixture::new(false);
        let (bot, _bot_rx) = fx.connect("bot");
        let (ui, _ui_rx) = fx.connect("ui");
        let (_other, mut other_rx) = fx.connect("other");
        let _ = fx.registry.register_as_bot(&bot.id);

        let outcome = fx.router.route(
            &ui,
            r#"{"type":"bot_status_update","bot":"","status":"active","timestamp":"T"}"#,
        );
        assert_eq!(
            outcome,
            RouteOutcome::StatusBroadcast {
                recipients: 2,
                registered_bot: false
            }
        );
        assert_eq!(fx.registry.bot_id(), Some(PeerId::from("bot")));
        assert_eq!(next_json(&mut other_rx)["bot"], "OpenClaw Bot");
    }

    #[test]
    fn task_update_is_relayed_verbatim() {
        let fx = Fixture::new(false);
        let (a, mut a_rx) = fx.connect("a");
        let (_b, mut b_rx) = fx.connect("b");
        let (_c, mut c_rx) = fx.connect("c");

        let raw = r#"{"type":"task_update","taskId":7,"status":"completed","extra":{"k":1}}"#;
        let outcome = fx.router.route(&a, raw);
        assert_eq!(outcome, RouteOutcome::TaskRelayed { recipients: 2 });
        assert_eq!(b_rx.try_recv().unwrap().as_str(), raw);
        assert_eq!(c_rx.try_recv().unwrap().as_str(), raw);
        assert!(a_rx.try_recv().is_err());
    }

    #[test]
    fn send_to_bot_delivers_command_frame() {
        let fx = Fixture::new(false);
        let (bot, mut bot_rx) = fx.connect("bot");
        let (ui, _ui_rx) = fx.connect("ui");
        let _ = fx.registry.register_as_bot(&bot.id);

        let outcome = fx.router.route(
            &ui,
            r#"{"type":"send_to_bot","command":"task_assign","params":{"task":{"id":1},"type":"evil"}}"#,
        );
        assert_eq!(outcome, RouteOutcome::DeliveredToBot);
        assert_eq!(
            next_json(&mut bot_rx),
            json!({"type":"task_assign","task":{"id":1}})
        );
    }

    #[test]
    fn send_to_bot_without_bot_is_dropped_silently() {
        let fx = Fixture::new(false);
        let (ui, mut ui_rx) = fx.connect("ui");

        let outcome = fx
            .router
            .route(&ui, r#"{"type":"send_to_bot","command":"pause"}"#);
        assert_eq!(
            outcome,
            RouteOutcome::BotUnavailable(BotUnavailable::NotConnected)
        );
        assert!(ui_rx.try_recv().is_err());
    }

    #[test]
    fn send_to_bot_without_bot_notifies_when_enabled() {
        let fx = Fixture::new(true);
        let (ui, mut ui_rx) = fx.connect("ui");

        let _ = fx
            .router
            .route(&ui, r#"{"type":"send_to_bot","command":"pause"}"#);
        let frame = next_json(&mut ui_rx);
        assert_eq!(frame["type"], "error");
        assert_eq!(frame["code"], "BOT_NOT_CONNECTED");
    }

    #[test]
    fn malformed_json_is_rejected_with_error_frame() {
        let fx = Fixture::new(false);
        let (ui, mut ui_rx) = fx.connect("ui");
        let (_other, mut other_rx) = fx.connect("other");

        let outcome = fx.router.route(&ui, "{not json");
        assert_eq!(outcome, RouteOutcome::Rejected { code: "INVALID_JSON" });
        let frame = next_json(&mut ui_rx);
        assert_eq!(frame["type"], "error");
        assert_eq!(frame["code"], "INVALID_JSON");
        assert!(other_rx.try_recv().is_err());
    }

    #[test]
    fn missing_type_is_rejected() {
        let fx = Fixture::new(false);
        let (ui, _ui_rx) = fx.connect("ui");
        assert_eq!(
            fx.router.route(&ui, r#"{"status":"x"}"#),
            RouteOutcome::Rejected {
                code: "INVALID_MESSAGE"
            }
        );
    }

    #[test]
    fn wrong_shape_is_rejected() {
        let fx = Fixture::new(false);
        let (ui, _ui_rx) = fx.connect("ui");
        assert_eq!(
            fx.router.route(&ui, r#"{"type":"send_to_bot","command":42}"#),
            RouteOutcome::Rejected {
                code: "INVALID_PAYLOAD"
            }
        );
    }

    #[test]
    fn unknown_type_is_ignored() {
        let fx = Fixture::new(false);
        let (ui, mut ui_rx) = fx.connect("ui");
        let (_other, mut other_rx) = fx.connect("other");

        let outcome = fx.router.route(&ui, r#"{"type":"mystery","x":1}"#);
        assert_eq!(
            outcome,
            RouteOutcome::Ignored {
                message_type: "mystery".into()
            }
        );
        assert!(ui_rx.try_recv().is_err());
        assert!(other_rx.try_recv().is_err());
    }
}
