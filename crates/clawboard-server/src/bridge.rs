//! HTTP command bridge: forwards dashboard commands to the bot.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use clawboard_core::protocol::bot_command_frame;
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::metrics::{BOT_DELIVERIES_TOTAL, BOT_DROPS_TOTAL};
use crate::server::AppState;
use crate::websocket::registry::{BotUnavailable, SessionRegistry};

/// Success message for a forwarded command.
pub const COMMAND_SENT: &str = "Befehl an Bot gesendet";

/// `POST /api/bot/command` body.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    /// Becomes the `type` of the frame sent to the bot.
    pub command: String,
    /// Merged into the frame.
    #[serde(default)]
    pub params: Option<Map<String, Value>>,
}

/// `POST /api/bot/command` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Whether the command reached the bot's transport.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
}

/// `GET /api/bot/status` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BotStatusResponse {
    /// Whether an open bot is registered.
    pub connected: bool,
    /// `"online"` or `"offline"`.
    pub status: &'static str,
}

/// Command bridge failures.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No bot, or the bot's socket has closed.
    #[error("Bot nicht verbunden")]
    BotNotConnected,
    /// The bot's outbound queue is full.
    #[error("Bot-Warteschlange voll")]
    BotBusy,
    /// Request body could not be used.
    #[error("{0}")]
    InvalidRequest(String),
}

impl BridgeError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BotNotConnected | Self::BotBusy => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<BotUnavailable> for BridgeError {
    fn from(reason: BotUnavailable) -> Self {
        match reason {
            BotUnavailable::NotConnected => Self::BotNotConnected,
            BotUnavailable::QueueFull => Self::BotBusy,
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let body = CommandResponse {
            success: false,
            message: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Validate a command and hand it to the bot.
pub fn forward_command(
    registry: &SessionRegistry,
    request: &CommandRequest,
) -> Result<(), BridgeError> {
    if request.command.trim().is_empty() {
        return Err(BridgeError::InvalidRequest("command must not be empty".into()));
    }
    let frame = bot_command_frame(&request.command, request.params.as_ref()).to_string();
    registry.send_to_bot(&frame).map_err(BridgeError::from)
}

/// `POST /api/bot/command`
pub async fn send_command(
    State(state): State<AppState>,
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Json<CommandResponse>, BridgeError> {
    let Json(request) = payload.map_err(|e| BridgeError::InvalidRequest(e.body_text()))?;

    match forward_command(&state.registry, &request) {
        Ok(()) => {
            counter!(BOT_DELIVERIES_TOTAL, "source" => "http").increment(1);
            info!(command = %request.command, "command forwarded to bot");
            Ok(Json(CommandResponse {
                success: true,
                message: COMMAND_SENT.into(),
            }))
        }
        Err(e) => {
            if !matches!(e, BridgeError::InvalidRequest(_)) {
                counter!(BOT_DROPS_TOTAL, "source" => "http", "reason" => "unavailable")
                    .increment(1);
            }
            warn!(command = %request.command, error = %e, "bot command rejected");
            Err(e)
        }
    }
}

/// `GET /api/bot/status`
pub async fn bot_status(State(state): State<AppState>) -> Json<BotStatusResponse> {
    let connected = state.registry.bot_connected();
    Json(BotStatusResponse {
        connected,
        status: if connected { "online" } else { "offline" },
    })
}
