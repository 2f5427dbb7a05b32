//! Protocol decode errors.

use thiserror::Error;

/// Frame was not valid JSON.
pub const INVALID_JSON: &str = "INVALID_JSON";
/// Frame was JSON but not an object with a string `type`.
pub const INVALID_MESSAGE: &str = "INVALID_MESSAGE";
/// A known message type had fields of the wrong shape.
pub const INVALID_PAYLOAD: &str = "INVALID_PAYLOAD";
/// `send_to_bot` was issued while no bot is connected.
pub const BOT_NOT_CONNECTED: &str = "BOT_NOT_CONNECTED";

/// Failure to decode an inbound frame into a typed message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not parseable JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// The frame is JSON but has no usable `type` tag.
    #[error("{0}")]
    InvalidMessage(String),

    /// The `type` tag is known but the payload does not match its shape.
    #[error("invalid {message_type} payload: {source}")]
    InvalidPayload {
        /// The declared message type.
        message_type: String,
        /// Underlying decode failure.
        #[source]
        source: serde_json::Error,
    },
}

impl ProtocolError {
    /// Stable machine-readable code for error frames.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => INVALID_JSON,
            Self::InvalidMessage(_) => INVALID_MESSAGE,
            Self::InvalidPayload { .. } => INVALID_PAYLOAD,
        }
    }
}
