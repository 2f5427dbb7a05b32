//! Relay wire protocol.
//!
//! Every frame on the relay socket is a JSON object tagged by a string `type`.
//! Frames are decoded once at the boundary into the typed unions below:
//!
//! - [`ClientMessage`]: what peers send to the relay
//! - [`RelayEvent`]: what the relay itself emits to peers
//! - [`BotInbound`]: what the bot understands
//! - [`BotOutbound`]: what the bot reports
//!
//! Unknown `type` tags decode to an `Unknown` variant so callers can log and
//! drop them; malformed frames surface as [`ProtocolError`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ProtocolError;
use crate::status::BotState;
use crate::DEFAULT_BOT_NAME;

/// Bot status report / broadcast.
pub const BOT_STATUS_UPDATE: &str = "bot_status_update";
/// Task progress, re-broadcast verbatim.
pub const TASK_UPDATE: &str = "task_update";
/// Request to forward a command to the bot.
pub const SEND_TO_BOT: &str = "send_to_bot";
/// Task handed to the bot.
pub const TASK_ASSIGN: &str = "task_assign";
/// Context file update handed to the bot.
pub const CONTEXT_UPDATE: &str = "context_update";
/// Control command for the bot.
pub const BOT_COMMAND: &str = "bot_command";
/// Ask the bot to report its status.
pub const STATUS_REQUEST: &str = "status_request";
/// Error frame sent back to a peer.
pub const ERROR: &str = "error";

/// Split a raw frame into its `type` tag and the full object.
fn split_frame(text: &str) -> Result<(String, Map<String, Value>), ProtocolError> {
    let value: Value = serde_json::from_str(text).map_err(ProtocolError::InvalidJson)?;
    let Value::Object(object) = value else {
        return Err(ProtocolError::InvalidMessage(
            "message must be a JSON object".into(),
        ));
    };
    let message_type = match object.get("type") {
        Some(Value::String(t)) => t.clone(),
        Some(_) => {
            return Err(ProtocolError::InvalidMessage(
                "message type must be a string".into(),
            ));
        }
        None => {
            return Err(ProtocolError::InvalidMessage(
                "message is missing a type".into(),
            ));
        }
    };
    Ok((message_type, object))
}

fn decode_payload<T: for<'de> Deserialize<'de>>(
    message_type: &str,
    object: Map<String, Value>,
) -> Result<T, ProtocolError> {
    serde_json::from_value(Value::Object(object)).map_err(|source| ProtocolError::InvalidPayload {
        message_type: message_type.to_owned(),
        source,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Peer → relay
// ─────────────────────────────────────────────────────────────────────────────

/// A `bot_status_update` as reported by a peer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotStatusReport {
    /// Bot name. A non-empty name marks the sender as the bot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot: Option<String>,
    /// Reported state.
    pub status: String,
    /// Sender-side timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl BotStatusReport {
    /// The reported bot name, with an empty string treated as absent.
    pub fn bot_name(&self) -> Option<&str> {
        self.bot.as_deref().filter(|name| !name.is_empty())
    }
}

/// A `send_to_bot` request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SendToBot {
    /// Becomes the `type` of the frame delivered to the bot.
    pub command: String,
    /// Extra fields merged into the delivered frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
}

impl SendToBot {
    /// Build the frame delivered to the bot.
    pub fn to_bot_frame(&self) -> Value {
        bot_command_frame(&self.command, self.params.as_ref())
    }
}

/// Messages a peer sends to the relay.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientMessage {
    /// Status report; registers the sender as bot when `bot` is set.
    BotStatusUpdate(BotStatusReport),
    /// Task progress. Kept as the raw object so it can be relayed verbatim.
    TaskUpdate(Map<String, Value>),
    /// Command to forward to the bot.
    SendToBot(SendToBot),
    /// Any other `type`; the relay logs and drops it.
    Unknown {
        /// The unrecognized tag.
        message_type: String,
    },
}

impl ClientMessage {
    /// Decode one text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let (message_type, object) = split_frame(text)?;
        match message_type.as_str() {
            BOT_STATUS_UPDATE => decode_payload(&message_type, object).map(Self::BotStatusUpdate),
            TASK_UPDATE => Ok(Self::TaskUpdate(object)),
            SEND_TO_BOT => decode_payload(&message_type, object).map(Self::SendToBot),
            _ => Ok(Self::Unknown { message_type }),
        }
    }

    /// The message's `type` tag.
    pub fn message_type(&self) -> &str {
        match self {
            Self::BotStatusUpdate(_) => BOT_STATUS_UPDATE,
            Self::TaskUpdate(_) => TASK_UPDATE,
            Self::SendToBot(_) => SEND_TO_BOT,
            Self::Unknown { message_type } => message_type,
        }
    }
}

/// Build `{type: command, ...params}`.
///
/// `type` is always `command`, even when `params` carries its own `type` key.
pub fn bot_command_frame(command: &str, params: Option<&Map<String, Value>>) -> Value {
    let mut frame = params.cloned().unwrap_or_default();
    let _ = frame.insert("type".into(), Value::String(command.to_owned()));
    Value::Object(frame)
}

// ─────────────────────────────────────────────────────────────────────────────
// Relay → peers
// ─────────────────────────────────────────────────────────────────────────────

/// Frames the relay emits on its own behalf.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    /// Normalized bot status, fanned out to every peer but the reporter.
    BotStatusUpdate {
        /// Bot name (defaults to [`DEFAULT_BOT_NAME`]).
        bot: String,
        /// Reported state.
        status: String,
        /// Reporter's timestamp, passed through.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
    /// A frame from this peer was rejected.
    Error {
        /// Machine-readable code.
        code: String,
        /// Human-readable reason.
        message: String,
    },
}

impl RelayEvent {
    /// Normalize a peer's status report for fan-out.
    pub fn status_from(report: &BotStatusReport) -> Self {
        Self::BotStatusUpdate {
            bot: report.bot_name().unwrap_or(DEFAULT_BOT_NAME).to_owned(),
            status: report.status.clone(),
            timestamp: report.timestamp.clone(),
        }
    }

    /// Build an error frame.
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_owned(),
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Relay → bot
// ─────────────────────────────────────────────────────────────────────────────

/// Task payload inside a `task_assign` frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskAssignment {
    /// Task identifier as issued by the dashboard (string or number).
    #[serde(default)]
    pub id: Value,
    /// Task title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Remaining task fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Context payload inside a `context_update` frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContextPayload {
    /// Name of the updated context file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Remaining context fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Control command for the bot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotCommand {
    /// Requested action; see [`BotAction`].
    pub action: String,
}

impl BotCommand {
    /// Command with the given action.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
        }
    }

    /// The recognized action, if any.
    pub fn kind(&self) -> Option<BotAction> {
        BotAction::parse(&self.action)
    }
}

/// Actions the bot understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BotAction {
    /// Close the connection and reconnect.
    Restart,
    /// Enter the paused state.
    Pause,
    /// Leave the paused state.
    Resume,
}

impl BotAction {
    /// Parse a wire action name.
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "restart" => Some(Self::Restart),
            "pause" => Some(Self::Pause),
            "resume" => Some(Self::Resume),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct TaskAssignFrame {
    task: TaskAssignment,
}

#[derive(Deserialize)]
struct ContextUpdateFrame {
    context: ContextPayload,
}

#[derive(Deserialize)]
struct BotCommandFrame {
    command: BotCommand,
}

/// Messages the bot acts on.
#[derive(Clone, Debug, PartialEq)]
pub enum BotInbound {
    /// Run a task.
    TaskAssign(TaskAssignment),
    /// Absorb a context update.
    ContextUpdate(ContextPayload),
    /// Control command, from `bot_command` or a bare `restart`/`pause`/`resume` frame.
    Command(BotCommand),
    /// Report status now.
    StatusRequest,
    /// Any other `type`.
    Unknown {
        /// The unrecognized tag.
        message_type: String,
    },
}

impl BotInbound {
    /// Decode one text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let (message_type, object) = split_frame(text)?;
        match message_type.as_str() {
            TASK_ASSIGN => decode_payload::<TaskAssignFrame>(&message_type, object)
                .map(|f| Self::TaskAssign(f.task)),
            CONTEXT_UPDATE => decode_payload::<ContextUpdateFrame>(&message_type, object)
                .map(|f| Self::ContextUpdate(f.context)),
            BOT_COMMAND => decode_payload::<BotCommandFrame>(&message_type, object)
                .map(|f| Self::Command(f.command)),
            STATUS_REQUEST => Ok(Self::StatusRequest),
            t if BotAction::parse(t).is_some() => Ok(Self::Command(BotCommand::new(t))),
            _ => Ok(Self::Unknown { message_type }),
        }
    }

    /// The message's `type` tag.
    pub fn message_type(&self) -> &str {
        match self {
            Self::TaskAssign(_) => TASK_ASSIGN,
            Self::ContextUpdate(_) => CONTEXT_UPDATE,
            Self::Command(_) => BOT_COMMAND,
            Self::StatusRequest => STATUS_REQUEST,
            Self::Unknown { message_type } => message_type,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bot → relay
// ─────────────────────────────────────────────────────────────────────────────

/// Final outcome of a task, as acknowledged by the bot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskResult {
    /// Task finished.
    Completed,
    /// Task failed; see the ack's `error`.
    Failed,
}

/// Frames the bot sends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BotOutbound {
    /// Current state.
    BotStatusUpdate {
        /// Bot name.
        bot: String,
        /// Current state.
        status: BotState,
        /// Emission time.
        timestamp: String,
    },
    /// Task acknowledgment.
    TaskUpdate {
        /// Echoed task id; omitted when the task had none.
        #[serde(rename = "taskId", default, skip_serializing_if = "Value::is_null")]
        task_id: Value,
        /// Outcome.
        status: TaskResult,
        /// Failure detail.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        /// Bot name.
        bot: String,
        /// Emission time.
        timestamp: String,
    },
}
