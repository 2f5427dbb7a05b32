//! # clawboard-core
//!
//! Shared vocabulary for the Clawboard relay server and the bot client:
//!
//! - **IDs**: [`PeerId`] newtype for connected socket peers
//! - **Protocol**: typed frames for every message on the relay socket
//! - **Bot state**: the [`BotState`] machine states reported in status updates
//! - **Errors**: [`ProtocolError`] with stable wire codes
//! - **Logging**: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod logging;
pub mod protocol;
pub mod status;

pub use errors::ProtocolError;
pub use ids::PeerId;
pub use status::BotState;

/// Bot name used when a status update does not carry one.
pub const DEFAULT_BOT_NAME: &str = "OpenClaw Bot";

/// Current time as an RFC 3339 UTC string with millisecond precision.
///
/// Matches the `2026-01-01T00:00:00.000Z` shape the dashboard expects.
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
