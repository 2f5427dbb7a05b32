//! Bot session states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// State the bot reports in its `bot_status_update` frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotState {
    /// Not connected to the relay.
    #[default]
    Inactive,
    /// Connected and idle.
    Active,
    /// Running an assigned task.
    Working,
    /// Absorbing a context update.
    Processing,
    /// Paused by command; still connected.
    Paused,
    /// A transport error or task failure occurred.
    Error,
}

impl BotState {
    /// Wire name of the state.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Working => "working",
            Self::Processing => "processing",
            Self::Paused => "paused",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for BotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
