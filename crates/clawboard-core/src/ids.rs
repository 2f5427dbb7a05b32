//! Peer identifiers.
//!
//! A socket connection has no natural identity on the wire, so the relay
//! assigns each accepted connection a time-ordered [`PeerId`].

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one connected socket peer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Generate a fresh `peer_<uuid v7>` identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(format!("peer_{}", Uuid::now_v7()))
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
