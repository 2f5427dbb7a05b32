//! Bot client errors.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Failures on the relay connection.
#[derive(Debug, Error)]
pub enum BotError {
    /// Connect or handshake failed.
    #[error("failed to connect to {url}: {source}")]
    Connect {
        /// Target URL.
        url: String,
        /// Underlying error.
        #[source]
        source: tungstenite::Error,
    },

    /// Reading or writing an established connection failed.
    #[error("transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    /// An outbound frame could not be encoded.
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}
