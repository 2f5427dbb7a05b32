//! A connected socket peer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use clawboard_core::PeerId;
use clawboard_core::protocol::RelayEvent;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::warn;

/// One open bidirectional connection, as seen by the registry.
///
/// Frames are handed to the peer's write task through a bounded channel.
/// Nothing here blocks: a full or closed channel drops the frame.
pub struct Peer {
    /// Registry key.
    pub id: PeerId,
    /// Send channel to the peer's `WebSocket` write task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Cleared once the session ends.
    open: AtomicBool,
    /// Whether the peer has shown activity since the last ping check.
    is_alive: AtomicBool,
    /// When the last pong (or any inbound frame) was received.
    last_pong: Mutex<Instant>,
    /// Count of frames dropped due to a full or closed channel.
    dropped_messages: AtomicU64,
}

impl Peer {
    /// Create a new open peer.
    pub fn new(id: PeerId, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            connected_at: now,
            open: AtomicBool::new(true),
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Whether frames can still be delivered to this peer.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    /// Mark the peer closed. Further sends are refused.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Hand a text frame to the write task.
    ///
    /// Returns `false` if the peer is closed or its queue is full.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if !self.is_open() {
            return false;
        }
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize a relay event and send it.
    pub fn send_event(&self, event: &RelayEvent) -> bool {
        match serde_json::to_string(event) {
            Ok(json) => self.send(Arc::new(json)),
            Err(e) => {
                warn!(peer_id = %self.id, error = %e, "failed to serialize relay event");
                false
            }
        }
    }

    /// Total frames dropped for this peer.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record activity (pong or inbound frame).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Check and reset the alive flag for the ping loop.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Duration since the last recorded activity.
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id)
            .field("open", &self.is_open())
            .field("dropped", &self.drop_count())
            .finish_non_exhaustive()
    }
}
