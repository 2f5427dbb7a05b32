//! Session registry: connected peers plus the single bot slot.

use std::collections::HashMap;
use std::sync::Arc;

use clawboard_core::PeerId;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info};

use super::connection::Peer;

/// Why a frame could not be handed to the bot.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BotUnavailable {
    /// No bot registered, or the registered peer is no longer open.
    #[error("bot not connected")]
    NotConnected,
    /// The bot's outbound queue is full.
    #[error("bot send queue full")]
    QueueFull,
}

#[derive(Default)]
struct Inner {
    peers: HashMap<PeerId, Arc<Peer>>,
    bot: Option<PeerId>,
}

/// Connected peers and the designated bot.
///
/// The peer table and the bot slot share one lock, so the bot slot always
/// names a peer present in the table.
#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<Inner>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new peer.
    pub fn add(&self, peer: Arc<Peer>) {
        let id = peer.id.clone();
        let _ = self.inner.write().peers.insert(id, peer);
    }

    /// Remove a peer, clearing the bot slot if it was the bot.
    pub fn remove(&self, peer_id: &PeerId) -> Option<Arc<Peer>> {
        let mut inner = self.inner.write();
        let removed = inner.peers.remove(peer_id);
        if Self::clear_bot_locked(&mut inner, peer_id) {
            info!(peer_id = %peer_id, "bot disconnected");
        }
        if let Some(peer) = &removed {
            peer.close();
        }
        removed
    }

    /// Designate `peer_id` as the bot. Last writer wins.
    ///
    /// Returns `false` if the peer is not registered.
    pub fn register_as_bot(&self, peer_id: &PeerId) -> bool {
        let mut inner = self.inner.write();
        if !inner.peers.contains_key(peer_id) {
            debug!(peer_id = %peer_id, "ignoring bot registration for unknown peer");
            return false;
        }
        match inner.bot.replace(peer_id.clone()) {
            Some(previous) if &previous == peer_id => {}
            Some(previous) => {
                info!(peer_id = %peer_id, previous = %previous, "bot slot taken over");
            }
            None => info!(peer_id = %peer_id, "bot registered"),
        }
        true
    }

    /// Clear the bot slot only if `peer_id` holds it.
    pub fn clear_bot_if_matches(&self, peer_id: &PeerId) -> bool {
        Self::clear_bot_locked(&mut self.inner.write(), peer_id)
    }

    fn clear_bot_locked(inner: &mut Inner, peer_id: &PeerId) -> bool {
        if inner.bot.as_ref() == Some(peer_id) {
            inner.bot = None;
            true
        } else {
            false
        }
    }

    /// The current bot, if set and still open.
    pub fn bot(&self) -> Option<Arc<Peer>> {
        let inner = self.inner.read();
        inner
            .bot
            .as_ref()
            .and_then(|id| inner.peers.get(id))
            .filter(|peer| peer.is_open())
            .cloned()
    }

    /// Id held in the bot slot, regardless of whether the peer is open.
    pub fn bot_id(&self) -> Option<PeerId> {
        self.inner.read().bot.clone()
    }

    /// Whether an open bot is connected.
    pub fn bot_connected(&self) -> bool {
        self.bot().is_some()
    }

    /// Hand `frame` to every open peer except `sender`.
    ///
    /// Returns how many peers accepted the frame.
    pub fn broadcast_except(&self, sender: &PeerId, frame: &str) -> usize {
        let frame = Arc::new(frame.to_owned());
        let inner = self.inner.read();
        inner
            .peers
            .values()
            .filter(|peer| &peer.id != sender)
            .filter(|peer| peer.send(Arc::clone(&frame)))
            .count()
    }

    /// Hand `frame` to the current bot.
    pub fn send_to_bot(&self, frame: &str) -> Result<(), BotUnavailable> {
        let bot = self.bot().ok_or(BotUnavailable::NotConnected)?;
        if bot.send(Arc::new(frame.to_owned())) {
            Ok(())
        } else if bot.is_open() {
            Err(BotUnavailable::QueueFull)
        } else {
            Err(BotUnavailable::NotConnected)
        }
    }

    /// Number of registered peers.
    pub fn connection_count(&self) -> usize {
        self.inner.read().peers.len()
    }
}
