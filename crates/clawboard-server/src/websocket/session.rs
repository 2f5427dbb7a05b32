//! Socket session lifecycle: one peer from upgrade through disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use clawboard_core::PeerId;
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use super::connection::Peer;
use crate::metrics::{
    BOT_CONNECTED, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_CONNECTION_DURATION_SECONDS,
    WS_DISCONNECTIONS_TOTAL,
};
use crate::server::AppState;

/// Run a session for a freshly upgraded socket.
///
/// 1. Registers the peer
/// 2. Forwards queued frames and sends periodic pings from a writer task
/// 3. Routes each inbound text frame to completion before reading the next
/// 4. Removes the peer (and clears the bot slot if it held it) on exit
#[instrument(skip_all, fields(peer_id = %peer_id))]
pub async fn run_peer_session(ws: WebSocket, peer_id: PeerId, state: AppState) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(state.config.send_queue_size.max(1));
    let peer = Arc::new(Peer::new(peer_id.clone(), send_tx));
    state.registry.add(peer.clone());

    let started = Instant::now();
    info!(connections = state.registry.connection_count(), "peer connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let ping_every = Duration::from_secs(state.config.heartbeat_interval_secs.max(1));
    let pong_timeout = Duration::from_secs(state.config.heartbeat_timeout_secs);
    let shutdown = state.shutdown.token();

    let writer_peer = peer.clone();
    let mut outbound = tokio::spawn(async move {
        let mut ping = tokio::time::interval(ping_every);
        let _ = ping.tick().await;

        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    let Some(frame) = frame else { break };
                    if ws_tx.send(Message::Text(frame.as_str().to_owned().into())).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if !writer_peer.check_alive()
                        && writer_peer.last_pong_elapsed() > pong_timeout
                    {
                        warn!(timeout = ?pong_timeout, "peer unresponsive, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                () = shutdown.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
        writer_peer.close();
    });

    loop {
        let frame = tokio::select! {
            frame = ws_rx.next() => frame,
            _ = &mut outbound => {
                debug!("writer finished");
                break;
            }
        };
        let Some(Ok(msg)) = frame else { break };

        let text = match msg {
            Message::Text(t) => t.as_str().to_owned(),
            Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                Ok(s) => s,
                Err(_) => {
                    debug!(len = data.len(), "ignoring non-UTF8 binary frame");
                    continue;
                }
            },
            Message::Close(_) => {
                debug!("peer sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                peer.mark_alive();
                continue;
            }
        };

        peer.mark_alive();
        let outcome = state.router.route(&peer, &text);
        debug!(?outcome, "frame routed");
    }

    peer.close();
    outbound.abort();
    let was_bot = state.registry.bot_id().as_ref() == Some(&peer_id);
    let _ = state.registry.remove(&peer_id);
    if was_bot {
        gauge!(BOT_CONNECTED).set(0.0);
    }

    info!(
        connections = state.registry.connection_count(),
        dropped = peer.drop_count(),
        age_secs = peer.age().as_secs(),
        "peer disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
}
