//! # clawboard-server
//!
//! Axum HTTP + `WebSocket` relay for the Clawboard dashboard.
//!
//! - `WebSocket` gateway: peer registry with a single bot slot, typed
//!   message routing, fan-out to every peer but the sender
//! - Command bridge: `POST /api/bot/command`, `GET /api/bot/status`
//! - Liveness: `/health`, `/ready`, Prometheus `/metrics`
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod bridge;
pub mod config;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;
