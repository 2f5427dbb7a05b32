//! Peer connections, the session registry, message routing, and the
//! per-connection session loop.

pub mod connection;
pub mod registry;
pub mod router;
pub mod session;
