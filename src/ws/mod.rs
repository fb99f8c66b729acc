//! WebSocket transport: upgrade handling, wire protocol, per-connection sessions

pub mod handler;
pub mod protocol;
pub mod session;
