//! Per-socket connection state.
//!
//! A [`Connection`] owns its stream, an append-only receive buffer and its
//! protocol [`Mode`]. It is driven by the reactor: one read per readiness
//! event, then [`Connection::process`] turns the buffered bytes into either
//! an HTTP response, an upgrade, or decoded frames.

mod mode;

#[allow(clippy::module_inception)]
mod connection;

pub use connection::{Connection, ConnectionId, Disposition};
pub use mode::Mode;
