//! Where decoded frames go.
//!
//! The reactor reports connection lifecycle and every decoded frame to a
//! [`FrameHandler`]. Only `on_frame` is required; closures of the shape
//! `FnMut(ConnectionId, &Frame)` are handlers too.

use std::net::SocketAddr;

use tracing::info;

use crate::connection::ConnectionId;
use crate::protocol::{Frame, HttpRequest, OpCode};

/// Receives the observable output of the server.
pub trait FrameHandler {
    /// A frame arrived on an upgraded connection.
    fn on_frame(&mut self, conn: ConnectionId, frame: &Frame);

    /// A connection was accepted.
    fn on_open(&mut self, _conn: ConnectionId, _peer: SocketAddr) {}

    /// A connection completed the WebSocket handshake.
    fn on_upgrade(&mut self, _conn: ConnectionId, _request: &HttpRequest) {}

    /// A connection was closed and removed from the live set.
    fn on_close(&mut self, _conn: ConnectionId) {}
}

impl<F> FrameHandler for F
where
    F: FnMut(ConnectionId, &Frame),
{
    fn on_frame(&mut self, conn: ConnectionId, frame: &Frame) {
        self(conn, frame)
    }
}

/// Logs every received frame. Used by the `wsloop` binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogHandler;

impl FrameHandler for LogHandler {
    fn on_frame(&mut self, conn: ConnectionId, frame: &Frame) {
        match frame.opcode {
            OpCode::Text => {
                let text = String::from_utf8_lossy(frame.payload());
                info!(conn = %conn, fin = frame.fin, "received message: {text}");
            }
            opcode => info!(
                conn = %conn,
                fin = frame.fin,
                %opcode,
                len = frame.payload_len(),
                "received frame"
            ),
        }
    }
}
