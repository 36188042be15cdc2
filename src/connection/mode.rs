//! Protocol mode of a connection.

/// Which protocol a connection is currently speaking.
///
/// A connection starts out waiting for an HTTP request head and moves to
/// `WebSocketEstablished` after a successful upgrade. There is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// Buffering bytes until a complete HTTP request head arrives.
    #[default]
    AwaitingHttpHead,
    /// Upgrade completed; incoming bytes are WebSocket frames.
    WebSocketEstablished,
}

impl Mode {
    #[must_use]
    #[inline]
    pub const fn is_websocket(&self) -> bool {
        matches!(self, Mode::WebSocketEstablished)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::AwaitingHttpHead => write!(f, "AwaitingHttpHead"),
            Mode::WebSocketEstablished => write!(f, "WebSocketEstablished"),
        }
    }
}
