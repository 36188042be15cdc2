//! Error types for the upgrade server.
//!
//! Every variant is local to a single connection: the reactor closes the
//! offending connection and keeps serving the rest.

use thiserror::Error;

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving a connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Request line is not `METHOD SP TARGET SP VERSION`.
    #[error("Malformed request line: {0}")]
    MalformedRequestLine(String),

    /// Header line without the `": "` separator.
    #[error("Malformed header line: {0}")]
    MalformedHeaderLine(String),

    /// Header block is not valid UTF-8.
    #[error("Invalid UTF-8 in request head")]
    InvalidUtf8,

    /// Request head grew past the configured maximum without a terminator.
    #[error("Request head too large: {size} bytes (max: {max})")]
    HeadTooLarge {
        /// Bytes buffered so far.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Request to the WebSocket route that is not a well-formed upgrade.
    #[error("Invalid upgrade request: {0}")]
    InvalidUpgradeRequest(String),

    /// Peer closed its end of the connection.
    #[error("Peer closed the connection")]
    PeerClosed,

    /// Incomplete frame data.
    #[error("Incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },

    /// Invalid frame structure.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Reserved bits set without extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Unmasked client frame.
    #[error("Client frame must be masked")]
    UnmaskedClientFrame,

    /// Control frame fragmented.
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Frame payload exceeds configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Declared payload length.
        size: u64,
        /// Maximum allowed size.
        max: usize,
    },

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Whether this is the normal end-of-stream signal rather than a failure.
    #[must_use]
    pub const fn is_peer_closed(&self) -> bool {
        matches!(self, Error::PeerClosed)
    }

    /// Whether the peer should be told `400 Bad Request` before closing.
    ///
    /// Only meaningful while the connection is still speaking HTTP.
    #[must_use]
    pub const fn warrants_bad_request(&self) -> bool {
        matches!(
            self,
            Error::MalformedRequestLine(_)
                | Error::MalformedHeaderLine(_)
                | Error::InvalidUtf8
                | Error::HeadTooLarge { .. }
                | Error::InvalidUpgradeRequest(_)
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::HeadTooLarge {
            size: 9000,
            max: 8192,
        };
        assert_eq!(err.to_string(), "Request head too large: 9000 bytes (max: 8192)");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_peer_closed_is_not_bad_request() {
        assert!(Error::PeerClosed.is_peer_closed());
        assert!(!Error::PeerClosed.warrants_bad_request());
    }

    #[test]
    fn test_http_errors_warrant_bad_request() {
        assert!(Error::MalformedRequestLine("GET /".into()).warrants_bad_request());
        assert!(Error::MalformedHeaderLine("Host".into()).warrants_bad_request());
        assert!(Error::InvalidUtf8.warrants_bad_request());
        assert!(Error::InvalidUpgradeRequest("missing key".into()).warrants_bad_request());
        assert!(!Error::ReservedBitsSet.warrants_bad_request());
        assert!(!Error::IncompleteFrame { needed: 2 }.warrants_bad_request());
    }
}
