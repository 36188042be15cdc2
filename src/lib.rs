//! # wsloop - WebSocket upgrade server on a single readiness loop
//!
//! `wsloop` accepts TCP connections, multiplexes them on one thread with
//! readiness polling, answers plain HTTP/1.1 requests with a static page, and
//! upgrades requests for the WebSocket route per RFC 6455. Frames sent by
//! clients on upgraded connections are decoded and handed to a
//! [`FrameHandler`].
//!
//! ## Layers
//!
//! - [`protocol`] - pure parsing: HTTP request heads, the upgrade handshake,
//!   frame headers, masking and incremental frame decoding
//! - [`connection`] - per-socket buffer and protocol mode
//! - [`reactor`] - the `mio` event loop that owns every connection
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wsloop::{Config, LogHandler, Reactor};
//!
//! let mut reactor = Reactor::bind(Config::default(), LogHandler)?;
//! reactor.run()?;
//! # Ok::<(), wsloop::Error>(())
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod reactor;

pub use config::{Config, Limits};
pub use connection::{Connection, ConnectionId, Disposition, Mode};
pub use error::{Error, Result};
pub use handler::{FrameHandler, LogHandler};
pub use protocol::{
    Frame, FrameDecoder, HandshakeContext, HeadStatus, HttpRequest, HttpVersion, OpCode, WS_GUID,
    build_handshake_response, derive_accept_value, is_valid_upgrade, parse_head,
};
pub use reactor::Reactor;
