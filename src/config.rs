//! Configuration and limits for the upgrade server.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

/// Port the server listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 5010;

/// The single route that is eligible for a WebSocket upgrade.
pub const DEFAULT_WEBSOCKET_PATH: &str = "/websocket";

/// Body returned to plain HTTP requests.
pub const DEFAULT_BODY: &[u8] = b"<HTML><HEAD><meta http-equiv=\"content-type\" content=\"text/html;charset=utf-8\">\r\n\
<TITLE>200 OK</TITLE></HEAD><BODY>\r\n\
<H1>200 OK</H1>\r\n\
Welcome to the default.\r\n\
</BODY></HTML>\r\n\r\n";

/// Resource limits for a single connection.
///
/// These keep a misbehaving peer from making the reactor buffer without bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum size of the HTTP request head in bytes.
    ///
    /// Default: 8 KB (8192)
    pub max_head_size: usize,

    /// Maximum payload size of a single frame in bytes.
    ///
    /// Default: 16 MB (16 * 1024 * 1024)
    pub max_frame_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_head_size: 8192,
            max_frame_size: 16 * 1024 * 1024, // 16 MB
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    #[must_use]
    pub const fn new(max_head_size: usize, max_frame_size: usize) -> Self {
        Self {
            max_head_size,
            max_frame_size,
        }
    }

    /// Create limits suitable for small embedded systems.
    ///
    /// - Max head: 4 KB
    /// - Max frame: 64 KB
    #[must_use]
    pub const fn embedded() -> Self {
        Self {
            max_head_size: 4096,
            max_frame_size: 64 * 1024,
        }
    }

    /// Validate that a buffered request head is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HeadTooLarge`](crate::Error::HeadTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_head_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_head_size {
            Err(crate::Error::HeadTooLarge {
                size,
                max: self.max_head_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a declared frame payload length is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`](crate::Error::FrameTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_frame_size(&self, size: u64) -> Result<(), crate::Error> {
        if size > self.max_frame_size as u64 {
            Err(crate::Error::FrameTooLarge {
                size,
                max: self.max_frame_size,
            })
        } else {
            Ok(())
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the listening socket binds to.
    ///
    /// Default: 127.0.0.1:5010
    pub bind_addr: SocketAddr,

    /// Route that distinguishes upgrade requests from plain HTTP.
    ///
    /// Default: `/websocket`
    pub websocket_path: String,

    /// Upper bound on a single readiness wait.
    ///
    /// Default: 5 seconds
    pub poll_interval: Duration,

    /// Size of the buffer used for the single read performed per readiness event.
    ///
    /// Default: 1 MB (1024 * 1024)
    pub read_buffer_size: usize,

    /// Number of readiness events collected per poll.
    ///
    /// Default: 1024
    pub events_capacity: usize,

    /// Accept unmasked frames from clients.
    ///
    /// RFC 6455 requires clients to mask all frames.
    ///
    /// Default: false
    pub accept_unmasked_frames: bool,

    /// Body sent after `HTTP/1.1 200 OK` to non-upgrade requests.
    pub default_body: Vec<u8>,

    /// Resource limits.
    pub limits: Limits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            websocket_path: DEFAULT_WEBSOCKET_PATH.to_string(),
            poll_interval: Duration::from_secs(5),
            read_buffer_size: 1024 * 1024,
            events_capacity: 1024,
            accept_unmasked_frames: false,
            default_body: DEFAULT_BODY.to_vec(),
            limits: Limits::default(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the listening address.
    #[must_use]
    pub const fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the WebSocket route.
    #[must_use]
    pub fn with_websocket_path(mut self, path: impl Into<String>) -> Self {
        self.websocket_path = path.into();
        self
    }

    /// Set the readiness wait bound.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set read buffer size.
    #[must_use]
    pub const fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the number of events collected per poll.
    #[must_use]
    pub const fn with_events_capacity(mut self, capacity: usize) -> Self {
        self.events_capacity = capacity;
        self
    }

    /// Accept (or reject) unmasked client frames.
    #[must_use]
    pub const fn with_accept_unmasked_frames(mut self, accept: bool) -> Self {
        self.accept_unmasked_frames = accept;
        self
    }

    /// Set the body returned to plain HTTP requests.
    #[must_use]
    pub fn with_default_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.default_body = body.into();
        self
    }

    /// Set custom limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}
