use std::io::{self, Read, Write};
use std::net::SocketAddr;

use bytes::BytesMut;
use tracing::{debug, info};

use crate::config::Config;
use crate::connection::Mode;
use crate::error::{Error, Result};
use crate::handler::FrameHandler;
use crate::protocol::FrameDecoder;
use crate::protocol::handshake::HandshakeContext;
use crate::protocol::http::{self, HeadStatus};

/// Identity of a live connection. Never shared by two live connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub usize);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the reactor should do with a connection after processing a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    KeepOpen,
    /// A final response was written; close the connection.
    Close,
}

/// One accepted socket and the bytes received on it.
///
/// Generic over the stream so the protocol logic can run against anything
/// that implements `Read + Write`; the reactor uses a non-blocking
/// `mio::net::TcpStream`.
pub struct Connection<S> {
    id: ConnectionId,
    peer: Option<SocketAddr>,
    stream: S,
    buffer: BytesMut,
    mode: Mode,
    decoder: FrameDecoder,
}

impl<S> Connection<S> {
    /// Create a connection in [`Mode::AwaitingHttpHead`].
    pub fn new(id: ConnectionId, stream: S, config: &Config) -> Self {
        let decoder = FrameDecoder::new(config.limits.clone())
            .with_accept_unmasked(config.accept_unmasked_frames);
        Self {
            id,
            peer: None,
            stream,
            buffer: BytesMut::new(),
            mode: Mode::default(),
            decoder,
        }
    }

    /// Record the remote address for logging.
    #[must_use]
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Bytes received but not yet consumed by a parser.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }
}

impl<S: Read + Write> Connection<S> {
    /// Perform a single read into the receive buffer.
    ///
    /// Returns the number of bytes read, or `None` if the stream had nothing
    /// to offer after all.
    ///
    /// # Errors
    ///
    /// - `Error::PeerClosed` on a zero-length read
    /// - `Error::Io` for any other read failure
    pub fn read_once(&mut self, scratch: &mut [u8]) -> Result<Option<usize>> {
        loop {
            match self.stream.read(scratch) {
                Ok(0) => return Err(Error::PeerClosed),
                Ok(n) => {
                    self.buffer.extend_from_slice(&scratch[..n]);
                    debug!(conn = %self.id, bytes = n, buffered = self.buffer.len(), "read");
                    return Ok(Some(n));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Hand the buffered bytes to the parser for the current mode.
    ///
    /// # Errors
    ///
    /// Any HTTP parse error, `Error::InvalidUpgradeRequest`, a frame decode
    /// error, or an I/O error while writing a response. All of them are
    /// terminal for this connection.
    pub fn process<H: FrameHandler>(
        &mut self,
        config: &Config,
        handler: &mut H,
    ) -> Result<Disposition> {
        match self.mode {
            Mode::AwaitingHttpHead => self.process_head(config, handler),
            Mode::WebSocketEstablished => {
                for frame in self.decoder.decode_all(&mut self.buffer)? {
                    debug!(
                        conn = %self.id,
                        opcode = %frame.opcode,
                        fin = frame.fin,
                        len = frame.payload_len(),
                        "frame decoded"
                    );
                    handler.on_frame(self.id, &frame);
                }
                Ok(Disposition::KeepOpen)
            }
        }
    }

    fn process_head<H: FrameHandler>(
        &mut self,
        config: &Config,
        handler: &mut H,
    ) -> Result<Disposition> {
        let (request, head_len) = match http::parse_head(&self.buffer)? {
            HeadStatus::Incomplete => {
                config.limits.check_head_size(self.buffer.len())?;
                return Ok(Disposition::KeepOpen);
            }
            HeadStatus::Complete { request, head_len } => (request, head_len),
        };
        debug!(
            conn = %self.id,
            method = %request.method,
            target = %request.target,
            version = %request.version,
            headers = request.headers.len(),
            "request head parsed"
        );

        if request.target != config.websocket_path {
            self.send(&http::ok_response(&config.default_body))?;
            return Ok(Disposition::Close);
        }

        let handshake = HandshakeContext::negotiate(&request)?;
        self.send(&handshake.response())?;
        self.mode = Mode::WebSocketEstablished;

        let trailing = self.buffer.len() - head_len;
        if trailing > 0 {
            debug!(conn = %self.id, bytes = trailing, "ignoring bytes after request head");
        }
        self.buffer.clear();

        info!(conn = %self.id, target = %request.target, "upgraded to websocket");
        handler.on_upgrade(self.id, &request);
        Ok(Disposition::KeepOpen)
    }

    /// Tell a peer that is still speaking HTTP that its request was rejected.
    ///
    /// Does nothing once the connection has been upgraded.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the response cannot be written.
    pub fn reject(&mut self) -> Result<()> {
        if self.mode.is_websocket() {
            return Ok(());
        }
        self.send(http::BAD_REQUEST)
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()?;
        Ok(())
    }
}
