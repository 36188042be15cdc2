//! Single-threaded readiness loop.
//!
//! The reactor owns the listening socket and every live [`Connection`]. Each
//! wake handles the sockets reported readable: the listener accepts one
//! connection, any other socket gets one read followed by the parser for its
//! mode. A failing connection is closed on its own; the loop carries on.
//!
//! Sources are registered edge-triggered. Because only one accept or read is
//! performed per event, a source is re-registered after each accept or
//! non-empty read, which makes the poller report it again on the next wake if
//! input (or end-of-stream) is still pending.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::connection::{Connection, ConnectionId, Disposition, Mode};
use crate::error::Result;
use crate::handler::FrameHandler;

const LISTENER: Token = Token(0);

/// The event loop.
pub struct Reactor<H> {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    connections: HashMap<Token, Connection<TcpStream>>,
    last_token: usize,
    scratch: Vec<u8>,
    config: Config,
    handler: H,
}

impl<H: FrameHandler> Reactor<H> {
    /// Bind the listening socket and register it for readiness.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the poller cannot be created or the address
    /// cannot be bound.
    pub fn bind(config: Config, handler: H) -> Result<Self> {
        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(config.bind_addr)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        info!(addr = %listener.local_addr()?, path = %config.websocket_path, "listening");

        Ok(Self {
            poll,
            events: Events::with_capacity(config.events_capacity),
            listener,
            connections: HashMap::new(),
            last_token: LISTENER.0,
            scratch: vec![0u8; config.read_buffer_size],
            config,
            handler,
        })
    }

    /// Address the listener is actually bound to.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Mode of a live connection, or `None` once it has been closed.
    pub fn mode_of(&self, id: ConnectionId) -> Option<Mode> {
        self.connections.get(&Token(id.0)).map(Connection::mode)
    }

    /// Ids of the live connections, in no particular order.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.values().map(Connection::id).collect()
    }

    /// Run the loop. Only returns if polling itself fails.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the readiness poll fails.
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.turn(Some(self.config.poll_interval))?;
        }
    }

    /// Wait for readiness once (at most `timeout`) and handle what was reported.
    ///
    /// Returns the number of events handled.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the readiness poll fails. Per-connection
    /// failures are never reported here.
    pub fn turn(&mut self, timeout: Option<Duration>) -> Result<usize> {
        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(0),
            Err(e) => return Err(e.into()),
        }

        let ready: Vec<Token> = self.events.iter().map(|event| event.token()).collect();
        for &token in &ready {
            if token == LISTENER {
                self.accept_one();
            } else {
                self.service(token);
            }
        }
        Ok(ready.len())
    }

    fn accept_one(&mut self) {
        match self.listener.accept() {
            Ok((stream, peer)) => self.admit(stream, peer),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
            Err(e) => warn!(error = %e, "accept failed"),
        }

        // More connections may be waiting in the backlog.
        if let Err(e) =
            self.poll
                .registry()
                .reregister(&mut self.listener, LISTENER, Interest::READABLE)
        {
            warn!(error = %e, "failed to re-arm listener");
        }
    }

    fn admit(&mut self, mut stream: TcpStream, peer: SocketAddr) {
        let token = self.next_token();
        if let Err(e) = self
            .poll
            .registry()
            .register(&mut stream, token, Interest::READABLE)
        {
            warn!(peer = %peer, error = %e, "failed to register connection");
            return;
        }

        let id = ConnectionId(token.0);
        self.connections
            .insert(token, Connection::new(id, stream, &self.config).with_peer(peer));
        info!(conn = %id, peer = %peer, live = self.connections.len(), "connection accepted");
        self.handler.on_open(id, peer);
    }

    fn service(&mut self, token: Token) {
        let Some(conn) = self.connections.get_mut(&token) else {
            trace!(token = token.0, "event for a connection that is already gone");
            return;
        };

        let result = match conn.read_once(&mut self.scratch) {
            Ok(Some(_)) => {
                // Bytes or a FIN may still be queued behind this read.
                if let Err(e) =
                    self.poll
                        .registry()
                        .reregister(conn.stream_mut(), token, Interest::READABLE)
                {
                    warn!(conn = %conn.id(), error = %e, "failed to re-arm connection");
                }
                conn.process(&self.config, &mut self.handler)
            }
            Ok(None) => Ok(Disposition::KeepOpen),
            Err(e) => Err(e),
        };

        let close = match result {
            Ok(Disposition::KeepOpen) => false,
            Ok(Disposition::Close) => true,
            Err(e) if e.is_peer_closed() => {
                debug!(conn = %conn.id(), mode = %conn.mode(), "peer closed");
                true
            }
            Err(e) => {
                warn!(conn = %conn.id(), mode = %conn.mode(), error = %e, "closing connection");
                if e.warrants_bad_request() {
                    if let Err(e) = conn.reject() {
                        debug!(conn = %conn.id(), error = %e, "could not send 400");
                    }
                }
                true
            }
        };

        if close {
            self.close(token);
        }
    }

    fn close(&mut self, token: Token) {
        let Some(mut conn) = self.connections.remove(&token) else {
            return;
        };
        if let Err(e) = self.poll.registry().deregister(conn.stream_mut()) {
            debug!(conn = %conn.id(), error = %e, "deregister failed");
        }
        let id = conn.id();
        let peer = conn.peer();
        drop(conn);
        info!(conn = %id, peer = ?peer, live = self.connections.len(), "connection closed");
        self.handler.on_close(id);
    }

    /// Next token not used by the listener or any live connection.
    fn next_token(&mut self) -> Token {
        loop {
            self.last_token = self.last_token.wrapping_add(1);
            let token = Token(self.last_token);
            if token != LISTENER && !self.connections.contains_key(&token) {
                return token;
            }
        }
    }
}
