//! WebSocket opening handshake (RFC 6455 Section 4.2).
//!
//! Decides whether a parsed request is an acceptable upgrade and renders the
//! `101 Switching Protocols` reply.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};
use crate::protocol::http::HttpRequest;

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

const MIN_HTTP_VERSION: f64 = 1.1;

/// Whether `request` is a well-formed upgrade.
///
/// Holds iff the method is exactly `GET`, the version number after `HTTP/`
/// read as a real number is at least 1.1, `upgrade` is exactly `websocket`,
/// `connection` is exactly `Upgrade`, and a `sec-websocket-key` is present.
/// Header values are compared as received. A version token that is not a
/// number fails the check.
#[must_use]
pub fn is_valid_upgrade(request: &HttpRequest) -> bool {
    upgrade_rejection(request).is_none()
}

/// The first reason `request` is not an acceptable upgrade, if any.
fn upgrade_rejection(request: &HttpRequest) -> Option<String> {
    if request.method != "GET" {
        return Some(format!("Expected GET method, got {}", request.method));
    }
    match request.version.number() {
        Some(number) if number >= MIN_HTTP_VERSION => {}
        _ => return Some(format!("Expected at least HTTP/1.1, got {}", request.version)),
    }
    match request.header("upgrade") {
        Some("websocket") => {}
        other => return Some(format!("Invalid Upgrade header: {other:?}")),
    }
    match request.header("connection") {
        Some("Upgrade") => {}
        other => return Some(format!("Invalid Connection header: {other:?}")),
    }
    if request.header("sec-websocket-key").is_none() {
        return Some("Missing Sec-WebSocket-Key header".to_string());
    }
    None
}

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept value is `Base64(SHA-1(key + GUID))`.
///
/// # Example
///
/// ```
/// use wsloop::protocol::handshake::derive_accept_value;
///
/// let accept = derive_accept_value("dGhlIHNhbXBsZSBub25jZQ==");
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn derive_accept_value(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Render the `101 Switching Protocols` reply carrying `accept`.
#[must_use]
pub fn build_handshake_response(accept: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128);
    buf.extend_from_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
    buf.extend_from_slice(b"Upgrade: websocket\r\n");
    buf.extend_from_slice(b"Connection: Upgrade\r\n");
    buf.extend_from_slice(format!("Sec-WebSocket-Accept: {accept}\r\n").as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf
}

/// Client key and the accept value derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeContext {
    pub key: String,
    pub accept: String,
}

impl HandshakeContext {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        let accept = derive_accept_value(&key);
        Self { key, accept }
    }

    /// Validate `request` as an upgrade and derive its accept value.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUpgradeRequest` naming the first failed check.
    pub fn negotiate(request: &HttpRequest) -> Result<Self> {
        if let Some(reason) = upgrade_rejection(request) {
            return Err(Error::InvalidUpgradeRequest(reason));
        }
        let key = request
            .header("sec-websocket-key")
            .ok_or_else(|| Error::InvalidUpgradeRequest("Missing Sec-WebSocket-Key header".into()))?;
        Ok(Self::new(key))
    }

    /// The reply to send for this handshake.
    #[must_use]
    pub fn response(&self) -> Vec<u8> {
        build_handshake_response(&self.accept)
    }
}
