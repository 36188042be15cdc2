//! Minimal HTTP/1.1 request head parsing.
//!
//! Only enough of HTTP is understood to recognise an upgrade request: the
//! request line and the header block. Message bodies are not interpreted;
//! anything after the blank line that ends the head is ignored.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Marks the end of the header block.
pub const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Response sent when an upgrade request is rejected or the head cannot be parsed.
pub const BAD_REQUEST: &[u8] = b"HTTP/1.1 400 Bad Request\r\n\r\n";

/// Status line and blank line preceding the default body.
pub const OK_HEAD: &[u8] = b"HTTP/1.1 200 OK\r\n\r\n";

/// Render the response for a plain (non-upgrade) HTTP request.
#[must_use]
pub fn ok_response(body: &[u8]) -> Vec<u8> {
    let mut response = Vec::with_capacity(OK_HEAD.len() + body.len());
    response.extend_from_slice(OK_HEAD);
    response.extend_from_slice(body);
    response
}

/// Version token from the request line, kept exactly as received.
///
/// Parsing a head never looks inside the token. Its numeric value only
/// matters when an upgrade is negotiated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HttpVersion(String);

impl HttpVersion {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `major.minor` part after `HTTP/` read as a real number.
    ///
    /// `None` if the token has no `HTTP/` prefix or the rest is not a number.
    #[must_use]
    pub fn number(&self) -> Option<f64> {
        self.0.strip_prefix("HTTP/")?.parse().ok()
    }
}

impl std::fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A parsed request head.
///
/// Header names are stored lower-cased; when a header repeats, the last value wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub target: String,
    pub version: HttpVersion,
    pub headers: HashMap<String, String>,
}

impl HttpRequest {
    /// Look up a header by name, ignoring ASCII case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Outcome of looking for a complete head in buffered bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadStatus {
    /// No blank line yet; keep buffering.
    Incomplete,
    /// A full head was found. `head_len` includes the terminating blank line.
    Complete {
        request: HttpRequest,
        head_len: usize,
    },
}

/// Position of the blank line that ends the head, if buffered.
#[must_use]
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEAD_TERMINATOR.len())
        .position(|window| window == HEAD_TERMINATOR)
}

/// Parse a request head out of the bytes accumulated so far.
///
/// Parsing happens exactly once per head: nothing is interpreted until the
/// terminator is present.
///
/// # Errors
///
/// - `Error::InvalidUtf8` if the head is not UTF-8
/// - `Error::MalformedRequestLine` unless the first line is exactly three
///   space-separated tokens
/// - `Error::MalformedHeaderLine` for a header line without `": "`
pub fn parse_head(buf: &[u8]) -> Result<HeadStatus> {
    let Some(end) = find_head_end(buf) else {
        return Ok(HeadStatus::Incomplete);
    };

    let text = std::str::from_utf8(&buf[..end])?;
    let mut lines = text.split("\r\n");

    // split() always yields at least one item
    let request_line = lines.next().unwrap_or_default();
    let (method, target, version) = parse_request_line(request_line)?;

    let mut headers = HashMap::new();
    for line in lines {
        let (name, value) = line
            .split_once(": ")
            .ok_or_else(|| Error::MalformedHeaderLine(line.to_string()))?;
        headers.insert(name.to_ascii_lowercase(), value.to_string());
    }

    Ok(HeadStatus::Complete {
        request: HttpRequest {
            method: method.to_string(),
            target: target.to_string(),
            version,
            headers,
        },
        head_len: end + HEAD_TERMINATOR.len(),
    })
}

fn parse_request_line(line: &str) -> Result<(&str, &str, HttpVersion)> {
    let mut tokens = line.split(' ');
    match (tokens.next(), tokens.next(), tokens.next(), tokens.next()) {
        (Some(method), Some(target), Some(version), None) => {
            Ok((method, target, HttpVersion::new(version)))
        }
        _ => Err(Error::MalformedRequestLine(line.to_string())),
    }
}
