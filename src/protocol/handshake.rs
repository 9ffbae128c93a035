//! Client side of the WebSocket opening handshake (RFC 6455 Section 4).
//!
//! The request is a fixed HTTP/1.1 `GET` upgrade. The response head is read
//! one byte at a time up to the blank line, so any frame bytes the server
//! sends right after it stay in the read buffer for the frame decoder.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use tokio::io::AsyncRead;

use crate::error::{Error, Result};
use crate::transport::FrameReader;

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// End of the HTTP response head.
const TERMINATOR: &[u8] = b"\r\n\r\n";

/// Parse HTTP header lines into a map keyed by lowercase header name.
///
/// Parsing stops at the first empty line. Lines without a colon are ignored.
fn parse_headers<'a, I>(lines: I) -> HashMap<String, String>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_lowercase(), value.trim().to_string());
        }
    }
    headers
}

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use wsclient::protocol::handshake::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// let accept = compute_accept_key(key);
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    let hash = hasher.finalize();
    BASE64.encode(hash)
}

/// Generate a fresh Sec-WebSocket-Key: 16 random bytes, base64-encoded.
///
/// # Errors
///
/// Returns `Error::InvalidHandshake` if the OS random source fails.
pub fn generate_key() -> Result<String> {
    let mut nonce = [0u8; 16];
    getrandom::getrandom(&mut nonce)
        .map_err(|e| Error::InvalidHandshake(format!("Failed to generate key: {}", e)))?;
    Ok(BASE64.encode(nonce))
}

/// The HTTP upgrade request sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// Value of the Host header.
    pub host: String,
    /// Request path including any query string.
    pub path: String,
    /// The Sec-WebSocket-Key header value.
    pub key: String,
}

impl HandshakeRequest {
    /// Create a request with a freshly generated key.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHandshake` if no key could be generated.
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Result<Self> {
        Ok(Self::with_key(host, path, generate_key()?))
    }

    /// Create a request with a caller-supplied key.
    #[must_use]
    pub fn with_key(host: impl Into<String>, path: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
            key: key.into(),
        }
    }

    /// The accept value a conforming server must answer with.
    #[must_use]
    pub fn expected_accept(&self) -> String {
        compute_accept_key(&self.key)
    }

    /// Write the HTTP request to a buffer.
    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(format!("GET {} HTTP/1.1\r\n", self.path).as_bytes());
        buf.extend_from_slice(b"Upgrade: websocket\r\n");
        buf.extend_from_slice(b"Connection: Upgrade\r\n");
        buf.extend_from_slice(format!("Host: {}\r\n", self.host).as_bytes());
        buf.extend_from_slice(format!("Sec-WebSocket-Key: {}\r\n", self.key).as_bytes());
        buf.extend_from_slice(b"Sec-WebSocket-Version: 13\r\n");
        buf.extend_from_slice(b"\r\n");
    }
}

/// WebSocket handshake response from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// The status line, e.g. `HTTP/1.1 101 Switching Protocols`.
    pub status_line: String,
    /// Header map with lowercase names.
    pub headers: HashMap<String, String>,
}

impl HandshakeResponse {
    /// Parse the response head.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if:
    /// - The data is not valid UTF-8.
    /// - The response is empty.
    /// - The status line is not `HTTP/1.1 101` or `HTTP/1.0 101`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::InvalidHandshake("Invalid UTF-8".into()))?;

        let mut lines = text.lines();
        let status_line = lines
            .next()
            .filter(|l| !l.is_empty())
            .ok_or_else(|| Error::InvalidHandshake("Empty response".into()))?;

        let rest = status_line
            .strip_prefix("HTTP/1.1 101")
            .or_else(|| status_line.strip_prefix("HTTP/1.0 101"));
        if !matches!(rest, Some(tail) if tail.is_empty() || tail.starts_with(' ')) {
            return Err(Error::InvalidHandshake(format!(
                "Expected 101 status, got: {}",
                status_line
            )));
        }

        Ok(Self {
            status_line: status_line.to_string(),
            headers: parse_headers(lines),
        })
    }

    /// Look up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Check the upgrade headers against the request that was sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if:
    /// - Any of `Upgrade`, `Connection`, `Sec-WebSocket-Accept` is missing.
    /// - The `Upgrade` header is not `websocket` (any case).
    /// - The `Connection` header has no `upgrade` token (any case).
    /// - `Sec-WebSocket-Accept` does not match `expected_accept` exactly.
    pub fn validate(&self, expected_accept: &str) -> Result<()> {
        let upgrade = self
            .header("upgrade")
            .ok_or_else(|| Error::InvalidHandshake("Missing Upgrade header in response".into()))?;
        if !upgrade.eq_ignore_ascii_case("websocket") {
            return Err(Error::InvalidHandshake(format!(
                "Invalid Upgrade header: {}",
                upgrade
            )));
        }

        let connection = self.header("connection").ok_or_else(|| {
            Error::InvalidHandshake("Missing Connection header in response".into())
        })?;
        if !connection
            .split(',')
            .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
        {
            return Err(Error::InvalidHandshake(format!(
                "Invalid Connection header: {}",
                connection
            )));
        }

        let accept = self.header("sec-websocket-accept").ok_or_else(|| {
            Error::InvalidHandshake("Missing Sec-WebSocket-Accept header".into())
        })?;
        // base64 is case-sensitive
        if accept != expected_accept {
            return Err(Error::InvalidHandshake(format!(
                "Sec-WebSocket-Accept mismatch: expected {}, got {}",
                expected_accept, accept
            )));
        }

        Ok(())
    }
}

/// Read the response head one byte at a time until `\r\n\r\n`.
///
/// Returns the head including the terminator. Bytes after it are left in the
/// reader.
///
/// # Errors
///
/// - `Error::HandshakeTooLarge` if no terminator appears within `max_size` bytes
/// - `Error::ConnectionClosed` / `Error::Io` from the transport
pub async fn read_response_head<R>(reader: &mut FrameReader<R>, max_size: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut head = Vec::with_capacity(256);
    while !head.ends_with(TERMINATOR) {
        if head.len() >= max_size {
            return Err(Error::HandshakeTooLarge {
                size: head.len() + 1,
                max: max_size,
            });
        }
        head.push(reader.read_byte().await?);
    }
    Ok(head)
}
