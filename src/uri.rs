//! WebSocket URI handling.

use url::{Host, Position, Url};

use crate::error::{Error, Result};

/// Connection target derived from a `ws://` or `wss://` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Whether the connection is TLS-backed (`wss`).
    pub secure: bool,
    /// Host as it appears in a socket address (IPv6 literals bracketed).
    pub host: String,
    /// Host without brackets, used as the TLS server name.
    pub server_name: String,
    /// Port from the URI, or 80/443 by scheme.
    pub port: u16,
    /// Path and query sent in the request line; `/` if the URI has none.
    pub path: String,
    /// Value of the Host header: the host, plus `:port` unless the port is 80.
    pub host_header: String,
}

impl Target {
    /// Split a WebSocket URI into its connection parts.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidUri` if the URI cannot be parsed or has no host
    /// - `Error::UnsupportedScheme` if the scheme is not `ws` or `wss`
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri).map_err(|e| Error::InvalidUri(format!("{}: {}", uri, e)))?;

        let secure = match url.scheme() {
            "ws" => false,
            "wss" => true,
            other => return Err(Error::UnsupportedScheme(other.to_string())),
        };

        let (host, server_name) = match url.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => {
                (domain.to_string(), domain.to_string())
            }
            Some(Host::Ipv4(ip)) => (ip.to_string(), ip.to_string()),
            Some(Host::Ipv6(ip)) => (format!("[{}]", ip), ip.to_string()),
            _ => return Err(Error::InvalidUri(format!("{}: missing host", uri))),
        };

        let port = url
            .port_or_known_default()
            .unwrap_or(if secure { 443 } else { 80 });

        // Port 80 is the only one left implicit, so `wss` without a port sends `host:443`.
        let host_header = if port == 80 {
            host.clone()
        } else {
            format!("{}:{}", host, port)
        };

        let path = match &url[Position::BeforePath..Position::AfterQuery] {
            "" => "/".to_string(),
            path => path.to_string(),
        };

        Ok(Self {
            secure,
            host,
            server_name,
            port,
            path,
            host_header,
        })
    }

    /// `host:port` for the TCP connect.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_default_port() {
        let target = Target::parse("ws://example.com/chat").unwrap();
        assert!(!target.secure);
        assert_eq!(target.host, "example.com");
        assert_eq!(target.port, 80);
        assert_eq!(target.path, "/chat");
        assert_eq!(target.host_header, "example.com");
        assert_eq!(target.address(), "example.com:80");
    }

    #[test]
    fn test_wss_default_port() {
        let target = Target::parse("wss://example.com").unwrap();
        assert!(target.secure);
        assert_eq!(target.port, 443);
        assert_eq!(target.path, "/");
        assert_eq!(target.host_header, "example.com:443");
    }

    #[test]
    fn test_host_header_port_rule() {
        assert_eq!(Target::parse("ws://example.com:80/").unwrap().host_header, "example.com");
        assert_eq!(Target::parse("wss://example.com:80/").unwrap().host_header, "example.com");
        assert_eq!(Target::parse("ws://example.com:443/").unwrap().host_header, "example.com:443");
        assert_eq!(Target::parse("wss://example.com:443/").unwrap().host_header, "example.com:443");
        assert_eq!(Target::parse("ws://[::1]:8080/").unwrap().host_header, "[::1]:8080");
    }

    #[test]
    fn test_explicit_port_in_host_header() {
        let target = Target::parse("ws://127.0.0.1:9001/echo?room=1").unwrap();
        assert_eq!(target.port, 9001);
        assert_eq!(target.host_header, "127.0.0.1:9001");
        assert_eq!(target.path, "/echo?room=1");
    }

    #[test]
    fn test_ipv6_host() {
        let target = Target::parse("ws://[::1]:8080/").unwrap();
        assert_eq!(target.host, "[::1]");
        assert_eq!(target.server_name, "::1");
        assert_eq!(target.address(), "[::1]:8080");
    }

    #[test]
    fn test_unsupported_scheme() {
        assert_eq!(
            Target::parse("http://example.com/"),
            Err(Error::UnsupportedScheme("http".into()))
        );
    }

    #[test]
    fn test_missing_scheme() {
        let err = Target::parse("example.com/chat").unwrap_err();
        assert!(matches!(err, Error::InvalidUri(_)));
        assert!(err.is_fatal());
    }
}
