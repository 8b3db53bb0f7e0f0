//! Builds the client's HTTP GET Upgrade request and validates the server's
//! 101 response (spec §4.4, §6).
//!
//! Grounded on the teacher's `request.rs` (URL-to-request-line plumbing)
//! and this file's own accept-key law, reworked for the client side: the
//! teacher builds a *response* to a request it received; here we build the
//! *request* and validate the *response*.

use crate::error::Error;
use crate::mask::generate_accept_key;
use log::debug;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;
use url::Url;

/// Everything `build_request` needs, derived once from the target URL.
pub struct HandshakeTarget {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    path_and_query: String,
    host_header: String,
}

impl HandshakeTarget {
    /// Parses a `ws://` or `wss://` URL into connection parameters
    /// (spec §6 URL scheme: default ports 80/443).
    pub fn parse(url: &str) -> Result<Self, Error> {
        let parsed = Url::parse(url)?;

        let default_port = match parsed.scheme() {
            "ws" => 80,
            "wss" => 443,
            _ => return Err(Error::InvalidSchemeURL),
        };
        let use_tls = parsed.scheme() == "wss";

        let host = parsed.host_str().ok_or(Error::URLNoHost)?.to_string();
        let port = parsed.port().unwrap_or(default_port);

        let host_header = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.clone(),
        };

        let path_and_query = match parsed.query() {
            Some(query) => format!("{}?{}", parsed.path(), query),
            None => parsed.path().to_string(),
        };

        Ok(Self {
            host,
            port,
            use_tls,
            path_and_query,
            host_header,
        })
    }
}

/// Builds the literal request bytes (spec §4.4/§6 required headers).
pub fn build_request(target: &HandshakeTarget, sec_key: &str) -> String {
    format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Connection: Upgrade\r\n\
         Upgrade: websocket\r\n\
         Sec-WebSocket-Key: {sec_key}\r\n\
         Sec-WebSocket-Version: 13\r\n\
         \r\n",
        path = target.path_and_query,
        host = target.host_header,
    )
}

/// Reads and validates the server's handshake response off `transport`
/// under an overall timeout (spec §4.4, §7 HandshakeFailure), accumulating
/// bytes until a full header block (terminated by `\r\n\r\n`) has arrived.
pub async fn read_response<T: AsyncRead + Unpin>(
    transport: &mut T,
    sec_key: &str,
    handshake_timeout: Duration,
) -> Result<(), Error> {
    timeout(handshake_timeout, read_response_inner(transport, sec_key))
        .await
        .map_err(|_| Error::HandshakeTimeout)?
}

async fn read_response_inner<T: AsyncRead + Unpin>(
    transport: &mut T,
    sec_key: &str,
) -> Result<(), Error> {
    let mut raw = Vec::with_capacity(1024);
    let mut chunk = [0u8; 512];

    loop {
        if let Some(end) = find_header_end(&raw) {
            return validate_response(&raw[..end], sec_key);
        }

        let n = transport.read(&mut chunk).await?;
        if n == 0 {
            return Err(Error::MalformedHandshakeResponse);
        }
        raw.extend_from_slice(&chunk[..n]);

        if raw.len() > 16 * 1024 {
            return Err(Error::MalformedHandshakeResponse);
        }
    }
}

fn find_header_end(raw: &[u8]) -> Option<usize> {
    raw.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

/// Parses the status line and headers (spec §4.4 response parser: split on
/// the first `:`, trim, case-insensitive header names) and checks every
/// invariant the spec requires before the connection may move to `Open`.
fn validate_response(header_block: &[u8], sec_key: &str) -> Result<(), Error> {
    let text = std::str::from_utf8(header_block).map_err(|_| Error::MalformedHandshakeResponse)?;
    let mut lines = text.split("\r\n");

    let status_line = lines.next().ok_or(Error::MalformedHandshakeResponse)?;
    let status: u16 = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .ok_or(Error::MalformedHandshakeResponse)?;
    if status != 101 {
        return Err(Error::UnexpectedStatus(status));
    }

    let mut upgrade = None;
    let mut connection = None;
    let mut accept = None;

    for line in lines {
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim().to_string();
        match name.as_str() {
            "upgrade" => upgrade = Some(value),
            "connection" => connection = Some(value),
            "sec-websocket-accept" => accept = Some(value),
            _ => {}
        }
    }

    let upgrade = upgrade.ok_or(Error::NoUpgradeHeaderPresent)?;
    if !upgrade.eq_ignore_ascii_case("websocket") {
        return Err(Error::InvalidUpgradeHeader(upgrade));
    }

    let connection = connection.ok_or(Error::NoConnectionHeaderPresent)?;
    if !connection
        .split(',')
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
    {
        return Err(Error::NoConnectionHeaderPresent);
    }

    let accept = accept.ok_or(Error::NoSecWebsocketAccept)?;
    if accept != generate_accept_key(sec_key) {
        return Err(Error::InvalidAcceptKey);
    }

    debug!("handshake response validated, Sec-WebSocket-Accept matches");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ws_url_with_default_port() {
        let target = HandshakeTarget::parse("ws://example.com/chat").unwrap();
        assert_eq!(target.host, "example.com");
        assert_eq!(target.port, 80);
        assert!(!target.use_tls);
        assert_eq!(target.host_header, "example.com");
    }

    #[test]
    fn parses_wss_url_with_explicit_port_and_query() {
        let target = HandshakeTarget::parse("wss://example.com:9443/chat?id=1").unwrap();
        assert_eq!(target.port, 9443);
        assert!(target.use_tls);
        assert_eq!(target.path_and_query, "/chat?id=1");
        assert_eq!(target.host_header, "example.com:9443");
    }

    #[test]
    fn rejects_non_ws_scheme() {
        let err = HandshakeTarget::parse("http://example.com").unwrap_err();
        assert!(matches!(err, Error::InvalidSchemeURL));
    }

    #[test]
    fn request_contains_required_headers() {
        let target = HandshakeTarget::parse("ws://example.com/chat").unwrap();
        let request = build_request(&target, "dGhlIHNhbXBsZSBub25jZQ==");
        assert!(request.starts_with("GET /chat HTTP/1.1\r\n"));
        assert!(request.contains("Host: example.com\r\n"));
        assert!(request.contains("Upgrade: websocket\r\n"));
        assert!(request.contains("Connection: Upgrade\r\n"));
        assert!(request.contains("Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n"));
        assert!(request.contains("Sec-WebSocket-Version: 13\r\n"));
        assert!(request.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn accepts_valid_101_response() {
        let sec_key = "dGhlIHNhbXBsZSBub25jZQ==";
        let response = format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {}\r\n\r\n",
            generate_accept_key(sec_key)
        );
        let mut cursor = std::io::Cursor::new(response.into_bytes());
        read_response(&mut cursor, sec_key, Duration::from_secs(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejects_wrong_status() {
        let response = "HTTP/1.1 404 Not Found\r\n\r\n";
        let mut cursor = std::io::Cursor::new(response.as_bytes().to_vec());
        let err = read_response(&mut cursor, "anykey", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedStatus(404)));
    }

    #[tokio::test]
    async fn rejects_mismatched_accept_key() {
        let response = "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: not-the-right-value\r\n\r\n";
        let mut cursor = std::io::Cursor::new(response.as_bytes().to_vec());
        let err = read_response(&mut cursor, "dGhlIHNhbXBsZSBub25jZQ==", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAcceptKey));
    }
}
