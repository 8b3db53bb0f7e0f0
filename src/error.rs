use crate::frame::CloseCode;
use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;
use tokio::time::error::Elapsed;
use url::ParseError;

/// The error type produced by every fallible operation in this crate.
///
/// Variants map onto the taxonomy from the close protocol design: handshake
/// failures never reach `Open` and are surfaced straight to the `connect`
/// caller; protocol errors carry the close code the reader wants echoed
/// back to the peer; transport errors collapse to the local 1006 sentinel.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{source}")]
    Timeout {
        #[from]
        source: Elapsed,
    },

    #[error("IO error: {source}")]
    IOError {
        #[from]
        source: io::Error,
    },

    #[error("{source}")]
    FromUtf8Error {
        #[from]
        source: FromUtf8Error,
    },

    #[error("{source}")]
    URLParseError {
        #[from]
        source: ParseError,
    },

    // Handshake errors
    #[error("invalid scheme in WebSocket URL, expected ws:// or wss://")]
    InvalidSchemeURL,

    #[error("URL has no host")]
    URLNoHost,

    #[error("malformed HTTP response during handshake")]
    MalformedHandshakeResponse,

    #[error("server responded with status {0}, expected 101 Switching Protocols")]
    UnexpectedStatus(u16),

    #[error("server response is missing the Upgrade header")]
    NoUpgradeHeaderPresent,

    #[error("server response has Upgrade: {0}, expected websocket")]
    InvalidUpgradeHeader(String),

    #[error("server response is missing the Connection: Upgrade header")]
    NoConnectionHeaderPresent,

    #[error("server response is missing Sec-WebSocket-Accept")]
    NoSecWebsocketAccept,

    #[error("Sec-WebSocket-Accept value does not match the expected digest")]
    InvalidAcceptKey,

    #[error("handshake did not complete within the configured timeout")]
    HandshakeTimeout,

    // Framing errors -- each close_code is the value §4.2 says the reader
    // must echo back to the peer before tearing the connection down.
    #[error("received an invalid or unknown opcode: {opcode:#x}")]
    InvalidOpcode { opcode: u8, close_code: CloseCode },

    #[error("RSV bit set but no extension negotiated")]
    RSVNotZero { close_code: CloseCode },

    #[error("control frames must not be fragmented")]
    ControlFramesFragmented { close_code: CloseCode },

    #[error("control frame payload exceeds 125 bytes")]
    ControlFramePayloadSize { close_code: CloseCode },

    #[error("close frame carried an undefined or reserved close code: {code}")]
    InvalidCloseCode { code: u16, close_code: CloseCode },

    #[error("close frame payload had a single byte, missing the close code")]
    MissingCloseCode { close_code: CloseCode },

    #[error("frame payload is not valid UTF-8")]
    InvalidPayloadData { close_code: CloseCode },

    #[error("message exceeds the configured maximum size")]
    MaxMessageSize { close_code: CloseCode },

    // Local programming errors -- surfaced to the caller, never to the peer.
    #[error("constructed frame violates protocol invariants: {0}")]
    InvalidLocalFrame(&'static str),

    // Transport / lifecycle
    #[error("connection reset or closed unexpectedly")]
    ConnectionReset,

    #[error("the connection is already closed")]
    AlreadyClosed,
}

impl Error {
    /// The close code a protocol error should be echoed to the peer with.
    /// `None` for handshake failures and local errors: we either never
    /// reached `Open`, or the peer never saw the offending bytes.
    pub fn close_code(&self) -> Option<CloseCode> {
        match self {
            Error::InvalidOpcode { close_code, .. }
            | Error::RSVNotZero { close_code }
            | Error::ControlFramesFragmented { close_code }
            | Error::ControlFramePayloadSize { close_code }
            | Error::InvalidCloseCode { close_code, .. }
            | Error::MissingCloseCode { close_code }
            | Error::InvalidPayloadData { close_code }
            | Error::MaxMessageSize { close_code } => Some(*close_code),
            _ => None,
        }
    }
}
