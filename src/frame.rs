use crate::error::Error;
use std::fmt;

/// The fixed RFC 6455 string concatenated with the client nonce when
/// computing the `Sec-WebSocket-Accept` response value.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Continue,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl OpCode {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x0 => Some(OpCode::Continue),
            0x1 => Some(OpCode::Text),
            0x2 => Some(OpCode::Binary),
            0x8 => Some(OpCode::Close),
            0x9 => Some(OpCode::Ping),
            0xA => Some(OpCode::Pong),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            OpCode::Continue => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
        }
    }

    pub fn is_control(&self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }
}

/// A WebSocket close status code (RFC 6455 §7.4).
///
/// 1005/1006/1015 are sentinels: they describe a closure locally but MUST
/// NOT appear on the wire, so `is_valid_on_wire` rejects them even though
/// `is_defined` (used for the "known or private-range" check on receive)
/// does not need to distinguish them from any other defined code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseCode(pub u16);

impl CloseCode {
    pub const NORMAL_CLOSURE: CloseCode = CloseCode(1000);
    pub const GOING_AWAY: CloseCode = CloseCode(1001);
    pub const PROTOCOL_ERROR: CloseCode = CloseCode(1002);
    pub const UNSUPPORTED_DATA: CloseCode = CloseCode(1003);
    pub const NO_STATUS_RECEIVED: CloseCode = CloseCode(1005);
    pub const ABNORMAL_CLOSURE: CloseCode = CloseCode(1006);
    pub const INVALID_PAYLOAD_DATA: CloseCode = CloseCode(1007);
    pub const POLICY_VIOLATION: CloseCode = CloseCode(1008);
    pub const MESSAGE_TOO_BIG: CloseCode = CloseCode(1009);
    pub const MANDATORY_EXTENSION: CloseCode = CloseCode(1010);
    pub const INTERNAL_ERROR: CloseCode = CloseCode(1011);
    pub const TLS_HANDSHAKE: CloseCode = CloseCode(1015);

    const DEFINED: [CloseCode; 9] = [
        Self::NORMAL_CLOSURE,
        Self::GOING_AWAY,
        Self::PROTOCOL_ERROR,
        Self::UNSUPPORTED_DATA,
        Self::INVALID_PAYLOAD_DATA,
        Self::POLICY_VIOLATION,
        Self::MESSAGE_TOO_BIG,
        Self::MANDATORY_EXTENSION,
        Self::INTERNAL_ERROR,
    ];

    /// True for a code allowed to appear as the 2-byte payload of a Close
    /// frame actually observed on the wire: one of the defined codes, or
    /// in the private-use range 3000-4999. The local-only sentinels
    /// (1005/1006/1015) are deliberately excluded.
    pub fn is_valid_on_wire(self) -> bool {
        Self::DEFINED.contains(&self) || (3000..=4999).contains(&self.0)
    }

    pub fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// In-memory value of one RFC 6455 frame.
///
/// `code` is only meaningful when `op == OpCode::Close`; it holds the
/// close status that was (or will be) carried in the first two bytes of
/// the Close payload, separate from `data` which holds the UTF-8 reason.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub op: OpCode,
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub data: Vec<u8>,
    pub code: Option<CloseCode>,
}

impl Frame {
    pub fn new(op: OpCode, data: Vec<u8>) -> Self {
        Self {
            op,
            fin: true,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            data,
            code: None,
        }
    }

    pub fn text(data: impl Into<String>) -> Self {
        Self::new(OpCode::Text, data.into().into_bytes())
    }

    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::new(OpCode::Binary, data.into())
    }

    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Self::new(OpCode::Ping, data.into())
    }

    pub fn pong(data: impl Into<Vec<u8>>) -> Self {
        Self::new(OpCode::Pong, data.into())
    }

    pub fn close(code: CloseCode, reason: impl Into<Vec<u8>>) -> Self {
        let mut frame = Self::new(OpCode::Close, reason.into());
        frame.code = Some(code);
        frame
    }

    /// The length a Close frame's payload will occupy on the wire: the
    /// reason bytes plus 2 if a close code is present.
    fn effective_len(&self) -> usize {
        self.data.len() + if self.code.is_some() { 2 } else { 0 }
    }

    /// Enforces the §3 data-model invariants before this frame is handed
    /// to the writer. A violation here is a local programming error (§7
    /// InvalidLocalFrame), never a peer-caused protocol error.
    pub fn validate(&self) -> Result<(), Error> {
        if self.op.is_control() {
            if !self.fin {
                return Err(Error::InvalidLocalFrame(
                    "control frames must not be fragmented",
                ));
            }
            if self.effective_len() > 125 {
                return Err(Error::InvalidLocalFrame(
                    "control frame payload exceeds 125 bytes",
                ));
            }
        }

        if self.rsv1 || self.rsv2 || self.rsv3 {
            return Err(Error::InvalidLocalFrame(
                "rsv bits set but no extension negotiated",
            ));
        }

        if self.op == OpCode::Close {
            if let Some(code) = self.code {
                if !code.is_valid_on_wire() {
                    return Err(Error::InvalidLocalFrame(
                        "close code is reserved or undefined",
                    ));
                }
            }
        } else if self.code.is_some() {
            return Err(Error::InvalidLocalFrame(
                "close code set on a non-close frame",
            ));
        }

        if self.op == OpCode::Text && std::str::from_utf8(&self.data).is_err() {
            return Err(Error::InvalidLocalFrame("text frame payload is not UTF-8"));
        }

        Ok(())
    }
}
