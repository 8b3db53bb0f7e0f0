//! Parses one frame at a time from a [`ParserBuffer`] (spec §4.2).
//!
//! `FrameReader` is a [`Parser`] whose internal `Stage` enum realizes the
//! coroutine-pull algorithm from the source as an explicit state machine
//! (spec §9): each `advance` call either completes the current stage with
//! the bytes on hand and moves to the next one, or leaves the stage
//! untouched and asks for more. A frame only leaves `advance` once every
//! step of the §4.2 algorithm -- opcode/rsv validation, control-frame
//! constraints, extended length, mask, payload, and the per-opcode
//! post-processing (UTF-8 validation, close-code parsing) -- has run.

use crate::buffer::ParserBuffer;
use crate::error::Error;
use crate::frame::{CloseCode, Frame, OpCode};
use crate::mask::apply_mask;
use crate::parser::Parser;
use log::{trace, warn};

#[derive(Debug, Clone, Copy)]
struct HeaderBits {
    op: OpCode,
    fin: bool,
    rsv1: bool,
    rsv2: bool,
    rsv3: bool,
    masked: bool,
}

enum Stage {
    /// Waiting for the 2-byte fixed header.
    Header,
    /// Waiting for the 2 or 8 byte extended length field.
    ExtendedLength { header: HeaderBits, ext_bytes: u8 },
    /// Waiting for the 4-byte mask key (only when `header.masked`).
    MaskKey { header: HeaderBits, length: u64 },
    /// Waiting for `length` bytes of payload.
    Payload {
        header: HeaderBits,
        mask: Option<[u8; 4]>,
        length: usize,
    },
}

/// Reads and validates RFC 6455 frames off an incremental byte stream.
///
/// Construct with a `max_message_size` cap (spec §9 open question 4):
/// frames whose payload would exceed it are rejected with close code 1009
/// before the payload is even read off the wire.
pub struct FrameReader {
    stage: Stage,
    max_message_size: usize,
}

impl FrameReader {
    pub fn new(max_message_size: usize) -> Self {
        Self {
            stage: Stage::Header,
            max_message_size,
        }
    }

    fn parse_header_byte(&self, fbyte: u8, sbyte: u8) -> Result<(HeaderBits, u8, bool), Error> {
        let fin = (fbyte >> 7) & 1 == 1;
        let rsv1 = (fbyte >> 6) & 1 == 1;
        let rsv2 = (fbyte >> 5) & 1 == 1;
        let rsv3 = (fbyte >> 4) & 1 == 1;
        let op_bits = fbyte & 0x0F;

        let op = OpCode::from_u8(op_bits).ok_or_else(|| {
            warn!("rejecting frame with unknown opcode {op_bits:#x}");
            Error::InvalidOpcode {
                opcode: op_bits,
                close_code: CloseCode::PROTOCOL_ERROR,
            }
        })?;

        if rsv1 || rsv2 || rsv3 {
            warn!("rejecting frame with reserved bits set (op={op:?})");
            return Err(Error::RSVNotZero {
                close_code: CloseCode::PROTOCOL_ERROR,
            });
        }

        if !fin && op.is_control() {
            warn!("rejecting fragmented control frame (op={op:?})");
            return Err(Error::ControlFramesFragmented {
                close_code: CloseCode::PROTOCOL_ERROR,
            });
        }

        let masked = (sbyte >> 7) & 1 == 1;
        let length_code = sbyte & 0x7F;

        if op.is_control() && length_code > 125 {
            warn!("rejecting oversized control frame (op={op:?}, length_code={length_code})");
            return Err(Error::ControlFramePayloadSize {
                close_code: CloseCode::PROTOCOL_ERROR,
            });
        }

        let header = HeaderBits {
            op,
            fin,
            rsv1,
            rsv2,
            rsv3,
            masked,
        };

        Ok((header, length_code, masked))
    }

    /// Post-processes a fully assembled, unmasked payload per opcode
    /// (spec §4.2 step 7): UTF-8 validation for Text, close-code and
    /// reason extraction for Close. Binary/Ping/Pong/Continuation pass
    /// through unchanged.
    fn finish(header: HeaderBits, mut data: Vec<u8>) -> Result<Frame, Error> {
        let mut frame = Frame {
            op: header.op,
            fin: header.fin,
            rsv1: header.rsv1,
            rsv2: header.rsv2,
            rsv3: header.rsv3,
            data: Vec::new(),
            code: None,
        };

        match header.op {
            OpCode::Close => {
                if data.is_empty() {
                    // No status code at all: treat as 1005 locally, echo nothing.
                    frame.code = None;
                } else if data.len() == 1 {
                    return Err(Error::MissingCloseCode {
                        close_code: CloseCode::PROTOCOL_ERROR,
                    });
                } else {
                    let code = CloseCode(u16::from_be_bytes([data[0], data[1]]));
                    if !code.is_valid_on_wire() {
                        return Err(Error::InvalidCloseCode {
                            code: code.as_u16(),
                            close_code: CloseCode::PROTOCOL_ERROR,
                        });
                    }
                    let reason = data.split_off(2);
                    if std::str::from_utf8(&reason).is_err() {
                        return Err(Error::InvalidPayloadData {
                            close_code: CloseCode::INVALID_PAYLOAD_DATA,
                        });
                    }
                    frame.code = Some(code);
                    frame.data = reason;
                    return Ok(frame);
                }
                frame.data = data;
            }
            OpCode::Text => {
                if std::str::from_utf8(&data).is_err() {
                    return Err(Error::InvalidPayloadData {
                        close_code: CloseCode::INVALID_PAYLOAD_DATA,
                    });
                }
                frame.data = data;
            }
            OpCode::Binary | OpCode::Ping | OpCode::Pong | OpCode::Continue => {
                frame.data = data;
            }
        }

        Ok(frame)
    }
}

impl Parser for FrameReader {
    type Output = Frame;

    fn advance(&mut self, buf: &mut ParserBuffer) -> Result<Option<Frame>, Error> {
        loop {
            // Take ownership of the current stage up front so each arm
            // below works with owned values -- no borrow of `self.stage`
            // is ever live across the `self.stage = ...` that follows.
            match std::mem::replace(&mut self.stage, Stage::Header) {
                Stage::Header => {
                    let Some(bytes) = buf.try_take(2) else {
                        return Ok(None);
                    };
                    let (header, length_code, masked) = self.parse_header_byte(bytes[0], bytes[1])?;

                    self.stage = match length_code {
                        126 => Stage::ExtendedLength {
                            header,
                            ext_bytes: 2,
                        },
                        127 => Stage::ExtendedLength {
                            header,
                            ext_bytes: 8,
                        },
                        length => {
                            if masked {
                                Stage::MaskKey {
                                    header,
                                    length: length as u64,
                                }
                            } else {
                                self.enter_payload(header, None, length as u64)?
                            }
                        }
                    };
                }
                Stage::ExtendedLength { header, ext_bytes } => {
                    let Some(bytes) = buf.try_take(ext_bytes as usize) else {
                        self.stage = Stage::ExtendedLength { header, ext_bytes };
                        return Ok(None);
                    };
                    let length = if ext_bytes == 2 {
                        u16::from_be_bytes([bytes[0], bytes[1]]) as u64
                    } else {
                        u64::from_be_bytes(bytes[..8].try_into().unwrap())
                    };

                    self.stage = if header.masked {
                        Stage::MaskKey { header, length }
                    } else {
                        self.enter_payload(header, None, length)?
                    };
                }
                Stage::MaskKey { header, length } => {
                    let Some(bytes) = buf.try_take(4) else {
                        self.stage = Stage::MaskKey { header, length };
                        return Ok(None);
                    };
                    let mask = [bytes[0], bytes[1], bytes[2], bytes[3]];
                    self.stage = self.enter_payload(header, Some(mask), length)?;
                }
                Stage::Payload {
                    header,
                    mask,
                    length,
                } => {
                    let Some(bytes) = buf.try_take(length) else {
                        self.stage = Stage::Payload {
                            header,
                            mask,
                            length,
                        };
                        return Ok(None);
                    };
                    let mut data = bytes.to_vec();
                    if let Some(mask) = mask {
                        apply_mask(&mut data, mask);
                    }

                    self.stage = Stage::Header;
                    let frame = Self::finish(header, data)?;
                    trace!("parsed {:?} frame ({} byte payload)", frame.op, frame.data.len());
                    return Ok(Some(frame));
                }
            }
        }
    }
}

impl FrameReader {
    fn enter_payload(
        &self,
        header: HeaderBits,
        mask: Option<[u8; 4]>,
        length: u64,
    ) -> Result<Stage, Error> {
        if length as usize > self.max_message_size {
            return Err(Error::MaxMessageSize {
                close_code: CloseCode::MESSAGE_TOO_BIG,
            });
        }
        Ok(Stage::Payload {
            header,
            mask,
            length: length as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(reader: &mut FrameReader, bytes: &[u8]) -> Result<Frame, Error> {
        let mut buf = ParserBuffer::new();
        buf.extend(bytes);
        loop {
            if let Some(frame) = reader.advance(&mut buf)? {
                return Ok(frame);
            }
        }
    }

    #[test]
    fn parses_unmasked_text_frame() {
        // "Hello" text frame, unmasked, as a server would send it.
        let wire = [0x81, 0x05, 0x48, 0x65, 0x6c, 0x6c, 0x6f];
        let mut reader = FrameReader::new(16 << 20);
        let frame = feed_all(&mut reader, &wire).unwrap();
        assert_eq!(frame.op, OpCode::Text);
        assert!(frame.fin);
        assert_eq!(frame.data, b"Hello");
    }

    #[test]
    fn parses_byte_at_a_time() {
        let wire = [0x81, 0x05, 0x48, 0x65, 0x6c, 0x6c, 0x6f];
        let mut reader = FrameReader::new(16 << 20);
        let mut buf = ParserBuffer::new();
        let mut result = None;
        for byte in wire {
            buf.extend(&[byte]);
            if let Some(frame) = reader.advance(&mut buf).unwrap() {
                result = Some(frame);
            }
        }
        assert_eq!(result.unwrap().data, b"Hello");
    }

    #[test]
    fn close_with_no_payload_has_no_code() {
        let wire = [0x88, 0x00];
        let mut reader = FrameReader::new(16 << 20);
        let frame = feed_all(&mut reader, &wire).unwrap();
        assert_eq!(frame.op, OpCode::Close);
        assert_eq!(frame.code, None);
        assert!(frame.data.is_empty());
    }

    #[test]
    fn close_with_code_and_reason() {
        // close(1000, "bye")
        let mut wire = vec![0x88, 0x05, 0x03, 0xe8];
        wire.extend_from_slice(b"bye");
        let mut reader = FrameReader::new(16 << 20);
        let frame = feed_all(&mut reader, &wire).unwrap();
        assert_eq!(frame.code, Some(CloseCode::NORMAL_CLOSURE));
        assert_eq!(frame.data, b"bye");
    }

    #[test]
    fn close_with_single_byte_payload_is_protocol_error() {
        let wire = [0x88, 0x01, 0x03];
        let mut reader = FrameReader::new(16 << 20);
        let err = feed_all(&mut reader, &wire).unwrap_err();
        assert_eq!(err.close_code(), Some(CloseCode::PROTOCOL_ERROR));
    }

    #[test]
    fn text_frame_with_invalid_utf8_is_rejected() {
        let wire = [0x81, 0x02, 0xC0, 0xAF];
        let mut reader = FrameReader::new(16 << 20);
        let err = feed_all(&mut reader, &wire).unwrap_err();
        assert_eq!(err.close_code(), Some(CloseCode::INVALID_PAYLOAD_DATA));
    }

    #[test]
    fn reserved_bit_is_rejected() {
        let wire = [0xC1, 0x00]; // fin + rsv1 + text
        let mut reader = FrameReader::new(16 << 20);
        let err = feed_all(&mut reader, &wire).unwrap_err();
        assert_eq!(err.close_code(), Some(CloseCode::PROTOCOL_ERROR));
    }

    #[test]
    fn fragmented_control_frame_is_rejected() {
        let wire = [0x09, 0x00]; // ping, fin=0
        let mut reader = FrameReader::new(16 << 20);
        let err = feed_all(&mut reader, &wire).unwrap_err();
        assert_eq!(err.close_code(), Some(CloseCode::PROTOCOL_ERROR));
    }

    #[test]
    fn oversized_control_frame_is_rejected() {
        let mut wire = vec![0x89, 126, 0, 126];
        wire.extend(std::iter::repeat(0u8).take(126));
        let mut reader = FrameReader::new(16 << 20);
        let err = feed_all(&mut reader, &wire).unwrap_err();
        assert_eq!(err.close_code(), Some(CloseCode::PROTOCOL_ERROR));
    }

    #[test]
    fn masked_frame_round_trips_with_unmasking() {
        let mask = [0x37, 0xfa, 0x21, 0x3d];
        let mut data = b"Hello".to_vec();
        apply_mask(&mut data, mask);

        let mut wire = vec![0x81, 0x80 | 5];
        wire.extend_from_slice(&mask);
        wire.extend_from_slice(&data);

        let mut reader = FrameReader::new(16 << 20);
        let frame = feed_all(&mut reader, &wire).unwrap();
        assert_eq!(frame.data, b"Hello");
    }

    #[test]
    fn length_126_and_127_codecs() {
        for (len, prefix) in [(200usize, vec![0x82, 126, 0, 200]), (70000, {
            let mut p = vec![0x82u8, 127];
            p.extend_from_slice(&70000u64.to_be_bytes());
            p
        })] {
            let mut wire = prefix;
            wire.extend(std::iter::repeat(0xAB).take(len));
            let mut reader = FrameReader::new(1 << 30);
            let frame = feed_all(&mut reader, &wire).unwrap();
            assert_eq!(frame.data.len(), len);
        }
    }

    #[test]
    fn exceeding_max_message_size_closes_with_1009() {
        let wire = [0x82, 126, 0xFF, 0xFF]; // declares 65535 bytes, cap is tiny
        let mut reader = FrameReader::new(10);
        let mut buf = ParserBuffer::new();
        buf.extend(&wire);
        let err = reader.advance(&mut buf).unwrap_err();
        assert_eq!(err.close_code(), Some(CloseCode::MESSAGE_TOO_BIG));
    }
}
