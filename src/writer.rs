//! Serializes a [`Frame`] onto the wire, optionally masking it (spec §3,
//! §4.3; RFC 6455 §5.3 mandates masking on every frame a client sends).
//!
//! `send_frame` is the single choke point every convenience sender funnels
//! through, mirroring the source's writer shape (spec §11): validate,
//! encode, mask, write, await drain. Per spec §3 ownership ("the FrameWriter
//! holds a borrow on the Stream's outbound channel"), this writer never owns
//! a socket itself -- it borrows the [`Stream`] that does.
//!
//! Every send takes a `mask: bool`, matching `wsaio.writer.WebSocketWriter
//! .send_frame(frame, *, mask=False)` (spec §4.3: "The writer's `mask`
//! argument is exposed for flexibility"); the client façade is the only
//! caller, and it always passes `true`, per the same paragraph.

use crate::config::ClientConfig;
use crate::error::Error;
use crate::frame::{CloseCode, Frame, OpCode};
use crate::mask::{apply_mask, generate_mask};
use crate::stream::Stream;
use log::trace;
use tokio::io::AsyncWrite;

/// Serializes `frame` to its wire representation. When `mask` is true, a
/// fresh mask is generated and applied to the payload (and, for Close
/// frames, to the leading 2-byte code) and carried in the header; when
/// false, the payload is written verbatim and no mask key is emitted
/// (spec §4.3 steps 2-5).
fn encode(frame: &Frame, mask: bool) -> Vec<u8> {
    let mut payload = frame.data.clone();
    if frame.op == OpCode::Close {
        if let Some(code) = frame.code {
            let mut full = code.as_u16().to_be_bytes().to_vec();
            full.extend_from_slice(&payload);
            payload = full;
        }
    }

    let mask_key = mask.then(generate_mask);
    if let Some(key) = mask_key {
        apply_mask(&mut payload, key);
    }

    let mut out = Vec::with_capacity(payload.len() + 14);

    let first_byte = (frame.fin as u8) << 7
        | (frame.rsv1 as u8) << 6
        | (frame.rsv2 as u8) << 5
        | (frame.rsv3 as u8) << 4
        | frame.op.as_u8();
    out.push(first_byte);

    let len = payload.len();
    let mask_bit = (mask as u8) << 7;
    if len <= 125 {
        out.push(mask_bit | len as u8);
    } else if len <= 65535 {
        out.push(mask_bit | 126);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(mask_bit | 127);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }
    if let Some(key) = mask_key {
        out.extend_from_slice(&key);
    }
    out.extend_from_slice(&payload);
    out
}

/// Borrows a [`Stream`]'s outbound side for the duration of one or more
/// sends. Cheap to construct; the client façade builds one per call.
pub struct FrameWriter<'s, T> {
    stream: &'s mut Stream<T>,
    max_message_size: usize,
}

impl<'s, T: AsyncWrite + Unpin> FrameWriter<'s, T> {
    pub fn new(stream: &'s mut Stream<T>, config: &ClientConfig) -> Self {
        Self {
            stream,
            max_message_size: config.max_message_size,
        }
    }

    /// Validates, encodes, masks and writes `frame`, then awaits drain
    /// (spec §4.3 step 6, §5 "`FrameWriter.send_frame` awaits drain after
    /// emission"). Every other method on this type is a thin wrapper around
    /// this one (spec §11).
    pub async fn send_frame(&mut self, frame: Frame, mask: bool) -> Result<(), Error> {
        frame.validate()?;
        if frame.data.len() > self.max_message_size {
            return Err(Error::InvalidLocalFrame(
                "outgoing payload exceeds the configured maximum message size",
            ));
        }
        let bytes = encode(&frame, mask);
        trace!(
            "writing {:?} frame ({} wire bytes, mask={mask})",
            frame.op,
            bytes.len()
        );
        self.stream.write(&bytes).await?;
        self.stream.wait_until_drained().await;
        Ok(())
    }

    pub async fn send_text(&mut self, text: impl Into<String>, mask: bool) -> Result<(), Error> {
        self.send_frame(Frame::text(text), mask).await
    }

    pub async fn send_binary(&mut self, data: impl Into<Vec<u8>>, mask: bool) -> Result<(), Error> {
        self.send_frame(Frame::binary(data), mask).await
    }

    pub async fn ping(&mut self, data: impl Into<Vec<u8>>, mask: bool) -> Result<(), Error> {
        self.send_frame(Frame::ping(data), mask).await
    }

    pub async fn pong(&mut self, data: impl Into<Vec<u8>>, mask: bool) -> Result<(), Error> {
        self.send_frame(Frame::pong(data), mask).await
    }

    /// Idempotency of *sending at most one Close* is the `Client`'s job
    /// (spec §4.5, §11); this method always writes, regardless of
    /// history.
    pub async fn close(
        &mut self,
        code: CloseCode,
        reason: impl Into<Vec<u8>>,
        mask: bool,
    ) -> Result<(), Error> {
        self.send_frame(Frame::close(code, reason), mask).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::FrameReader;
    use crate::parser::Parser;

    async fn written_bytes(frame: Frame, mask: bool) -> Vec<u8> {
        let (client, mut server) = tokio::io::duplex(4096);
        let mut stream = Stream::new(client);
        let config = ClientConfig::default();
        let mut writer = FrameWriter::new(&mut stream, &config);
        writer.send_frame(frame, mask).await.unwrap();
        drop(stream);

        let mut out = Vec::new();
        use tokio::io::AsyncReadExt;
        let _ = server.read_to_end(&mut out).await;
        out
    }

    #[tokio::test]
    async fn text_frame_is_masked_and_round_trips() {
        let bytes = written_bytes(Frame::text("Hello"), true).await;

        // MASK bit must be set when mask=true.
        assert_ne!(bytes[1] & 0x80, 0);

        let mut buf = crate::buffer::ParserBuffer::new();
        buf.extend(&bytes);
        let mut reader = FrameReader::new(ClientConfig::default().max_message_size);
        let frame = reader.advance(&mut buf).unwrap().unwrap();
        assert_eq!(frame.op, OpCode::Text);
        assert_eq!(frame.data, b"Hello");
    }

    #[tokio::test]
    async fn text_frame_unmasked_round_trips() {
        // §8 property 1: parse(serialize(F, mask=m)) == F for both m=true
        // and m=false.
        let bytes = written_bytes(Frame::text("Hello"), false).await;

        // MASK bit must be clear when mask=false, and the payload must
        // appear verbatim right after the length header (no mask key).
        assert_eq!(bytes[1] & 0x80, 0);
        assert_eq!(&bytes[2..], b"Hello");

        let mut buf = crate::buffer::ParserBuffer::new();
        buf.extend(&bytes);
        let mut reader = FrameReader::new(ClientConfig::default().max_message_size);
        let frame = reader.advance(&mut buf).unwrap().unwrap();
        assert_eq!(frame.op, OpCode::Text);
        assert!(frame.fin);
        assert_eq!(frame.data, b"Hello");
    }

    #[tokio::test]
    async fn close_frame_carries_code_and_reason() {
        let bytes = written_bytes(Frame::close(CloseCode::NORMAL_CLOSURE, "bye"), true).await;

        let mut buf = crate::buffer::ParserBuffer::new();
        buf.extend(&bytes);
        let mut reader = FrameReader::new(ClientConfig::default().max_message_size);
        let frame = reader.advance(&mut buf).unwrap().unwrap();
        assert_eq!(frame.op, OpCode::Close);
        assert_eq!(frame.code, Some(CloseCode::NORMAL_CLOSURE));
        assert_eq!(frame.data, b"bye");
    }

    #[tokio::test]
    async fn invalid_local_frame_is_rejected_before_writing_anything() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut stream = Stream::new(client);
        let config = ClientConfig::default();
        let mut writer = FrameWriter::new(&mut stream, &config);

        let mut bad = Frame::ping(Vec::new());
        bad.fin = false; // control frames must not be fragmented

        let result = writer.send_frame(bad, true).await;
        assert!(matches!(result, Err(Error::InvalidLocalFrame(_))));

        drop(stream);
        let mut out = Vec::new();
        use tokio::io::AsyncReadExt;
        let _ = server.read_to_end(&mut out).await;
        assert!(out.is_empty());
    }
}
