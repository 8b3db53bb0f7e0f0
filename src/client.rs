//! Wires the handshake, reader, writer and event hooks into a single
//! connection handle (spec §4.6) and implements the close protocol
//! (spec §4.5).
//!
//! Grounded on the teacher's `split.rs`/`server.rs` shape: the transport is
//! split into a read half (driven by a dedicated pump loop) and a write
//! half behind `Arc<Mutex<_>>`, the same way the teacher's `WSWriter` wraps
//! its `Writer` so a connection can be sent on concurrently with the task
//! reading it (`server.rs`'s `tokio::spawn` of the reader loop alongside
//! the handed-back writer). Here the caller drives `run()` itself (spec §5:
//! "single-threaded cooperative... driven from a single task runner")
//! instead of the engine spawning its own task.

use crate::config::ClientConfig;
use crate::error::Error;
use crate::event::Hooks;
use crate::frame::{CloseCode, Frame, OpCode};
use crate::handshake::{build_request, read_response, HandshakeTarget};
use crate::mask::generate_sec_key;
use crate::reader::FrameReader;
use crate::stream::Stream;
use crate::transport::Transport;
use crate::writer::FrameWriter;
use log::{debug, error, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{split, AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{Mutex, Notify};

/// Connection lifecycle (spec §3 `ConnectionState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// A single client connection: owns the split transport, the frame
/// reader, and the registered event hooks.
pub struct Client<T> {
    read_stream: Stream<ReadHalf<T>>,
    write_stream: Arc<Mutex<Stream<WriteHalf<T>>>>,
    reader: FrameReader,
    config: ClientConfig,
    pub hooks: Hooks,
    state: ConnectionState,
    sent_close: bool,
    closed: Arc<AtomicBool>,
    closed_notify: Arc<Notify>,
}

impl Client<Transport> {
    /// Resolves `url`, performs the TCP/TLS connect and the HTTP Upgrade
    /// handshake, and returns a `Client` in the `Open` state (spec §4.4,
    /// §6 `connect(url, timeout=30)`).
    pub async fn connect(url: &str, hooks: Hooks) -> Result<Self, Error> {
        Self::connect_with_config(url, ClientConfig::default(), hooks).await
    }

    pub async fn connect_with_config(
        url: &str,
        config: ClientConfig,
        hooks: Hooks,
    ) -> Result<Self, Error> {
        let target = HandshakeTarget::parse(url)?;
        let sec_key = generate_sec_key();

        let mut transport = if target.use_tls {
            Transport::connect_tls(&target.host, target.port).await?
        } else {
            Transport::connect_plain(&target.host, target.port).await?
        };

        let request = build_request(&target, &sec_key);
        transport.write_all(request.as_bytes()).await?;
        read_response(&mut transport, &sec_key, config.handshake_timeout).await?;
        debug!("handshake with {url} succeeded, connection is Open");

        Ok(Self::from_transport(transport, config, hooks))
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> Client<T> {
    /// Builds a `Client` already past the handshake. Used by `connect` and
    /// directly by tests driving an in-memory duplex transport.
    fn from_transport(transport: T, config: ClientConfig, mut hooks: Hooks) -> Self {
        let (read_half, write_half) = split(transport);
        let reader = FrameReader::new(config.max_message_size);

        if let Some(on_open) = &mut hooks.on_open {
            on_open();
        }

        Self {
            read_stream: Stream::new(read_half),
            write_stream: Arc::new(Mutex::new(Stream::new(write_half))),
            reader,
            config,
            hooks,
            state: ConnectionState::Open,
            sent_close: false,
            closed: Arc::new(AtomicBool::new(false)),
            closed_notify: Arc::new(Notify::new()),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), Error> {
        let mut stream = self.write_stream.lock().await;
        FrameWriter::new(&mut stream, &self.config)
            .send_text(text, true)
            .await
    }

    pub async fn send_binary(&self, data: impl Into<Vec<u8>>) -> Result<(), Error> {
        let mut stream = self.write_stream.lock().await;
        FrameWriter::new(&mut stream, &self.config)
            .send_binary(data, true)
            .await
    }

    pub async fn ping(&self, data: impl Into<Vec<u8>>) -> Result<(), Error> {
        let mut stream = self.write_stream.lock().await;
        FrameWriter::new(&mut stream, &self.config)
            .ping(data, true)
            .await
    }

    pub async fn pong(&self, data: impl Into<Vec<u8>>) -> Result<(), Error> {
        let mut stream = self.write_stream.lock().await;
        FrameWriter::new(&mut stream, &self.config)
            .pong(data, true)
            .await
    }

    /// Sends a Close, waits up to `close_grace_period` for the peer's
    /// echo, then tears the transport down regardless (spec §4.5). A
    /// second call is a no-op (spec §4.5, §11 "idempotent close").
    pub async fn close(&mut self, code: CloseCode, reason: impl Into<Vec<u8>>) -> Result<(), Error> {
        if self.sent_close {
            return Ok(());
        }
        self.send_close_frame(code, reason.into()).await?;

        let _ = tokio::time::timeout(self.config.close_grace_period, self.wait_until_closed()).await;
        self.finish_close().await
    }

    /// Suspends until the connection has fully closed, either by the
    /// close protocol completing or by an abnormal transport closure.
    pub async fn wait_until_closed(&self) {
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return;
            }
            let notified = self.closed_notify.notified();
            if self.closed.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    /// Drives the read side: pulls bytes off the transport, parses
    /// frames, dispatches hooks, and runs the automatic parts of the
    /// close protocol (echo, auto-pong). Intended to be awaited (or
    /// spawned) as the connection's single task runner (spec §5).
    pub async fn run(&mut self) -> Result<(), Error> {
        loop {
            if self.state == ConnectionState::Closed {
                return Ok(());
            }

            match self.read_stream.read_more().await {
                Ok(true) => {}
                Ok(false) => {
                    self.handle_transport_closed().await;
                    return Ok(());
                }
                Err(err) => {
                    self.handle_transport_closed().await;
                    return Err(err);
                }
            }

            let mut frames = Vec::new();
            let mut reader =
                std::mem::replace(&mut self.reader, FrameReader::new(self.config.max_message_size));
            let parsed = self
                .read_stream
                .feed_bytes(&[], &mut reader, |frame| frames.push(frame));
            self.reader = reader;

            if let Err(err) = parsed {
                self.handle_protocol_error(err).await?;
                return Ok(());
            }

            for frame in frames {
                self.handle_frame(frame).await?;
                if self.state == ConnectionState::Closed {
                    return Ok(());
                }
            }
        }
    }

    async fn handle_frame(&mut self, frame: Frame) -> Result<(), Error> {
        self.hooks.dispatch(&frame);

        match frame.op {
            OpCode::Ping => {
                let mut stream = self.write_stream.lock().await;
                FrameWriter::new(&mut stream, &self.config)
                    .pong(frame.data, true)
                    .await?;
            }
            OpCode::Close => {
                self.handle_incoming_close(frame.code, frame.data).await?;
            }
            _ => {}
        }

        Ok(())
    }

    /// Receiving a Close while Open: echo one back (same code, or 1000 if
    /// the peer sent none) unless we already sent our own, then close
    /// (spec §4.5, §8 property 9).
    async fn handle_incoming_close(
        &mut self,
        code: Option<CloseCode>,
        reason: Vec<u8>,
    ) -> Result<(), Error> {
        if !self.sent_close {
            let echo_code = code.unwrap_or(CloseCode::NORMAL_CLOSURE);
            self.send_close_frame(echo_code, reason).await?;
        }
        self.finish_close().await
    }

    /// A protocol error from the reader: send Close with the error's code,
    /// then close (spec §4.2 Failure semantics, §7 ProtocolError).
    async fn handle_protocol_error(&mut self, err: Error) -> Result<(), Error> {
        warn!("protocol error, closing with {:?}: {err}", err.close_code());
        if let Some(code) = err.close_code() {
            if !self.sent_close {
                let _ = self.send_close_frame(code, Vec::new()).await;
            }
        }
        self.finish_close().await?;
        Err(err)
    }

    /// EOF or a transport-level read error: the local 1006 sentinel,
    /// never put on the wire (spec §7 Transport).
    async fn handle_transport_closed(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        error!("transport closed without a Close handshake, reporting 1006");
        self.state = ConnectionState::Closed;
        if let Some(on_close) = &mut self.hooks.on_close {
            on_close(Some(CloseCode::ABNORMAL_CLOSURE), b"");
        }
        self.closed.store(true, Ordering::SeqCst);
        self.closed_notify.notify_waiters();
    }

    async fn send_close_frame(&mut self, code: CloseCode, reason: Vec<u8>) -> Result<(), Error> {
        self.sent_close = true;
        self.state = ConnectionState::Closing;
        debug!("sending Close({code}), connection is now Closing");
        let mut stream = self.write_stream.lock().await;
        FrameWriter::new(&mut stream, &self.config)
            .close(code, reason, true)
            .await
    }

    async fn finish_close(&mut self) -> Result<(), Error> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        self.state = ConnectionState::Closed;
        {
            let mut stream = self.write_stream.lock().await;
            let _ = stream.shutdown().await;
        }
        self.closed.store(true, Ordering::SeqCst);
        self.closed_notify.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use tokio::io::AsyncReadExt;

    fn text_wire(text: &str) -> Vec<u8> {
        let mut out = vec![0x81, text.len() as u8];
        out.extend_from_slice(text.as_bytes());
        out
    }

    #[tokio::test]
    async fn receives_text_and_fires_on_text_hook() {
        let (client_half, mut server_half) = tokio::io::duplex(4096);
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let mut hooks = Hooks::default();
        hooks.on_text = Some(Box::new(move |text| {
            seen_clone.lock().unwrap().push(text.to_string());
        }));

        let mut client = Client::from_transport(client_half, ClientConfig::default(), hooks);

        server_half.write_all(&text_wire("Hello")).await.unwrap();
        // Close right after so `run` terminates on its own.
        server_half.write_all(&[0x88, 0x00]).await.unwrap();

        client.run().await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["Hello".to_string()]);
        assert_eq!(client.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn echoes_close_exactly_once() {
        let (client_half, mut server_half) = tokio::io::duplex(4096);
        let client = Client::from_transport(client_half, ClientConfig::default(), Hooks::default());
        let mut client = client;

        server_half.write_all(&[0x88, 0x00]).await.unwrap();

        client.run().await.unwrap();

        let mut echoed = [0u8; 2];
        server_half.read_exact(&mut echoed).await.unwrap();
        // fin=1, opcode=Close, masked, length 0.
        assert_eq!(echoed[0], 0x88);
        assert_eq!(echoed[1] & 0x80, 0x80);
        assert_eq!(echoed[1] & 0x7F, 0);

        assert_eq!(client.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn auto_pongs_a_received_ping() {
        let (client_half, mut server_half) = tokio::io::duplex(4096);
        let client = Client::from_transport(client_half, ClientConfig::default(), Hooks::default());
        let mut client = client;

        // Ping("hi") then Close so run() terminates.
        server_half.write_all(&[0x89, 0x02, b'h', b'i']).await.unwrap();
        server_half.write_all(&[0x88, 0x00]).await.unwrap();

        client.run().await.unwrap();

        let mut pong_header = [0u8; 2];
        server_half.read_exact(&mut pong_header).await.unwrap();
        assert_eq!(pong_header[0], 0x8A); // fin + Pong
        assert_eq!(pong_header[1] & 0x7F, 2);
    }

    #[tokio::test]
    async fn abnormal_eof_fires_on_close_with_local_sentinel() {
        let (client_half, server_half) = tokio::io::duplex(64);
        let seen = Arc::new(StdMutex::new(None));
        let seen_clone = seen.clone();

        let mut hooks = Hooks::default();
        hooks.on_close = Some(Box::new(move |code, _reason| {
            *seen_clone.lock().unwrap() = Some(code);
        }));

        let mut client = Client::from_transport(client_half, ClientConfig::default(), hooks);
        drop(server_half);

        client.run().await.unwrap();

        assert_eq!(*seen.lock().unwrap(), Some(Some(CloseCode::ABNORMAL_CLOSURE)));
        assert_eq!(client.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn second_close_call_is_a_no_op() {
        let (client_half, _server_half) = tokio::io::duplex(64);
        let mut config = ClientConfig::default();
        config.close_grace_period = std::time::Duration::from_millis(20);
        let mut client = Client::from_transport(client_half, config, Hooks::default());

        client.close(CloseCode::NORMAL_CLOSURE, "bye").await.unwrap();
        assert_eq!(client.state(), ConnectionState::Closed);
        // Already closed; must not attempt to write again.
        client.close(CloseCode::GOING_AWAY, "ignored").await.unwrap();
    }
}
