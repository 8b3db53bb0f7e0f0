//! The byte pump between a [`Transport`](crate::transport::Transport) and a
//! [`Parser`] (spec §4.1): owns the unconsumed-byte buffer, drives the
//! parser as far as buffered bytes allow, and tracks drain/close signals
//! for the writer and the client façade.
//!
//! The source expresses this as a coroutine that suspends on `read(n)`;
//! `Stream` realizes the same contract by splitting it into a pure,
//! synchronous half (`feed_bytes`, testable without any socket) and an
//! async half (`read_more`) that only touches the transport when the
//! buffer can't satisfy the parser on its own.

use crate::buffer::ParserBuffer;
use crate::error::Error;
use crate::parser::Parser;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Notify;

/// Outstanding unflushed write bytes above which `wait_until_drained`
/// suspends callers (spec §9 "Backpressure").
const HIGH_WATERMARK: usize = 1 << 20;
const LOW_WATERMARK: usize = HIGH_WATERMARK / 2;

const READ_CHUNK: usize = 8 * 1024;

pub struct Stream<T> {
    transport: T,
    buffer: ParserBuffer,
    pending_write_bytes: Arc<AtomicUsize>,
    drained: Arc<Notify>,
    closed: Arc<AtomicBool>,
    closed_notify: Arc<Notify>,
}

impl<T> Stream<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            buffer: ParserBuffer::new(),
            pending_write_bytes: Arc::new(AtomicUsize::new(0)),
            drained: Arc::new(Notify::new()),
            closed: Arc::new(AtomicBool::new(false)),
            closed_notify: Arc::new(Notify::new()),
        }
    }

    /// Appends `chunk` and drives `parser` until it can't make further
    /// progress without more input, invoking `on_output` for each value
    /// produced along the way (spec §4.1 `feed_bytes`). A parser error
    /// is returned to the caller rather than unwinding it -- the caller
    /// is the registered error handler.
    pub fn feed_bytes<P, F>(
        &mut self,
        chunk: &[u8],
        parser: &mut P,
        mut on_output: F,
    ) -> Result<(), Error>
    where
        P: Parser,
        F: FnMut(P::Output),
    {
        self.buffer.extend(chunk);
        loop {
            match parser.advance(&mut self.buffer)? {
                Some(output) => on_output(output),
                None => return Ok(()),
            }
        }
    }

    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.closed_notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Suspends until `mark_closed` has been called (spec §4.1
    /// `wait_until_closed`). Returns immediately if already closed.
    pub async fn wait_until_closed(&self) {
        loop {
            if self.is_closed() {
                return;
            }
            let notified = self.closed_notify.notified();
            if self.is_closed() {
                return;
            }
            notified.await;
        }
    }
}

impl<T: AsyncRead + Unpin> Stream<T> {
    /// Reads one chunk off the transport and feeds it to `buffer`. Returns
    /// `Ok(false)` on EOF (spec §4.1 `feed_eof`): a parser mid-frame at
    /// that point is the caller's cue to treat this as an abnormal close
    /// (local sentinel 1006), since nothing further will ever arrive.
    pub async fn read_more(&mut self) -> Result<bool, Error> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.transport.read(&mut chunk).await?;
        if n == 0 {
            self.mark_closed();
            return Ok(false);
        }
        self.buffer.extend(&chunk[..n]);
        Ok(true)
    }

    /// True once EOF has been observed and every buffered byte has been
    /// consumed by the parser -- i.e. nothing was left mid-frame.
    pub fn ended_cleanly(&self) -> bool {
        self.is_closed() && self.buffer.is_empty()
    }
}

impl<T: AsyncWrite + Unpin> Stream<T> {
    /// Hands `bytes` straight to the transport (spec §4.1 `write`):
    /// buffering beyond the OS socket buffer is the transport's problem,
    /// not this pump's.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.pending_write_bytes
            .fetch_add(bytes.len(), Ordering::SeqCst);
        let result = self.transport.write_all(bytes).await;
        let flushed = self.transport.flush().await;
        let remaining = self
            .pending_write_bytes
            .fetch_sub(bytes.len(), Ordering::SeqCst)
            - bytes.len();
        if remaining <= LOW_WATERMARK {
            self.drained.notify_waiters();
        }
        result?;
        flushed?;
        Ok(())
    }

    /// Shuts the write side of the transport down and marks this stream
    /// closed (spec §4.5: every close path ends with "close the
    /// transport").
    pub async fn shutdown(&mut self) -> Result<(), Error> {
        let result = self.transport.shutdown().await;
        self.mark_closed();
        result.map_err(Error::from)
    }

    /// Suspends while more than [`LOW_WATERMARK`] bytes are unflushed
    /// (spec §9 "Backpressure"). `FrameWriter::send_frame` awaits this
    /// after every write (spec §4.3 step 6, §5), so backpressure is
    /// applied on the send path without any higher layer having to ask.
    pub async fn wait_until_drained(&self) {
        loop {
            if self.pending_write_bytes.load(Ordering::SeqCst) <= LOW_WATERMARK {
                return;
            }
            let notified = self.drained.notified();
            if self.pending_write_bytes.load(Ordering::SeqCst) <= LOW_WATERMARK {
                return;
            }
            notified.await;
        }
    }
}
