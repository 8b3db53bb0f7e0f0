//! A resumable parser driven by [`Stream`](crate::stream::Stream).
//!
//! The source this crate is modeled on expresses a parser as a routine
//! that yields each time it wants more bytes than are currently buffered
//! (spec §4.1, §9). Rust has no stable generators, so each parser here is
//! an explicit tagged state advanced one [`ParserBuffer`] pull at a time:
//! `advance` either returns the next state transition immediately (the
//! buffer had enough bytes) or leaves its internal state untouched and
//! returns `Ok(None)` (the buffer didn't) -- functionally the same
//! pull-model contract as the coroutine `read(n)`, just realized without
//! `yield`.

use crate::buffer::ParserBuffer;
use crate::error::Error;

/// A parser that can be registered on a [`Stream`](crate::stream::Stream).
/// `advance` is called every time new bytes are fed in, and may be called
/// several times per `feed_bytes` if more than one unit of output is fully
/// buffered already.
pub trait Parser {
    type Output;

    /// Drives the parser as far as the buffered bytes allow.
    ///
    /// - `Ok(Some(output))`: one complete unit parsed; implementations
    ///   must reset their internal stage so the next call starts fresh.
    /// - `Ok(None)`: not enough bytes yet; no bytes were consumed beyond
    ///   what was needed to make partial progress (e.g. the fixed header).
    /// - `Err`: a protocol violation. The caller decides what happens next
    ///   (typically: emit a Close with the attached code, tear down).
    fn advance(&mut self, buf: &mut ParserBuffer) -> Result<Option<Self::Output>, Error>;
}
