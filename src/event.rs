//! The application-facing event type and callback slots a received frame
//! is dispatched through (spec §4.2, §6, §9).
//!
//! Grounded on the teacher's `event.rs` shape (a tagged enum plus a
//! channel-backed stream wrapper) but reworked per spec §9: instead of an
//! mpsc channel and a server-side `ID`, the client owns one connection and
//! dispatches straight through nullable hook slots -- "a record of optional
//! callables", the spec's own suggested realization for a typed language.

use crate::frame::{CloseCode, Frame, OpCode};

/// One dispatched event (spec §9: "the event type is a tagged union").
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close {
        code: Option<CloseCode>,
        reason: Vec<u8>,
    },
}

impl Event {
    /// Converts a validated, complete (`fin == true`) frame into its
    /// event. Returns `None` for fragmented data frames and Continuation
    /// frames: reassembly across frames is out of scope (spec §9 open
    /// question 3), so only `on_frame` sees those.
    pub fn from_frame(frame: &Frame) -> Option<Self> {
        if !frame.fin {
            return None;
        }
        match frame.op {
            OpCode::Text => Some(Event::Text(
                String::from_utf8(frame.data.clone()).expect("payload validated by FrameReader"),
            )),
            OpCode::Binary => Some(Event::Binary(frame.data.clone())),
            OpCode::Ping => Some(Event::Ping(frame.data.clone())),
            OpCode::Pong => Some(Event::Pong(frame.data.clone())),
            OpCode::Close => Some(Event::Close {
                code: frame.code,
                reason: frame.data.clone(),
            }),
            OpCode::Continue => None,
        }
    }
}

/// Nullable callback slots (spec §6 application API surface). Every field
/// is optional; `dispatch` invokes whichever are set, plus `on_frame` for
/// every frame regardless of `fin` -- the one hook that sees fragmented
/// and Continuation frames.
#[derive(Default)]
pub struct Hooks {
    pub on_open: Option<Box<dyn FnMut() + Send>>,
    pub on_frame: Option<Box<dyn FnMut(&Frame) + Send>>,
    pub on_text: Option<Box<dyn FnMut(&str) + Send>>,
    pub on_binary: Option<Box<dyn FnMut(&[u8]) + Send>>,
    pub on_ping: Option<Box<dyn FnMut(&[u8]) + Send>>,
    pub on_pong: Option<Box<dyn FnMut(&[u8]) + Send>>,
    pub on_close: Option<Box<dyn FnMut(Option<CloseCode>, &[u8]) + Send>>,
}

impl Hooks {
    pub fn dispatch(&mut self, frame: &Frame) {
        if let Some(hook) = &mut self.on_frame {
            hook(frame);
        }

        let Some(event) = Event::from_frame(frame) else {
            return;
        };

        match event {
            Event::Text(text) => {
                if let Some(hook) = &mut self.on_text {
                    hook(&text);
                }
            }
            Event::Binary(data) => {
                if let Some(hook) = &mut self.on_binary {
                    hook(&data);
                }
            }
            Event::Ping(data) => {
                if let Some(hook) = &mut self.on_ping {
                    hook(&data);
                }
            }
            Event::Pong(data) => {
                if let Some(hook) = &mut self.on_pong {
                    hook(&data);
                }
            }
            Event::Close { code, reason } => {
                if let Some(hook) = &mut self.on_close {
                    hook(code, &reason);
                }
            }
        }
    }
}
