//! A client-side WebSocket (RFC 6455) engine for the Tokio stack.
//!
//! This crate offers the wire protocol a thin application layer needs to
//! speak WebSocket against a real `ws://`/`wss://` endpoint: the HTTP
//! Upgrade handshake, an incremental frame parser fed by arbitrary network
//! chunks, a frame writer that masks every outbound payload, and the close
//! protocol that ties the two together. It does not do server-side accept,
//! permessage-deflate, or fragmentation reassembly across frames -- see
//! each module's docs for what it does and does not cover.

pub mod buffer;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod parser;
pub mod reader;
pub mod stream;
pub mod transport;
pub mod writer;

pub use client::{Client, ConnectionState};
pub use config::ClientConfig;
pub use error::Error;
pub use event::{Event, Hooks};
pub use frame::{CloseCode, Frame, OpCode};
