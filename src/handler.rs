//! Event sink for completed messages and control frames.
//!
//! The receiver calls exactly one [`EventHandler`] method per completed
//! message or control frame, in the order the frames were decoded.

use crate::error::Error;
use crate::message::CloseCode;
use crate::protocol::OpCode;

/// Frame-level details delivered alongside every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMeta {
    /// Opcode of the message (never `Continuation`).
    pub opcode: OpCode,
    /// RSV1 of the first fragment.
    pub compressed: bool,
    /// Whether the frames arrived masked.
    pub masked: bool,
    /// Number of physical frames the message was spread over.
    pub fragments: usize,
}

/// Receives decoded messages from a [`Receiver`](crate::connection::Receiver).
///
/// Only the data callbacks are required.
pub trait EventHandler {
    /// A complete, UTF-8 validated text message.
    fn on_text(&mut self, text: String, meta: &FrameMeta);

    /// A complete binary message.
    fn on_binary(&mut self, data: Vec<u8>, meta: &FrameMeta);

    /// A Close frame. An empty Close arrives as `(Normal, "")`.
    fn on_close(&mut self, code: CloseCode, reason: String, meta: &FrameMeta) {
        let _ = (code, reason, meta);
    }

    /// A Ping frame.
    fn on_ping(&mut self, data: Vec<u8>, meta: &FrameMeta) {
        let _ = (data, meta);
    }

    /// A Pong frame.
    fn on_pong(&mut self, data: Vec<u8>, meta: &FrameMeta) {
        let _ = (data, meta);
    }

    /// The connection failed. Called once; `code` is the status to send
    /// back in the closing Close frame.
    fn on_protocol_error(&mut self, error: &Error, code: CloseCode) {
        let _ = (error, code);
    }
}

/// One recorded callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `on_text`
    Text(String),
    /// `on_binary`
    Binary(Vec<u8>),
    /// `on_close`
    Close {
        /// Status code.
        code: u16,
        /// Reason text.
        reason: String,
    },
    /// `on_ping`
    Ping(Vec<u8>),
    /// `on_pong`
    Pong(Vec<u8>),
    /// `on_protocol_error`
    ProtocolError {
        /// Error description.
        message: String,
        /// Close code to answer with.
        code: u16,
    },
}

/// Handler that records every callback in order.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
    metas: Vec<Option<FrameMeta>>,
}

impl EventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Frame details of the event at `index`. `None` for protocol errors.
    #[must_use]
    pub fn meta(&self, index: usize) -> Option<&FrameMeta> {
        self.metas.get(index).and_then(Option::as_ref)
    }

    /// Remove and return everything recorded so far.
    pub fn take(&mut self) -> Vec<Event> {
        self.metas.clear();
        std::mem::take(&mut self.events)
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn push(&mut self, event: Event, meta: Option<FrameMeta>) {
        self.events.push(event);
        self.metas.push(meta);
    }
}

impl EventHandler for EventLog {
    fn on_text(&mut self, text: String, meta: &FrameMeta) {
        self.push(Event::Text(text), Some(*meta));
    }

    fn on_binary(&mut self, data: Vec<u8>, meta: &FrameMeta) {
        self.push(Event::Binary(data), Some(*meta));
    }

    fn on_close(&mut self, code: CloseCode, reason: String, meta: &FrameMeta) {
        self.push(
            Event::Close {
                code: code.as_u16(),
                reason,
            },
            Some(*meta),
        );
    }

    fn on_ping(&mut self, data: Vec<u8>, meta: &FrameMeta) {
        self.push(Event::Ping(data), Some(*meta));
    }

    fn on_pong(&mut self, data: Vec<u8>, meta: &FrameMeta) {
        self.push(Event::Pong(data), Some(*meta));
    }

    fn on_protocol_error(&mut self, error: &Error, code: CloseCode) {
        self.push(
            Event::ProtocolError {
                message: error.to_string(),
                code: code.as_u16(),
            },
            None,
        );
    }
}
