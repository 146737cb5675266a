//! Receive-side state: per-frame read stage and per-message fragmentation.

use crate::handler::FrameMeta;
use crate::protocol::OpCode;
use crate::protocol::frame::extended_len_size;

/// Decoding stage of the frame currently being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReadState {
    /// Between frames, waiting for the two fixed header bytes.
    #[default]
    Idle,
    /// Waiting for the 16 or 64-bit extended length.
    AwaitingLengthExt,
    /// Waiting for the 4-byte masking key.
    AwaitingMask,
    /// Header complete, waiting for the payload.
    AwaitingPayload,
    /// A complete frame is being snapshotted and queued.
    Dispatching,
}

impl ReadState {
    /// Stage reached by a buffered window that does not yet hold a whole
    /// frame.
    #[must_use]
    pub fn of_partial(window: &[u8]) -> Self {
        let [_, byte1, ..] = *window else {
            return ReadState::Idle;
        };
        let length_end = 2 + extended_len_size(byte1 & 0x7F);
        let mask_end = if byte1 & 0x80 != 0 {
            length_end + 4
        } else {
            length_end
        };
        if window.len() < length_end {
            ReadState::AwaitingLengthExt
        } else if window.len() < mask_end {
            ReadState::AwaitingMask
        } else {
            ReadState::AwaitingPayload
        }
    }
}

impl std::fmt::Display for ReadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReadState::Idle => "idle",
            ReadState::AwaitingLengthExt => "awaiting-length",
            ReadState::AwaitingMask => "awaiting-mask",
            ReadState::AwaitingPayload => "awaiting-payload",
            ReadState::Dispatching => "dispatching",
        };
        f.write_str(name)
    }
}

/// Fragmentation state of one connection.
///
/// The flag fields describe the most recently decoded data frame and are
/// copied into a [`FrameSnapshot`] before the frame is queued.
/// `current_message` holds transformed fragment payloads and is only touched
/// when queued tasks run.
#[derive(Debug, Clone, Default)]
pub struct FragmentState {
    /// Masking mode of the frames received so far.
    pub masked: bool,
    /// Whether the last decoded data frame ended its message.
    pub last_fragment: bool,
    /// RSV1 of the open message's first fragment.
    pub compressed: bool,
    /// Opcode of the open message, `None` between messages.
    pub opcode: Option<OpCode>,
    /// Data frames decoded for the open message.
    pub fragment_count: usize,
    /// Transformed payloads waiting for the final fragment.
    pub current_message: Vec<Vec<u8>>,
    /// Total bytes in `current_message`.
    pub message_size: usize,
}

impl FragmentState {
    /// Create an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a fragmented message is open on the decode side.
    #[inline]
    #[must_use]
    pub fn in_message(&self) -> bool {
        self.opcode.is_some()
    }

    /// Record a decoded data frame.
    ///
    /// `opcode` is the frame's own opcode; a continuation inherits the
    /// opcode and compression flag of the first fragment.
    pub fn begin_fragment(&mut self, opcode: OpCode, fin: bool, rsv1: bool, masked: bool) {
        if opcode.starts_message() {
            self.opcode = Some(opcode);
            self.compressed = rsv1;
            self.fragment_count = 0;
        }
        self.fragment_count += 1;
        self.masked = masked;
        self.last_fragment = fin;
    }

    /// Immutable copy of the decode-time flags for a data frame.
    #[must_use]
    pub fn snapshot(&self, payload_len: usize) -> FrameSnapshot {
        FrameSnapshot {
            opcode: self.opcode.unwrap_or(OpCode::Continuation),
            last_fragment: self.last_fragment,
            compressed: self.compressed,
            masked: self.masked,
            fragment_index: self.fragment_count.saturating_sub(1),
            payload_len,
        }
    }

    /// Close the decode side of the message once its final frame is queued.
    pub fn end_message(&mut self) {
        self.opcode = None;
        self.compressed = false;
        self.fragment_count = 0;
    }

    /// Append a transformed fragment. Returns the new message size.
    pub fn push_output(&mut self, chunk: Vec<u8>) -> usize {
        self.message_size += chunk.len();
        if !chunk.is_empty() {
            self.current_message.push(chunk);
        }
        self.message_size
    }

    /// Concatenate and clear the accumulated payloads.
    pub fn take_message(&mut self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.message_size);
        for chunk in self.current_message.drain(..) {
            data.extend_from_slice(&chunk);
        }
        self.message_size = 0;
        data
    }

    /// Drop everything, including a half-received message.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Fragmentation flags as they were when one frame was decoded.
///
/// Passed by value into the queued task so later frames cannot change what
/// the task sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSnapshot {
    /// Message opcode; for control frames the frame's own opcode.
    pub opcode: OpCode,
    /// Whether this frame is the last of its message.
    pub last_fragment: bool,
    /// Compression flag inherited from the first fragment.
    pub compressed: bool,
    /// Whether the frame was masked.
    pub masked: bool,
    /// Zero-based position of the frame within its message.
    pub fragment_index: usize,
    /// Unmasked payload length.
    pub payload_len: usize,
}

impl FrameSnapshot {
    /// Snapshot of a control frame, which stands alone.
    #[must_use]
    pub fn control(opcode: OpCode, masked: bool, payload_len: usize) -> Self {
        Self {
            opcode,
            last_fragment: true,
            compressed: false,
            masked,
            fragment_index: 0,
            payload_len,
        }
    }

    /// Details handed to the event handler.
    #[must_use]
    pub fn meta(&self) -> FrameMeta {
        FrameMeta {
            opcode: self.opcode,
            compressed: self.compressed,
            masked: self.masked,
            fragments: self.fragment_index + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_state_of_partial_window() {
        assert_eq!(ReadState::of_partial(&[]), ReadState::Idle);
        assert_eq!(ReadState::of_partial(&[0x81]), ReadState::Idle);
        assert_eq!(ReadState::of_partial(&[0x81, 0x05]), ReadState::AwaitingPayload);
        assert_eq!(ReadState::of_partial(&[0x82, 0x7e, 0x01]), ReadState::AwaitingLengthExt);
        assert_eq!(ReadState::of_partial(&[0x82, 0xfe, 0x01, 0x00]), ReadState::AwaitingMask);
        assert_eq!(
            ReadState::of_partial(&[0x82, 0xff, 0, 0, 0, 0, 0, 0, 1, 0]),
            ReadState::AwaitingMask
        );
        assert_eq!(
            ReadState::of_partial(&[0x81, 0x85, 1, 2, 3, 4, 0x00]),
            ReadState::AwaitingPayload
        );
    }

    #[test]
    fn test_continuation_inherits_first_fragment_flags() {
        let mut state = FragmentState::new();
        state.begin_fragment(OpCode::Text, false, true, true);
        let first = state.snapshot(3);
        state.begin_fragment(OpCode::Continuation, true, false, true);
        let last = state.snapshot(2);

        assert_eq!(first.opcode, OpCode::Text);
        assert!(first.compressed && !first.last_fragment);
        assert_eq!(last.opcode, OpCode::Text);
        assert!(last.compressed && last.last_fragment);
        assert_eq!(last.fragment_index, 1);
        assert_eq!(last.meta().fragments, 2);
    }

    #[test]
    fn test_snapshot_is_detached_from_state() {
        let mut state = FragmentState::new();
        state.begin_fragment(OpCode::Binary, false, false, false);
        let snapshot = state.snapshot(1);
        state.end_message();
        state.begin_fragment(OpCode::Text, true, true, true);

        assert_eq!(snapshot.opcode, OpCode::Binary);
        assert!(!snapshot.compressed);
        assert!(!snapshot.last_fragment);
    }

    #[test]
    fn test_message_accumulation() {
        let mut state = FragmentState::new();
        assert_eq!(state.push_output(b"ab".to_vec()), 2);
        assert_eq!(state.push_output(Vec::new()), 2);
        assert_eq!(state.push_output(b"c".to_vec()), 3);
        assert_eq!(state.take_message(), b"abc");
        assert!(state.current_message.is_empty());
        assert_eq!(state.message_size, 0);
    }

    #[test]
    fn test_reset_discards_partial_message() {
        let mut state = FragmentState::new();
        state.begin_fragment(OpCode::Text, false, false, true);
        state.push_output(b"partial".to_vec());
        state.reset();
        assert!(!state.in_message());
        assert!(state.current_message.is_empty());
    }

    #[test]
    fn test_control_snapshot() {
        let snapshot = FrameSnapshot::control(OpCode::Ping, true, 4);
        assert!(snapshot.last_fragment);
        assert_eq!(snapshot.meta().fragments, 1);
        assert_eq!(snapshot.meta().opcode, OpCode::Ping);
    }
}
