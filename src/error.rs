//! Error type shared by the codec, the state machine and the transforms.
//!
//! Apart from [`Error::IncompleteFrame`], which only asks for more bytes,
//! every variant ends the connection. [`Error::close_code`] says which
//! status to put in the Close frame sent back (RFC 6455 Section 7.4.1).

use thiserror::Error;

use crate::message::CloseCode;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Malformed frame, or a frame that cannot be encoded as asked.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Frame out of sequence for the current message.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Text message or close reason that is not UTF-8.
    #[error("Invalid UTF-8 payload")]
    InvalidUtf8,

    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// Reassembled (and transformed) message above the limit.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Too many fragments: {count} (max: {max})")]
    TooManyFragments { count: usize, max: usize },

    /// The connection already failed (with this close code) or closed.
    #[error("Connection closed: {0:?}")]
    ConnectionClosed(Option<u16>),

    #[error("I/O error: {0}")]
    Io(String),

    /// A payload transform rejected its input.
    #[error("Transform failed: {0}")]
    Transform(String),

    /// Transform registration or configuration problem.
    #[error("Invalid extension: {0}")]
    InvalidExtension(String),

    /// Close code outside the registry, or reserved for local use.
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),

    #[error("Close packets with data must be at least two bytes")]
    InvalidClosePayload,

    /// Opcode 0x3-0x7 or 0xB-0xF.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Close, Ping or Pong without FIN.
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(u64),

    /// A server received an unmasked frame.
    #[error("Client frame must be masked")]
    UnmaskedClientFrame,

    /// A client received a masked frame.
    #[error("Server frame must not be masked")]
    MaskedServerFrame,

    /// RSV bit set that no installed transform claims.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Not a failure: buffer at least `needed` more bytes and retry.
    #[error("Incomplete frame: need {needed} more bytes")]
    IncompleteFrame { needed: usize },

    /// Opcode value wider than four bits.
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// 64-bit length with its high 32 bits set.
    #[error("Unsupported payload length: {0} bytes (max: 4294967295)")]
    UnsupportedLength(u64),
}

impl Error {
    #[inline]
    #[must_use]
    pub const fn is_incomplete(&self) -> bool {
        matches!(self, Error::IncompleteFrame { .. })
    }

    /// Status code for the Close frame that fails the connection.
    ///
    /// 1007 for bad payload data, 1009 for configured size limits, 1011 for
    /// I/O trouble and 1002 for everything else. A length past the 4 GiB
    /// ceiling is malformed framing, so it is a 1002.
    #[must_use]
    pub const fn close_code(&self) -> CloseCode {
        match self {
            Error::InvalidUtf8 | Error::Transform(_) => CloseCode::InvalidPayload,
            Error::FrameTooLarge { .. }
            | Error::MessageTooLarge { .. }
            | Error::TooManyFragments { .. } => CloseCode::MessageTooBig,
            Error::Io(_) => CloseCode::InternalError,
            _ => CloseCode::ProtocolError,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            Error::TooManyFragments { count: 9, max: 8 }.to_string(),
            "Too many fragments: 9 (max: 8)"
        );
        assert_eq!(Error::ReservedOpcode(0xb).to_string(), "Reserved opcode: 0xb");
        assert_eq!(
            Error::InvalidClosePayload.to_string(),
            "Close packets with data must be at least two bytes"
        );
    }

    #[test]
    fn test_conversions() {
        let io: Error = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(matches!(io, Error::Io(_)));
        assert_eq!(io.close_code(), CloseCode::InternalError);

        let bad = [0xffu8];
        let utf8: Error = std::str::from_utf8(&bad).unwrap_err().into();
        assert_eq!(utf8, Error::InvalidUtf8);
    }

    #[test]
    fn test_incomplete_is_not_fatal() {
        assert!(Error::IncompleteFrame { needed: 2 }.is_incomplete());
        assert!(!Error::InvalidUtf8.is_incomplete());
    }

    #[test]
    fn test_close_code_mapping() {
        for err in [
            Error::FragmentedControlFrame,
            Error::ControlFrameTooLarge(200),
            Error::InvalidCloseCode(1005),
            Error::InvalidClosePayload,
            Error::ReservedOpcode(0x3),
            Error::ReservedBitsSet,
            Error::ProtocolViolation("x".into()),
            Error::UnsupportedLength(1 << 40),
        ] {
            assert_eq!(err.close_code().as_u16(), 1002, "{err}");
        }
        assert_eq!(Error::InvalidUtf8.close_code().as_u16(), 1007);
        assert_eq!(Error::Transform("bad".into()).close_code().as_u16(), 1007);
        assert_eq!(
            Error::MessageTooLarge { size: 2, max: 1 }.close_code().as_u16(),
            1009
        );
    }
}
