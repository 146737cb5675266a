//! Messages and close codes as defined in RFC 6455.

use crate::error::{Error, Result};
use crate::protocol::OpCode;

/// WebSocket close status code per RFC 6455 Section 7.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CloseCode {
    /// Normal closure (1000).
    #[default]
    Normal,
    /// Going away (1001).
    GoingAway,
    /// Protocol error (1002). Malformed frame or state violation.
    ProtocolError,
    /// Unsupported data (1003).
    UnsupportedData,
    /// Invalid payload (1007). Non-UTF-8 text or a failed payload transform.
    InvalidPayload,
    /// Policy violation (1008).
    PolicyViolation,
    /// Message too big (1009).
    MessageTooBig,
    /// Mandatory extension (1010).
    MandatoryExtension,
    /// Internal error (1011).
    InternalError,
    /// Any other code, registered or not.
    Other(u16),
}

impl CloseCode {
    /// Map a wire value to its variant; unnamed codes become `Other`.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            other => CloseCode::Other(other),
        }
    }

    /// Wire value.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::Other(code) => *code,
        }
    }

    /// Whether this code may appear on the wire in a Close frame.
    ///
    /// Legal: 1000-1003, 1007-1014 and the 3000-4999 range for libraries and
    /// applications. 1004-1006 and 1015 are reserved for local use only.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        is_legal_close_code(self.as_u16())
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        CloseCode::from_u16(code)
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}

/// Registry lookup for close codes received from the peer.
#[inline]
#[must_use]
pub const fn is_legal_close_code(code: u16) -> bool {
    matches!(code, 1000..=1003 | 1007..=1014 | 3000..=4999)
}

/// Decoded body of a Close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// Status code.
    pub code: CloseCode,
    /// Human-readable reason (UTF-8, at most 123 bytes on the wire).
    pub reason: String,
}

impl CloseFrame {
    #[must_use]
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Parse the payload of a received Close frame.
    ///
    /// An empty payload means a normal closure with no reason.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidClosePayload` for a one-byte payload
    /// - `Error::InvalidCloseCode` if the code is not in the registry
    /// - `Error::InvalidUtf8` if the reason is not valid UTF-8
    pub fn parse(payload: &[u8]) -> Result<Self> {
        match payload.len() {
            0 => Ok(Self::new(CloseCode::Normal, String::new())),
            1 => Err(Error::InvalidClosePayload),
            _ => {
                let raw = u16::from_be_bytes([payload[0], payload[1]]);
                if !is_legal_close_code(raw) {
                    return Err(Error::InvalidCloseCode(raw));
                }
                let reason = std::str::from_utf8(&payload[2..])?;
                Ok(Self::new(CloseCode::from_u16(raw), reason))
            }
        }
    }

    /// Encode as a Close frame payload: big-endian code followed by the reason.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(2 + self.reason.len());
        data.extend_from_slice(&self.code.as_u16().to_be_bytes());
        data.extend_from_slice(self.reason.as_bytes());
        data
    }
}

/// A complete application-level message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Message {
    /// Validated UTF-8 text.
    Text(String),
    /// Arbitrary bytes.
    Binary(Vec<u8>),
    /// A ping frame (payload <= 125 bytes).
    Ping(Vec<u8>),
    /// A pong frame (payload <= 125 bytes).
    Pong(Vec<u8>),
    /// A close frame; `None` sends an empty close payload.
    Close(Option<CloseFrame>),
}

impl Message {
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Message::Text(s.into())
    }

    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Message::Binary(data.into())
    }

    /// Close with a status code and reason.
    #[must_use]
    pub fn close(code: CloseCode, reason: impl Into<String>) -> Self {
        Message::Close(Some(CloseFrame::new(code, reason)))
    }

    /// The opcode this message is sent with.
    #[must_use]
    pub const fn opcode(&self) -> OpCode {
        match self {
            Message::Text(_) => OpCode::Text,
            Message::Binary(_) => OpCode::Binary,
            Message::Ping(_) => OpCode::Ping,
            Message::Pong(_) => OpCode::Pong,
            Message::Close(_) => OpCode::Close,
        }
    }

    /// Ping, Pong and Close are control messages.
    #[must_use]
    pub const fn is_control(&self) -> bool {
        self.opcode().is_control()
    }

    /// Serialize the payload as it appears on the wire (before masking).
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        match self {
            Message::Text(s) => s.into_bytes(),
            Message::Binary(data) | Message::Ping(data) | Message::Pong(data) => data,
            Message::Close(Some(frame)) => frame.encode(),
            Message::Close(None) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_code_roundtrip() {
        for code in [1000, 1001, 1002, 1003, 1007, 1008, 1009, 1010, 1011, 3000] {
            assert_eq!(CloseCode::from_u16(code).as_u16(), code);
        }
        assert_eq!(CloseCode::from_u16(4999), CloseCode::Other(4999));
    }

    #[test]
    fn test_close_code_validity() {
        assert!(CloseCode::Normal.is_valid());
        assert!(CloseCode::InternalError.is_valid());
        assert!(CloseCode::Other(1012).is_valid());
        assert!(CloseCode::Other(1014).is_valid());
        assert!(CloseCode::Other(3000).is_valid());
        assert!(CloseCode::Other(4999).is_valid());

        for reserved in [0, 999, 1004, 1005, 1006, 1015, 2999, 5000] {
            assert!(!CloseCode::Other(reserved).is_valid(), "{reserved}");
        }
    }

    #[test]
    fn test_parse_empty_close_payload() {
        let frame = CloseFrame::parse(&[]).unwrap();
        assert_eq!(frame.code, CloseCode::Normal);
        assert_eq!(frame.reason, "");
    }

    #[test]
    fn test_parse_code_only() {
        let frame = CloseFrame::parse(&[0x03, 0xe8]).unwrap();
        assert_eq!(frame.code, CloseCode::Normal);
        assert!(frame.reason.is_empty());
    }

    #[test]
    fn test_parse_code_and_reason() {
        let frame = CloseFrame::parse(b"\x03\xe9bye").unwrap();
        assert_eq!(frame.code, CloseCode::GoingAway);
        assert_eq!(frame.reason, "bye");
    }

    #[test]
    fn test_parse_single_byte_rejected() {
        assert_eq!(CloseFrame::parse(&[0x03]), Err(Error::InvalidClosePayload));
    }

    #[test]
    fn test_parse_reserved_code_rejected() {
        // 1005 (No Status Received) must never appear on the wire.
        assert_eq!(
            CloseFrame::parse(&[0x03, 0xed]),
            Err(Error::InvalidCloseCode(1005))
        );
    }

    #[test]
    fn test_parse_invalid_reason_rejected() {
        assert_eq!(
            CloseFrame::parse(&[0x03, 0xe8, 0xff, 0xfe]),
            Err(Error::InvalidUtf8)
        );
    }

    #[test]
    fn test_encode_close_frame() {
        let frame = CloseFrame::new(CloseCode::Normal, "done");
        assert_eq!(frame.encode(), b"\x03\xe8done");
    }

    #[test]
    fn test_message_opcode() {
        assert_eq!(Message::text("a").opcode(), OpCode::Text);
        assert_eq!(Message::binary([1]).opcode(), OpCode::Binary);
        assert_eq!(Message::Ping(vec![]).opcode(), OpCode::Ping);
        assert!(Message::Close(None).is_control());
        assert!(!Message::text("a").is_control());
    }

    #[test]
    fn test_message_into_payload() {
        assert_eq!(Message::text("hi").into_payload(), b"hi");
        assert_eq!(
            Message::close(CloseCode::GoingAway, "").into_payload(),
            vec![0x03, 0xe9]
        );
        assert!(Message::Close(None).into_payload().is_empty());
    }
}
