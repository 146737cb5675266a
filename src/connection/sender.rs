//! Outgoing frame encoder.

use tracing::trace;

use crate::connection::Role;
use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseFrame, Message};
use crate::protocol::{Frame, MaskGenerator, OpCode, encode_frame_with_mask};

/// Encodes messages as single final frames, masked when the role requires.
#[derive(Debug, Clone)]
pub struct Sender {
    role: Role,
    masks: MaskGenerator,
    #[cfg(feature = "compression")]
    compression: Option<u32>,
}

impl Sender {
    /// Create a sender for `role`.
    #[must_use]
    pub fn new(role: Role) -> Self {
        Self {
            role,
            masks: MaskGenerator::new(),
            #[cfg(feature = "compression")]
            compression: None,
        }
    }

    /// Compress Text and Binary payloads at `level` and flag them with RSV1.
    ///
    /// Only enable this once permessage-deflate has been negotiated.
    #[cfg(feature = "compression")]
    #[must_use]
    pub fn with_compression(mut self, level: u32) -> Self {
        self.compression = Some(level);
        self
    }

    /// The role this sender encodes for.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Encode one message.
    ///
    /// # Errors
    ///
    /// - `Error::ControlFrameTooLarge` for a Ping, Pong or Close payload over 125 bytes
    /// - `Error::InvalidCloseCode` for a close code that may not be sent
    /// - `Error::UnsupportedLength` for a payload over 4 GiB
    pub fn encode(&mut self, message: Message) -> Result<Vec<u8>> {
        if let Message::Close(Some(close)) = &message {
            if !close.code.is_valid() {
                return Err(Error::InvalidCloseCode(close.code.as_u16()));
            }
        }

        let opcode = message.opcode();
        let payload = message.into_payload();
        trace!(%opcode, len = payload.len(), role = %self.role, "encoding frame");

        if opcode.is_control() {
            let mask = self.next_mask();
            return Frame::new(true, opcode, payload).encode(mask);
        }
        self.encode_data(opcode, payload)
    }

    /// Encode a Ping.
    ///
    /// # Errors
    ///
    /// See [`encode`](Self::encode).
    pub fn ping(&mut self, data: impl Into<Vec<u8>>) -> Result<Vec<u8>> {
        self.encode(Message::Ping(data.into()))
    }

    /// Encode a Pong.
    ///
    /// # Errors
    ///
    /// See [`encode`](Self::encode).
    pub fn pong(&mut self, data: impl Into<Vec<u8>>) -> Result<Vec<u8>> {
        self.encode(Message::Pong(data.into()))
    }

    /// Encode a Close with a status code and reason.
    ///
    /// # Errors
    ///
    /// See [`encode`](Self::encode).
    pub fn close(&mut self, code: CloseCode, reason: &str) -> Result<Vec<u8>> {
        self.encode(Message::Close(Some(CloseFrame::new(code, reason))))
    }

    fn encode_data(&mut self, opcode: OpCode, payload: Vec<u8>) -> Result<Vec<u8>> {
        #[cfg(feature = "compression")]
        if let Some(level) = self.compression {
            let compressed = crate::extensions::deflate::deflate_payload(&payload, level)?;
            let mask = self.next_mask();
            return Frame::new(true, opcode, compressed).with_rsv1(true).encode(mask);
        }

        match self.next_mask() {
            Some(key) => encode_frame_with_mask(&payload, opcode, key),
            None => Frame::new(true, opcode, payload).encode(None),
        }
    }

    fn next_mask(&mut self) -> Option<[u8; 4]> {
        self.role.must_mask().then(|| self.masks.next_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_frames_are_masked() {
        let mut sender = Sender::new(Role::Client);
        let bytes = sender.encode(Message::text("Hello")).unwrap();
        let (frame, used) = Frame::parse(&bytes).unwrap();

        assert_eq!(bytes[0], 0x81);
        assert_eq!(bytes[1], 0x85);
        assert_eq!(used, bytes.len());
        assert_eq!(frame.payload, b"Hello");
    }

    #[test]
    fn test_server_frames_are_unmasked() {
        let mut sender = Sender::new(Role::Server);
        let bytes = sender.encode(Message::binary(vec![1, 2, 3])).unwrap();
        assert_eq!(bytes, vec![0x82, 0x03, 1, 2, 3]);
    }

    #[test]
    fn test_close_frame_layout() {
        let mut sender = Sender::new(Role::Server);
        let bytes = sender.close(CloseCode::Normal, "bye").unwrap();
        assert_eq!(bytes, vec![0x88, 0x05, 0x03, 0xe8, b'b', b'y', b'e']);

        let empty = sender.encode(Message::Close(None)).unwrap();
        assert_eq!(empty, vec![0x88, 0x00]);
    }

    #[test]
    fn test_reserved_close_code_rejected() {
        let mut sender = Sender::new(Role::Client);
        assert_eq!(
            sender.close(CloseCode::Other(1005), ""),
            Err(Error::InvalidCloseCode(1005))
        );
    }

    #[test]
    fn test_oversized_ping_rejected() {
        let mut sender = Sender::new(Role::Client);
        assert_eq!(
            sender.ping(vec![0; 126]),
            Err(Error::ControlFrameTooLarge(126))
        );
        assert!(sender.ping(vec![0; 125]).is_ok());
    }

    #[test]
    fn test_pong_echoes_payload() {
        let mut sender = Sender::new(Role::Client);
        let bytes = sender.pong(b"beat".to_vec()).unwrap();
        let (frame, _) = Frame::parse(&bytes).unwrap();
        assert_eq!(frame.opcode, OpCode::Pong);
        assert!(frame.fin);
        assert_eq!(frame.payload, b"beat");
    }
}
