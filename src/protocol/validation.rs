//! Header legality checks applied before a frame's payload is consumed.
//!
//! - Masking rules per RFC 6455 Section 5.1, when strict masking is on
//! - RSV bits per Section 5.2 (RSV1 only with a transform that claims it)
//! - Control frame constraints per Section 5.5
//! - Continuation sequencing per Section 5.4
//! - Frame size limits

use crate::config::Limits;
use crate::connection::Role;
use crate::error::{Error, Result};
use crate::protocol::frame::{FrameHeader, MAX_CONTROL_FRAME_PAYLOAD};
use crate::protocol::OpCode;

/// Frame validator for incoming WebSocket frames.
#[derive(Debug, Clone)]
pub struct FrameValidator {
    /// Connection role (Client or Server).
    role: Role,
    /// Size limits for frames.
    limits: Limits,
    /// Reject frames whose mask bit does not match the peer's role.
    strict_masking: bool,
    /// Whether a transform claims the RSV1 bit.
    rsv1_claimed: bool,
}

impl FrameValidator {
    /// Create a new frame validator.
    pub fn new(role: Role, limits: Limits) -> Self {
        Self {
            role,
            limits,
            strict_masking: false,
            rsv1_claimed: false,
        }
    }

    /// Require masked input on a server and unmasked input on a client.
    #[must_use]
    pub fn with_strict_masking(mut self, strict: bool) -> Self {
        self.strict_masking = strict;
        self
    }

    /// Allow RSV1 on the first fragment of data messages.
    #[must_use]
    pub fn with_rsv1(mut self, claimed: bool) -> Self {
        self.rsv1_claimed = claimed;
        self
    }

    /// Validate a decoded header.
    ///
    /// `in_message` tells whether a fragmented data message is currently open.
    ///
    /// # Errors
    ///
    /// - `Error::UnmaskedClientFrame` / `Error::MaskedServerFrame` on a masking
    ///   violation, with strict masking on
    /// - `Error::ReservedBitsSet` for RSV bits nothing has claimed
    /// - `Error::FragmentedControlFrame` / `Error::ControlFrameTooLarge` for bad control frames
    /// - `Error::ProtocolViolation` for a continuation out of sequence
    /// - `Error::FrameTooLarge` if the payload exceeds the frame limit
    pub fn validate(&self, header: &FrameHeader, in_message: bool) -> Result<()> {
        self.validate_masking(header.masked)?;
        self.validate_rsv_bits(header)?;

        if header.opcode.is_control() {
            self.validate_control(header)?;
        } else {
            validate_sequence(header.opcode, in_message)?;
        }

        self.limits.check_frame_size(header.payload_len)
    }

    fn validate_masking(&self, masked: bool) -> Result<()> {
        if !self.strict_masking || masked == self.role.expects_masked() {
            return Ok(());
        }
        match self.role {
            Role::Server => Err(Error::UnmaskedClientFrame),
            Role::Client => Err(Error::MaskedServerFrame),
        }
    }

    fn validate_rsv_bits(&self, header: &FrameHeader) -> Result<()> {
        if header.rsv2 || header.rsv3 {
            return Err(Error::ReservedBitsSet);
        }
        // The compression flag lives on the first fragment only.
        if header.rsv1 && !(self.rsv1_claimed && header.opcode.starts_message()) {
            return Err(Error::ReservedBitsSet);
        }
        Ok(())
    }

    fn validate_control(&self, header: &FrameHeader) -> Result<()> {
        if !header.fin {
            return Err(Error::FragmentedControlFrame);
        }
        if header.payload_len > MAX_CONTROL_FRAME_PAYLOAD {
            return Err(Error::ControlFrameTooLarge(header.payload_len));
        }
        Ok(())
    }
}

fn validate_sequence(opcode: OpCode, in_message: bool) -> Result<()> {
    match opcode {
        OpCode::Continuation if !in_message => Err(Error::ProtocolViolation(
            "Unexpected continuation frame".into(),
        )),
        OpCode::Text | OpCode::Binary if in_message => Err(Error::ProtocolViolation(
            "Expected continuation frame".into(),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode_header;

    fn header(bytes: &[u8]) -> FrameHeader {
        decode_header(bytes).unwrap()
    }

    fn client() -> FrameValidator {
        FrameValidator::new(Role::Client, Limits::default())
    }

    #[test]
    fn test_masking_is_permissive_by_default() {
        let masked = header(&[0x81, 0x80, 1, 2, 3, 4]);
        let unmasked = header(&[0x81, 0x00]);
        for role in [Role::Client, Role::Server] {
            let validator = FrameValidator::new(role, Limits::default());
            assert!(validator.validate(&masked, false).is_ok(), "{role}");
            assert!(validator.validate(&unmasked, false).is_ok(), "{role}");
        }
    }

    #[test]
    fn test_strict_server_rejects_unmasked_client_frame() {
        let validator =
            FrameValidator::new(Role::Server, Limits::default()).with_strict_masking(true);
        assert_eq!(
            validator.validate(&header(&[0x81, 0x00]), false),
            Err(Error::UnmaskedClientFrame)
        );
        assert!(validator
            .validate(&header(&[0x81, 0x80, 1, 2, 3, 4]), false)
            .is_ok());
    }

    #[test]
    fn test_strict_client_rejects_masked_server_frame() {
        let validator = client().with_strict_masking(true);
        assert_eq!(
            validator.validate(&header(&[0x81, 0x80, 1, 2, 3, 4]), false),
            Err(Error::MaskedServerFrame)
        );
        assert!(validator.validate(&header(&[0x81, 0x00]), false).is_ok());
    }

    #[test]
    fn test_rsv1_requires_claim() {
        assert_eq!(
            client().validate(&header(&[0xc1, 0x00]), false),
            Err(Error::ReservedBitsSet)
        );
        assert!(client()
            .with_rsv1(true)
            .validate(&header(&[0xc1, 0x00]), false)
            .is_ok());
    }

    #[test]
    fn test_rsv1_rejected_on_continuation_and_control() {
        let validator = client().with_rsv1(true);
        assert_eq!(
            validator.validate(&header(&[0xc0, 0x00]), true),
            Err(Error::ReservedBitsSet)
        );
        assert_eq!(
            validator.validate(&header(&[0xc9, 0x00]), false),
            Err(Error::ReservedBitsSet)
        );
    }

    #[test]
    fn test_rsv2_rsv3_always_rejected() {
        let validator = client().with_rsv1(true);
        for byte0 in [0xa1, 0x91] {
            assert_eq!(
                validator.validate(&header(&[byte0, 0x00]), false),
                Err(Error::ReservedBitsSet)
            );
        }
    }

    #[test]
    fn test_fragmented_control_frames_rejected() {
        for opcode in [0x08, 0x09, 0x0a] {
            assert_eq!(
                client().validate(&header(&[opcode, 0x00]), false),
                Err(Error::FragmentedControlFrame)
            );
        }
    }

    #[test]
    fn test_oversized_control_frame_rejected() {
        // Ping announcing 200 bytes through the 16-bit length field.
        assert_eq!(
            client().validate(&header(&[0x89, 0x7e, 0x00, 0xc8]), false),
            Err(Error::ControlFrameTooLarge(200))
        );
        assert!(client().validate(&header(&[0x89, 0x7d]), false).is_ok());
    }

    #[test]
    fn test_control_frames_allowed_inside_message() {
        assert!(client().validate(&header(&[0x89, 0x00]), true).is_ok());
    }

    #[test]
    fn test_continuation_sequencing() {
        assert!(matches!(
            client().validate(&header(&[0x80, 0x00]), false),
            Err(Error::ProtocolViolation(_))
        ));
        assert!(matches!(
            client().validate(&header(&[0x81, 0x00]), true),
            Err(Error::ProtocolViolation(_))
        ));
        assert!(client().validate(&header(&[0x80, 0x00]), true).is_ok());
    }

    #[test]
    fn test_frame_size_limit() {
        let validator = FrameValidator::new(Role::Client, Limits::new(100, 1000, 4));
        assert!(validator.validate(&header(&[0x82, 0x64]), false).is_ok());
        assert_eq!(
            validator.validate(&header(&[0x82, 0x65]), false),
            Err(Error::FrameTooLarge { size: 101, max: 100 })
        );
    }
}
