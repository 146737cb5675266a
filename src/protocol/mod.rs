//! Wire-level protocol pieces (RFC 6455): the frame codec, masking,
//! opcodes, header validation and UTF-8 checks.

pub mod frame;
pub mod mask;
pub mod opcode;
pub mod utf8;
pub mod validation;

pub use frame::{
    Frame, FrameHeader, MAX_CONTROL_FRAME_PAYLOAD, MAX_PAYLOAD_LEN, decode_header, decode_payload,
    encode_frame, encode_frame_with_mask, encoded_len,
};
pub use mask::{MaskGenerator, apply_mask, apply_mask_fast};
pub use opcode::OpCode;
pub use utf8::{is_valid_utf8, validate_utf8};
pub use validation::FrameValidator;
