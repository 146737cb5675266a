//! Frame header decoding, payload unmasking and frame encoding (RFC 6455).
//!
//! All decoding functions work on a byte window of whatever length happens
//! to be buffered. A window that is too short yields
//! [`Error::IncompleteFrame`] with the number of bytes still missing; the
//! caller buffers more and retries. Nothing here keeps a reference to the
//! window past the call.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |                         Masking key (if present)              |
//! +---------------------------------------------------------------+
//! |                     Payload data                              |
//! +---------------------------------------------------------------+
//! ```

use bytes::BufMut;

use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::mask::{MaskGenerator, apply_mask_fast};

/// Maximum payload size for control frames.
pub const MAX_CONTROL_FRAME_PAYLOAD: u64 = 125;

/// Largest payload the 64-bit length field may announce.
pub const MAX_PAYLOAD_LEN: u64 = u32::MAX as u64;

/// Size of the extended length field selected by a 7-bit length indicator.
#[inline]
#[must_use]
pub const fn extended_len_size(indicator: u8) -> usize {
    match indicator {
        126 => 2,
        127 => 8,
        _ => 0,
    }
}

/// Total encoded size of a frame carrying `payload_len` bytes.
#[must_use]
pub const fn encoded_len(payload_len: usize, masked: bool) -> usize {
    let extended = if payload_len <= 125 {
        0
    } else if payload_len <= 0xFFFF {
        2
    } else {
        8
    };
    let mask = if masked { 4 } else { 0 };
    2 + extended + mask + payload_len
}

/// A decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// FIN bit: this frame completes the current message.
    pub fin: bool,
    /// RSV1. Marks a compressed message on its first fragment.
    pub rsv1: bool,
    /// RSV2.
    pub rsv2: bool,
    /// RSV3.
    pub rsv3: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// MASK bit.
    pub masked: bool,
    /// Payload length in bytes, never above [`MAX_PAYLOAD_LEN`].
    pub payload_len: u64,
    /// Masking key, present exactly when `masked` is set.
    pub mask: Option<[u8; 4]>,
    /// Bytes occupied by the header, including length extension and key.
    pub header_len: usize,
}

impl FrameHeader {
    /// Payload length as a buffer index.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedLength` if the length does not fit `usize`.
    #[inline]
    pub fn payload_size(&self) -> Result<usize> {
        usize::try_from(self.payload_len).map_err(|_| Error::UnsupportedLength(self.payload_len))
    }

    /// Header plus payload.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedLength` if the total does not fit `usize`.
    #[inline]
    pub fn frame_len(&self) -> Result<usize> {
        self.header_len
            .checked_add(self.payload_size()?)
            .ok_or(Error::UnsupportedLength(self.payload_len))
    }
}

/// Decode the header at the start of `window`.
///
/// # Errors
///
/// - `Error::IncompleteFrame` if the window ends inside the header
/// - `Error::ReservedOpcode` / `Error::InvalidOpcode` for an unknown opcode
/// - `Error::UnsupportedLength` if a 64-bit length has its high word set
pub fn decode_header(window: &[u8]) -> Result<FrameHeader> {
    if window.len() < 2 {
        return Err(Error::IncompleteFrame {
            needed: 2 - window.len(),
        });
    }

    let byte0 = window[0];
    let byte1 = window[1];

    let fin = byte0 & 0x80 != 0;
    let rsv1 = byte0 & 0x40 != 0;
    let rsv2 = byte0 & 0x20 != 0;
    let rsv3 = byte0 & 0x10 != 0;
    let opcode = OpCode::from_u8(byte0 & 0x0F)?;

    let masked = byte1 & 0x80 != 0;
    let indicator = byte1 & 0x7F;

    let length_end = 2 + extended_len_size(indicator);
    if window.len() < length_end {
        return Err(Error::IncompleteFrame {
            needed: length_end - window.len(),
        });
    }
    let payload_len = decode_length(indicator, &window[2..length_end])?;

    let header_len = if masked { length_end + 4 } else { length_end };
    if window.len() < header_len {
        return Err(Error::IncompleteFrame {
            needed: header_len - window.len(),
        });
    }

    let mask = masked.then(|| {
        [
            window[length_end],
            window[length_end + 1],
            window[length_end + 2],
            window[length_end + 3],
        ]
    });

    Ok(FrameHeader {
        fin,
        rsv1,
        rsv2,
        rsv3,
        opcode,
        masked,
        payload_len,
        mask,
        header_len,
    })
}

/// Resolve the payload length from the 7-bit indicator and its extension.
///
/// `extension` must hold exactly [`extended_len_size`] bytes.
fn decode_length(indicator: u8, extension: &[u8]) -> Result<u64> {
    match *extension {
        [] => Ok(u64::from(indicator)),
        [a, b] => Ok(u64::from(u16::from_be_bytes([a, b]))),
        [a, b, c, d, e, f, g, h] => {
            let len = u64::from_be_bytes([a, b, c, d, e, f, g, h]);
            if len > MAX_PAYLOAD_LEN {
                return Err(Error::UnsupportedLength(len));
            }
            Ok(len)
        }
        _ => Err(Error::InvalidFrame(format!(
            "length extension of {} bytes",
            extension.len()
        ))),
    }
}

/// Take the payload described by `header` from the front of `window` and
/// unmask it.
///
/// `window` starts at the first payload byte. Without a masking key the
/// payload passes through unchanged.
///
/// # Errors
///
/// Returns `Error::IncompleteFrame` if fewer than `payload_len` bytes are
/// available.
pub fn decode_payload(window: &[u8], header: &FrameHeader) -> Result<Vec<u8>> {
    let len = header.payload_size()?;
    if window.len() < len {
        return Err(Error::IncompleteFrame {
            needed: len - window.len(),
        });
    }
    let mut payload = window[..len].to_vec();
    if let Some(mask) = header.mask {
        apply_mask_fast(&mut payload, mask);
    }
    Ok(payload)
}

/// Encode a final, masked Text or Binary frame under a fresh random key.
///
/// The smallest length field that fits is used.
///
/// # Errors
///
/// - `Error::InvalidFrame` if `opcode` is not Text or Binary
/// - `Error::UnsupportedLength` if the payload exceeds [`MAX_PAYLOAD_LEN`]
pub fn encode_frame(payload: &[u8], opcode: OpCode) -> Result<Vec<u8>> {
    encode_frame_with_mask(payload, opcode, MaskGenerator::new().next_key())
}

/// [`encode_frame`] with a caller-chosen key.
///
/// RFC 6455 Section 5.3 requires the key to be unpredictable and new for
/// every frame. Pass a key from [`MaskGenerator`] unless the output must be
/// reproducible.
///
/// # Errors
///
/// Same as [`encode_frame`].
pub fn encode_frame_with_mask(payload: &[u8], opcode: OpCode, mask: [u8; 4]) -> Result<Vec<u8>> {
    if !opcode.starts_message() {
        return Err(Error::InvalidFrame(format!(
            "{opcode} cannot be sent as a data frame"
        )));
    }
    let mut out = Vec::with_capacity(encoded_len(payload.len(), true));
    write_frame(&mut out, true, false, opcode, payload, Some(mask))?;
    Ok(out)
}

/// Append one encoded frame to `out`.
pub(crate) fn write_frame(
    out: &mut Vec<u8>,
    fin: bool,
    rsv1: bool,
    opcode: OpCode,
    payload: &[u8],
    mask: Option<[u8; 4]>,
) -> Result<()> {
    let payload_len = payload.len() as u64;
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(Error::UnsupportedLength(payload_len));
    }

    let mut byte0 = opcode.as_u8();
    if fin {
        byte0 |= 0x80;
    }
    if rsv1 {
        byte0 |= 0x40;
    }
    out.put_u8(byte0);

    let mask_bit = if mask.is_some() { 0x80 } else { 0x00 };
    if payload_len <= 125 {
        out.put_u8(mask_bit | payload_len as u8);
    } else if payload_len <= 0xFFFF {
        out.put_u8(mask_bit | 126);
        out.put_u16(payload_len as u16);
    } else {
        out.put_u8(mask_bit | 127);
        out.put_u64(payload_len);
    }

    if let Some(key) = mask {
        out.put_slice(&key);
    }
    let start = out.len();
    out.put_slice(payload);
    if let Some(key) = mask {
        apply_mask_fast(&mut out[start..], key);
    }
    Ok(())
}

/// A complete frame: header flags plus unmasked payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// Compressed-message flag.
    pub rsv1: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Unmasked payload.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a new frame.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            fin,
            rsv1: false,
            opcode,
            payload,
        }
    }

    /// Set the RSV1 flag.
    #[must_use]
    pub fn with_rsv1(mut self, rsv1: bool) -> Self {
        self.rsv1 = rsv1;
        self
    }

    /// Decode a whole frame (header and payload) from `buf`.
    ///
    /// Returns the frame and the number of bytes consumed. Reserved bits
    /// other than RSV1 are not reported; run the header through a
    /// [`FrameValidator`](crate::protocol::FrameValidator) first when they matter.
    ///
    /// # Errors
    ///
    /// See [`decode_header`] and [`decode_payload`].
    pub fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        let header = decode_header(buf)?;
        let payload = decode_payload(&buf[header.header_len..], &header)?;
        let frame = Frame {
            fin: header.fin,
            rsv1: header.rsv1,
            opcode: header.opcode,
            payload,
        };
        Ok((frame, header.frame_len()?))
    }

    /// Encode this frame, masking it when a key is given.
    ///
    /// # Errors
    ///
    /// - `Error::ControlFrameTooLarge` for a control payload over 125 bytes
    /// - `Error::FragmentedControlFrame` for a control frame without FIN
    /// - `Error::UnsupportedLength` if the payload exceeds [`MAX_PAYLOAD_LEN`]
    pub fn encode(&self, mask: Option<[u8; 4]>) -> Result<Vec<u8>> {
        if self.opcode.is_control() {
            if !self.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if self.payload.len() as u64 > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(Error::ControlFrameTooLarge(self.payload.len() as u64));
            }
        }
        let mut out = Vec::with_capacity(self.wire_size(mask.is_some()));
        write_frame(
            &mut out,
            self.fin,
            self.rsv1,
            self.opcode,
            &self.payload,
            mask,
        )?;
        Ok(out)
    }

    /// Calculate the size needed to write this frame.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        encoded_len(self.payload.len(), masked)
    }
}
