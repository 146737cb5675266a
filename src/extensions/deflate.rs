//! permessage-deflate payload transform (RFC 7692).
//!
//! Only the payload side lives here; offering and accepting the extension
//! during the HTTP upgrade is up to the transport. Every message is
//! compressed and inflated on its own, which matches the
//! `server_no_context_takeover` and `client_no_context_takeover` parameters.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;

use crate::error::{Error, Result};
use crate::extensions::{RsvBits, Transform, TransformFuture, ready};

/// Empty stored block that ends every sync-flushed message.
const DEFLATE_TRAILER: [u8; 4] = [0x00, 0x00, 0xff, 0xff];

/// Default zlib compression level.
pub const DEFAULT_LEVEL: u32 = 6;

/// Compress a whole message payload for a frame with RSV1 set.
///
/// The stream is sync-flushed and the trailing `00 00 FF FF` removed.
///
/// # Errors
///
/// - `Error::InvalidExtension` for a level above 9
/// - `Error::Transform` if the encoder fails
pub fn deflate_payload(payload: &[u8], level: u32) -> Result<Vec<u8>> {
    if level > 9 {
        return Err(Error::InvalidExtension(format!(
            "compression level must be 0-9, got {level}"
        )));
    }

    let mut encoder = DeflateEncoder::new(Vec::with_capacity(payload.len() / 2 + 8), Compression::new(level));
    encoder
        .write_all(payload)
        .and_then(|()| encoder.flush())
        .map_err(|e| Error::Transform(format!("compression failed: {e}")))?;
    let mut compressed = std::mem::take(encoder.get_mut());

    if compressed.ends_with(&DEFLATE_TRAILER) {
        compressed.truncate(compressed.len() - DEFLATE_TRAILER.len());
    }
    Ok(compressed)
}

/// Inflate a complete compressed message.
///
/// # Errors
///
/// - `Error::Transform` for a corrupt stream
/// - `Error::MessageTooLarge` if the output would exceed `max_size`
pub fn inflate_payload(data: &[u8], max_size: usize) -> Result<Vec<u8>> {
    let input = data.chain(&DEFLATE_TRAILER[..]);
    let limit = u64::try_from(max_size).unwrap_or(u64::MAX).saturating_add(1);
    let mut decoder = DeflateDecoder::new(input).take(limit);
    let mut inflated = Vec::new();
    decoder
        .read_to_end(&mut inflated)
        .map_err(|e| Error::Transform(format!("decompression failed: {e}")))?;

    if inflated.len() > max_size {
        return Err(Error::MessageTooLarge {
            size: inflated.len(),
            max: max_size,
        });
    }
    Ok(inflated)
}

/// Receive-side permessage-deflate.
///
/// Fragments of a compressed message are held back until the last one
/// arrives, then the whole message is inflated in one go. Uncompressed
/// messages pass straight through.
#[derive(Debug, Clone)]
pub struct DeflateTransform {
    pending: Vec<u8>,
    max_size: usize,
}

impl Default for DeflateTransform {
    fn default() -> Self {
        Self::new(crate::config::Limits::default().max_message_size)
    }
}

impl DeflateTransform {
    /// Create a transform that refuses to inflate beyond `max_size` bytes.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_size,
        }
    }

    /// Compressed bytes held for the open message.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }
}

impl Transform for DeflateTransform {
    fn name(&self) -> &str {
        "permessage-deflate"
    }

    fn rsv_bits(&self) -> RsvBits {
        RsvBits::RSV1
    }

    fn apply(&mut self, payload: Vec<u8>, is_last: bool, is_compressed: bool) -> TransformFuture<'_> {
        if !is_compressed {
            return ready(Ok(Some(payload)));
        }
        if self.pending.len() + payload.len() > self.max_size {
            let size = self.pending.len() + payload.len();
            return ready(Err(Error::MessageTooLarge {
                size,
                max: self.max_size,
            }));
        }

        self.pending.extend_from_slice(&payload);
        if !is_last {
            return ready(Ok(None));
        }

        let compressed = std::mem::take(&mut self.pending);
        ready(inflate_payload(&compressed, self.max_size).map(Some))
    }

    fn reset(&mut self) {
        self.pending.clear();
    }
}
