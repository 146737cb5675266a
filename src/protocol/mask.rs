//! Payload masking (RFC 6455 Section 5.3).
//!
//! `transformed-octet-i = original-octet-i XOR masking-key-octet-(i MOD 4)`.
//! XOR is its own inverse, so the same routines mask and unmask.

/// Byte-by-byte XOR masking.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Word-at-a-time XOR masking. Produces exactly the same output as
/// [`apply_mask`].
#[inline]
pub fn apply_mask_fast(data: &mut [u8], mask: [u8; 4]) {
    let mask_u32 = u32::from_ne_bytes(mask);
    let mut chunks = data.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ mask_u32;
        chunk.copy_from_slice(&word.to_ne_bytes());
    }
    // The tail starts at a multiple of four, so the key index restarts at 0.
    for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte ^= mask[i];
    }
}

/// Source of masking keys for outgoing frames.
///
/// Every key comes from the OS random source. If that source is unavailable
/// a seeded mixing counter takes over, so consecutive keys still differ.
#[derive(Debug, Clone)]
pub struct MaskGenerator {
    counter: u32,
}

impl Default for MaskGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MaskGenerator {
    /// Create a generator with a random fallback seed.
    #[must_use]
    pub fn new() -> Self {
        let mut seed = [0u8; 4];
        let counter = if getrandom::getrandom(&mut seed).is_ok() {
            u32::from_le_bytes(seed)
        } else {
            use std::time::{SystemTime, UNIX_EPOCH};
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u32)
                .unwrap_or(0x1234_5678)
        };
        Self { counter }
    }

    /// Produce the key for the next frame.
    pub fn next_key(&mut self) -> [u8; 4] {
        let mut key = [0u8; 4];
        if getrandom::getrandom(&mut key).is_ok() {
            return key;
        }
        self.counter = self.counter.wrapping_add(0x9E37_79B9);
        let a = self.counter.wrapping_mul(0x85EB_CA6B);
        let b = a ^ (a >> 13);
        b.wrapping_mul(0xC2B2_AE35).to_le_bytes()
    }
}
