//! Payload masking (RFC 6455 Section 5.3).
//!
//! Masking is a byte-wise XOR with `key[i % 4]`, so applying the same key
//! twice restores the original bytes.

/// Byte-by-byte XOR masking.
#[inline]
pub fn apply_mask(data: &mut [u8], key: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

/// Word-at-a-time masking. Produces exactly the same output as [`apply_mask`].
#[inline]
pub fn apply_mask_fast(data: &mut [u8], key: [u8; 4]) {
    let key_word = u32::from_ne_bytes(key);
    let mut chunks = data.chunks_exact_mut(4);

    for chunk in &mut chunks {
        let word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ key_word;
        chunk.copy_from_slice(&word.to_ne_bytes());
    }

    // Tail starts on a multiple of four, so key alignment is unchanged.
    for (byte, k) in chunks.into_remainder().iter_mut().zip(key) {
        *byte ^= k;
    }
}
