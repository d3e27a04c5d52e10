//! The client-to-server masking transform.

/// XORs `key` cyclically over `payload`, in place.
///
/// Masking is its own inverse, the same call masks and unmasks.
pub fn unmask(payload: &mut [u8], key: [u8; 4]) {
    let mut chunks = payload.chunks_exact_mut(4);

    for chunk in &mut chunks {
        chunk[0] ^= key[0];
        chunk[1] ^= key[1];
        chunk[2] ^= key[2];
        chunk[3] ^= key[3];
    }

    // The remainder starts on a multiple of 4.
    for (byte, key) in chunks.into_remainder().iter_mut().zip(key) {
        *byte ^= key;
    }
}
