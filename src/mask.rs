//! Masking utility shared by the read and write paths.
//!
//! The teacher's read/write code used to repeat the same `byte ^= mask[i % 4]`
//! loop in three places with three different (and, on the read side, buggy)
//! offset bookkeeping schemes. This module is the single place that does it,
//! resumable across chunked reads.

use base64::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// XORs `buf` in place against `key`, as if `buf` were a slice of a larger
/// payload starting at `offset` bytes into that payload. Calling this
/// repeatedly over consecutive, non-overlapping slices of one payload (with
/// `offset` advancing by each slice's length) is equivalent to calling it once
/// over the whole payload — this is what lets `recv_into` unmask a frame's
/// payload across multiple short reads.
pub(crate) fn apply_mask(buf: &mut [u8], key: [u8; 4], offset: u64) {
    for (i, byte) in buf.iter_mut().enumerate() {
        let key_index = (offset + i as u64) % 4;
        *byte ^= key[key_index as usize];
    }
}

/// Returns a fresh per-connection CSPRNG seeded from OS entropy.
pub(crate) fn new_rng() -> StdRng {
    StdRng::from_rng(rand::thread_rng())
}

/// Generates a 4-byte mask key for one outbound client frame.
pub(crate) fn random_mask_key(rng: &mut StdRng) -> [u8; 4] {
    rng.random::<[u8; 4]>()
}

/// Generates the 16-byte nonce used for `Sec-WebSocket-Key`, base64-encoded.
pub(crate) fn random_handshake_nonce(rng: &mut StdRng) -> String {
    let nonce: [u8; 16] = rng.random();
    BASE64_STANDARD.encode(nonce)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masking_is_its_own_inverse() {
        let key = [0x11, 0x22, 0x33, 0x44];
        let original = b"a longer payload that spans more than one mask period".to_vec();

        let mut masked = original.clone();
        apply_mask(&mut masked, key, 0);
        assert_ne!(masked, original);

        let mut unmasked = masked;
        apply_mask(&mut unmasked, key, 0);
        assert_eq!(unmasked, original);
    }

    #[test]
    fn masking_is_resumable_across_chunk_boundaries() {
        let key = [0xAA, 0xBB, 0xCC, 0xDD];
        let original: Vec<u8> = (0u8..=255).collect();

        let mut whole = original.clone();
        apply_mask(&mut whole, key, 0);

        // Mirrors how `read.rs` advances `FrameCursor::consumed` call by call:
        // masking several consecutive slices with the running offset must equal
        // masking the whole payload at once.
        let mut consumed: u64 = 0;
        let mut rebuilt = original.clone();
        for chunk in rebuilt.chunks_mut(7) {
            apply_mask(chunk, key, consumed);
            consumed += chunk.len() as u64;
        }

        assert_eq!(rebuilt, whole);
    }
}
