//! Bit index derivation.
//!
//! ```text
//!     MD5(item) = d[0] d[1] ... d[15]
//!
//!     index i = u32_be(d[i], d[i+1], d[i+2], d[i+3]) mod bit_size
//!               (byte positions taken mod 16)
//! ```
//!
//! The layout is shared with every other writer of the same key, so it must
//! not change.

use md5::{Digest, Md5};

const DIGEST_LEN: usize = 16;

/// The `hash_count` bit offsets for `item` in a filter of `bit_size` bits.
pub(crate) fn bit_indices(item: &[u8], hash_count: u32, bit_size: u64) -> Vec<u64> {
    let digest = Md5::digest(item);
    let bytes = &digest[..];

    (0..hash_count as usize)
        .map(|i| {
            let word = u32::from_be_bytes([
                bytes[i % DIGEST_LEN],
                bytes[(i + 1) % DIGEST_LEN],
                bytes[(i + 2) % DIGEST_LEN],
                bytes[(i + 3) % DIGEST_LEN],
            ]);
            u64::from(word) % bit_size
        })
        .collect()
}
