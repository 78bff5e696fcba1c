//! Strong hash used to confirm weak-checksum candidates.
//!
//! BLAKE3 truncated to 128 bits: collision probability is negligible for the
//! data volumes a synchronization round sees, and 16 bytes per block keeps
//! signature payloads small.

use serde::{Deserialize, Serialize};

/// Byte width of a strong digest on the wire.
pub const STRONG_LEN: usize = 16;

/// 128-bit strong digest of a byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrongDigest(pub [u8; STRONG_LEN]);

impl StrongDigest {
    /// Digest a contiguous byte range.
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(data);
        Self::finish(hasher)
    }

    /// Digest a window held in two pieces (a wrapped ring buffer).
    pub fn of_parts(front: &[u8], back: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(front);
        hasher.update(back);
        Self::finish(hasher)
    }

    fn finish(hasher: blake3::Hasher) -> Self {
        let full = hasher.finalize();
        let mut truncated = [0u8; STRONG_LEN];
        truncated.copy_from_slice(&full.as_bytes()[..STRONG_LEN]);
        Self(truncated)
    }

    pub fn as_bytes(&self) -> &[u8; STRONG_LEN] {
        &self.0
    }
}
