//! Block-level content resynchronization (rsync-style signature/delta/patch).
//!
//! A receiver holding an old version of a stream (the *base*) sends per-block
//! signatures to a sender holding the new version (the *source*). The sender
//! scans the source against those signatures and answers with a compact delta
//! of Copy/Literal operations; replaying the delta against the base
//! reconstructs the source without ever transmitting it in full.
//!
//! Every component is a single-pass streaming state machine: only one rolling
//! window and the pending-literal buffer are resident during a scan, so
//! memory use is independent of stream length. All value objects
//! ([`SignatureSet`], [`Delta`]) are immutable once built, and independent
//! synchronization rounds can run concurrently without coordination.
//!
//! ```
//! use std::io::Cursor;
//!
//! let base = b"the quick brown fox jumps over the lazy dog";
//! let source = b"the quick brown cat jumps over the lazy dog";
//!
//! // Receiver side: describe the base.
//! let signatures = deltasync::generate_signatures(Cursor::new(base), 8)?;
//! let sig_payload = deltasync::encode_signatures(&signatures);
//!
//! // Sender side: scan the source against the decoded signatures.
//! let signatures = deltasync::decode_signatures(&sig_payload)?;
//! let delta = deltasync::compute_delta(&signatures, Cursor::new(source))?;
//! let delta_payload = deltasync::encode_delta(&delta);
//!
//! // Receiver side: reconstruct the source from base + delta.
//! let delta = deltasync::decode_delta(&delta_payload)?;
//! let mut reconstructed = Vec::new();
//! deltasync::apply_delta(Cursor::new(base), &delta, &mut reconstructed)?;
//! assert_eq!(reconstructed, source);
//! # Ok::<(), deltasync::SyncError>(())
//! ```

pub mod delta;
pub mod error;
pub mod patch;
pub mod rolling_hash;
pub mod signature;
pub mod strong_hash;
pub mod wire;

pub use delta::{Delta, DeltaEncoder, DeltaOp, DeltaStats};
pub use error::{Result, SyncError};
pub use patch::{apply_to_vec, PatchApplier};
pub use rolling_hash::RollingChecksum;
pub use signature::{Block, SignatureBuilder, SignatureIndex, SignatureSet, DEFAULT_BLOCK_SIZE};
pub use strong_hash::{StrongDigest, STRONG_LEN};
pub use wire::{decode_delta, decode_signatures, encode_delta, encode_signatures};

use std::io::{Read, Seek, Write};

/// Partition `base` into `block_size`-byte blocks and sign each one.
///
/// A zero-length base yields an empty signature set.
///
/// # Panics
///
/// Panics if `block_size` is zero.
pub fn generate_signatures<R: Read>(base: R, block_size: u32) -> Result<SignatureSet> {
    SignatureBuilder::new().block_size(block_size).build(base)
}

/// Scan `source` against `signatures` and produce the delta that rebuilds it
/// from the signed base.
pub fn compute_delta<R: Read>(signatures: &SignatureSet, source: R) -> Result<Delta> {
    let index = SignatureIndex::from_signature_set(signatures);
    DeltaEncoder::new(&index).encode(source)
}

/// Replay `delta` against the random-access `base`, writing the
/// reconstructed source to `out`. Returns the number of bytes written.
pub fn apply_delta<R, W>(mut base: R, delta: &Delta, mut out: W) -> Result<u64>
where
    R: Read + Seek,
    W: Write,
{
    PatchApplier::apply(&mut base, delta, &mut out)
}

/// Reads until `buf` is full or EOF, returning the number of bytes read.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}
