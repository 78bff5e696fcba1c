//! Patch application: replaying a delta against a random-access base.

use crate::delta::{Delta, DeltaOp};
use crate::error::{Result, SyncError};
use std::io::{Read, Seek, SeekFrom, Write};
use tracing::debug;

// Fixed copy buffer so memory stays bounded regardless of op lengths.
const COPY_BUF_LEN: usize = 8 * 1024;

/// Replays a [`Delta`] against a seekable base, writing the reconstructed
/// source to `out`.
pub struct PatchApplier;

impl PatchApplier {
    /// Apply `delta` in strict op order. Returns the number of bytes
    /// written, which always equals the sum of all op lengths.
    ///
    /// A Copy op that reaches outside the base's extent means the signature
    /// set is stale (the base has changed since it was built); reconstruction
    /// aborts with [`SyncError::OutOfRange`] rather than clamping the range.
    pub fn apply<R, W>(base: &mut R, delta: &Delta, out: &mut W) -> Result<u64>
    where
        R: Read + Seek,
        W: Write,
    {
        let base_len = base.seek(SeekFrom::End(0))?;
        let mut written = 0u64;
        let mut copy_buf = [0u8; COPY_BUF_LEN];

        for op in delta.ops() {
            match op {
                DeltaOp::Copy { offset, length } => {
                    match offset.checked_add(u64::from(*length)) {
                        Some(end) if end <= base_len => {}
                        _ => {
                            return Err(SyncError::OutOfRange {
                                offset: *offset,
                                length: *length,
                                base_len,
                            })
                        }
                    }

                    base.seek(SeekFrom::Start(*offset))?;
                    let mut remaining = *length as usize;
                    while remaining > 0 {
                        let n = remaining.min(copy_buf.len());
                        base.read_exact(&mut copy_buf[..n])?;
                        out.write_all(&copy_buf[..n])?;
                        remaining -= n;
                    }
                    written += u64::from(*length);
                }
                DeltaOp::Literal { bytes } => {
                    out.write_all(bytes)?;
                    written += bytes.len() as u64;
                }
            }
        }

        debug!(base_len, written, ops = delta.ops().len(), "patch applied");
        Ok(written)
    }
}

/// Apply a delta against an in-memory base, collecting the output.
pub fn apply_to_vec(base: &[u8], delta: &Delta) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(delta.output_len() as usize);
    PatchApplier::apply(&mut std::io::Cursor::new(base), delta, &mut out)?;
    Ok(out)
}
