//! Delta computation: scanning a source stream against a signature index.
//!
//! Produces an ordered recipe of Copy/Literal operations that reconstructs
//! the source from the base plus the literal bytes carried in the delta.

use crate::error::Result;
use crate::read_full;
use crate::rolling_hash::RollingChecksum;
use crate::signature::SignatureIndex;
use crate::strong_hash::StrongDigest;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::Read;
use tracing::debug;

/// One reconstruction instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaOp {
    /// Copy `length` bytes from the base starting at `offset`.
    Copy { offset: u64, length: u32 },
    /// Insert bytes that were not found in the base.
    Literal { bytes: Vec<u8> },
}

impl DeltaOp {
    /// Number of output bytes this op produces.
    pub fn output_len(&self) -> u64 {
        match self {
            DeltaOp::Copy { length, .. } => u64::from(*length),
            DeltaOp::Literal { bytes } => bytes.len() as u64,
        }
    }
}

/// Ordered sequence of [`DeltaOp`]s.
///
/// Replaying the ops in order against the base reproduces the source exactly.
/// Immutable once built; consumed exactly once by the patch applier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    ops: Vec<DeltaOp>,
}

impl Delta {
    pub(crate) fn from_ops(ops: Vec<DeltaOp>) -> Self {
        Self { ops }
    }

    pub fn ops(&self) -> &[DeltaOp] {
        &self.ops
    }

    /// Total length of the reconstructed output.
    pub fn output_len(&self) -> u64 {
        self.ops.iter().map(DeltaOp::output_len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Count how many bytes are copied vs carried literally.
    pub fn stats(&self) -> DeltaStats {
        let mut stats = DeltaStats::default();

        for op in &self.ops {
            match op {
                DeltaOp::Copy { length, .. } => {
                    stats.copied_bytes += u64::from(*length);
                    stats.copy_ops += 1;
                }
                DeltaOp::Literal { bytes } => {
                    stats.literal_bytes += bytes.len() as u64;
                    stats.literal_ops += 1;
                }
            }
        }

        stats
    }
}

/// Byte and op counts for a delta.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeltaStats {
    pub copied_bytes: u64,
    pub literal_bytes: u64,
    pub copy_ops: usize,
    pub literal_ops: usize,
}

impl DeltaStats {
    /// Fraction of the output that could be copied from the base.
    pub fn copy_ratio(&self) -> f64 {
        let total = self.copied_bytes + self.literal_bytes;
        if total == 0 {
            return 0.0;
        }
        self.copied_bytes as f64 / total as f64
    }
}

impl std::fmt::Display for DeltaStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} copied ({:.1}%), {} literal, {} ops",
            self.copied_bytes,
            self.copy_ratio() * 100.0,
            self.literal_bytes,
            self.copy_ops + self.literal_ops
        )
    }
}

/// Scans a source stream against a [`SignatureIndex`] and emits a [`Delta`].
///
/// Single-pass and single-threaded; only the rolling window and the
/// pending-literal buffer are held in memory. The unmatched path reads the
/// source one byte at a time, so callers with unbuffered sources should wrap
/// them in [`std::io::BufReader`].
pub struct DeltaEncoder<'a> {
    index: &'a SignatureIndex<'a>,
    block_size: usize,
}

impl<'a> DeltaEncoder<'a> {
    pub fn new(index: &'a SignatureIndex<'a>) -> Self {
        let block_size = index.block_size() as usize;
        assert!(block_size >= 1, "block size must be at least 1");
        Self { index, block_size }
    }

    /// Scan `source` and produce the delta. Read errors abort the scan; a
    /// partial delta is never returned.
    pub fn encode<R: Read>(&self, mut source: R) -> Result<Delta> {
        let mut ops: Vec<DeltaOp> = Vec::new();
        let mut pending: Vec<u8> = Vec::new();
        let mut window: VecDeque<u8> = VecDeque::with_capacity(self.block_size);
        let mut rolling = RollingChecksum::new(self.block_size);
        let mut fill_buf = vec![0u8; self.block_size];

        self.refill(&mut source, &mut window, &mut fill_buf)?;
        let mut window_full = window.len() == self.block_size;
        if window_full {
            Self::prime(&mut rolling, &window);
        }

        while !window.is_empty() {
            let weak = if window_full {
                rolling.value()
            } else {
                // Past the last full window the stream can no longer refill;
                // recompute over the shrinking tail so a short final base
                // block can still match.
                let (front, back) = window.as_slices();
                let mut tail = RollingChecksum::new(window.len());
                tail.update(front);
                tail.update(back);
                tail.value()
            };

            if let Some((offset, length)) = self.find_match(weak, &window) {
                if !pending.is_empty() {
                    ops.push(DeltaOp::Literal {
                        bytes: std::mem::take(&mut pending),
                    });
                }
                ops.push(DeltaOp::Copy { offset, length });

                // The whole matched window is consumed; restart at the new
                // cursor.
                window.clear();
                self.refill(&mut source, &mut window, &mut fill_buf)?;
                window_full = window.len() == self.block_size;
                if window_full {
                    rolling.reset();
                    Self::prime(&mut rolling, &window);
                }
            } else {
                let departing = window.pop_front().expect("window is non-empty");
                pending.push(departing);

                if window_full {
                    match read_one(&mut source)? {
                        Some(arriving) => {
                            window.push_back(arriving);
                            rolling.roll(departing, arriving);
                        }
                        None => window_full = false,
                    }
                }
            }
        }

        if !pending.is_empty() {
            ops.push(DeltaOp::Literal { bytes: pending });
        }

        let delta = Delta::from_ops(ops);
        debug!(
            block_size = self.block_size,
            ops = delta.ops.len(),
            output_len = delta.output_len(),
            "delta computed"
        );
        Ok(delta)
    }

    /// First candidate in ascending sequence order whose length and strong
    /// digest both match the window. The strong digest of the window is
    /// computed at most once per position.
    fn find_match(&self, weak: u32, window: &VecDeque<u8>) -> Option<(u64, u32)> {
        let window_len = window.len() as u32;
        let mut strong: Option<StrongDigest> = None;

        for candidate in self.index.lookup(weak) {
            if candidate.length != window_len {
                continue;
            }
            let digest = *strong.get_or_insert_with(|| {
                let (front, back) = window.as_slices();
                StrongDigest::of_parts(front, back)
            });
            if candidate.strong == digest {
                return Some((candidate.offset, candidate.length));
            }
        }

        None
    }

    fn refill<R: Read>(
        &self,
        source: &mut R,
        window: &mut VecDeque<u8>,
        fill_buf: &mut [u8],
    ) -> Result<()> {
        debug_assert!(window.is_empty());
        let read = read_full(source, fill_buf)?;
        window.extend(&fill_buf[..read]);
        Ok(())
    }

    fn prime(rolling: &mut RollingChecksum, window: &VecDeque<u8>) {
        let (front, back) = window.as_slices();
        rolling.update(front);
        rolling.update(back);
    }
}

fn read_one<R: Read>(source: &mut R) -> Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match source.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
}
