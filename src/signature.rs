//! Block signatures describing a base stream.
//!
//! The base is partitioned into fixed-size blocks (the last may be short);
//! each block gets a weak rolling checksum and a strong digest. The
//! resulting signature set is enough for the sending side to detect which
//! base blocks reappear in a newer stream.

use crate::error::Result;
use crate::read_full;
use crate::rolling_hash::RollingChecksum;
use crate::strong_hash::StrongDigest;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use tracing::debug;

/// Default block size (4 KiB). Every operation still takes the block size
/// explicitly; this is only a convenient starting point.
pub const DEFAULT_BLOCK_SIZE: u32 = 4096;

/// Signature of a single base block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position of this block in the signature set (0-based, strictly
    /// increasing, matching array position).
    pub sequence: u32,
    /// Byte offset of the block in the base stream.
    pub offset: u64,
    /// Block length; equals the set's block size except possibly for the
    /// final block.
    pub length: u32,
    /// Weak rolling checksum of the block contents.
    pub weak: u32,
    /// Strong digest confirming a weak match.
    pub strong: StrongDigest,
}

impl Block {
    fn from_chunk(sequence: u32, offset: u64, chunk: &[u8]) -> Self {
        Self {
            sequence,
            offset,
            length: chunk.len() as u32,
            weak: RollingChecksum::checksum(chunk),
            strong: StrongDigest::of(chunk),
        }
    }
}

/// Immutable per-block signature metadata for one base stream.
///
/// Built once per synchronization round and never mutated afterward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSet {
    block_size: u32,
    blocks: Vec<Block>,
}

impl SignatureSet {
    pub(crate) fn new(block_size: u32, blocks: Vec<Block>) -> Self {
        Self { block_size, blocks }
    }

    /// Block size the set was built with.
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// A zero-length base yields an empty set; that is a valid degenerate
    /// case, not an error.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Builds a [`SignatureSet`] from a forward-sequential read of the base.
pub struct SignatureBuilder {
    block_size: u32,
}

impl SignatureBuilder {
    /// Create a builder with the default block size.
    pub fn new() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    /// Set the block size.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn block_size(mut self, size: u32) -> Self {
        assert!(size >= 1, "block size must be at least 1");
        self.block_size = size;
        self
    }

    /// Read the base sequentially in non-overlapping chunks and sign each
    /// one. A read error aborts the build; a partial set is never returned.
    pub fn build<R: Read>(&self, mut base: R) -> Result<SignatureSet> {
        let mut blocks = Vec::new();
        let mut chunk = vec![0u8; self.block_size as usize];
        let mut offset = 0u64;
        let mut sequence = 0u32;

        loop {
            let read = read_full(&mut base, &mut chunk)?;
            if read == 0 {
                break;
            }

            blocks.push(Block::from_chunk(sequence, offset, &chunk[..read]));
            offset += read as u64;
            sequence += 1;

            // A short chunk means EOF.
            if read < chunk.len() {
                break;
            }
        }

        debug!(
            block_size = self.block_size,
            blocks = blocks.len(),
            base_len = offset,
            "signature set built"
        );

        Ok(SignatureSet::new(self.block_size, blocks))
    }
}

impl Default for SignatureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Weak-checksum lookup structure over a [`SignatureSet`], used only during
/// delta computation. Never mutated after construction.
pub struct SignatureIndex<'a> {
    set: &'a SignatureSet,
    by_weak: HashMap<u32, Vec<usize>>,
}

impl<'a> SignatureIndex<'a> {
    pub fn from_signature_set(set: &'a SignatureSet) -> Self {
        let mut by_weak: HashMap<u32, Vec<usize>> = HashMap::new();

        // Blocks are visited in sequence order, so each bucket stays sorted
        // by ascending sequence, which fixes the match tie-break.
        for (idx, block) in set.blocks().iter().enumerate() {
            by_weak.entry(block.weak).or_default().push(idx);
        }

        Self { set, by_weak }
    }

    /// All blocks sharing `weak`, in ascending sequence order. Possibly more
    /// than one: duplicate base content, or a weak-checksum collision.
    pub fn lookup(&self, weak: u32) -> impl Iterator<Item = &Block> + '_ {
        self.by_weak
            .get(&weak)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|&idx| &self.set.blocks()[idx])
    }

    pub fn block_size(&self) -> u32 {
        self.set.block_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn partitions_into_fixed_blocks() {
        let data = b"AAAABBBBCCCCDD";
        let set = SignatureBuilder::new()
            .block_size(4)
            .build(Cursor::new(data))
            .unwrap();

        assert_eq!(set.block_size(), 4);
        assert_eq!(set.block_count(), 4);

        for (i, block) in set.blocks().iter().enumerate() {
            assert_eq!(block.sequence, i as u32);
            assert_eq!(block.offset, i as u64 * 4);
        }

        // Final block is short.
        assert_eq!(set.blocks()[3].length, 2);
        assert_eq!(set.blocks()[3].weak, RollingChecksum::checksum(b"DD"));
        assert_eq!(set.blocks()[3].strong, StrongDigest::of(b"DD"));
    }

    #[test]
    fn exact_multiple_has_no_short_block() {
        let data = b"AAAABBBB";
        let set = SignatureBuilder::new()
            .block_size(4)
            .build(Cursor::new(data))
            .unwrap();

        assert_eq!(set.block_count(), 2);
        assert!(set.blocks().iter().all(|b| b.length == 4));
    }

    #[test]
    fn empty_base_yields_empty_set() {
        let set = SignatureBuilder::new()
            .block_size(4)
            .build(Cursor::new(b""))
            .unwrap();

        assert!(set.is_empty());
        assert_eq!(set.block_size(), 4);
    }

    #[test]
    fn index_returns_candidates_in_sequence_order() {
        // Repeated content: every block has the same checksums.
        let data = b"AAAA".repeat(5);
        let set = SignatureBuilder::new()
            .block_size(4)
            .build(Cursor::new(&data))
            .unwrap();
        let index = SignatureIndex::from_signature_set(&set);

        let weak = set.blocks()[0].weak;
        let sequences: Vec<u32> = index.lookup(weak).map(|b| b.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn index_misses_unknown_weak() {
        let set = SignatureBuilder::new()
            .block_size(4)
            .build(Cursor::new(b"AAAABBBB"))
            .unwrap();
        let index = SignatureIndex::from_signature_set(&set);

        let known: Vec<u32> = set.blocks().iter().map(|b| b.weak).collect();
        let unknown = (0..).find(|w| !known.contains(w)).unwrap();
        assert_eq!(index.lookup(unknown).count(), 0);
    }

    #[test]
    fn read_error_yields_no_partial_set() {
        struct FailingReader {
            served: usize,
        }

        impl Read for FailingReader {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if self.served == 0 {
                    self.served = buf.len().min(4);
                    buf[..self.served].fill(b'A');
                    Ok(self.served)
                } else {
                    Err(std::io::Error::new(
                        std::io::ErrorKind::BrokenPipe,
                        "stream closed",
                    ))
                }
            }
        }

        let result = SignatureBuilder::new()
            .block_size(4)
            .build(FailingReader { served: 0 });
        assert!(matches!(result, Err(crate::SyncError::Io(_))));
    }
}
