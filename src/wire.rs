//! Binary wire format for signature sets and deltas.
//!
//! Fixed-width fields, network byte order. A signature set is
//! `block_size(u32) count(u32)` followed by one 36-byte entry per block:
//! `weak(u32) strong(16) offset(u64) length(u32) sequence(u32)`. A delta is
//! `op_count(u32)` followed by tagged ops: tag `0` is Copy
//! (`offset(u64) length(u32)`), tag `1` is Literal (`length(u32)` + raw
//! bytes).
//!
//! Decoding is strict: truncated or structurally invalid input yields an
//! error, never a partially-populated object, and trailing bytes are
//! rejected.

use crate::delta::{Delta, DeltaOp};
use crate::error::{Result, SyncError};
use crate::signature::{Block, SignatureSet};
use crate::strong_hash::{StrongDigest, STRONG_LEN};
use bytes::{Buf, BufMut, BytesMut};

const SIG_HEADER_LEN: usize = 8;
const SIG_ENTRY_LEN: usize = 4 + STRONG_LEN + 8 + 4 + 4;

const OP_TAG_COPY: u8 = 0;
const OP_TAG_LITERAL: u8 = 1;

fn need(buf: &[u8], needed: usize, context: &'static str) -> Result<()> {
    if buf.remaining() < needed {
        return Err(SyncError::Truncated {
            context,
            needed,
            available: buf.remaining(),
        });
    }
    Ok(())
}

fn reject_trailing(buf: &[u8], context: &'static str) -> Result<()> {
    if buf.has_remaining() {
        return Err(SyncError::Malformed { context });
    }
    Ok(())
}

/// Serialize a [`SignatureSet`] for transmission or storage.
pub fn encode_signatures(set: &SignatureSet) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(SIG_HEADER_LEN + set.block_count() * SIG_ENTRY_LEN);

    buf.put_u32(set.block_size());
    buf.put_u32(set.block_count() as u32);

    for block in set.blocks() {
        buf.put_u32(block.weak);
        buf.put_slice(block.strong.as_bytes());
        buf.put_u64(block.offset);
        buf.put_u32(block.length);
        buf.put_u32(block.sequence);
    }

    buf.to_vec()
}

/// Deserialize a [`SignatureSet`].
pub fn decode_signatures(mut data: &[u8]) -> Result<SignatureSet> {
    need(data, SIG_HEADER_LEN, "signature header")?;
    let block_size = data.get_u32();
    let count = data.get_u32() as usize;

    if block_size == 0 {
        return Err(SyncError::Malformed {
            context: "signature block size is zero",
        });
    }

    let body_len = count
        .checked_mul(SIG_ENTRY_LEN)
        .ok_or(SyncError::Malformed {
            context: "signature entry count overflows",
        })?;
    need(data, body_len, "signature entries")?;

    let mut blocks = Vec::with_capacity(count);
    for position in 0..count {
        let weak = data.get_u32();
        let mut strong = [0u8; STRONG_LEN];
        data.copy_to_slice(&mut strong);
        let offset = data.get_u64();
        let length = data.get_u32();
        let sequence = data.get_u32();

        if sequence != position as u32 {
            return Err(SyncError::Malformed {
                context: "signature sequence does not match entry position",
            });
        }
        if length > block_size {
            return Err(SyncError::Malformed {
                context: "signature block length exceeds block size",
            });
        }

        blocks.push(Block {
            sequence,
            offset,
            length,
            weak,
            strong: StrongDigest(strong),
        });
    }

    reject_trailing(data, "trailing bytes after signature entries")?;
    Ok(SignatureSet::new(block_size, blocks))
}

/// Serialize a [`Delta`] for transmission or storage.
pub fn encode_delta(delta: &Delta) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(4 + delta.ops().len() * 13);

    buf.put_u32(delta.ops().len() as u32);

    for op in delta.ops() {
        match op {
            DeltaOp::Copy { offset, length } => {
                buf.put_u8(OP_TAG_COPY);
                buf.put_u64(*offset);
                buf.put_u32(*length);
            }
            DeltaOp::Literal { bytes } => {
                buf.put_u8(OP_TAG_LITERAL);
                buf.put_u32(bytes.len() as u32);
                buf.put_slice(bytes);
            }
        }
    }

    buf.to_vec()
}

/// Deserialize a [`Delta`].
pub fn decode_delta(mut data: &[u8]) -> Result<Delta> {
    need(data, 4, "delta header")?;
    let count = data.get_u32() as usize;

    // Every op takes at least one byte, which bounds the preallocation for
    // hostile counts.
    let mut ops = Vec::with_capacity(count.min(data.remaining()));

    for _ in 0..count {
        need(data, 1, "delta op tag")?;
        match data.get_u8() {
            OP_TAG_COPY => {
                need(data, 12, "copy op payload")?;
                let offset = data.get_u64();
                let length = data.get_u32();
                ops.push(DeltaOp::Copy { offset, length });
            }
            OP_TAG_LITERAL => {
                need(data, 4, "literal op length")?;
                let len = data.get_u32() as usize;
                need(data, len, "literal op bytes")?;
                let bytes = data[..len].to_vec();
                data.advance(len);
                ops.push(DeltaOp::Literal { bytes });
            }
            tag => return Err(SyncError::UnknownOpTag { tag }),
        }
    }

    reject_trailing(data, "trailing bytes after delta ops")?;
    Ok(Delta::from_ops(ops))
}
