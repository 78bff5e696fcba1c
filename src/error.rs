use thiserror::Error;

/// Errors surfaced by the resynchronization core.
///
/// None of these are retried internally; retry and backoff policy belongs to
/// the caller. A zero-length base or source is a valid degenerate case, not
/// an error.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("truncated wire payload ({context}): needed {needed} bytes, {available} available")]
    Truncated {
        context: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("malformed wire payload: {context}")]
    Malformed { context: &'static str },

    #[error("unknown delta op tag {tag:#04x}")]
    UnknownOpTag { tag: u8 },

    #[error("copy range [{offset}, {offset}+{length}) exceeds base length {base_len}")]
    OutOfRange {
        offset: u64,
        length: u32,
        base_len: u64,
    },
}

pub type Result<T> = std::result::Result<T, SyncError>;
