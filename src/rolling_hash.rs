//! Weak rolling checksum over a fixed-size sliding byte window.
//!
//! Adler-32 style, similar to rsync's rolling checksum: two sums computed
//! modulo 65521 (largest prime < 2^16), both updatable in O(1) when the
//! window slides by one byte. Used as a fast first-pass filter; a strong
//! hash confirms any candidate match.

const MOD_ADLER: u32 = 65521;

/// Rolling checksum state for a window of `window_len` bytes.
///
/// The two accumulators are:
/// - `a`: 1 + sum of window bytes
/// - `b`: sum of the successive `a` values (a weighted sum)
///
/// Rolling from window `[x1, x2, ..., xn]` to `[x2, ..., xn, new]`:
/// - `a' = a - x1 + new`
/// - `b' = b - n*x1 + a' - 1`
#[derive(Debug, Clone)]
pub struct RollingChecksum {
    a: u32,
    b: u32,
    window_len: usize,
}

impl RollingChecksum {
    /// Create an empty state for windows of `window_len` bytes.
    pub fn new(window_len: usize) -> Self {
        Self {
            a: 1,
            b: 0,
            window_len,
        }
    }

    /// Feed bytes into the state. May be called repeatedly to cover a
    /// window held in non-contiguous storage.
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.a = (self.a + u32::from(byte)) % MOD_ADLER;
            self.b = (self.b + self.a) % MOD_ADLER;
        }
    }

    /// Slide the window forward by one byte: `removed` leaves at the front,
    /// `added` enters at the back. Only valid once a full window of
    /// `window_len` bytes has been fed.
    pub fn roll(&mut self, removed: u8, added: u8) {
        let old = u32::from(removed);
        let new = u32::from(added);

        self.a = (self.a + MOD_ADLER - old + new) % MOD_ADLER;

        // b' = b - n*old + a' - 1; widen so n*old cannot overflow u32 for
        // very large windows.
        let subtract =
            ((self.window_len as u64 * u64::from(removed) + 1) % u64::from(MOD_ADLER)) as u32;
        self.b = (self.b + MOD_ADLER + self.a - subtract) % MOD_ADLER;
    }

    /// Current checksum value.
    pub fn value(&self) -> u32 {
        (self.b << 16) | self.a
    }

    /// Reset to the empty state, keeping the window length.
    pub fn reset(&mut self) {
        self.a = 1;
        self.b = 0;
    }

    /// One-shot checksum of a whole block.
    pub fn checksum(data: &[u8]) -> u32 {
        let mut state = Self::new(data.len());
        state.update(data);
        state.value()
    }
}
