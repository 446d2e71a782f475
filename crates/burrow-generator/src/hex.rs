use crate::Generator;
use burrow_core::ShortId;
use std::sync::atomic::{AtomicU64, Ordering};

/// A short ID generator backed by a sequential counter.
///
/// Every call advances the counter by one and renders the new value as an
/// uppercase hexadecimal string without padding, so a fresh generator yields
/// `"1"`, `"2"`, ... `"F"`, `"10"`.
///
/// The counter lives in memory only. After a restart the sequence begins
/// again from the configured offset; use [`HexGenerator::with_offset`] to
/// skip past IDs that an earlier process already issued.
///
/// Past `u64::MAX` the counter wraps to zero. IDs repeat from there and the
/// store rejects the ones already taken.
#[derive(Debug, Default)]
pub struct HexGenerator {
    counter: AtomicU64,
}

impl HexGenerator {
    /// Creates a generator whose first ID is `"1"`.
    pub fn new() -> Self {
        Self::with_offset(0)
    }

    /// Creates a generator whose first ID is `offset + 1`.
    pub fn with_offset(offset: u64) -> Self {
        Self {
            counter: AtomicU64::new(offset),
        }
    }

    /// Returns the last value handed out (or the offset if none was).
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}

impl Generator for HexGenerator {
    type Output = ShortId;

    fn generate(&self) -> Self::Output {
        let next = self.counter.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        ShortId::new(format!("{next:X}"))
    }
}
