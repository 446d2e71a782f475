pub mod hex;

pub use hex::HexGenerator;

use burrow_core::ShortId;

/// Trait for generating short IDs.
///
/// Implementations are pure generators that don't interact with storage.
/// Uniqueness is only promised within one generator instance; the record
/// store is the final authority and rejects an ID that is already taken.
pub trait Generator: Send + Sync + 'static {
    type Output: Into<ShortId>;

    /// Generates a value that can be converted into a short ID.
    fn generate(&self) -> Self::Output;
}
