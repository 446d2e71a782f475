//! Core types and traits for the Burrow URL shortener.
//!
//! This crate provides the shared domain types, the record store contract
//! implemented by `burrow-storage`, and the shortening contract implemented
//! by `burrow-shortener` and consumed by the HTTP gateway.

pub mod error;
pub mod record;
pub mod repository;
pub mod shortener;

pub use error::{ShortenerError, StorageError};
pub use record::{OwnerId, ShortId, UrlRecord};
pub use repository::{ReadRepository, Repository, SaveOutcome};
pub use shortener::{BatchEntry, BatchItem, Listing, Shortened, Shortener, UrlPair};
