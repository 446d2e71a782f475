//! URL shortening workflow.
//!
//! [`ShortenerService`] implements the [`burrow_core::Shortener`] contract
//! on top of any record store and ID generator. Core types are re-exported
//! from `burrow_core`.

pub mod service;

pub use burrow_core::{
    BatchEntry, BatchItem, Listing, Shortened, Shortener, ShortenerError, UrlPair,
};
pub use service::ShortenerService;
