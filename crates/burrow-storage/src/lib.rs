//! Record store backends for the Burrow URL shortener.
//!
//! Every backend implements the [`Repository`] contract from `burrow_core`:
//!
//! - [`InMemoryRepository`]: process-local maps, nothing survives a restart.
//! - [`FileRepository`]: in-memory maps mirrored by an append-only JSON Lines
//!   journal that is replayed on startup.
//! - [`PostgresRepository`]: a `urls` table with a unique index on the
//!   original URL.
//! - [`CachedRepository`]: a moka read-through cache in front of any of the
//!   above, meant for the PostgreSQL backend.

mod batch;
pub mod cached;
pub mod journal;
pub mod memory;
pub mod postgres;

pub use burrow_core::repository::Result;
pub use burrow_core::{ReadRepository, Repository, SaveOutcome, StorageError};
pub use cached::{CacheSettings, CachedRepository};
pub use journal::{FileRepository, JournalOptions, SyncMode};
pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;
