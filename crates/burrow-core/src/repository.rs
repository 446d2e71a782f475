use crate::error::StorageError;
use crate::record::{OwnerId, ShortId, UrlRecord};
use async_trait::async_trait;

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Per-item result of [`Repository::save_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The record was persisted under its own short ID.
    Created,
    /// The URL was already shortened; the record was skipped in favour of
    /// the existing short ID.
    Existing(ShortId),
}

/// A read-only view of a record store.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Retrieves the record for a given short ID.
    /// Returns `None` if the ID does not exist.
    async fn get(&self, id: &ShortId) -> Result<Option<UrlRecord>>;

    /// Looks up the short ID already assigned to `original_url`, if any.
    async fn find_by_url(&self, original_url: &str) -> Result<Option<ShortId>>;

    /// Returns every record submitted by `owner`, one entry per short ID.
    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<UrlRecord>>;

    /// Reports whether the backing database is reachable.
    ///
    /// Only meaningful for database-backed stores; the default reports the
    /// store as unavailable because no database is configured.
    async fn health_check(&self) -> Result<()> {
        Err(StorageError::Unavailable(
            "no database configured".to_string(),
        ))
    }
}

#[async_trait]
pub trait Repository: ReadRepository {
    /// Persists a new record.
    ///
    /// Returns `Err(Conflict)` if the original URL is already stored and
    /// `Err(DuplicateId)` if the short ID is taken. Neither case modifies
    /// the store.
    async fn save(&self, record: UrlRecord) -> Result<()>;

    /// Persists a batch of records as one unit.
    ///
    /// Returns one outcome per input record, in input order. A record whose
    /// URL is already stored (including by an earlier record of the same
    /// batch) is skipped and reported as [`SaveOutcome::Existing`]. Any other
    /// failure aborts the whole batch and nothing is persisted.
    async fn save_batch(&self, records: Vec<UrlRecord>) -> Result<Vec<SaveOutcome>>;
}
