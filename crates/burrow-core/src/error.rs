use thiserror::Error;

/// Errors raised by record store backends.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// The original URL already has a short ID.
    #[error("url already shortened: {0}")]
    Conflict(String),
    /// The short ID is already taken by another record.
    #[error("short id already exists: {0}")]
    DuplicateId(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
}

/// Errors returned by the shortening workflow.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShortenerError {
    #[error("url cannot be empty")]
    EmptyUrl,
    #[error("batch cannot be empty")]
    EmptyBatch,
    #[error("batch item {0} has an empty url")]
    EmptyBatchUrl(String),
    #[error("storage error: {0}")]
    Storage(
        #[from]
        #[source]
        StorageError,
    ),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Unavailable(err.to_string())
    }
}
