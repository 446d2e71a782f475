use crate::record::{OwnerId, ShortId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, crate::error::ShortenerError>;

/// Outcome of shortening a single URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shortened {
    /// A new short ID was minted for the URL.
    Created(ShortId),
    /// The URL was already shortened; this is the existing ID.
    Existing(ShortId),
}

impl Shortened {
    pub fn short_id(&self) -> &ShortId {
        match self {
            Shortened::Created(id) | Shortened::Existing(id) => id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Shortened::Created(_))
    }
}

/// One URL of a batch submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    /// Caller-chosen key used to match response entries to request items.
    pub correlation_id: String,
    pub original_url: String,
}

/// Result for one [`BatchItem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub correlation_id: String,
    pub short_id: ShortId,
    /// `true` when the URL was already shortened and `short_id` is the
    /// pre-existing ID.
    pub conflict: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPair {
    pub short_id: ShortId,
    pub original_url: String,
}

/// Result of listing an owner's URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    /// The owner has not shortened anything.
    Empty,
    Urls(Vec<UrlPair>),
}

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Returns the short ID for `original_url`, minting one if the URL has
    /// never been shortened.
    async fn shorten(&self, original_url: &str, owner: &OwnerId) -> Result<Shortened>;

    /// Shortens every item of a batch. The response has one entry per item,
    /// in input order.
    async fn shorten_batch(&self, items: Vec<BatchItem>, owner: &OwnerId)
        -> Result<Vec<BatchEntry>>;

    /// Resolves a short ID to the original URL.
    /// Returns `None` if the ID was never issued.
    async fn resolve(&self, id: &ShortId) -> Result<Option<String>>;

    /// Lists every URL shortened by `owner`.
    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Listing>;

    /// Checks that the record store is reachable.
    async fn health_check(&self) -> Result<()>;
}
