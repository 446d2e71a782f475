use async_trait::async_trait;
use burrow_core::repository::Result;
use burrow_core::{OwnerId, ReadRepository, Repository, SaveOutcome, ShortId, UrlRecord};
use moka::future::Cache;
use std::time::Duration;
use tracing::{debug, trace};
use typed_builder::TypedBuilder;

/// Sizing of the caches held by a [`CachedRepository`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct CacheSettings {
    /// Maximum number of entries per cache.
    #[builder(default = 10_000)]
    pub max_capacity: u64,
    /// Entries expire this long after insertion. `None` keeps them until
    /// evicted for space.
    #[builder(default, setter(strip_option))]
    pub time_to_live: Option<Duration>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl CacheSettings {
    fn build_cache<K, V>(&self) -> Cache<K, V>
    where
        K: std::hash::Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let builder = Cache::builder().max_capacity(self.max_capacity);
        match self.time_to_live {
            Some(ttl) => builder.time_to_live(ttl).build(),
            None => builder.build(),
        }
    }
}

/// A repository decorator that caches lookups in memory.
///
/// `get` and `find_by_url` check the cache first and fall back to the inner
/// repository. Only hits are cached: a miss is asked of the inner repository
/// again next time, since another process sharing the database may have
/// written the record meanwhile. Records are immutable, so successful saves
/// populate the cache directly and nothing is ever invalidated.
#[derive(Debug, Clone)]
pub struct CachedRepository<R> {
    inner: R,
    records: Cache<ShortId, UrlRecord>,
    by_url: Cache<String, ShortId>,
}

impl<R: Repository> CachedRepository<R> {
    pub fn new(inner: R, settings: &CacheSettings) -> Self {
        Self {
            inner,
            records: settings.build_cache(),
            by_url: settings.build_cache(),
        }
    }

    /// Returns a reference to the inner repository.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    async fn remember(&self, record: UrlRecord) {
        self.by_url
            .insert(record.original_url.clone(), record.short_id.clone())
            .await;
        self.records.insert(record.short_id.clone(), record).await;
    }
}

#[async_trait]
impl<R: Repository> ReadRepository for CachedRepository<R> {
    async fn get(&self, id: &ShortId) -> Result<Option<UrlRecord>> {
        if let Some(record) = self.records.get(id).await {
            debug!(short_id = %id, "cache hit");
            return Ok(Some(record));
        }

        trace!(short_id = %id, "cache miss, fetching from inner repository");
        let record = self.inner.get(id).await?;
        if let Some(record) = &record {
            self.remember(record.clone()).await;
        }
        Ok(record)
    }

    async fn find_by_url(&self, original_url: &str) -> Result<Option<ShortId>> {
        if let Some(id) = self.by_url.get(original_url).await {
            return Ok(Some(id));
        }

        let id = self.inner.find_by_url(original_url).await?;
        if let Some(id) = &id {
            self.by_url
                .insert(original_url.to_string(), id.clone())
                .await;
        }
        Ok(id)
    }

    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<UrlRecord>> {
        self.inner.list_by_owner(owner).await
    }

    async fn health_check(&self) -> Result<()> {
        self.inner.health_check().await
    }
}

#[async_trait]
impl<R: Repository> Repository for CachedRepository<R> {
    async fn save(&self, record: UrlRecord) -> Result<()> {
        self.inner.save(record.clone()).await?;
        self.remember(record).await;
        Ok(())
    }

    async fn save_batch(&self, records: Vec<UrlRecord>) -> Result<Vec<SaveOutcome>> {
        let outcomes = self.inner.save_batch(records.clone()).await?;

        for (record, outcome) in records.into_iter().zip(&outcomes) {
            match outcome {
                SaveOutcome::Created => self.remember(record).await,
                SaveOutcome::Existing(id) => {
                    self.by_url.insert(record.original_url, id.clone()).await;
                }
            }
        }
        Ok(outcomes)
    }
}
