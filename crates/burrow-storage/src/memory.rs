use crate::batch;
use async_trait::async_trait;
use burrow_core::repository::Result;
use burrow_core::{
    OwnerId, ReadRepository, Repository, SaveOutcome, ShortId, StorageError, UrlRecord,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::trace;

/// Process-local record store. Nothing survives a restart.
///
/// Writers are serialized through `write_gate` so that the URL uniqueness
/// check and the insert of a single save, or every item of a batch, happen
/// as one step. Readers never take the gate.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    records: DashMap<ShortId, UrlRecord>,
    by_url: DashMap<String, ShortId>,
    write_gate: Mutex<()>,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory repository with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: DashMap::with_capacity(capacity),
            by_url: DashMap::with_capacity(capacity),
            write_gate: Mutex::new(()),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // The record goes in before the URL index entry, so a reader that finds
    // the ID through `find_by_url` can always `get` it.
    fn insert(&self, record: UrlRecord) {
        let url = record.original_url.clone();
        let id = record.short_id.clone();
        self.records.insert(id.clone(), record);
        self.by_url.insert(url, id);
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn get(&self, id: &ShortId) -> Result<Option<UrlRecord>> {
        Ok(self.records.get(id).map(|entry| entry.value().clone()))
    }

    async fn find_by_url(&self, original_url: &str) -> Result<Option<ShortId>> {
        Ok(self.by_url.get(original_url).map(|entry| entry.value().clone()))
    }

    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<UrlRecord>> {
        let mut records: Vec<UrlRecord> = self
            .records
            .iter()
            .filter(|entry| entry.owner_id == *owner)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.short_id.cmp(&b.short_id))
        });
        Ok(records)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn save(&self, record: UrlRecord) -> Result<()> {
        let _gate = self.write_gate.lock();

        if self.by_url.contains_key(&record.original_url) {
            return Err(StorageError::Conflict(record.original_url));
        }
        if self.records.contains_key(&record.short_id) {
            return Err(StorageError::DuplicateId(record.short_id.to_string()));
        }

        trace!(short_id = %record.short_id, "saving record in memory");
        self.insert(record);
        Ok(())
    }

    async fn save_batch(&self, records: Vec<UrlRecord>) -> Result<Vec<SaveOutcome>> {
        let _gate = self.write_gate.lock();

        let plan = batch::plan(
            records,
            |url| self.by_url.get(url).map(|entry| entry.value().clone()),
            |id| self.records.contains_key(id),
        )?;

        trace!(saved = plan.accepted.len(), "saving batch in memory");
        for record in plan.accepted {
            self.insert(record);
        }
        Ok(plan.outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(id: &str, url: &str, owner: &str) -> UrlRecord {
        UrlRecord::new(ShortId::new(id), url, OwnerId::new(owner))
    }

    #[tokio::test]
    async fn save_and_get() {
        let repo = InMemoryRepository::new();

        repo.save(record("1", "https://example.com", "alice"))
            .await
            .unwrap();

        let result = repo.get(&ShortId::new("1")).await.unwrap().unwrap();
        assert_eq!(result.original_url, "https://example.com");
        assert_eq!(result.owner_id, OwnerId::new("alice"));
    }

    #[tokio::test]
    async fn get_nonexistent() {
        let repo = InMemoryRepository::new();

        let result = repo.get(&ShortId::new("nope")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn save_rejects_known_url() {
        let repo = InMemoryRepository::new();

        repo.save(record("1", "https://example.com", "alice"))
            .await
            .unwrap();

        let err = repo
            .save(record("2", "https://example.com", "bob"))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Conflict(_)));
        assert!(repo.get(&ShortId::new("2")).await.unwrap().is_none());
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn save_rejects_taken_id() {
        let repo = InMemoryRepository::new();

        repo.save(record("1", "https://one.com", "alice"))
            .await
            .unwrap();

        let err = repo
            .save(record("1", "https://two.com", "alice"))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::DuplicateId(_)));
        assert!(repo.find_by_url("https://two.com").await.unwrap().is_none());
        let kept = repo.get(&ShortId::new("1")).await.unwrap().unwrap();
        assert_eq!(kept.original_url, "https://one.com");
    }

    #[tokio::test]
    async fn find_by_url() {
        let repo = InMemoryRepository::new();
        repo.save(record("A", "https://example.com", "alice"))
            .await
            .unwrap();

        assert_eq!(
            repo.find_by_url("https://example.com").await.unwrap(),
            Some(ShortId::new("A"))
        );
        assert_eq!(repo.find_by_url("https://other.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_by_owner_filters_by_owner() {
        let repo = InMemoryRepository::new();
        repo.save(record("1", "https://a.com", "alice")).await.unwrap();
        repo.save(record("2", "https://b.com", "bob")).await.unwrap();
        repo.save(record("3", "https://c.com", "alice")).await.unwrap();

        let listed = repo.list_by_owner(&OwnerId::new("alice")).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|r| r.short_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);

        assert!(repo
            .list_by_owner(&OwnerId::new("carol"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn save_batch_substitutes_existing_ids() {
        let repo = InMemoryRepository::new();
        repo.save(record("1", "https://a.com", "alice")).await.unwrap();

        let outcomes = repo
            .save_batch(vec![
                record("2", "https://a.com", "bob"),
                record("3", "https://b.com", "bob"),
            ])
            .await
            .unwrap();

        assert_eq!(
            outcomes,
            vec![SaveOutcome::Existing(ShortId::new("1")), SaveOutcome::Created]
        );
        assert!(repo.get(&ShortId::new("2")).await.unwrap().is_none());
        assert!(repo.get(&ShortId::new("3")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn save_batch_with_taken_id_writes_nothing() {
        let repo = InMemoryRepository::new();
        repo.save(record("2", "https://a.com", "alice")).await.unwrap();

        let err = repo
            .save_batch(vec![
                record("1", "https://x.com", "bob"),
                record("2", "https://y.com", "bob"),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::DuplicateId(_)));
        assert!(repo.get(&ShortId::new("1")).await.unwrap().is_none());
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn health_check_reports_no_database() {
        let repo = InMemoryRepository::new();
        assert!(matches!(
            repo.health_check().await,
            Err(StorageError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_saves_of_one_url_store_one_record() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut handles = vec![];

        for i in 0..16u64 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.save(record(&format!("{i:X}"), "https://same.com", "alice"))
                    .await
            }));
        }

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => created += 1,
                Err(err) => assert!(matches!(err, StorageError::Conflict(_))),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(repo.len(), 1);
    }
}
