use async_trait::async_trait;
use burrow_core::{
    BatchEntry, BatchItem, Listing, OwnerId, Repository, SaveOutcome, ShortId, Shortened,
    Shortener, ShortenerError, StorageError, UrlPair, UrlRecord,
};
use burrow_generator::Generator;
use std::sync::Arc;
use tracing::{debug, info};

type Result<T> = std::result::Result<T, ShortenerError>;

/// A concrete implementation of the `Shortener` trait.
///
/// Each original URL gets exactly one short ID. Shortening a URL that is
/// already stored hands back its existing ID instead of minting another.
///
/// Note: The `Generator` implementation is responsible for producing IDs
/// that are not yet taken. No retry is performed when the store rejects a
/// generated ID.
#[derive(Debug)]
pub struct ShortenerService<R, G> {
    repository: Arc<R>,
    generator: Arc<G>,
}

impl<R, G> Clone for ShortenerService<R, G> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            generator: Arc::clone(&self.generator),
        }
    }
}

impl<R: Repository, G: Generator> ShortenerService<R, G> {
    pub fn new(repository: R, generator: G) -> Self {
        Self {
            repository: Arc::new(repository),
            generator: Arc::new(generator),
        }
    }

    fn generate_id(&self) -> ShortId {
        self.generator.generate().into()
    }
}

#[async_trait]
impl<R: Repository, G: Generator> Shortener for ShortenerService<R, G> {
    async fn shorten(&self, original_url: &str, owner: &OwnerId) -> Result<Shortened> {
        if original_url.is_empty() {
            return Err(ShortenerError::EmptyUrl);
        }

        if let Some(id) = self.repository.find_by_url(original_url).await? {
            debug!(short_id = %id, "url already shortened");
            return Ok(Shortened::Existing(id));
        }

        let id = self.generate_id();
        let record = UrlRecord::new(id.clone(), original_url, owner.clone());

        match self.repository.save(record).await {
            Ok(()) => {
                info!(short_id = %id, owner = %owner, "shortened url");
                Ok(Shortened::Created(id))
            }
            // Another request stored the same URL between the lookup and the save.
            Err(StorageError::Conflict(url)) => match self.repository.find_by_url(&url).await? {
                Some(winner) => {
                    debug!(short_id = %winner, "lost race, returning existing id");
                    Ok(Shortened::Existing(winner))
                }
                None => Err(StorageError::Conflict(url).into()),
            },
            Err(err) => Err(err.into()),
        }
    }

    async fn shorten_batch(
        &self,
        items: Vec<BatchItem>,
        owner: &OwnerId,
    ) -> Result<Vec<BatchEntry>> {
        if items.is_empty() {
            return Err(ShortenerError::EmptyBatch);
        }
        if let Some(item) = items.iter().find(|item| item.original_url.is_empty()) {
            return Err(ShortenerError::EmptyBatchUrl(item.correlation_id.clone()));
        }

        let records: Vec<UrlRecord> = items
            .iter()
            .map(|item| UrlRecord::new(self.generate_id(), &item.original_url, owner.clone()))
            .collect();
        let ids: Vec<ShortId> = records.iter().map(|r| r.short_id.clone()).collect();

        let outcomes = self.repository.save_batch(records).await?;

        let entries: Vec<BatchEntry> = items
            .into_iter()
            .zip(ids)
            .zip(outcomes)
            .map(|((item, generated), outcome)| match outcome {
                SaveOutcome::Created => BatchEntry {
                    correlation_id: item.correlation_id,
                    short_id: generated,
                    conflict: false,
                },
                SaveOutcome::Existing(existing) => BatchEntry {
                    correlation_id: item.correlation_id,
                    short_id: existing,
                    conflict: true,
                },
            })
            .collect();

        info!(
            owner = %owner,
            count = entries.len(),
            conflicts = entries.iter().filter(|e| e.conflict).count(),
            "shortened batch"
        );
        Ok(entries)
    }

    async fn resolve(&self, id: &ShortId) -> Result<Option<String>> {
        let record = self.repository.get(id).await?;
        Ok(record.map(|r| r.original_url))
    }

    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Listing> {
        let records = self.repository.list_by_owner(owner).await?;
        if records.is_empty() {
            return Ok(Listing::Empty);
        }

        Ok(Listing::Urls(
            records
                .into_iter()
                .map(|r| UrlPair {
                    short_id: r.short_id,
                    original_url: r.original_url,
                })
                .collect(),
        ))
    }

    async fn health_check(&self) -> Result<()> {
        Ok(self.repository.health_check().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_core::repository::Result as StorageResult;
    use burrow_core::ReadRepository;
    use burrow_generator::HexGenerator;
    use burrow_storage::InMemoryRepository;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A store that loses every save to a concurrent writer. The first URL
    /// lookup misses; later lookups report `winner`.
    #[derive(Debug)]
    struct RacingRepository {
        winner: Option<ShortId>,
        lookups: AtomicUsize,
    }

    impl RacingRepository {
        fn new(winner: Option<&str>) -> Self {
            Self {
                winner: winner.map(ShortId::new),
                lookups: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ReadRepository for RacingRepository {
        async fn get(&self, _id: &ShortId) -> StorageResult<Option<UrlRecord>> {
            Ok(None)
        }

        async fn find_by_url(&self, _original_url: &str) -> StorageResult<Option<ShortId>> {
            if self.lookups.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok(None);
            }
            Ok(self.winner.clone())
        }

        async fn list_by_owner(&self, _owner: &OwnerId) -> StorageResult<Vec<UrlRecord>> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl Repository for RacingRepository {
        async fn save(&self, record: UrlRecord) -> StorageResult<()> {
            Err(StorageError::Conflict(record.original_url))
        }

        async fn save_batch(&self, records: Vec<UrlRecord>) -> StorageResult<Vec<SaveOutcome>> {
            Ok(records.iter().map(|_| SaveOutcome::Created).collect())
        }
    }

    fn test_service() -> ShortenerService<InMemoryRepository, HexGenerator> {
        ShortenerService::new(InMemoryRepository::new(), HexGenerator::new())
    }

    fn owner(id: &str) -> OwnerId {
        OwnerId::new(id)
    }

    fn item(correlation_id: &str, url: &str) -> BatchItem {
        BatchItem {
            correlation_id: correlation_id.to_string(),
            original_url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn shorten_mints_sequential_ids() {
        let service = test_service();

        let first = service
            .shorten("https://example.com", &owner("alice"))
            .await
            .unwrap();
        let second = service
            .shorten("https://example.org", &owner("alice"))
            .await
            .unwrap();

        assert_eq!(first, Shortened::Created(ShortId::new("1")));
        assert_eq!(second, Shortened::Created(ShortId::new("2")));
    }

    #[tokio::test]
    async fn shorten_returns_existing_id_for_known_url() {
        let service = test_service();

        let first = service
            .shorten("https://example.com", &owner("alice"))
            .await
            .unwrap();
        let again = service
            .shorten("https://example.com", &owner("bob"))
            .await
            .unwrap();

        assert!(first.is_created());
        assert_eq!(again, Shortened::Existing(first.short_id().clone()));
        assert_eq!(service.generator.current(), 1);
    }

    #[tokio::test]
    async fn shorten_rejects_empty_url() {
        let service = test_service();

        let err = service.shorten("", &owner("alice")).await.unwrap_err();

        assert_eq!(err, ShortenerError::EmptyUrl);
        assert_eq!(service.generator.current(), 0);
    }

    #[tokio::test]
    async fn resolve_existing_and_unknown() {
        let service = test_service();
        let shortened = service
            .shorten("https://example.com", &owner("alice"))
            .await
            .unwrap();

        assert_eq!(
            service.resolve(shortened.short_id()).await.unwrap(),
            Some("https://example.com".to_string())
        );
        assert_eq!(service.resolve(&ShortId::new("FFFF")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn shorten_batch_keeps_input_order_and_flags_conflicts() {
        let service = test_service();
        service
            .shorten("https://known.com", &owner("alice"))
            .await
            .unwrap();

        let entries = service
            .shorten_batch(
                vec![
                    item("a", "https://new.com"),
                    item("b", "https://known.com"),
                    item("c", "https://new.com"),
                ],
                &owner("bob"),
            )
            .await
            .unwrap();

        assert_eq!(
            entries,
            vec![
                BatchEntry {
                    correlation_id: "a".to_string(),
                    short_id: ShortId::new("2"),
                    conflict: false,
                },
                BatchEntry {
                    correlation_id: "b".to_string(),
                    short_id: ShortId::new("1"),
                    conflict: true,
                },
                BatchEntry {
                    correlation_id: "c".to_string(),
                    short_id: ShortId::new("2"),
                    conflict: true,
                },
            ]
        );
    }

    #[tokio::test]
    async fn shorten_batch_on_empty_store_mints_fresh_ids() {
        let service = test_service();

        let entries = service
            .shorten_batch(
                vec![item("1", "https://a.com"), item("2", "https://b.com")],
                &owner("alice"),
            )
            .await
            .unwrap();

        let correlation_ids: Vec<_> = entries.iter().map(|e| e.correlation_id.as_str()).collect();
        assert_eq!(correlation_ids, vec!["1", "2"]);
        assert_ne!(entries[0].short_id, entries[1].short_id);
        assert!(entries.iter().all(|e| !e.conflict));
        assert_eq!(
            service.resolve(&entries[1].short_id).await.unwrap(),
            Some("https://b.com".to_string())
        );
    }

    #[tokio::test]
    async fn shorten_batch_rejects_empty_input_before_generating() {
        let service = test_service();

        let err = service
            .shorten_batch(vec![], &owner("alice"))
            .await
            .unwrap_err();
        assert_eq!(err, ShortenerError::EmptyBatch);

        let err = service
            .shorten_batch(
                vec![item("a", "https://a.com"), item("b", "")],
                &owner("alice"),
            )
            .await
            .unwrap_err();
        assert_eq!(err, ShortenerError::EmptyBatchUrl("b".to_string()));

        assert_eq!(service.generator.current(), 0);
        assert!(service
            .resolve(&ShortId::new("1"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn list_by_owner_returns_only_that_owners_urls() {
        let service = test_service();
        service
            .shorten("https://a.com", &owner("alice"))
            .await
            .unwrap();
        service.shorten("https://b.com", &owner("bob")).await.unwrap();

        let listing = service.list_by_owner(&owner("alice")).await.unwrap();
        assert_eq!(
            listing,
            Listing::Urls(vec![UrlPair {
                short_id: ShortId::new("1"),
                original_url: "https://a.com".to_string(),
            }])
        );

        assert_eq!(
            service.list_by_owner(&owner("carol")).await.unwrap(),
            Listing::Empty
        );
    }

    #[tokio::test]
    async fn health_check_propagates_store_status() {
        let service = test_service();

        let err = service.health_check().await.unwrap_err();

        assert!(matches!(
            err,
            ShortenerError::Storage(StorageError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn taken_id_surfaces_as_storage_error() {
        let repo = InMemoryRepository::new();
        repo.save(UrlRecord::new(
            ShortId::new("1"),
            "https://first.com",
            owner("alice"),
        ))
        .await
        .unwrap();
        let service = ShortenerService::new(repo, HexGenerator::new());

        let err = service
            .shorten("https://second.com", &owner("alice"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ShortenerError::Storage(StorageError::DuplicateId(_))
        ));
    }

    #[tokio::test]
    async fn lost_race_returns_winners_id() {
        let service = ShortenerService::new(RacingRepository::new(Some("7")), HexGenerator::new());

        let result = service
            .shorten("https://raced.com", &owner("alice"))
            .await
            .unwrap();

        assert_eq!(result, Shortened::Existing(ShortId::new("7")));
        assert_eq!(service.generator.current(), 1);
        assert_eq!(service.repository.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn lost_race_without_winner_surfaces_conflict() {
        let service = ShortenerService::new(RacingRepository::new(None), HexGenerator::new());

        let err = service
            .shorten("https://raced.com", &owner("alice"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ShortenerError::Storage(StorageError::Conflict("https://raced.com".to_string()))
        );
        assert_eq!(service.generator.current(), 1);
    }

    #[tokio::test]
    async fn concurrent_shortens_of_one_url_agree_on_one_id() {
        let service = test_service();
        let mut handles = vec![];

        for i in 0..16 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .shorten("https://same.com", &OwnerId::new(format!("user-{i}")))
                    .await
                    .unwrap()
            }));
        }

        let mut results = vec![];
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        let created = results.iter().filter(|r| r.is_created()).count();
        assert_eq!(created, 1);

        let winner = results[0].short_id().clone();
        assert!(results.iter().all(|r| *r.short_id() == winner));
    }
}
