use burrow_core::repository::Result;
use burrow_core::{SaveOutcome, ShortId, StorageError, UrlRecord};
use std::collections::{HashMap, HashSet};

/// Records that a batch will actually write, alongside the per-item outcomes.
pub(crate) struct BatchPlan {
    pub outcomes: Vec<SaveOutcome>,
    pub accepted: Vec<UrlRecord>,
}

/// Decides, without touching any state, what a batch save does to a store
/// whose existing contents are described by `existing_url` and `id_taken`.
///
/// URLs already stored, or claimed by an earlier item of the same batch,
/// become [`SaveOutcome::Existing`]. A short ID that is already taken fails
/// the whole batch.
pub(crate) fn plan<U, I>(records: Vec<UrlRecord>, existing_url: U, id_taken: I) -> Result<BatchPlan>
where
    U: Fn(&str) -> Option<ShortId>,
    I: Fn(&ShortId) -> bool,
{
    let mut claimed_urls: HashMap<String, ShortId> = HashMap::new();
    let mut claimed_ids: HashSet<ShortId> = HashSet::new();
    let mut outcomes = Vec::with_capacity(records.len());
    let mut accepted = Vec::with_capacity(records.len());

    for record in records {
        let existing = existing_url(&record.original_url)
            .or_else(|| claimed_urls.get(&record.original_url).cloned());
        if let Some(id) = existing {
            outcomes.push(SaveOutcome::Existing(id));
            continue;
        }

        if id_taken(&record.short_id) || !claimed_ids.insert(record.short_id.clone()) {
            return Err(StorageError::DuplicateId(record.short_id.to_string()));
        }

        claimed_urls.insert(record.original_url.clone(), record.short_id.clone());
        outcomes.push(SaveOutcome::Created);
        accepted.push(record);
    }

    Ok(BatchPlan { outcomes, accepted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_core::OwnerId;

    fn record(id: &str, url: &str) -> UrlRecord {
        UrlRecord::new(ShortId::new(id), url, OwnerId::new("owner"))
    }

    #[test]
    fn fresh_batch_is_accepted_in_order() {
        let plan = plan(
            vec![record("1", "https://a.com"), record("2", "https://b.com")],
            |_| None,
            |_| false,
        )
        .unwrap();

        assert_eq!(plan.outcomes, vec![SaveOutcome::Created, SaveOutcome::Created]);
        assert_eq!(plan.accepted.len(), 2);
        assert_eq!(plan.accepted[0].short_id.as_str(), "1");
    }

    #[test]
    fn stored_and_repeated_urls_become_existing() {
        let plan = plan(
            vec![
                record("1", "https://stored.com"),
                record("2", "https://new.com"),
                record("3", "https://new.com"),
            ],
            |url| (url == "https://stored.com").then(|| ShortId::new("A")),
            |_| false,
        )
        .unwrap();

        assert_eq!(
            plan.outcomes,
            vec![
                SaveOutcome::Existing(ShortId::new("A")),
                SaveOutcome::Created,
                SaveOutcome::Existing(ShortId::new("2")),
            ]
        );
        assert_eq!(plan.accepted.len(), 1);
    }

    #[test]
    fn taken_id_fails_the_batch() {
        let err = plan(
            vec![record("1", "https://a.com"), record("2", "https://b.com")],
            |_| None,
            |id| id.as_str() == "2",
        )
        .err()
        .unwrap();

        assert_eq!(err, StorageError::DuplicateId("2".to_string()));
    }

    #[test]
    fn id_repeated_within_batch_fails() {
        let result = plan(
            vec![record("1", "https://a.com"), record("1", "https://b.com")],
            |_| None,
            |_| false,
        );

        assert!(matches!(result, Err(StorageError::DuplicateId(_))));
    }
}
