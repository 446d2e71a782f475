use async_trait::async_trait;
use burrow_core::repository::Result;
use burrow_core::{
    OwnerId, ReadRepository, Repository, SaveOutcome, ShortId, StorageError, UrlRecord,
};
use jiff::Timestamp;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::{debug, info};

const SCHEMA: &str = include_str!("../ddl/postgres/urls.sql");

/// Name of the unique index on `urls.original_url`. A unique violation on
/// any other constraint is a short ID collision.
const ORIGINAL_URL_INDEX: &str = "idx_urls_original_url";

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// PostgreSQL implementation of the repository contract.
///
/// Uniqueness of both the short ID and the original URL is enforced by the
/// database, so several processes may share one table.
#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a repository from an existing PostgreSQL connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a repository by opening a new PostgreSQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Creates the `urls` table and its indexes if they do not exist yet.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        info!("postgres schema ready");
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse_created_at(millis: i64) -> Result<Timestamp> {
    Timestamp::from_millisecond(millis).map_err(|e| {
        StorageError::InvalidData(format!("invalid created_at timestamp '{millis}': {e}"))
    })
}

fn record_from_row(row: &PgRow) -> Result<UrlRecord> {
    let short_id: String = row.try_get("id").map_err(map_sqlx_error)?;
    let original_url: String = row.try_get("original_url").map_err(map_sqlx_error)?;
    let owner_id: String = row.try_get("owner_id").map_err(map_sqlx_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;

    Ok(UrlRecord {
        short_id: ShortId::new(short_id),
        original_url,
        owner_id: OwnerId::new(owner_id),
        created_at: parse_created_at(created_at)?,
    })
}

/// Maps an insert failure, telling apart the two unique constraints.
fn map_insert_error(err: sqlx::Error, record: &UrlRecord) -> StorageError {
    let Some(db_err) = err.as_database_error() else {
        return map_sqlx_error(err);
    };
    if !db_err.is_unique_violation() {
        return map_sqlx_error(err);
    }

    if db_err.constraint() == Some(ORIGINAL_URL_INDEX) {
        StorageError::Conflict(record.original_url.clone())
    } else {
        StorageError::DuplicateId(record.short_id.to_string())
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl ReadRepository for PostgresRepository {
    async fn get(&self, id: &ShortId) -> Result<Option<UrlRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, original_url, owner_id, created_at
            FROM urls
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn find_by_url(&self, original_url: &str) -> Result<Option<ShortId>> {
        let id: Option<String> = sqlx::query_scalar(
            r#"
            SELECT id
            FROM urls
            WHERE original_url = $1
            "#,
        )
        .bind(original_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(id.map(ShortId::new))
    }

    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<UrlRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, original_url, owner_id, created_at
            FROM urls
            WHERE owner_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(record_from_row).collect()
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn save(&self, record: UrlRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO urls (id, original_url, owner_id, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(record.short_id.as_str())
        .bind(record.original_url.as_str())
        .bind(record.owner_id.as_str())
        .bind(record.created_at.as_millisecond())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => Err(map_insert_error(err, &record)),
        }
    }

    /// Inserts the batch in one transaction.
    ///
    /// Rows whose URL is already stored are skipped by `ON CONFLICT` and the
    /// stored ID is read back inside the same transaction. A short ID
    /// collision aborts the transaction, so nothing is committed.
    async fn save_batch(&self, records: Vec<UrlRecord>) -> Result<Vec<SaveOutcome>> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut outcomes = Vec::with_capacity(records.len());

        for record in &records {
            let inserted = sqlx::query(
                r#"
                INSERT INTO urls (id, original_url, owner_id, created_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (original_url) DO NOTHING
                "#,
            )
            .bind(record.short_id.as_str())
            .bind(record.original_url.as_str())
            .bind(record.owner_id.as_str())
            .bind(record.created_at.as_millisecond())
            .execute(&mut *tx)
            .await
            .map_err(|err| map_insert_error(err, record))?
            .rows_affected();

            if inserted > 0 {
                outcomes.push(SaveOutcome::Created);
                continue;
            }

            let existing: String =
                sqlx::query_scalar("SELECT id FROM urls WHERE original_url = $1")
                    .bind(record.original_url.as_str())
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;
            outcomes.push(SaveOutcome::Existing(ShortId::new(existing)));
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(count = records.len(), "committed batch");
        Ok(outcomes)
    }
}
