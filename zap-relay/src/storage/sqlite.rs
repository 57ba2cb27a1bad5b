//! SQLite storage backend for zap-relay.

use super::{NewZapRecord, RecordStore, ZapRecord};
use crate::error::StorageError;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// SQLite-based record storage.
///
/// Uses WAL mode for concurrent reads/writes.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage from a database path.
    ///
    /// Creates the database file if it doesn't exist.
    pub async fn new(path: &Path) -> Result<Self, StorageError> {
        let path_str = path.to_str().ok_or_else(|| StorageError::InvalidPath {
            path: path.to_path_buf(),
        })?;
        let options = SqliteConnectOptions::from_str(path_str)
            .map_err(StorageError::Database)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let storage = Self { pool };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Create an in-memory SQLite storage (for testing).
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(":memory:")
            .map_err(StorageError::Database)?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let storage = Self { pool };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        // AUTOINCREMENT so ids are never reused after the retention sweep.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS zap_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                request_time TEXT NOT NULL,
                request_body TEXT NOT NULL,
                primary_response_code INTEGER,
                primary_response_body TEXT,
                besteffort_response_code INTEGER,
                besteffort_response_body TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS relay_settings (
                name TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        // The retention sweep scans by request_time.
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_zap_records_request_time
             ON zap_records(request_time)",
        )
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteStorage {
    async fn insert_record(&self, record: NewZapRecord) -> Result<i64, StorageError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO zap_records (
                request_time, request_body,
                primary_response_code, primary_response_body,
                besteffort_response_code, besteffort_response_body
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING id
            "#,
        )
        .bind(&record.request_time)
        .bind(&record.request_body)
        .bind(record.primary_response_code)
        .bind(&record.primary_response_body)
        .bind(record.besteffort_response_code)
        .bind(&record.besteffort_response_body)
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(id)
    }

    async fn recent_records(
        &self,
        limit: Option<i64>,
        before_id: Option<i64>,
    ) -> Result<Vec<ZapRecord>, StorageError> {
        // SQLite treats a negative LIMIT as "no limit".
        let rows = sqlx::query_as::<_, ZapRecord>(
            r#"
            SELECT id, request_time, request_body,
                   primary_response_code, primary_response_body,
                   besteffort_response_code, besteffort_response_body
            FROM zap_records
            WHERE ?2 IS NULL OR id < ?2
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )
        .bind(limit.unwrap_or(-1))
        .bind(before_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(rows)
    }

    async fn prune_records_before(&self, cutoff: &str) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM zap_records WHERE request_time < ?1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(result.rows_affected())
    }

    async fn record_count(&self) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM zap_records")
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(count as u64)
    }

    async fn last_record_id(&self) -> Result<i64, StorageError> {
        let id: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM zap_records")
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(id.unwrap_or(0))
    }

    async fn get_setting(&self, name: &str) -> Result<Option<String>, StorageError> {
        sqlx::query_scalar("SELECT value FROM relay_settings WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::Database)
    }

    async fn set_setting(&self, name: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO relay_settings (name, value)
            VALUES (?1, ?2)
            ON CONFLICT(name) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(name)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(request_time: &str, request_body: &str) -> NewZapRecord {
        NewZapRecord {
            request_time: request_time.to_string(),
            request_body: request_body.to_string(),
            ..NewZapRecord::default()
        }
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let storage = SqliteStorage::in_memory().await.unwrap();

        let a = storage
            .insert_record(make_record("2025-06-01 08:00:00", "a=1"))
            .await
            .unwrap();
        let b = storage
            .insert_record(make_record("2025-06-01 08:05:00", "b=2"))
            .await
            .unwrap();

        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[tokio::test]
    async fn insert_preserves_response_fields() {
        let storage = SqliteStorage::in_memory().await.unwrap();

        let record = NewZapRecord {
            request_time: "2025-06-01 08:00:00".to_string(),
            request_body: "statusEventCount=1".to_string(),
            primary_response_code: Some(200),
            primary_response_body: Some("ACK".to_string()),
            besteffort_response_code: Some(500),
            besteffort_response_body: Some("connection refused".to_string()),
        };
        let id = storage.insert_record(record).await.unwrap();

        let rows = storage.recent_records(None, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
        assert_eq!(rows[0].primary_response_code, Some(200));
        assert_eq!(rows[0].primary_response_body.as_deref(), Some("ACK"));
        assert_eq!(rows[0].besteffort_response_code, Some(500));
        assert_eq!(
            rows[0].besteffort_response_body.as_deref(),
            Some("connection refused")
        );
    }

    #[tokio::test]
    async fn absent_responses_read_back_as_none() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        storage
            .insert_record(make_record("2025-06-01 08:00:00", "a=1&norelay"))
            .await
            .unwrap();

        let rows = storage.recent_records(None, None).await.unwrap();
        assert_eq!(rows[0].primary_response_code, None);
        assert_eq!(rows[0].primary_response_body, None);
        assert_eq!(rows[0].besteffort_response_code, None);
        assert_eq!(rows[0].besteffort_response_body, None);
    }

    #[tokio::test]
    async fn recent_records_newest_first() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        for i in 0..5 {
            storage
                .insert_record(make_record("2025-06-01 08:00:00", &format!("n={i}")))
                .await
                .unwrap();
        }

        let rows = storage.recent_records(None, None).await.unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![5, 4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn recent_records_respects_limit_and_before_id() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        for i in 0..10 {
            storage
                .insert_record(make_record("2025-06-01 08:00:00", &format!("n={i}")))
                .await
                .unwrap();
        }

        let limited = storage.recent_records(Some(3), None).await.unwrap();
        let ids: Vec<i64> = limited.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![10, 9, 8]);

        let page = storage.recent_records(Some(3), Some(8)).await.unwrap();
        let ids: Vec<i64> = page.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![7, 6, 5]);
    }

    #[tokio::test]
    async fn prune_removes_only_older_records() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        storage
            .insert_record(make_record("2023-05-01 12:00:00", "old=1"))
            .await
            .unwrap();
        storage
            .insert_record(make_record("2025-06-01 08:00:00", "fresh=1"))
            .await
            .unwrap();

        let pruned = storage
            .prune_records_before("2024-06-01 08:00:00")
            .await
            .unwrap();
        assert_eq!(pruned, 1);

        let rows = storage.recent_records(None, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].request_body, "fresh=1");
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_prune() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        storage
            .insert_record(make_record("2023-05-01 12:00:00", "old=1"))
            .await
            .unwrap();
        storage
            .insert_record(make_record("2023-05-02 12:00:00", "old=2"))
            .await
            .unwrap();
        storage
            .prune_records_before("2024-01-01 00:00:00")
            .await
            .unwrap();

        let id = storage
            .insert_record(make_record("2025-06-01 08:00:00", "fresh=1"))
            .await
            .unwrap();
        assert_eq!(id, 3);
    }

    #[tokio::test]
    async fn counts_and_last_id() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        assert_eq!(storage.record_count().await.unwrap(), 0);
        assert_eq!(storage.last_record_id().await.unwrap(), 0);

        storage
            .insert_record(make_record("2025-06-01 08:00:00", "a=1"))
            .await
            .unwrap();
        storage
            .insert_record(make_record("2025-06-01 08:05:00", "b=2"))
            .await
            .unwrap();

        assert_eq!(storage.record_count().await.unwrap(), 2);
        assert_eq!(storage.last_record_id().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn settings_roundtrip_and_overwrite() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        assert_eq!(storage.get_setting("primary_url").await.unwrap(), None);

        storage
            .set_setting("primary_url", "https://ok.example/hook")
            .await
            .unwrap();
        assert_eq!(
            storage.get_setting("primary_url").await.unwrap().as_deref(),
            Some("https://ok.example/hook")
        );

        storage
            .set_setting("primary_url", "https://other.example/hook")
            .await
            .unwrap();
        assert_eq!(
            storage.get_setting("primary_url").await.unwrap().as_deref(),
            Some("https://other.example/hook")
        );
    }

    #[tokio::test]
    async fn file_backed_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zapsters.db");

        {
            let storage = SqliteStorage::new(&path).await.unwrap();
            storage
                .insert_record(make_record("2025-06-01 08:00:00", "a=1"))
                .await
                .unwrap();
        }

        let reopened = SqliteStorage::new(&path).await.unwrap();
        let rows = reopened.recent_records(None, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].request_body, "a=1");
    }
}
