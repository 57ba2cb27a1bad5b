//! Storage layer for zap-relay.
//!
//! One table holds the exchange records, a second holds the mutable
//! relay settings. Records are append-only: inserted by the relay
//! pipeline, removed only by the retention sweep.

mod sqlite;

pub use sqlite::SqliteStorage;

use crate::error::StorageError;
use async_trait::async_trait;
use serde::Serialize;

/// One recorded exchange with a station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ZapRecord {
    /// Store-assigned id, monotonically increasing and never reused.
    pub id: i64,
    /// Arrival time as civil time in the station's zone.
    pub request_time: String,
    /// Raw form-encoded body exactly as received.
    pub request_body: String,
    /// Status from the primary destination, when one was called.
    pub primary_response_code: Option<u16>,
    /// Body from the primary destination, when one was called.
    pub primary_response_body: Option<String>,
    /// Status from the best-effort destination, when one was called.
    pub besteffort_response_code: Option<u16>,
    /// Body from the best-effort destination, when one was called.
    pub besteffort_response_body: Option<String>,
}

/// Fields for inserting a new exchange record.
#[derive(Debug, Clone, Default)]
pub struct NewZapRecord {
    /// Arrival time as civil time in the station's zone.
    pub request_time: String,
    /// Raw form-encoded body exactly as received.
    pub request_body: String,
    /// Status from the primary destination, if relayed there.
    pub primary_response_code: Option<u16>,
    /// Body from the primary destination, if relayed there.
    pub primary_response_body: Option<String>,
    /// Status from the best-effort destination, if relayed there.
    pub besteffort_response_code: Option<u16>,
    /// Body from the best-effort destination, if relayed there.
    pub besteffort_response_body: Option<String>,
}

/// Trait for exchange record storage backends.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a record and assign it an id.
    ///
    /// Returns the assigned id.
    async fn insert_record(&self, record: NewZapRecord) -> Result<i64, StorageError>;

    /// Most recent records, newest first.
    ///
    /// `limit` caps the row count (`None` means unbounded); `before_id`
    /// restricts to rows older than the given id, for paging.
    async fn recent_records(
        &self,
        limit: Option<i64>,
        before_id: Option<i64>,
    ) -> Result<Vec<ZapRecord>, StorageError>;

    /// Delete records whose `request_time` sorts before `cutoff`.
    ///
    /// `cutoff` is civil time in record format; the comparison is
    /// textual, which matches chronological order for that format.
    /// Returns the number of records deleted.
    async fn prune_records_before(&self, cutoff: &str) -> Result<u64, StorageError>;

    /// Number of records currently stored.
    async fn record_count(&self) -> Result<u64, StorageError>;

    /// Highest id currently in the table, or 0 when empty.
    async fn last_record_id(&self) -> Result<i64, StorageError>;

    /// Read one relay setting.
    async fn get_setting(&self, name: &str) -> Result<Option<String>, StorageError>;

    /// Write one relay setting, replacing any existing value.
    async fn set_setting(&self, name: &str, value: &str) -> Result<(), StorageError>;
}
