//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{ApiCallRecord, CanonicalItem, ItemRecord, ReconcileStats, SnapshotRecord};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Api call record not found: {0}")]
    ApiCallNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the crawler.
pub trait Storage {
    // ===== Listing Snapshots =====

    /// Gets the snapshot record for a listing URL, if one exists
    fn get_snapshot(&self, url: &str) -> StorageResult<Option<SnapshotRecord>>;

    /// Records a visit to an unchanged listing page
    ///
    /// Updates only `last_checked_at`; the fingerprint and
    /// `last_changed_at` are untouched. The snapshot row must already
    /// exist (a URL with no stored fingerprint is always treated as
    /// changed upstream).
    fn touch_snapshot(&mut self, url: &str, checked_at: DateTime<Utc>) -> StorageResult<()>;

    /// Applies one changed listing page as a single transaction
    ///
    /// Upserts the snapshot row (new fingerprint, `last_changed_at` and
    /// `last_checked_at` set to `now`), then for each item performs
    /// get-or-create of its language and identity, a field-by-field diff
    /// update of mutable fields, and set-reconciliation of its tag links.
    /// Either everything commits or nothing does.
    fn apply_listing(
        &mut self,
        url: &str,
        fingerprint: &str,
        items: &[CanonicalItem],
        now: DateTime<Utc>,
    ) -> StorageResult<ReconcileStats>;

    // ===== Items and tags (read side) =====

    /// Gets an item by its canonical identity URL
    fn get_item(&self, identity_url: &str) -> StorageResult<Option<ItemRecord>>;

    /// Gets the tag names currently linked to an item, sorted
    fn get_item_tags(&self, item_id: i64) -> StorageResult<Vec<String>>;

    // ===== Api call log =====

    /// Creates an api call record at dispatch start, returning its ID
    fn log_call_start(&mut self, url: &str, started_at: DateTime<Utc>) -> StorageResult<i64>;

    /// Patches an api call record with the observed outcome
    ///
    /// `status` is `None` when the attempt failed before a response
    /// arrived (network error).
    fn log_call_end(
        &mut self,
        call_id: i64,
        status: Option<u16>,
        ended_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Reads the whole api call log in dispatch order, for offline analysis
    fn list_api_calls(&self) -> StorageResult<Vec<ApiCallRecord>>;

    // ===== Statistics =====

    /// Counts stored listing snapshots
    fn count_snapshots(&self) -> StorageResult<u64>;

    /// Counts stored items
    fn count_items(&self) -> StorageResult<u64>;

    /// Counts stored tags
    fn count_tags(&self) -> StorageResult<u64>;

    /// Counts stored item-tag associations
    fn count_item_tags(&self) -> StorageResult<u64>;
}
