//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Listing snapshot persistence and change timestamps
//! - Item, language and tag reconciliation
//! - The append-only api call log

mod schema;
mod sqlite;
mod traits;

pub use schema::initialize_schema;
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::SkimmerError;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, SkimmerError> {
    Ok(SqliteStorage::new(path)?)
}

/// Represents one crawled listing page
#[derive(Debug, Clone)]
pub struct SnapshotRecord {
    pub id: i64,
    pub url: String,
    pub content_fingerprint: Option<String>,
    pub last_checked_at: Option<String>,
    pub last_changed_at: Option<String>,
}

/// Represents a derived item, keyed by canonical URL
#[derive(Debug, Clone)]
pub struct ItemRecord {
    pub id: i64,
    pub identity_url: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub last_activity_at: Option<String>,
    pub source_snapshot_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// An observed item after identity canonicalization
///
/// Produced by the reconciliation engine; every `identity_url` here has
/// already passed through the canonicalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalItem {
    pub identity_url: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
}

/// Represents one outbound request attempt
#[derive(Debug, Clone)]
pub struct ApiCallRecord {
    pub id: i64,
    pub url: String,
    pub status: Option<u16>,
    pub start_time: String,
    pub end_time: Option<String>,
}

/// Write counts for one listing page's reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub items_created: u64,
    pub items_updated: u64,
    pub tags_linked: u64,
    pub tags_unlinked: u64,
}

impl ReconcileStats {
    /// Whether any item or tag write occurred
    pub fn wrote_anything(&self) -> bool {
        self.items_created + self.items_updated + self.tags_linked + self.tags_unlinked > 0
    }

    pub fn add(&mut self, other: &ReconcileStats) {
        self.items_created += other.items_created;
        self.items_updated += other.items_updated;
        self.tags_linked += other.tags_linked;
        self.tags_unlinked += other.tags_unlinked;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_wrote_anything() {
        let mut stats = ReconcileStats::default();
        assert!(!stats.wrote_anything());

        stats.items_created = 1;
        assert!(stats.wrote_anything());
    }

    #[test]
    fn test_stats_add() {
        let mut total = ReconcileStats::default();
        total.add(&ReconcileStats {
            items_created: 2,
            items_updated: 1,
            tags_linked: 5,
            tags_unlinked: 0,
        });
        total.add(&ReconcileStats {
            items_created: 0,
            items_updated: 3,
            tags_linked: 1,
            tags_unlinked: 2,
        });

        assert_eq!(total.items_created, 2);
        assert_eq!(total.items_updated, 4);
        assert_eq!(total.tags_linked, 6);
        assert_eq!(total.tags_unlinked, 2);
    }
}
