//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.
//! Each listing page's reconciliation is one transaction; the api call log
//! uses a two-phase insert-then-patch write per attempt.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{ApiCallRecord, CanonicalItem, ItemRecord, ReconcileStats, SnapshotRecord};
use crate::SkimmerError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::HashSet;
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates a database at the given path
    pub fn new(path: &Path) -> Result<Self, SkimmerError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self, SkimmerError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl Storage for SqliteStorage {
    // ===== Listing Snapshots =====

    fn get_snapshot(&self, url: &str) -> StorageResult<Option<SnapshotRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, url, content_fingerprint, last_checked_at, last_changed_at
             FROM snapshots WHERE url = ?1",
        )?;

        let snapshot = stmt
            .query_row(params![url], |row| {
                Ok(SnapshotRecord {
                    id: row.get(0)?,
                    url: row.get(1)?,
                    content_fingerprint: row.get(2)?,
                    last_checked_at: row.get(3)?,
                    last_changed_at: row.get(4)?,
                })
            })
            .optional()?;

        Ok(snapshot)
    }

    fn touch_snapshot(&mut self, url: &str, checked_at: DateTime<Utc>) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE snapshots SET last_checked_at = ?1 WHERE url = ?2",
            params![checked_at.to_rfc3339(), url],
        )?;

        if updated == 0 {
            return Err(StorageError::SnapshotNotFound(url.to_string()));
        }

        Ok(())
    }

    fn apply_listing(
        &mut self,
        url: &str,
        fingerprint: &str,
        items: &[CanonicalItem],
        now: DateTime<Utc>,
    ) -> StorageResult<ReconcileStats> {
        let tx = self.conn.transaction()?;
        let now_str = now.to_rfc3339();

        // Snapshot upsert: a changed page always moves both timestamps
        tx.execute(
            "INSERT INTO snapshots (url, content_fingerprint, last_checked_at, last_changed_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(url) DO UPDATE SET
                 content_fingerprint = excluded.content_fingerprint,
                 last_checked_at = excluded.last_checked_at,
                 last_changed_at = excluded.last_changed_at",
            params![url, fingerprint, now_str],
        )?;
        let snapshot_id: i64 =
            tx.query_row("SELECT id FROM snapshots WHERE url = ?1", params![url], |row| {
                row.get(0)
            })?;

        let mut stats = ReconcileStats::default();
        for item in items {
            let item_stats = reconcile_item(&tx, snapshot_id, item, &now_str)?;
            stats.add(&item_stats);
        }

        tx.commit()?;
        Ok(stats)
    }

    // ===== Items and tags (read side) =====

    fn get_item(&self, identity_url: &str) -> StorageResult<Option<ItemRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT i.id, i.identity_url, i.description, l.name, i.last_activity_at,
                    i.source_snapshot_id, i.created_at, i.updated_at
             FROM items i
             LEFT JOIN languages l ON l.id = i.language_id
             WHERE i.identity_url = ?1",
        )?;

        let item = stmt
            .query_row(params![identity_url], |row| {
                Ok(ItemRecord {
                    id: row.get(0)?,
                    identity_url: row.get(1)?,
                    description: row.get(2)?,
                    language: row.get(3)?,
                    last_activity_at: row.get(4)?,
                    source_snapshot_id: row.get(5)?,
                    created_at: row.get(6)?,
                    updated_at: row.get(7)?,
                })
            })
            .optional()?;

        Ok(item)
    }

    fn get_item_tags(&self, item_id: i64) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.name FROM tags t
             JOIN item_tags it ON it.tag_id = t.id
             WHERE it.item_id = ?1
             ORDER BY t.name",
        )?;

        let tags = stmt
            .query_map(params![item_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tags)
    }

    // ===== Api call log =====

    fn log_call_start(&mut self, url: &str, started_at: DateTime<Utc>) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO api_calls (url, start_time) VALUES (?1, ?2)",
            params![url, started_at.to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn log_call_end(
        &mut self,
        call_id: i64,
        status: Option<u16>,
        ended_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE api_calls SET status = ?1, end_time = ?2 WHERE id = ?3",
            params![status, ended_at.to_rfc3339(), call_id],
        )?;

        if updated == 0 {
            return Err(StorageError::ApiCallNotFound(call_id));
        }

        Ok(())
    }

    fn list_api_calls(&self) -> StorageResult<Vec<ApiCallRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, url, status, start_time, end_time FROM api_calls ORDER BY id",
        )?;

        let calls = stmt
            .query_map([], |row| {
                Ok(ApiCallRecord {
                    id: row.get(0)?,
                    url: row.get(1)?,
                    status: row.get(2)?,
                    start_time: row.get(3)?,
                    end_time: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(calls)
    }

    // ===== Statistics =====

    fn count_snapshots(&self) -> StorageResult<u64> {
        count_table(&self.conn, "snapshots")
    }

    fn count_items(&self) -> StorageResult<u64> {
        count_table(&self.conn, "items")
    }

    fn count_tags(&self) -> StorageResult<u64> {
        count_table(&self.conn, "tags")
    }

    fn count_item_tags(&self) -> StorageResult<u64> {
        count_table(&self.conn, "item_tags")
    }
}

fn count_table(conn: &Connection, table: &str) -> StorageResult<u64> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })?;
    Ok(count as u64)
}

/// Finds a language by name, inserting it if absent
fn get_or_create_language(tx: &Transaction, name: &str) -> Result<i64, rusqlite::Error> {
    let existing: Option<i64> = tx
        .query_row("SELECT id FROM languages WHERE name = ?1", params![name], |row| {
            row.get(0)
        })
        .optional()?;

    if let Some(id) = existing {
        return Ok(id);
    }

    tx.execute("INSERT INTO languages (name) VALUES (?1)", params![name])?;
    Ok(tx.last_insert_rowid())
}

/// Finds a tag by name, inserting it if absent
fn get_or_create_tag(tx: &Transaction, name: &str) -> Result<i64, rusqlite::Error> {
    let existing: Option<i64> = tx
        .query_row("SELECT id FROM tags WHERE name = ?1", params![name], |row| {
            row.get(0)
        })
        .optional()?;

    if let Some(id) = existing {
        return Ok(id);
    }

    tx.execute("INSERT INTO tags (name) VALUES (?1)", params![name])?;
    Ok(tx.last_insert_rowid())
}

/// Upserts one item and reconciles its tag set inside the page transaction
fn reconcile_item(
    tx: &Transaction,
    snapshot_id: i64,
    item: &CanonicalItem,
    now_str: &str,
) -> StorageResult<ReconcileStats> {
    let mut stats = ReconcileStats::default();

    let language_id = item
        .language
        .as_deref()
        .map(|name| get_or_create_language(tx, name))
        .transpose()?;
    let activity = item.last_activity_at.map(|t| t.to_rfc3339());

    let existing: Option<(i64, Option<String>, Option<i64>, Option<String>, i64)> = tx
        .query_row(
            "SELECT id, description, language_id, last_activity_at, source_snapshot_id
             FROM items WHERE identity_url = ?1",
            params![item.identity_url],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            },
        )
        .optional()?;

    let item_id = match existing {
        None => {
            tx.execute(
                "INSERT INTO items (identity_url, description, language_id, last_activity_at,
                                    source_snapshot_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    item.identity_url,
                    item.description,
                    language_id,
                    activity,
                    snapshot_id,
                    now_str
                ],
            )?;
            stats.items_created += 1;
            tx.last_insert_rowid()
        }
        Some((id, stored_desc, stored_lang, stored_activity, stored_snapshot)) => {
            // Field-by-field diff. An observed None means "not seen on this
            // listing" and leaves the stored value alone.
            let mut changed = false;

            if let Some(desc) = item.description.as_deref() {
                if stored_desc.as_deref() != Some(desc) {
                    tx.execute(
                        "UPDATE items SET description = ?1 WHERE id = ?2",
                        params![desc, id],
                    )?;
                    changed = true;
                }
            }
            if let Some(lang_id) = language_id {
                if stored_lang != Some(lang_id) {
                    tx.execute(
                        "UPDATE items SET language_id = ?1 WHERE id = ?2",
                        params![lang_id, id],
                    )?;
                    changed = true;
                }
            }
            if let Some(act) = activity.as_deref() {
                if stored_activity.as_deref() != Some(act) {
                    tx.execute(
                        "UPDATE items SET last_activity_at = ?1 WHERE id = ?2",
                        params![act, id],
                    )?;
                    changed = true;
                }
            }
            if stored_snapshot != snapshot_id {
                tx.execute(
                    "UPDATE items SET source_snapshot_id = ?1 WHERE id = ?2",
                    params![snapshot_id, id],
                )?;
                changed = true;
            }

            if changed {
                tx.execute(
                    "UPDATE items SET updated_at = ?1 WHERE id = ?2",
                    params![now_str, id],
                )?;
                stats.items_updated += 1;
            }

            id
        }
    };

    // Tag set reconciliation: stored set converges to the observed set.
    // Links in the intersection are left untouched.
    let mut stmt = tx.prepare(
        "SELECT t.name FROM tags t
         JOIN item_tags it ON it.tag_id = t.id
         WHERE it.item_id = ?1",
    )?;
    let stored_tags: HashSet<String> = stmt
        .query_map(params![item_id], |row| row.get(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    let observed_tags: HashSet<&str> = item.tags.iter().map(String::as_str).collect();

    for stale in stored_tags
        .iter()
        .filter(|name| !observed_tags.contains(name.as_str()))
    {
        tx.execute(
            "DELETE FROM item_tags
             WHERE item_id = ?1 AND tag_id = (SELECT id FROM tags WHERE name = ?2)",
            params![item_id, stale],
        )?;
        stats.tags_unlinked += 1;
    }

    for name in observed_tags
        .iter()
        .filter(|name| !stored_tags.contains(**name))
    {
        let tag_id = get_or_create_tag(tx, name)?;
        tx.execute(
            "INSERT OR IGNORE INTO item_tags (item_id, tag_id) VALUES (?1, ?2)",
            params![item_id, tag_id],
        )?;
        stats.tags_linked += 1;
    }

    Ok(stats)
}
