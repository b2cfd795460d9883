//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the skimmer database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per crawled listing page
CREATE TABLE IF NOT EXISTS snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    content_fingerprint TEXT,
    last_checked_at TEXT,
    last_changed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_snapshots_url ON snapshots(url);

-- Classification references, created on demand
CREATE TABLE IF NOT EXISTS languages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

-- Items derived from listing pages, keyed by canonical URL
CREATE TABLE IF NOT EXISTS items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    identity_url TEXT NOT NULL UNIQUE,
    description TEXT,
    language_id INTEGER REFERENCES languages(id),
    last_activity_at TEXT,
    source_snapshot_id INTEGER NOT NULL REFERENCES snapshots(id),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_identity ON items(identity_url);
CREATE INDEX IF NOT EXISTS idx_items_language ON items(language_id);

-- Deduplicated labels, created on demand
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

-- Item <-> tag associations, reconciled as a set per item
CREATE TABLE IF NOT EXISTS item_tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id INTEGER NOT NULL REFERENCES items(id),
    tag_id INTEGER NOT NULL REFERENCES tags(id),
    UNIQUE(item_id, tag_id)
);

CREATE INDEX IF NOT EXISTS idx_item_tags_item ON item_tags(item_id);
CREATE INDEX IF NOT EXISTS idx_item_tags_tag ON item_tags(tag_id);

-- Append-only log of outbound request attempts
CREATE TABLE IF NOT EXISTS api_calls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    status INTEGER,
    start_time TEXT NOT NULL,
    end_time TEXT
);

CREATE INDEX IF NOT EXISTS idx_api_calls_url ON api_calls(url);
"#;

/// Initializes the database schema
///
/// Safe to call on an already-initialized database; all statements are
/// `IF NOT EXISTS`.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}
