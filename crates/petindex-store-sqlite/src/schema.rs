//! SQL schema for the document index.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per owner; every write overwrites the previous document.
CREATE TABLE IF NOT EXISTS documents (
    owner_id     INTEGER PRIMARY KEY,
    document     TEXT    NOT NULL,   -- JSON owner document
    content_hash TEXT    NOT NULL,   -- SHA-256 hex of `document`
    indexed_at   TEXT    NOT NULL,   -- ISO 8601 UTC of the last change
    revision     INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS documents_indexed_idx ON documents(indexed_at);

PRAGMA user_version = 1;
";
