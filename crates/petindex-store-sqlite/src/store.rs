//! [`SqliteIndex`]: owner documents in one SQLite table, one row per owner.

use std::path::Path;

use chrono::Utc;
use petindex_core::{
  DocumentQuery, DocumentSink, Owner, OwnerId, UpsertOutcome,
};
use rusqlite::OptionalExtension as _;
use tracing::debug;

use crate::{
  Result,
  encode::{
    IndexedDocument, RawDocument, contains_pattern, content_hash, encode_dt,
  },
  schema::SCHEMA,
};

const SELECT_COLUMNS: &str =
  "SELECT owner_id, document, content_hash, indexed_at, revision
   FROM documents";

// ─── Index ───────────────────────────────────────────────────────────────────

/// An owner document index backed by a single SQLite file.
///
/// Clones share one background connection.
#[derive(Clone)]
pub struct SqliteIndex {
  conn: tokio_rusqlite::Connection,
}

impl SqliteIndex {
  /// Open (or create) an index at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let index = Self { conn };
    index.init_schema().await?;
    Ok(index)
  }

  /// Open a throwaway in-memory index.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let index = Self { conn };
    index.init_schema().await?;
    Ok(index)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch a document with its index metadata.
  pub async fn get_indexed(&self, id: OwnerId) -> Result<Option<IndexedDocument>> {
    let raw: Option<RawDocument> = self
      .conn
      .call(move |conn| {
        let raw = conn
          .query_row(
            &format!("{SELECT_COLUMNS} WHERE owner_id = ?1"),
            rusqlite::params![id],
            RawDocument::from_row,
          )
          .optional()?;
        Ok(raw)
      })
      .await?;

    raw.map(RawDocument::into_indexed).transpose()
  }

  /// Number of documents in the index.
  pub async fn count(&self) -> Result<u64> {
    let n: i64 = self
      .conn
      .call(|conn| {
        let n =
          conn.query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))?;
        Ok(n)
      })
      .await?;
    Ok(n.max(0) as u64)
  }
}

// ─── DocumentSink impl ───────────────────────────────────────────────────────

impl DocumentSink for SqliteIndex {
  type Error = crate::Error;

  async fn upsert(&self, owner: &Owner) -> Result<UpsertOutcome> {
    let owner_id   = owner.id;
    let document   = owner.to_document()?;
    let hash       = content_hash(&document);
    let indexed_at = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let existing: Option<String> = tx
          .query_row(
            "SELECT content_hash FROM documents WHERE owner_id = ?1",
            rusqlite::params![owner_id],
            |r| r.get(0),
          )
          .optional()?;

        let outcome = match existing {
          Some(stored) if stored == hash => UpsertOutcome::Unchanged,
          Some(_) => UpsertOutcome::Updated,
          None => UpsertOutcome::Inserted,
        };

        if outcome != UpsertOutcome::Unchanged {
          tx.execute(
            "INSERT INTO documents (owner_id, document, content_hash, indexed_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(owner_id) DO UPDATE SET
               document     = excluded.document,
               content_hash = excluded.content_hash,
               indexed_at   = excluded.indexed_at,
               revision     = documents.revision + 1",
            rusqlite::params![owner_id, document, hash, indexed_at],
          )?;
        }
        tx.commit()?;
        Ok(outcome)
      })
      .await?;

    debug!(owner = owner_id, ?outcome, "document upserted");
    Ok(outcome)
  }

  async fn delete(&self, id: OwnerId) -> Result<bool> {
    let affected = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "DELETE FROM documents WHERE owner_id = ?1",
          rusqlite::params![id],
        )?;
        Ok(n)
      })
      .await?;
    debug!(owner = id, deleted = affected > 0, "document deleted");
    Ok(affected > 0)
  }

  async fn get(&self, id: OwnerId) -> Result<Option<Owner>> {
    Ok(self.get_indexed(id).await?.map(|doc| doc.owner))
  }

  async fn search(&self, query: &DocumentQuery) -> Result<Vec<Owner>> {
    // Substring match over the serialised document.
    let text_pattern = query.text.as_deref().map(contains_pattern);
    let limit_val    = query.limit.unwrap_or(100) as i64;
    let offset_val   = query.offset.unwrap_or(0) as i64;

    let raws: Vec<RawDocument> = self
      .conn
      .call(move |conn| {
        let where_clause = if text_pattern.is_some() {
          "WHERE document LIKE ?1 ESCAPE '\\'"
        } else {
          "WHERE ?1 IS NULL"
        };
        let sql = format!(
          "{SELECT_COLUMNS}
           {where_clause}
           ORDER BY owner_id
           LIMIT ?2 OFFSET ?3"
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![text_pattern.as_deref(), limit_val, offset_val],
            RawDocument::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDocument::into_owner).collect()
  }
}
