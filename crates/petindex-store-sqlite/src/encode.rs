//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings; documents as compact JSON with
//! a SHA-256 content hash alongside.

use chrono::{DateTime, Utc};
use petindex_core::{Owner, OwnerId};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

// ─── Content hash ────────────────────────────────────────────────────────────

/// Lowercase hex SHA-256 of a serialised document. Identical documents hash
/// identically, which is what makes repeated upserts no-ops.
pub fn content_hash(document: &str) -> String {
  hex::encode(Sha256::digest(document.as_bytes()))
}

// ─── LIKE patterns ───────────────────────────────────────────────────────────

/// A `LIKE ... ESCAPE '\'` pattern matching `text` anywhere, with `%`, `_`
/// and `\` in `text` taken literally.
pub fn contains_pattern(text: &str) -> String {
  let mut pattern = String::with_capacity(text.len() + 2);
  pattern.push('%');
  for c in text.chars() {
    if matches!(c, '%' | '_' | '\\') {
      pattern.push('\\');
    }
    pattern.push(c);
  }
  pattern.push('%');
  pattern
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// A stored document together with its index metadata.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
  pub owner:        Owner,
  pub content_hash: String,
  pub indexed_at:   DateTime<Utc>,
  /// Number of writes that changed the document.
  pub revision:     u64,
}

/// Raw values read directly from a `documents` row.
pub struct RawDocument {
  pub owner_id:     OwnerId,
  pub document:     String,
  pub content_hash: String,
  pub indexed_at:   String,
  pub revision:     i64,
}

impl RawDocument {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      owner_id:     row.get(0)?,
      document:     row.get(1)?,
      content_hash: row.get(2)?,
      indexed_at:   row.get(3)?,
      revision:     row.get(4)?,
    })
  }

  pub fn into_owner(self) -> Result<Owner> {
    let mut owner = Owner::from_document(&self.document)?;
    owner.id = self.owner_id;
    Ok(owner)
  }

  pub fn into_indexed(self) -> Result<IndexedDocument> {
    let indexed_at = decode_dt(&self.indexed_at)?;
    let content_hash = self.content_hash.clone();
    let revision = self.revision.max(0) as u64;
    Ok(IndexedDocument {
      owner: self.into_owner()?,
      content_hash,
      indexed_at,
      revision,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn hash_is_stable_and_content_sensitive() {
    let a = content_hash(r#"{"id":6}"#);
    assert_eq!(a, content_hash(r#"{"id":6}"#));
    assert_ne!(a, content_hash(r#"{"id":7}"#));
    assert_eq!(a.len(), 64);
  }

  #[test]
  fn like_wildcards_are_escaped() {
    assert_eq!(contains_pattern("rabies"), "%rabies%");
    assert_eq!(contains_pattern("50%"), r"%50\%%");
    assert_eq!(contains_pattern(r"O_Neil\"), r"%O\_Neil\\%");
  }

  #[test]
  fn timestamps_round_trip() {
    let ts = Utc.with_ymd_and_hms(2010, 3, 4, 12, 0, 0).unwrap();
    assert_eq!(decode_dt(&encode_dt(ts)).unwrap(), ts);
    assert!(matches!(decode_dt("yesterday"), Err(Error::DateParse(_))));
  }
}
