//! The `DocumentSink` trait: where emitted owner documents are written.
//!
//! The trait is implemented by index backends (e.g. `petindex-store-sqlite`).
//! The pipeline depends on this abstraction, not on any concrete backend.

use std::future::Future;

use crate::{aggregate::Owner, event::OwnerId};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`DocumentSink::search`].
#[derive(Debug, Clone, Default)]
pub struct DocumentQuery {
  /// Free-text filter applied over the serialised document.
  pub text:   Option<String>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

/// What an upsert did to the stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
  Inserted,
  Updated,
  /// The stored document was already identical; nothing was written.
  Unchanged,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// An index of owner documents keyed by owner id.
///
/// Writes are upserts: the same or an evolving document for one owner may be
/// written any number of times, and each write overwrites the previous one.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait DocumentSink: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Insert or overwrite the document for `owner.id`.
  fn upsert<'a>(
    &'a self,
    owner: &'a Owner,
  ) -> impl Future<Output = Result<UpsertOutcome, Self::Error>> + Send + 'a;

  /// Remove the document for `id`. Returns whether one existed.
  fn delete(
    &self,
    id: OwnerId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Fetch the stored document for `id`.
  fn get(
    &self,
    id: OwnerId,
  ) -> impl Future<Output = Result<Option<Owner>, Self::Error>> + Send + '_;

  /// Documents matching `query`, ordered by owner id.
  fn search<'a>(
    &'a self,
    query: &'a DocumentQuery,
  ) -> impl Future<Output = Result<Vec<Owner>, Self::Error>> + Send + 'a;
}
