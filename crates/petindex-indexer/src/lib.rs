//! The pet-clinic indexing pipeline.
//!
//! Reads newline-delimited change records, folds them into owner documents,
//! and writes every complete document to a [`DocumentSink`].
//!
//! [`DocumentSink`]: petindex_core::DocumentSink

pub mod config;
pub mod error;
pub mod pipeline;

use std::path::Path;

pub use config::{IndexerConfig, OnMalformed};
pub use error::{Error, Result};
pub use pipeline::{Pipeline, RunSummary, StepOutcome};
use petindex_store_sqlite::SqliteIndex;

/// Open the SQLite index at `path`, or an in-memory one for `None`.
pub async fn open_index(path: Option<&Path>) -> Result<SqliteIndex> {
  let index = match path {
    Some(path) => SqliteIndex::open(path).await?,
    None => SqliteIndex::open_in_memory().await?,
  };
  Ok(index)
}
