//! Error types for `petindex-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The wire-level table name matches none of the joined tables. This is a
  /// schema mismatch between source and joiner and is never retried.
  #[error("unrecognized event kind: table {0:?}")]
  UnrecognizedEventKind(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
