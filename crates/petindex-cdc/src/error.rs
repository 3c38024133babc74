//! Error types for the change-record normalizer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The record names a table outside the joined schema.
  #[error("unrecognized event kind: table {0:?}")]
  UnrecognizedEventKind(String),

  #[error("change record has no table name")]
  MissingTable,

  #[error("change record has no row image")]
  MissingRow,

  #[error("unknown change op {0:?}")]
  UnknownOp(String),

  #[error("malformed {table} payload: column {column:?} missing or mistyped")]
  MalformedPayload { table: String, column: String },

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),
}

impl Error {
  /// Schema drift between source and joiner. Never worth retrying or
  /// skipping.
  pub fn is_schema_drift(&self) -> bool {
    matches!(self, Self::UnrecognizedEventKind(_))
  }
}

impl From<petindex_core::Error> for Error {
  fn from(e: petindex_core::Error) -> Self {
    match e {
      petindex_core::Error::UnrecognizedEventKind(table) => {
        Self::UnrecognizedEventKind(table)
      }
      petindex_core::Error::Serialization(e) => Self::Json(e),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
