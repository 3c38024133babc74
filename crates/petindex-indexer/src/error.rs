//! Error type for `petindex-indexer`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Cdc(#[from] petindex_cdc::Error),

  #[error("index error: {0}")]
  Store(#[from] petindex_store_sqlite::Error),

  /// A failure reported by a [`DocumentSink`](petindex_core::DocumentSink)
  /// other than the SQLite index.
  #[error("sink error: {0}")]
  Sink(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("configuration error: {0}")]
  Config(#[from] config::ConfigError),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
}

impl Error {
  pub(crate) fn sink<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Sink(Box::new(e))
  }

  /// The input does not match the joined schema.
  pub fn is_schema_drift(&self) -> bool {
    matches!(self, Self::Cdc(e) if e.is_schema_drift())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
