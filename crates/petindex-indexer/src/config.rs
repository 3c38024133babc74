//! Indexer configuration.
//!
//! Layered with the `config` crate: an optional TOML file, then environment
//! variables prefixed `PETINDEX_`, with `__` separating nested keys
//! (`PETINDEX_JOIN__STRATEGY=chained`). Every field has a default, so a
//! missing file is valid.

use std::path::{Path, PathBuf};

use petindex_core::{JoinConfig, enrich::DEFAULT_KEYWORD_LIMIT};
use petindex_rake::Rake;
use serde::Deserialize;

use crate::Result;

/// Index path that selects an in-memory database.
pub const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
  /// SQLite file holding the document index. `~` is expanded.
  pub index_path: PathBuf,
  pub join:       JoinConfig,
  pub keywords:   KeywordConfig,
  pub pipeline:   PipelineConfig,
}

impl Default for IndexerConfig {
  fn default() -> Self {
    Self {
      index_path: PathBuf::from("petindex.db"),
      join:       JoinConfig::default(),
      keywords:   KeywordConfig::default(),
      pipeline:   PipelineConfig::default(),
    }
  }
}

impl IndexerConfig {
  /// Read `file` (if it exists) and overlay the environment.
  pub fn load(file: &Path) -> Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(file).required(false))
      .add_source(
        config::Environment::with_prefix("PETINDEX")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true)
          .list_separator(",")
          .with_list_parse_key("keywords.extra_stop_words"),
      )
      .build()?;
    Ok(settings.try_deserialize()?)
  }

  /// `index_path` with a leading `~` expanded; `None` for an in-memory
  /// index.
  pub fn resolved_index_path(&self) -> Option<PathBuf> {
    if self.index_path.as_os_str() == IN_MEMORY {
      return None;
    }
    Some(expand_tilde(&self.index_path))
  }
}

/// The `[keywords]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
  /// Keywords kept per visit.
  pub limit:            usize,
  pub extra_stop_words: Vec<String>,
}

impl Default for KeywordConfig {
  fn default() -> Self {
    Self { limit: DEFAULT_KEYWORD_LIMIT, extra_stop_words: Vec::new() }
  }
}

impl KeywordConfig {
  pub fn extractor(&self) -> Rake {
    Rake::english().with_stop_words(&self.extra_stop_words)
  }
}

/// The `[pipeline]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  pub on_malformed: OnMalformed,
}

/// What to do with a record that cannot be normalized.
///
/// Records naming an unknown table always halt the run regardless.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnMalformed {
  #[default]
  Halt,
  /// Log a warning and move on to the next record.
  Skip,
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Some(home) = std::env::var_os("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use petindex_core::{JoinStrategy, enrich::KeywordExtractor as _};

  use super::*;

  fn from_toml(toml: &str) -> IndexerConfig {
    config::Config::builder()
      .add_source(config::File::from_str(toml, config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn empty_file_uses_defaults() {
    let cfg = from_toml("");
    assert_eq!(cfg.index_path, PathBuf::from("petindex.db"));
    assert_eq!(cfg.join.strategy, JoinStrategy::Nested);
    assert!(cfg.join.max_owners.is_none());
    assert_eq!(cfg.keywords.limit, 5);
    assert_eq!(cfg.pipeline.on_malformed, OnMalformed::Halt);
  }

  #[test]
  fn all_sections() {
    let cfg = from_toml(
      r#"
        index_path = ":memory:"

        [join]
        strategy   = "chained"
        max_owners = 1000

        [keywords]
        limit            = 3
        extra_stop_words = ["routine"]

        [pipeline]
        on_malformed = "skip"
      "#,
    );
    assert!(cfg.resolved_index_path().is_none());
    assert_eq!(cfg.join.strategy, JoinStrategy::Chained);
    assert_eq!(cfg.join.max_owners.map(|n| n.get()), Some(1000));
    assert_eq!(cfg.keywords.limit, 3);
    assert_eq!(cfg.pipeline.on_malformed, OnMalformed::Skip);
    let keywords = cfg.keywords.extractor().extract("routine checkup");
    assert_eq!(keywords, ["checkup"]);
  }

  #[test]
  fn missing_file_is_not_an_error() {
    let cfg = IndexerConfig::load(Path::new("/nonexistent/petindex.toml"))
      .unwrap();
    assert_eq!(cfg.keywords.limit, 5);
  }

  #[test]
  fn relative_paths_are_kept() {
    let cfg = from_toml(r#"index_path = "data/index.db""#);
    assert_eq!(cfg.resolved_index_path(), Some(PathBuf::from("data/index.db")));
  }
}
