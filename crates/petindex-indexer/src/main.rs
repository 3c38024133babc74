//! `petindex` binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! document index, and indexes newline-delimited change records from a file
//! or stdin until EOF.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use petindex_indexer::{IndexerConfig, Pipeline, open_index};
use tokio::io::{AsyncBufRead, BufReader};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Pet clinic search indexer")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Newline-delimited change records; `-` reads stdin.
  #[arg(short, long, default_value = "-")]
  input: PathBuf,

  /// Index location, overriding `index_path` from the configuration.
  #[arg(long)]
  index: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let mut cfg = IndexerConfig::load(&cli.config)
    .context("failed to load configuration")?;
  if let Some(index) = cli.index {
    cfg.index_path = index;
  }

  // Open the index.
  let index_path = cfg.resolved_index_path();
  let index = open_index(index_path.as_deref())
    .await
    .with_context(|| format!("failed to open index at {:?}", cfg.index_path))?;

  let stdin = cli.input.as_os_str() == "-";
  let reader: Box<dyn AsyncBufRead + Unpin> = if stdin {
    Box::new(BufReader::new(tokio::io::stdin()))
  } else {
    let file = tokio::fs::File::open(&cli.input)
      .await
      .with_context(|| format!("failed to open {:?}", cli.input))?;
    Box::new(BufReader::new(file))
  };

  tracing::info!(
    strategy = ?cfg.join.strategy,
    index = ?cfg.index_path,
    "indexer configured"
  );

  let mut pipeline = Pipeline::from_config(&cfg, index);
  let summary = pipeline.run(reader).await.context("indexing failed")?;

  tracing::info!(
    documents = pipeline.sink().count().await?,
    emitted = summary.emitted,
    "done"
  );

  Ok(())
}
