//! The indexing pipeline: raw change record → normalize → enrich → join →
//! upsert.
//!
//! One [`Pipeline`] owns one denormalizer, so every record is processed on
//! the task that calls [`Pipeline::run`], in arrival order.

use petindex_core::{
  Change, ChangeEvent, ChangeOp, Denormalizer, DocumentSink, JoinStats,
  UpsertOutcome,
  enrich::{self, KeywordExtractor},
};
use petindex_rake::Rake;
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _};
use tracing::{debug, error, info, warn};

use crate::{
  Error, Result,
  config::{IndexerConfig, OnMalformed},
};

/// What a single record did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
  /// A complete owner document was written to the sink.
  Emitted(UpsertOutcome),
  /// The record was folded in but its owner is not complete yet.
  Suppressed,
  /// An owner was deleted: its join state and document are gone.
  Closed,
  /// The record was ignored.
  Skipped,
}

/// Counters for one [`Pipeline::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
  /// Non-blank input lines.
  pub lines:      u64,
  pub emitted:    u64,
  /// Emissions the sink already had verbatim.
  pub unchanged:  u64,
  pub suppressed: u64,
  pub closed:     u64,
  pub skipped:    u64,
}

impl RunSummary {
  fn record(&mut self, outcome: StepOutcome) {
    match outcome {
      StepOutcome::Emitted(upsert) => {
        self.emitted += 1;
        if upsert == UpsertOutcome::Unchanged {
          self.unchanged += 1;
        }
      }
      StepOutcome::Suppressed => self.suppressed += 1,
      StepOutcome::Closed => self.closed += 1,
      StepOutcome::Skipped => self.skipped += 1,
    }
  }
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

pub struct Pipeline<D, K, S> {
  joiner:        D,
  extractor:     K,
  sink:          S,
  keyword_limit: usize,
  on_malformed:  OnMalformed,
}

impl<S: DocumentSink> Pipeline<Box<dyn Denormalizer>, Rake, S> {
  /// A pipeline with the configured join strategy and keyword extractor.
  pub fn from_config(config: &IndexerConfig, sink: S) -> Self {
    Pipeline::new(config.join.build(), config.keywords.extractor(), sink)
      .keyword_limit(config.keywords.limit)
      .on_malformed(config.pipeline.on_malformed)
  }
}

impl<D, K, S> Pipeline<D, K, S>
where
  D: Denormalizer,
  K: KeywordExtractor,
  S: DocumentSink,
{
  pub fn new(joiner: D, extractor: K, sink: S) -> Self {
    Self {
      joiner,
      extractor,
      sink,
      keyword_limit: enrich::DEFAULT_KEYWORD_LIMIT,
      on_malformed: OnMalformed::default(),
    }
  }

  pub fn keyword_limit(mut self, limit: usize) -> Self {
    self.keyword_limit = limit;
    self
  }

  pub fn on_malformed(mut self, policy: OnMalformed) -> Self {
    self.on_malformed = policy;
    self
  }

  pub fn sink(&self) -> &S { &self.sink }

  pub fn stats(&self) -> JoinStats { self.joiner.stats() }

  /// Run one raw change record through the pipeline.
  pub async fn process_line(&mut self, line: &str) -> Result<StepOutcome> {
    let change = match petindex_cdc::parse(line) {
      Ok(change) => change,
      Err(e) if self.skips(&e) => {
        warn!(error = %e, "skipping malformed change record");
        return Ok(StepOutcome::Skipped);
      }
      Err(e) => return Err(e.into()),
    };
    self.apply(change).await
  }

  fn skips(&self, e: &petindex_cdc::Error) -> bool {
    self.on_malformed == OnMalformed::Skip && !e.is_schema_drift()
  }

  /// Apply an already-normalized change.
  pub async fn apply(&mut self, change: Change) -> Result<StepOutcome> {
    let Change { op, event } = change;

    if op == ChangeOp::Delete {
      return self.delete(event).await;
    }

    let event =
      enrich::enrich_event(event, &self.extractor, self.keyword_limit);
    let emitted = self.joiner.ingest(event);
    self.refresh_displaced().await?;

    let Some(owner) = emitted else {
      return Ok(StepOutcome::Suppressed);
    };

    let outcome = self.sink.upsert(&owner).await.map_err(Error::sink)?;
    debug!(owner = owner.id, ?outcome, "document emitted");
    Ok(StepOutcome::Emitted(outcome))
  }

  /// Rewrite the documents of owners that just lost a pet to another owner.
  async fn refresh_displaced(&mut self) -> Result<()> {
    for owner_id in self.joiner.take_displaced() {
      let Some(owner) = self.joiner.snapshot(owner_id) else {
        continue;
      };
      let outcome = self.sink.upsert(&owner).await.map_err(Error::sink)?;
      debug!(owner = owner_id, ?outcome, "displaced owner refreshed");
    }
    Ok(())
  }

  async fn delete(&mut self, event: ChangeEvent) -> Result<StepOutcome> {
    let row = match event {
      ChangeEvent::Owner(row) => row,
      other => {
        warn!(
          table = %other.table(),
          pet = other.pet_key(),
          "ignoring delete of a non-owner row"
        );
        return Ok(StepOutcome::Skipped);
      }
    };

    let had_state = self.joiner.close(row.id);
    let had_document = self.sink.delete(row.id).await.map_err(Error::sink)?;
    debug!(owner = row.id, had_state, had_document, "owner closed");
    Ok(StepOutcome::Closed)
  }

  /// Process newline-delimited change records until EOF.
  ///
  /// Stops at the first fatal error; everything before it has already been
  /// written to the sink.
  pub async fn run<R>(&mut self, reader: R) -> Result<RunSummary>
  where
    R: AsyncBufRead + Unpin,
  {
    info!(on_malformed = ?self.on_malformed, "indexing started");

    let mut summary = RunSummary::default();
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
      if line.trim().is_empty() {
        continue;
      }
      summary.lines += 1;

      match self.process_line(&line).await {
        Ok(outcome) => summary.record(outcome),
        Err(e) => {
          error!(line = summary.lines, error = %e, "indexing halted");
          return Err(e);
        }
      }
    }

    let stats = self.joiner.stats();
    info!(
      lines = summary.lines,
      emitted = summary.emitted,
      unchanged = summary.unchanged,
      suppressed = summary.suppressed,
      closed = summary.closed,
      skipped = summary.skipped,
      owners = stats.owners,
      pending = stats.pending,
      evicted = stats.evicted,
      "indexing finished"
    );
    Ok(summary)
  }
}

#[cfg(test)]
mod tests {
  use petindex_core::{JoinConfig, JoinStrategy, Owner, Pet, Visit};
  use petindex_store_sqlite::SqliteIndex;

  use super::*;

  const OWNER: &str =
    r#"{"__table":"owners","id":6,"first_name":"Jean","last_name":"Coleman"}"#;
  const PET: &str =
    r#"{"__table":"pets","id":7,"name":"Samantha","owner_id":6}"#;
  const VISIT: &str =
    r#"{"__table":"visits","id":1,"pet_id":7,"description":"rabies shot"}"#;

  async fn pipeline(
    strategy: JoinStrategy,
  ) -> Pipeline<Box<dyn Denormalizer>, Rake, SqliteIndex> {
    let index = SqliteIndex::open_in_memory().await.unwrap();
    let join = JoinConfig { strategy, max_owners: None };
    Pipeline::new(join.build(), Rake::english(), index)
  }

  fn coleman() -> Owner {
    Owner {
      id:         6,
      first_name: "Jean".into(),
      last_name:  "Coleman".into(),
      pets:       vec![Pet {
        id:       7,
        owner_id: 6,
        name:     "Samantha".into(),
        visits:   vec![Visit {
          description: "rabies shot".into(),
          keywords:    vec!["rabies shot".into()],
        }],
      }],
    }
  }

  fn input(lines: &[&str]) -> Vec<u8> { lines.join("\n").into_bytes() }

  const STRATEGIES: [JoinStrategy; 2] =
    [JoinStrategy::Nested, JoinStrategy::Chained];

  #[tokio::test]
  async fn in_order_arrival_indexes_full_document() {
    for strategy in STRATEGIES {
      let mut p = pipeline(strategy).await;
      let summary = p.run(&input(&[OWNER, PET, VISIT])[..]).await.unwrap();

      assert_eq!(summary.lines, 3);
      assert_eq!(summary.emitted, 3, "{strategy:?}");
      assert_eq!(p.sink().get(6).await.unwrap(), Some(coleman()));
    }
  }

  #[tokio::test]
  async fn reversed_arrival_indexes_full_document() {
    for strategy in STRATEGIES {
      let mut p = pipeline(strategy).await;
      let summary = p.run(&input(&[VISIT, PET, OWNER])[..]).await.unwrap();

      assert_eq!(summary.suppressed, 2, "{strategy:?}");
      assert_eq!(summary.emitted, 1, "{strategy:?}");
      assert_eq!(p.sink().get(6).await.unwrap(), Some(coleman()));
    }
  }

  #[tokio::test]
  async fn redelivery_leaves_document_unchanged() {
    let mut p = pipeline(JoinStrategy::Nested).await;
    let summary = p
      .run(&input(&[OWNER, PET, VISIT, OWNER])[..])
      .await
      .unwrap();

    assert_eq!(summary.emitted, 4);
    assert_eq!(summary.unchanged, 1);
  }

  #[tokio::test]
  async fn keyword_limit_applies_to_visits() {
    let index = SqliteIndex::open_in_memory().await.unwrap();
    let mut p =
      Pipeline::new(JoinConfig::default().build(), Rake::english(), index)
        .keyword_limit(1);
    let visit = r#"{"__table":"visits","pet_id":7,"description":"Spayed, then given a rabies shot"}"#;
    p.run(&input(&[OWNER, PET, visit])[..]).await.unwrap();

    let owner = p.sink().get(6).await.unwrap().unwrap();
    assert_eq!(owner.pets[0].visits[0].keywords, ["rabies shot"]);
  }

  #[tokio::test]
  async fn blank_lines_are_ignored() {
    let mut p = pipeline(JoinStrategy::Nested).await;
    let summary = p.run(&input(&["", OWNER, "   ", ""])[..]).await.unwrap();
    assert_eq!(summary.lines, 1);
    assert_eq!(summary.emitted, 1);
  }

  // ─── Failure policy ────────────────────────────────────────────────────────

  #[tokio::test]
  async fn unknown_table_is_fatal_even_when_skipping() {
    let mut p = pipeline(JoinStrategy::Nested)
      .await
      .on_malformed(OnMalformed::Skip);
    let err = p
      .run(&input(&[OWNER, r#"{"__table":"vets","id":1}"#, PET])[..])
      .await
      .unwrap_err();

    assert!(err.is_schema_drift());
    assert_eq!(p.stats().emitted, 1);
  }

  #[tokio::test]
  async fn malformed_record_halts_by_default() {
    let mut p = pipeline(JoinStrategy::Nested).await;
    let err = p
      .run(&input(&[r#"{"__table":"pets","id":7}"#, OWNER])[..])
      .await
      .unwrap_err();

    assert!(matches!(
      err,
      Error::Cdc(petindex_cdc::Error::MalformedPayload { .. })
    ));
    assert!(p.sink().get(6).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn malformed_record_is_skipped_when_configured() {
    let mut p = pipeline(JoinStrategy::Chained)
      .await
      .on_malformed(OnMalformed::Skip);
    let summary = p
      .run(&input(&["not json", r#"{"__table":"pets","id":7}"#, OWNER])[..])
      .await
      .unwrap();

    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.emitted, 1);
  }

  // ─── Deletes ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn owner_delete_closes_state_and_document() {
    for strategy in STRATEGIES {
      let mut p = pipeline(strategy).await;
      let delete = r#"{"op":"d","source":{"table":"owners"},"before":{"id":6}}"#;
      let summary = p
        .run(&input(&[OWNER, PET, VISIT, delete, PET])[..])
        .await
        .unwrap();

      assert_eq!(summary.closed, 1, "{strategy:?}");
      assert_eq!(summary.suppressed, 1, "{strategy:?}");
      assert!(p.sink().get(6).await.unwrap().is_none());
    }
  }

  #[tokio::test]
  async fn moved_pet_leaves_previous_owner_document() {
    for strategy in STRATEGIES {
      let mut p = pipeline(strategy).await;
      let davis =
        r#"{"__table":"owners","id":4,"first_name":"Harold","last_name":"Davis"}"#;
      let moved =
        r#"{"__table":"pets","__op":"u","id":7,"name":"Samantha","owner_id":4}"#;
      p.run(&input(&[OWNER, davis, PET, VISIT, moved])[..])
        .await
        .unwrap();

      let previous = p.sink().get(6).await.unwrap().unwrap();
      assert!(previous.pets.is_empty(), "{strategy:?}");
      let current = p.sink().get(4).await.unwrap().unwrap();
      assert_eq!(current.pets.len(), 1, "{strategy:?}");
      assert_eq!(current.pets[0].visits.len(), 1, "{strategy:?}");
    }
  }

  #[tokio::test]
  async fn child_deletes_are_skipped() {
    let mut p = pipeline(JoinStrategy::Nested).await;
    let delete = r#"{"__table":"visits","__op":"d","pet_id":7}"#;
    let outcome = p.process_line(delete).await.unwrap();
    assert_eq!(outcome, StepOutcome::Skipped);
  }

  #[tokio::test]
  async fn from_config_uses_configured_strategy_and_limit() {
    let mut config = IndexerConfig::default();
    config.join.strategy = JoinStrategy::Chained;
    config.keywords.limit = 0;

    let index = SqliteIndex::open_in_memory().await.unwrap();
    let mut p = Pipeline::from_config(&config, index);
    p.run(&input(&[OWNER, PET, VISIT])[..]).await.unwrap();

    let owner = p.sink().get(6).await.unwrap().unwrap();
    assert!(owner.pets[0].visits[0].keywords.is_empty());
  }
}
