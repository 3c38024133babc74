//! The [`Denormalizer`] trait and join configuration.
//!
//! Two implementations fold the same event stream into the same documents:
//! [`NestedJoiner`] in a single pass with routing indices, and
//! [`ChainedJoiner`] as two chained [`OneToMany`](crate::join::OneToMany)
//! stages. Which one runs is a configuration choice.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::{
  aggregate::Owner,
  chained::ChainedJoiner,
  emission::Decision,
  event::{ChangeEvent, OwnerId},
  joiner::NestedJoiner,
};

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Keyed, stateful fold of change events into owner documents.
///
/// Implementations are single-threaded state machines: the caller must feed
/// every event that can affect one owner through the same instance, one at a
/// time. Out-of-order and duplicate arrival are normal operating conditions,
/// never errors.
pub trait Denormalizer: Send {
  /// Fold one event. Returns the owner document it produced, or `None` when
  /// the document is not complete enough to emit.
  fn ingest(&mut self, event: ChangeEvent) -> Option<Owner>;

  /// Drop all state for `owner_id` and the pets attached to it. A later
  /// event for the same key starts over from nothing. Returns whether any
  /// state existed.
  fn close(&mut self, owner_id: OwnerId) -> bool;

  /// The current document for `owner_id`, if the owner is complete.
  fn snapshot(&self, owner_id: OwnerId) -> Option<Owner>;

  /// Owners that lost a pet to another owner since the last call. Their
  /// previously emitted documents still list that pet.
  fn take_displaced(&mut self) -> Vec<OwnerId>;

  fn stats(&self) -> JoinStats;
}

impl<D: Denormalizer + ?Sized> Denormalizer for Box<D> {
  fn ingest(&mut self, event: ChangeEvent) -> Option<Owner> {
    (**self).ingest(event)
  }

  fn close(&mut self, owner_id: OwnerId) -> bool { (**self).close(owner_id) }

  fn snapshot(&self, owner_id: OwnerId) -> Option<Owner> {
    (**self).snapshot(owner_id)
  }

  fn take_displaced(&mut self) -> Vec<OwnerId> { (**self).take_displaced() }

  fn stats(&self) -> JoinStats { (**self).stats() }
}

// ─── Stats ───────────────────────────────────────────────────────────────────

/// Point-in-time gauges plus running counters for a denormalizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JoinStats {
  /// Owner keys holding any state, complete or shell.
  pub owners:          usize,
  pub complete_owners: usize,
  /// Pet keys holding any state.
  pub pets:            usize,
  /// Items held back until an ancestor shows up.
  pub pending:         usize,
  pub emitted:         u64,
  pub suppressed:      u64,
  /// Owners dropped to stay within `max_owners`.
  pub evicted:         u64,
}

impl JoinStats {
  pub(crate) fn record(&mut self, decision: Decision) {
    match decision {
      Decision::Emit => self.emitted += 1,
      Decision::Suppress(_) => self.suppressed += 1,
    }
  }
}

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinStrategy {
  /// Single pass over all three tables.
  #[default]
  Nested,
  /// Pets ⋈ visits by pet id, then owners ⋈ pets by owner id.
  Chained,
}

/// The `[join]` configuration section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
  pub strategy:   JoinStrategy,
  /// Upper bound on owner keys held in memory. Least recently touched owners
  /// beyond it are closed. Unbounded when absent.
  pub max_owners: Option<NonZeroUsize>,
}

impl JoinConfig {
  pub fn build(&self) -> Box<dyn Denormalizer> {
    match self.strategy {
      JoinStrategy::Nested => Box::new(NestedJoiner::new(self.max_owners)),
      JoinStrategy::Chained => Box::new(ChainedJoiner::new(self.max_owners)),
    }
  }
}
