//! The keyed incremental one-to-many join primitive.
//!
//! [`OneToMany`] keeps, per key, the current parent record (if its defining
//! event has been seen) and the children that arrived before it. Children
//! are buffered only while the parent is absent; the buffer is folded into
//! the parent, in arrival order, the moment the parent shows up.
//!
//! The caller routes each item by key: a parent by its own id, a child by the
//! foreign key referencing its parent. All items for one key must be ingested
//! by a single worker, one at a time.

use std::{collections::HashMap, hash::Hash};

use tracing::trace;

use crate::aggregate::Aggregate;

/// An item of either side of the relation.
pub enum Item<P: Aggregate> {
  /// The "one" side: a new version of the parent record.
  One(P),
  /// The "many" side: a child referencing the parent.
  Many(P::Child),
}

struct Slot<P: Aggregate> {
  current:  Option<P>,
  buffered: Vec<P::Child>,
}

impl<P: Aggregate> Default for Slot<P> {
  fn default() -> Self { Self { current: None, buffered: Vec::new() } }
}

/// Per-key join state for a parent type `P` and its child type `P::Child`.
pub struct OneToMany<K, P: Aggregate> {
  slots: HashMap<K, Slot<P>>,
}

impl<K, P: Aggregate> Default for OneToMany<K, P> {
  fn default() -> Self { Self { slots: HashMap::new() } }
}

impl<K, P> OneToMany<K, P>
where
  K: Eq + Hash + Copy + std::fmt::Debug,
  P: Aggregate,
{
  pub fn new() -> Self { Self::default() }

  /// Fold one item into the state for `key`.
  ///
  /// Returns a snapshot of the parent whenever one is materialized for `key`
  /// after the fold, and `None` while only children are known.
  pub fn ingest(&mut self, key: K, item: Item<P>) -> Option<P> {
    let slot = self.slots.entry(key).or_default();
    match item {
      Item::One(incoming) => match slot.current.as_mut() {
        None => {
          let mut parent = incoming;
          let buffered = std::mem::take(&mut slot.buffered);
          trace!(?key, buffered = buffered.len(), "parent materialized");
          for child in buffered {
            parent.merge(child);
          }
          slot.current = Some(parent.clone());
          Some(parent)
        }
        Some(current) if *current == incoming => Some(current.clone()),
        Some(current) => {
          current.update_from(incoming);
          Some(current.clone())
        }
      },
      Item::Many(child) => match slot.current.as_mut() {
        None => {
          slot.buffered.push(child);
          trace!(?key, buffered = slot.buffered.len(), "child buffered");
          None
        }
        Some(current) => {
          current.merge(child);
          Some(current.clone())
        }
      },
    }
  }

  /// The materialized parent for `key`, if any.
  pub fn get(&self, key: K) -> Option<&P> {
    self.slots.get(&key).and_then(|s| s.current.as_ref())
  }

  /// Mutate the materialized parent for `key` in place, if there is one.
  pub fn modify(&mut self, key: K, f: impl FnOnce(&mut P)) -> bool {
    match self.slots.get_mut(&key).and_then(|s| s.current.as_mut()) {
      Some(parent) => {
        f(parent);
        true
      }
      None => false,
    }
  }

  /// Drop buffered children for `key` that do not satisfy `keep`.
  pub fn retain_buffered(
    &mut self,
    key: K,
    keep: impl FnMut(&P::Child) -> bool,
  ) {
    if let Some(slot) = self.slots.get_mut(&key) {
      slot.buffered.retain(keep);
    }
  }

  /// Forget everything known about `key`. Returns whether any state existed.
  pub fn remove(&mut self, key: K) -> bool { self.slots.remove(&key).is_some() }

  /// Number of keys with any state.
  pub fn len(&self) -> usize { self.slots.len() }

  pub fn is_empty(&self) -> bool { self.slots.is_empty() }

  /// Number of keys with a materialized parent.
  pub fn materialized(&self) -> usize {
    self.slots.values().filter(|s| s.current.is_some()).count()
  }

  /// Total number of children waiting for their parent.
  pub fn buffered(&self) -> usize {
    self.slots.values().map(|s| s.buffered.len()).sum()
  }
}
