//! Least-recently-touched ordering over owner keys, used to bound join state.

use std::collections::{BTreeMap, HashMap};

use crate::event::OwnerId;

#[derive(Debug, Default)]
pub struct Recency {
  tick:    u64,
  by_key:  HashMap<OwnerId, u64>,
  by_tick: BTreeMap<u64, OwnerId>,
}

impl Recency {
  pub fn new() -> Self { Self::default() }

  /// Mark `key` as the most recently touched.
  pub fn touch(&mut self, key: OwnerId) {
    self.tick += 1;
    if let Some(old) = self.by_key.insert(key, self.tick) {
      self.by_tick.remove(&old);
    }
    self.by_tick.insert(self.tick, key);
  }

  pub fn forget(&mut self, key: OwnerId) {
    if let Some(old) = self.by_key.remove(&key) {
      self.by_tick.remove(&old);
    }
  }

  /// Remove and return the least recently touched key.
  pub fn pop_oldest(&mut self) -> Option<OwnerId> {
    let (_, key) = self.by_tick.pop_first()?;
    self.by_key.remove(&key);
    Some(key)
  }

  pub fn len(&self) -> usize { self.by_key.len() }

  pub fn is_empty(&self) -> bool { self.by_key.is_empty() }
}
