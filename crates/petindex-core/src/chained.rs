//! Owner documents built from two chained one-to-many joins.
//!
//! The first stage joins pets with their visits, keyed by pet id. Every pet
//! it emits is fed to the second stage as a child of its owner, keyed by
//! owner id. Because each stage only emits once its own parent is known, the
//! second stage's output obeys the same completeness rule as
//! [`NestedJoiner`](crate::joiner::NestedJoiner).

use std::{collections::HashMap, num::NonZeroUsize};

use tracing::debug;

use crate::{
  aggregate::{Owner, Pet, Visit},
  denormalize::{Denormalizer, JoinStats},
  emission::{self, Completeness, Decision},
  event::{ChangeEvent, OwnerId, PetId},
  join::{Item, OneToMany},
  recency::Recency,
};

#[derive(Default)]
pub struct ChainedJoiner {
  pets:       OneToMany<PetId, Pet>,
  owners:     OneToMany<OwnerId, Owner>,
  /// The owner each pet was last handed to.
  placed:     HashMap<PetId, OwnerId>,
  /// Owners that lost a pet since the last `take_displaced`.
  displaced:  Vec<OwnerId>,
  recency:    Recency,
  max_owners: Option<NonZeroUsize>,
  tally:      JoinStats,
}

impl ChainedJoiner {
  pub fn new(max_owners: Option<NonZeroUsize>) -> Self {
    Self { max_owners, ..Self::default() }
  }

  pub fn unbounded() -> Self { Self::default() }

  /// Hand a pet emitted by the first stage to its owner.
  fn forward(&mut self, pet: Pet) -> (Option<OwnerId>, Option<Owner>) {
    let (pet_id, owner_id) = (pet.id, pet.owner_id);
    if let Some(previous) = self.placed.insert(pet_id, owner_id)
      && previous != owner_id
    {
      self.owners.modify(previous, |o| {
        o.detach(pet_id);
      });
      self.owners.retain_buffered(previous, |p| p.id != pet_id);
      self.displaced.push(previous);
      debug!(pet = pet_id, from = previous, to = owner_id, "pet moved owner");
    }
    // A buffered snapshot of this pet is superseded by the newer one.
    self.owners.retain_buffered(owner_id, |p| p.id != pet_id);
    (Some(owner_id), self.owners.ingest(owner_id, Item::Many(pet)))
  }

  fn remove_owner(&mut self, owner_id: OwnerId) -> bool {
    let removed = self.owners.remove(owner_id);
    let pets: Vec<PetId> = self
      .placed
      .iter()
      .filter(|(_, owner)| **owner == owner_id)
      .map(|(pet, _)| *pet)
      .collect();
    for pet_id in pets {
      self.placed.remove(&pet_id);
      self.pets.remove(pet_id);
    }
    removed
  }

  fn enforce_capacity(&mut self) {
    let Some(max) = self.max_owners else { return };
    while self.owners.len() > max.get() {
      let Some(oldest) = self.recency.pop_oldest() else { break };
      if self.remove_owner(oldest) {
        self.tally.evicted += 1;
        debug!(owner = oldest, "evicted least recently touched owner");
      }
    }
  }
}

impl Denormalizer for ChainedJoiner {
  fn ingest(&mut self, event: ChangeEvent) -> Option<Owner> {
    let (owner_id, out) = match event {
      ChangeEvent::Owner(row) => {
        let id = row.id;
        (Some(id), self.owners.ingest(id, Item::One(Owner::from(row))))
      }
      ChangeEvent::Pet(row) => {
        let id = row.id;
        match self.pets.ingest(id, Item::One(Pet::from(row))) {
          Some(pet) => self.forward(pet),
          None => (None, None),
        }
      }
      ChangeEvent::Visit(row) => {
        let id = row.pet_id;
        match self.pets.ingest(id, Item::Many(Visit::from(row))) {
          Some(pet) => self.forward(pet),
          None => (None, None),
        }
      }
    };

    let completeness = owner_id.map(|id| {
      Completeness::of(self.owners.get(id))
    });
    let decision = emission::decide(completeness);
    self.tally.record(decision);
    if let Decision::Suppress(reason) = decision {
      debug!(owner = ?owner_id, %reason, "emission suppressed");
    }

    if let Some(id) = owner_id {
      self.recency.touch(id);
      self.enforce_capacity();
    }
    out
  }

  fn close(&mut self, owner_id: OwnerId) -> bool {
    self.recency.forget(owner_id);
    self.remove_owner(owner_id)
  }

  fn snapshot(&self, owner_id: OwnerId) -> Option<Owner> {
    self.owners.get(owner_id).cloned()
  }

  fn take_displaced(&mut self) -> Vec<OwnerId> {
    std::mem::take(&mut self.displaced)
  }

  fn stats(&self) -> JoinStats {
    JoinStats {
      owners: self.owners.len(),
      complete_owners: self.owners.materialized(),
      pets: self.pets.len(),
      pending: self.pets.buffered() + self.owners.buffered(),
      ..self.tally
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    event::{OwnerRow, PetRow, VisitRow},
    joiner::NestedJoiner,
  };

  fn owner(id: OwnerId, last: &str) -> ChangeEvent {
    ChangeEvent::Owner(OwnerRow {
      id,
      first_name: "Jean".into(),
      last_name: last.into(),
    })
  }

  fn pet(id: PetId, name: &str, owner_id: OwnerId) -> ChangeEvent {
    ChangeEvent::Pet(PetRow { id, owner_id, name: name.into() })
  }

  fn visit(pet_id: PetId, description: &str) -> ChangeEvent {
    ChangeEvent::Visit(VisitRow {
      pet_id,
      description: description.into(),
      keywords: vec!["shot".into()],
    })
  }

  fn expected_coleman() -> Owner {
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
          keywords:    vec!["shot".into()],
        }],
      }],
    }
  }

  #[test]
  fn order_independence() {
    let events = [
      owner(6, "Coleman"),
      pet(7, "Samantha", 6),
      visit(7, "rabies shot"),
    ];
    let orders =
      [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
    for order in orders {
      let mut j = ChainedJoiner::unbounded();
      let mut last = None;
      for i in order {
        last = j.ingest(events[i].clone());
      }
      assert_eq!(last, Some(expected_coleman()), "{order:?}");
      assert_eq!(j.snapshot(6), Some(expected_coleman()), "{order:?}");
    }
  }

  #[test]
  fn unplaced_pet_keeps_one_buffered_snapshot() {
    let mut j = ChainedJoiner::unbounded();
    j.ingest(pet(100, "Samantha", 1));
    for _ in 0..100 {
      assert_eq!(j.ingest(visit(100, "checkup")), None);
    }
    assert_eq!(j.stats().pending, 1);

    let out = j.ingest(owner(1, "Coleman")).unwrap();
    assert_eq!(out.pets.len(), 1);
    assert_eq!(out.pets[0].visits.len(), 100);
  }

  #[test]
  fn reversed_arrival_emits_only_on_last_event() {
    let mut j = ChainedJoiner::unbounded();
    assert_eq!(j.ingest(visit(7, "rabies shot")), None);
    assert!(j.ingest(owner(6, "Coleman")).is_some());

    let out = j.ingest(pet(7, "Samantha", 6)).unwrap();
    assert_eq!(out.pets.len(), 1);
    assert_eq!(out.pets[0].visits[0].keywords, ["shot"]);
  }

  #[test]
  fn pet_before_owner_is_suppressed() {
    let mut j = ChainedJoiner::unbounded();
    assert_eq!(j.ingest(pet(100, "Samantha", 1)), None);
    assert_eq!(j.stats().pending, 1);
    assert_eq!(j.stats().suppressed, 1);
  }

  #[test]
  fn agrees_with_nested_joiner() {
    let events = vec![
      visit(100, "rabies shot"),
      pet(101, "Rex", 1),
      owner(1, "Coleman"),
      pet(100, "Sam", 1),
      visit(101, "checkup"),
      pet(100, "Samantha", 1),
      owner(1, "ColemanX"),
      visit(100, "neutered"),
      owner(1, "ColemanX"),
    ];

    let mut nested = NestedJoiner::unbounded();
    let mut chained = ChainedJoiner::unbounded();
    for event in events {
      let a = nested.ingest(event.clone());
      let b = chained.ingest(event);
      assert_eq!(a.is_some(), b.is_some());
      if let (Some(mut a), Some(mut b)) = (a, b) {
        a.pets.sort_by_key(|p| p.id);
        b.pets.sort_by_key(|p| p.id);
        assert_eq!(a, b);
      }
    }
  }

  #[test]
  fn moved_pet_is_detached() {
    let mut j = ChainedJoiner::unbounded();
    j.ingest(owner(1, "Coleman"));
    j.ingest(owner(2, "Davis"));
    j.ingest(pet(100, "Samantha", 1));

    assert!(j.take_displaced().is_empty());

    let out = j.ingest(pet(100, "Samantha", 2)).unwrap();
    assert_eq!(out.id, 2);
    assert_eq!(out.pets.len(), 1);
    assert_eq!(j.take_displaced(), [1]);
    assert!(j.take_displaced().is_empty());
    assert!(j.snapshot(1).unwrap().pets.is_empty());

    let out = j.ingest(owner(1, "Coleman")).unwrap();
    assert!(out.pets.is_empty());
  }

  #[test]
  fn close_forgets_owner_and_its_pets() {
    let mut j = ChainedJoiner::unbounded();
    j.ingest(owner(1, "Coleman"));
    j.ingest(pet(100, "Samantha", 1));

    assert!(j.close(1));
    assert_eq!(j.stats().owners, 0);
    assert_eq!(j.stats().pets, 0);
    assert_eq!(j.ingest(visit(100, "checkup")), None);
  }
}
