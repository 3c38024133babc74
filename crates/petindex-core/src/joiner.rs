//! The three-level owner ⋈ pet ⋈ visit joiner.
//!
//! State, all keyed by natural id:
//!
//! - `owners`: every owner key referenced so far, complete or shell, with the
//!   ordered ids of its attached pets.
//! - `pets`: the current pet rows and their visits, independent of which
//!   owner they are attached to. A visit for an unknown pet creates a shell.
//! - `routes`: for each pet, the owner it is attached to. Visits carry only a
//!   pet id, so this is how a late visit finds its document.
//!
//! Documents are materialized from these maps on emission, so an emitted
//! [`Owner`] is always a fresh deep copy.

use std::{collections::HashMap, num::NonZeroUsize};

use tracing::{debug, trace};

use crate::{
  aggregate::{Owner, Pet, Visit},
  denormalize::{Denormalizer, JoinStats},
  emission::{self, Completeness, Decision},
  event::{ChangeEvent, OwnerId, OwnerRow, PetId, PetRow, VisitRow},
  recency::Recency,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct OwnerScalars {
  first_name: String,
  last_name:  String,
}

#[derive(Debug, Default)]
struct OwnerEntry {
  /// `None` while the owner is a shell.
  scalars: Option<OwnerScalars>,
  /// Attached pets in first-attachment order, no duplicates.
  pets:    Vec<PetId>,
}

impl OwnerEntry {
  fn completeness(&self) -> Completeness {
    Completeness::of(self.scalars.as_ref())
  }
}

#[derive(Debug, Default)]
struct PetEntry {
  /// `None` while the pet is a shell created by a visit.
  name:   Option<String>,
  visits: Vec<Visit>,
}

/// Single-pass denormalizer over owner, pet and visit events.
#[derive(Default)]
pub struct NestedJoiner {
  owners:     HashMap<OwnerId, OwnerEntry>,
  pets:       HashMap<PetId, PetEntry>,
  routes:     HashMap<PetId, OwnerId>,
  /// Owners that lost a pet since the last `take_displaced`.
  displaced:  Vec<OwnerId>,
  recency:    Recency,
  max_owners: Option<NonZeroUsize>,
  tally:      JoinStats,
}

impl NestedJoiner {
  pub fn new(max_owners: Option<NonZeroUsize>) -> Self {
    Self { max_owners, ..Self::default() }
  }

  pub fn unbounded() -> Self { Self::default() }

  /// The current document for `owner_id`, if the owner is complete.
  pub fn snapshot(&self, owner_id: OwnerId) -> Option<Owner> {
    let entry = self.owners.get(&owner_id)?;
    let scalars = entry.scalars.as_ref()?;
    let pets = entry
      .pets
      .iter()
      .filter_map(|pet_id| {
        self.pets.get(pet_id).map(|pet| Pet {
          id:       *pet_id,
          owner_id,
          name:     pet.name.clone().unwrap_or_default(),
          visits:   pet.visits.clone(),
        })
      })
      .collect();

    Some(Owner {
      id: owner_id,
      first_name: scalars.first_name.clone(),
      last_name: scalars.last_name.clone(),
      pets,
    })
  }

  fn fold_owner(&mut self, row: OwnerRow) -> (Option<OwnerId>, Decision) {
    let scalars = OwnerScalars {
      first_name: row.first_name,
      last_name:  row.last_name,
    };
    let entry = self.owners.entry(row.id).or_default();
    match &entry.scalars {
      None if entry.pets.is_empty() => trace!(owner = row.id, "new owner"),
      None => debug!(owner = row.id, pets = entry.pets.len(), "shell completed"),
      Some(current) if *current == scalars => {
        trace!(owner = row.id, "owner redelivered")
      }
      Some(_) => trace!(owner = row.id, "owner updated"),
    }
    entry.scalars = Some(scalars);
    (Some(row.id), emission::decide(Some(entry.completeness())))
  }

  fn fold_pet(&mut self, row: PetRow) -> (Option<OwnerId>, Decision) {
    let PetRow { id, owner_id, name } = row;
    self.pets.entry(id).or_default().name = Some(name);

    if let Some(previous) = self.routes.insert(id, owner_id)
      && previous != owner_id
    {
      if let Some(old) = self.owners.get_mut(&previous) {
        old.pets.retain(|p| *p != id);
        self.displaced.push(previous);
      }
      debug!(pet = id, from = previous, to = owner_id, "pet moved owner");
    }

    let owner = self.owners.entry(owner_id).or_insert_with(|| {
      trace!(owner = owner_id, pet = id, "shell owner created");
      OwnerEntry::default()
    });
    if !owner.pets.contains(&id) {
      owner.pets.push(id);
    }
    (Some(owner_id), emission::decide(Some(owner.completeness())))
  }

  fn fold_visit(&mut self, row: VisitRow) -> (Option<OwnerId>, Decision) {
    let pet_id = row.pet_id;
    self
      .pets
      .entry(pet_id)
      .or_insert_with(|| {
        trace!(pet = pet_id, "shell pet created");
        PetEntry::default()
      })
      .visits
      .push(Visit::from(row));

    let owner_id = self.routes.get(&pet_id).copied();
    let completeness = owner_id
      .and_then(|id| self.owners.get(&id))
      .map(OwnerEntry::completeness);
    (owner_id, emission::decide(completeness))
  }

  fn remove_owner(&mut self, owner_id: OwnerId) -> bool {
    let Some(entry) = self.owners.remove(&owner_id) else {
      return false;
    };
    for pet_id in entry.pets {
      self.pets.remove(&pet_id);
      self.routes.remove(&pet_id);
    }
    true
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

impl Denormalizer for NestedJoiner {
  fn ingest(&mut self, event: ChangeEvent) -> Option<Owner> {
    let (owner_id, decision) = match event {
      ChangeEvent::Owner(row) => self.fold_owner(row),
      ChangeEvent::Pet(row) => self.fold_pet(row),
      ChangeEvent::Visit(row) => self.fold_visit(row),
    };
    self.tally.record(decision);

    let emitted = match decision {
      Decision::Emit => owner_id.and_then(|id| self.snapshot(id)),
      Decision::Suppress(reason) => {
        debug!(owner = ?owner_id, %reason, "emission suppressed");
        None
      }
    };

    if let Some(id) = owner_id {
      self.recency.touch(id);
      self.enforce_capacity();
    }
    emitted
  }

  fn close(&mut self, owner_id: OwnerId) -> bool {
    self.recency.forget(owner_id);
    self.remove_owner(owner_id)
  }

  fn snapshot(&self, owner_id: OwnerId) -> Option<Owner> {
    NestedJoiner::snapshot(self, owner_id)
  }

  fn take_displaced(&mut self) -> Vec<OwnerId> {
    std::mem::take(&mut self.displaced)
  }

  fn stats(&self) -> JoinStats {
    JoinStats {
      owners: self.owners.len(),
      complete_owners: self
        .owners
        .values()
        .filter(|o| o.scalars.is_some())
        .count(),
      pets: self.pets.len(),
      pending: self
        .pets
        .keys()
        .filter(|id| !self.routes.contains_key(id))
        .count(),
      ..self.tally
    }
  }
}
