//! The nested owner document and its update/merge semantics.
//!
//! The document handed to the index is
//! `{id, firstName, lastName, pets: [{id, name, visits: [{description, keywords}]}]}`.
//! Every emitted [`Owner`] is an owned deep copy; nothing downstream can reach
//! back into join state.

use serde::{Deserialize, Serialize};

use crate::{
  Result,
  event::{OwnerId, OwnerRow, PetId, PetRow, VisitRow},
};

// ─── Mergeable capability ────────────────────────────────────────────────────

/// A record that owns an ordered collection of child records.
///
/// This is the single contract the join primitive folds through: scalar
/// updates never touch attached children, and children are folded one at a
/// time.
pub trait Aggregate: Clone + PartialEq {
  type Child;

  /// Copy the updatable scalar fields from `newer`. Children already attached
  /// to `self` are kept; children carried by `newer` are ignored.
  fn update_from(&mut self, newer: Self);

  /// Fold one child into the collection.
  fn merge(&mut self, child: Self::Child);
}

// ─── Visit ───────────────────────────────────────────────────────────────────

/// A visit as it appears in the document. Visits have no identity and are
/// never deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
  pub description: String,
  #[serde(default)]
  pub keywords:    Vec<String>,
}

impl From<VisitRow> for Visit {
  fn from(row: VisitRow) -> Self {
    Self { description: row.description, keywords: row.keywords }
  }
}

// ─── Pet ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pet {
  pub id:       PetId,
  /// Routing only; not part of the indexed document.
  #[serde(skip)]
  pub owner_id: OwnerId,
  pub name:     String,
  #[serde(default)]
  pub visits:   Vec<Visit>,
}

impl From<PetRow> for Pet {
  fn from(row: PetRow) -> Self {
    Self {
      id:       row.id,
      owner_id: row.owner_id,
      name:     row.name,
      visits:   Vec::new(),
    }
  }
}

impl Pet {
  /// Take the scalars of a later snapshot of the same pet, and its visits if
  /// it has seen more of them. Visit lists only grow, so the longer list is
  /// the later one.
  pub fn absorb(&mut self, later: Pet) {
    self.name = later.name;
    self.owner_id = later.owner_id;
    if later.visits.len() >= self.visits.len() {
      self.visits = later.visits;
    }
  }
}

impl Aggregate for Pet {
  type Child = Visit;

  fn update_from(&mut self, newer: Self) {
    self.name = newer.name;
    self.owner_id = newer.owner_id;
  }

  fn merge(&mut self, visit: Visit) { self.visits.push(visit); }
}

// ─── Owner ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
  pub id:         OwnerId,
  pub first_name: String,
  pub last_name:  String,
  #[serde(default)]
  pub pets:       Vec<Pet>,
}

impl From<OwnerRow> for Owner {
  fn from(row: OwnerRow) -> Self {
    Self {
      id:         row.id,
      first_name: row.first_name,
      last_name:  row.last_name,
      pets:       Vec::new(),
    }
  }
}

impl Owner {
  pub fn pet(&self, id: PetId) -> Option<&Pet> {
    self.pets.iter().find(|p| p.id == id)
  }

  /// Remove a pet from the collection; returns whether it was present.
  pub fn detach(&mut self, id: PetId) -> bool {
    let before = self.pets.len();
    self.pets.retain(|p| p.id != id);
    self.pets.len() != before
  }

  /// Serialise to the JSON document stored in the index.
  pub fn to_document(&self) -> Result<String> {
    Ok(serde_json::to_string(self)?)
  }

  /// Parse a stored document. Pet owner ids are not part of the document and
  /// are restored from the owner id.
  pub fn from_document(json: &str) -> Result<Self> {
    let mut owner: Owner = serde_json::from_str(json)?;
    for pet in &mut owner.pets {
      pet.owner_id = owner.id;
    }
    Ok(owner)
  }
}

impl Aggregate for Owner {
  type Child = Pet;

  fn update_from(&mut self, newer: Self) {
    self.first_name = newer.first_name;
    self.last_name = newer.last_name;
  }

  /// At most one pet per id: a re-arriving pet updates the existing entry in
  /// place and keeps its position.
  fn merge(&mut self, pet: Pet) {
    match self.pets.iter_mut().find(|p| p.id == pet.id) {
      Some(existing) => existing.absorb(pet),
      None => self.pets.push(pet),
    }
  }
}
