//! The typed event model produced by change-record normalization.
//!
//! Each event carries exactly the natural and foreign keys needed to join it
//! into an owner document. Visits carry no owner id, only the pet they belong
//! to, which is why the joiner keeps a pet → owner routing index.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result};

/// Primary key of the owners table.
pub type OwnerId = i64;

/// Primary key of the pets table.
pub type PetId = i64;

// ─── Tables ──────────────────────────────────────────────────────────────────

/// The source tables this index is built from.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum TableKind {
  Owners,
  Pets,
  Visits,
}

impl TableKind {
  /// Resolve a wire-level table name. Schema-qualified names such as
  /// `petclinic.owners` are accepted.
  pub fn parse(name: &str) -> Result<Self> {
    let bare = name.rsplit('.').next().unwrap_or(name);
    Self::from_str(bare)
      .map_err(|_| Error::UnrecognizedEventKind(name.to_owned()))
  }
}

/// The kind of row change, using Debezium op codes on the wire.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Display, AsRefStr, EnumString,
)]
pub enum ChangeOp {
  /// A row read during the initial snapshot.
  #[strum(serialize = "r")]
  Read,
  #[default]
  #[strum(serialize = "c")]
  Create,
  #[strum(serialize = "u")]
  Update,
  #[strum(serialize = "d")]
  Delete,
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// The joined columns of an `owners` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRow {
  pub id:         OwnerId,
  pub first_name: String,
  pub last_name:  String,
}

/// The joined columns of a `pets` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetRow {
  pub id:       PetId,
  pub owner_id: OwnerId,
  pub name:     String,
}

/// The joined columns of a `visits` row, plus the keywords attached by the
/// enrichment step before the row reaches the joiner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitRow {
  pub pet_id:      PetId,
  pub description: String,
  #[serde(default)]
  pub keywords:    Vec<String>,
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// One row-level change, tagged by the table it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
  Owner(OwnerRow),
  Pet(PetRow),
  Visit(VisitRow),
}

impl ChangeEvent {
  pub fn table(&self) -> TableKind {
    match self {
      Self::Owner(_) => TableKind::Owners,
      Self::Pet(_) => TableKind::Pets,
      Self::Visit(_) => TableKind::Visits,
    }
  }

  /// The owner id this event partitions on, if it carries one.
  pub fn owner_key(&self) -> Option<OwnerId> {
    match self {
      Self::Owner(row) => Some(row.id),
      Self::Pet(row) => Some(row.owner_id),
      Self::Visit(_) => None,
    }
  }

  /// The pet id this event partitions on, if it carries one.
  pub fn pet_key(&self) -> Option<PetId> {
    match self {
      Self::Owner(_) => None,
      Self::Pet(row) => Some(row.id),
      Self::Visit(row) => Some(row.pet_id),
    }
  }
}

/// A normalized change record: the operation and the typed row image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
  pub op:    ChangeOp,
  pub event: ChangeEvent,
}

impl Change {
  pub fn new(op: ChangeOp, event: ChangeEvent) -> Self { Self { op, event } }
}
