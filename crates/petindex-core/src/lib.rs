//! Core types and the denormalizing join for the pet-clinic search index.
//!
//! Change events for three tables (owners, pets, visits) arrive independently
//! and in any order. This crate folds them into one nested [`Owner`] document
//! per owner id and decides when that document is complete enough to hand to
//! a [`DocumentSink`].
//!
//! This crate is deliberately free of I/O. Parsing raw change records,
//! keyword extraction, and the index backend live in sibling crates.

pub mod aggregate;
pub mod chained;
pub mod denormalize;
pub mod emission;
pub mod enrich;
pub mod error;
pub mod event;
pub mod join;
pub mod joiner;
pub mod recency;
pub mod sink;

pub use aggregate::{Aggregate, Owner, Pet, Visit};
pub use denormalize::{Denormalizer, JoinConfig, JoinStats, JoinStrategy};
pub use error::{Error, Result};
pub use event::{
  Change, ChangeEvent, ChangeOp, OwnerId, OwnerRow, PetId, PetRow, TableKind,
  VisitRow,
};
pub use sink::{DocumentQuery, DocumentSink, UpsertOutcome};
