//! When an owner document may leave the joiner.
//!
//! An owner is emitted only once its own scalar fields have been observed,
//! that is after at least one owner event for its id. Pets and visits that
//! arrive earlier are kept but never surface on their own.

use strum::{AsRefStr, Display};

/// The lifecycle of one owner key. Keys that were never referenced have no
/// state at all and are not represented here.
///
/// `Shell → Complete` happens only on an owner event. `Complete` is not
/// terminal: later events keep mutating and re-emitting the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completeness {
  /// Referenced by a pet, scalars unknown.
  Shell,
  /// Scalars known; pets may still grow.
  Complete,
}

impl Completeness {
  pub fn of<T>(scalars: Option<&T>) -> Self {
    match scalars {
      Some(_) => Self::Complete,
      None => Self::Shell,
    }
  }
}

/// Why a fold step produced no document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Suppression {
  /// The owner is still a shell.
  OwnerIncomplete,
  /// A visit for a pet whose owner is not known yet.
  PetUnrouted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
  Emit,
  Suppress(Suppression),
}

/// Decide for the owner a fold step touched. `None` means the step could not
/// be routed to any owner.
pub fn decide(owner: Option<Completeness>) -> Decision {
  match owner {
    None => Decision::Suppress(Suppression::PetUnrouted),
    Some(Completeness::Shell) => {
      Decision::Suppress(Suppression::OwnerIncomplete)
    }
    Some(Completeness::Complete) => Decision::Emit,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_complete_owners_are_emitted() {
    assert_eq!(decide(Some(Completeness::Complete)), Decision::Emit);
    assert_eq!(
      decide(Some(Completeness::Shell)),
      Decision::Suppress(Suppression::OwnerIncomplete)
    );
    assert_eq!(decide(None), Decision::Suppress(Suppression::PetUnrouted));
  }

  #[test]
  fn completeness_follows_scalars() {
    assert_eq!(Completeness::of(Some(&"Jean")), Completeness::Complete);
    assert_eq!(Completeness::of::<&str>(None), Completeness::Shell);
    assert_eq!(Suppression::PetUnrouted.as_ref(), "pet_unrouted");
  }
}
