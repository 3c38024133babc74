//! Change-record normalization for the pet-clinic index.
//!
//! Turns raw JSON change records into typed [`Change`]s. Pure synchronous;
//! no I/O.
//!
//! Two record shapes are accepted:
//!
//! - flat, with the table and op inlined next to the columns:
//!   `{"__table":"owners","__op":"u","id":6,"first_name":"Jean",...}`
//! - a Debezium envelope, optionally wrapped in `{"payload": ...}`:
//!   `{"op":"u","source":{"table":"pets"},"before":{...},"after":{...}}`
//!
//! # Quick start
//!
//! ```
//! use petindex_cdc::parse;
//! use petindex_core::{ChangeEvent, ChangeOp};
//!
//! let line = r#"{"__table":"pets","id":7,"name":"Samantha","owner_id":6}"#;
//! let change = parse(line).unwrap();
//! assert_eq!(change.op, ChangeOp::Create);
//! assert!(matches!(change.event, ChangeEvent::Pet(ref p) if p.owner_id == 6));
//! ```

pub mod error;
mod record;

pub use error::{Error, Result};
use petindex_core::Change;

/// Parse a single JSON change record.
pub fn parse(input: &str) -> Result<Change> {
  let value: serde_json::Value = serde_json::from_str(input)?;
  record::normalize(value)
}

/// Normalize an already-decoded JSON change record.
pub fn parse_value(value: serde_json::Value) -> Result<Change> {
  record::normalize(value)
}

/// Parse newline-delimited change records.
///
/// Each non-blank line is parsed independently; a malformed line yields
/// `Err(…)` in the corresponding position without aborting the rest.
pub fn parse_many(input: &str) -> Vec<Result<Change>> {
  input
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty())
    .map(parse)
    .collect()
}

#[cfg(test)]
mod tests {
  use petindex_core::{ChangeEvent, ChangeOp};

  use super::*;

  #[test]
  fn already_decoded_envelope() {
    let value = serde_json::json!({
      "payload": {
        "op": "r",
        "source": { "table": "owners" },
        "after": { "id": "6", "first_name": "Jean", "last_name": "Coleman" }
      }
    });
    let change = parse_value(value).unwrap();
    assert_eq!(change.op, ChangeOp::Read);
    assert_eq!(change.event.owner_key(), Some(6));
  }

  #[test]
  fn parse_many_keeps_going_after_a_bad_line() {
    let input = concat!(
      r#"{"__table":"owners","id":6,"first_name":"Jean","last_name":"Coleman"}"#,
      "\n\n",
      "not json\n",
      r#"{"__table":"visits","pet_id":7,"description":"rabies shot"}"#,
      "\n",
    );
    let results = parse_many(input);
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(Error::Json(_))));
    let visit = results[2].as_ref().unwrap();
    assert_eq!(visit.op, ChangeOp::Create);
    assert!(matches!(visit.event, ChangeEvent::Visit(ref v) if v.pet_id == 7));
  }
}
