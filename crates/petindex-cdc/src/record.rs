//! Envelope detection and column extraction.
//!
//! Pipeline:
//!   serde_json::Value
//!     └─ unwrap `payload`          → record object
//!          └─ locate()             → (table name, op code, row image)
//!               └─ TableKind::parse
//!                    └─ owner_row() / pet_row() / visit_row() → ChangeEvent

use std::str::FromStr;

use petindex_core::{
  Change, ChangeEvent, ChangeOp, OwnerRow, PetRow, TableKind, VisitRow,
};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

type Object = Map<String, Value>;

pub(crate) fn normalize(value: Value) -> Result<Change> {
  let record = match value {
    Value::Object(mut obj) => match obj.remove("payload") {
      Some(Value::Object(inner)) => inner,
      Some(_) => return Err(Error::MissingRow),
      None => obj,
    },
    _ => return Err(Error::MissingRow),
  };

  let (table, op, row) = locate(record)?;
  let kind = TableKind::parse(&table)?;
  let row = Row { table: kind, op, columns: row };

  let event = match kind {
    TableKind::Owners => ChangeEvent::Owner(row.owner()?),
    TableKind::Pets => ChangeEvent::Pet(row.pet()?),
    TableKind::Visits => ChangeEvent::Visit(row.visit()?),
  };
  Ok(Change::new(op, event))
}

/// Split a record into its table name, op, and row image.
fn locate(mut record: Object) -> Result<(String, ChangeOp, Object)> {
  if let Some(table) = record.remove("__table") {
    let table = table.as_str().ok_or(Error::MissingTable)?.to_owned();
    let op = parse_op(record.remove("__op"))?;
    return Ok((table, op, record));
  }

  let table = record
    .get("source")
    .and_then(|s| s.get("table"))
    .and_then(Value::as_str)
    .ok_or(Error::MissingTable)?
    .to_owned();
  let op = parse_op(record.remove("op"))?;

  let after = take_object(&mut record, "after");
  let before = take_object(&mut record, "before");
  let row = match op {
    ChangeOp::Delete => before.or(after),
    _ => after.or(before),
  }
  .ok_or(Error::MissingRow)?;

  Ok((table, op, row))
}

fn take_object(record: &mut Object, key: &str) -> Option<Object> {
  match record.remove(key) {
    Some(Value::Object(obj)) => Some(obj),
    _ => None,
  }
}

fn parse_op(value: Option<Value>) -> Result<ChangeOp> {
  match value {
    None | Some(Value::Null) => Ok(ChangeOp::default()),
    Some(Value::String(code)) => {
      ChangeOp::from_str(&code).map_err(|_| Error::UnknownOp(code))
    }
    Some(other) => Err(Error::UnknownOp(other.to_string())),
  }
}

// ─── Typed columns ───────────────────────────────────────────────────────────

struct Row {
  table:   TableKind,
  op:      ChangeOp,
  columns: Object,
}

impl Row {
  fn malformed(&self, column: &str) -> Error {
    Error::MalformedPayload {
      table:  self.table.to_string(),
      column: column.to_owned(),
    }
  }

  /// An integer column, as a JSON number or a numeric string.
  fn int(&self, column: &str) -> Result<i64> {
    let value = match self.columns.get(column) {
      Some(Value::Number(n)) => n.as_i64(),
      Some(Value::String(s)) => s.trim().parse().ok(),
      _ => None,
    };
    value.ok_or_else(|| self.malformed(column))
  }

  /// A text column. Delete images may omit non-key columns; those read as
  /// empty.
  fn text(&self, column: &str) -> Result<String> {
    match self.columns.get(column) {
      Some(Value::String(s)) => Ok(s.clone()),
      None | Some(Value::Null) if self.op == ChangeOp::Delete => {
        Ok(String::new())
      }
      _ => Err(self.malformed(column)),
    }
  }

  fn owner(&self) -> Result<OwnerRow> {
    Ok(OwnerRow {
      id:         self.int("id")?,
      first_name: self.text("first_name")?,
      last_name:  self.text("last_name")?,
    })
  }

  fn pet(&self) -> Result<PetRow> {
    Ok(PetRow {
      id:       self.int("id")?,
      owner_id: self.int("owner_id")?,
      name:     self.text("name")?,
    })
  }

  fn visit(&self) -> Result<VisitRow> {
    Ok(VisitRow {
      pet_id:      self.int("pet_id")?,
      description: self.text("description")?,
      keywords:    Vec::new(),
    })
  }
}
