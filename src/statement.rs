//! Statement construction for the mutating operations.  Statements carry a structured kernel
//! plus bound parameters; engines that speak SQL render the placeholder text and bind
//! [Statement::params], while engines that do not (the reference store) interpret the kernel
//! directly.  Point reads and scans never build statements; they go through [crate::RowSet].

use zerror_core::ErrorCore;

use crate::slots::{ATTRIBUTE_COLUMNS, KEY_COLUMN, NUM_ATTRIBUTE_COLUMNS};
use crate::{Error, TableId};

///////////////////////////////////////////// Constants ////////////////////////////////////////////

/// The marker emitted for unused attribute slots.
pub const NULL_MARKER: &str = "NULL";

///////////////////////////////////////////// Operation ////////////////////////////////////////////

/// The structured kernel of a statement.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Operation {
    /// Insert a full row: the key plus exactly ten slot-ordered attribute values, None for NULL.
    Insert {
        key: String,
        row: Vec<Option<String>>,
    },
    /// Assign values to attribute slots on the row matching the key.
    Update {
        key: String,
        assignments: Vec<(usize, String)>,
    },
    /// Remove the row matching the key.
    Delete { key: String },
}

///////////////////////////////////////////// Statement ////////////////////////////////////////////

/// One executable statement against one table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Statement {
    table: TableId,
    op: Operation,
}

impl Statement {
    /// An insert of `key` with the provided values in slot order.  Unused trailing slots pad with
    /// NULL so the row always has exactly ten attribute columns.
    pub fn insert(table: &TableId, key: &str, values: &[(String, String)]) -> Result<Self, Error> {
        if values.len() > NUM_ATTRIBUTE_COLUMNS {
            return Err(too_many_fields(values.len()));
        }
        let mut row: Vec<Option<String>> = Vec::with_capacity(NUM_ATTRIBUTE_COLUMNS);
        for (_, value) in values {
            row.push(Some(value.clone()));
        }
        row.resize(NUM_ATTRIBUTE_COLUMNS, None);
        Ok(Self {
            table: table.clone(),
            op: Operation::Insert {
                key: key.to_string(),
                row,
            },
        })
    }

    /// An update of `key`, assigning each value to the slot matching its position in the input.
    pub fn update(table: &TableId, key: &str, values: &[(String, String)]) -> Result<Self, Error> {
        if values.len() > NUM_ATTRIBUTE_COLUMNS {
            return Err(too_many_fields(values.len()));
        }
        let assignments = values
            .iter()
            .enumerate()
            .map(|(slot, (_, value))| (slot, value.clone()))
            .collect();
        Ok(Self {
            table: table.clone(),
            op: Operation::Update {
                key: key.to_string(),
                assignments,
            },
        })
    }

    /// A delete of the row under `key`.
    pub fn delete(table: &TableId, key: &str) -> Self {
        Self {
            table: table.clone(),
            op: Operation::Delete {
                key: key.to_string(),
            },
        }
    }

    pub fn table(&self) -> &TableId {
        &self.table
    }

    pub fn operation(&self) -> &Operation {
        &self.op
    }

    /// The statement text with `?` placeholders for every bound parameter.  NULL padding appears
    /// literally; it is not a parameter.
    pub fn text(&self) -> String {
        match &self.op {
            Operation::Insert { row, .. } => {
                let mut placeholders = vec!["?"];
                for slot in row {
                    placeholders.push(if slot.is_some() { "?" } else { NULL_MARKER });
                }
                format!(
                    "INSERT INTO {} VALUES ({})",
                    self.table.qualified(),
                    placeholders.join(", ")
                )
            }
            Operation::Update { assignments, .. } => {
                let sets: Vec<String> = assignments
                    .iter()
                    .map(|(slot, _)| format!("{} = ?", ATTRIBUTE_COLUMNS[*slot]))
                    .collect();
                format!(
                    "UPDATE {} SET {} WHERE {} = ?",
                    self.table.qualified(),
                    sets.join(", "),
                    KEY_COLUMN
                )
            }
            Operation::Delete { .. } => {
                format!(
                    "DELETE FROM {} WHERE {} = ?",
                    self.table.qualified(),
                    KEY_COLUMN
                )
            }
        }
    }

    /// The bound parameters, in placeholder order.
    pub fn params(&self) -> Vec<&str> {
        match &self.op {
            Operation::Insert { key, row } => {
                let mut params = vec![key.as_str()];
                params.extend(row.iter().flatten().map(String::as_str));
                params
            }
            Operation::Update { key, assignments } => {
                let mut params: Vec<&str> =
                    assignments.iter().map(|(_, value)| value.as_str()).collect();
                params.push(key.as_str());
                params
            }
            Operation::Delete { key } => vec![key.as_str()],
        }
    }

    /// The legacy literal rendering: values embedded in single quotes with every `'` replaced by
    /// `r`.  For engines that cannot bind parameters; the substitution is a textual escape, not
    /// a security boundary.
    pub fn render_literal(&self) -> String {
        match &self.op {
            Operation::Insert { key, row } => {
                let mut cells = vec![format!("'{}'", key)];
                for slot in row {
                    match slot {
                        Some(value) => cells.push(format!("'{}'", sanitize(value))),
                        None => cells.push(NULL_MARKER.to_string()),
                    }
                }
                format!(
                    "INSERT INTO {} VALUES ({})",
                    self.table.qualified(),
                    cells.join(", ")
                )
            }
            Operation::Update { key, assignments } => {
                let sets: Vec<String> = assignments
                    .iter()
                    .map(|(slot, value)| {
                        format!("{} = '{}'", ATTRIBUTE_COLUMNS[*slot], sanitize(value))
                    })
                    .collect();
                format!(
                    "UPDATE {} SET {} WHERE {} = '{}'",
                    self.table.qualified(),
                    sets.join(", "),
                    KEY_COLUMN,
                    key
                )
            }
            Operation::Delete { key } => {
                format!(
                    "DELETE FROM {} WHERE {} = '{}'",
                    self.table.qualified(),
                    KEY_COLUMN,
                    key
                )
            }
        }
    }
}

///////////////////////////////////////////// sanitize /////////////////////////////////////////////

fn sanitize(value: &str) -> String {
    value.replace('\'', "r")
}

fn too_many_fields(fields: usize) -> Error {
    Error::TooManyFields {
        core: ErrorCore::default(),
        fields: fields as u64,
        limit: NUM_ATTRIBUTE_COLUMNS as u64,
    }
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////
