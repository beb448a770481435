//! An in-memory table store for tests and the reference binary.  It interprets statement kernels
//! directly against a sorted map, so it exercises the full adapter surface without an engine
//! behind it.

use std::collections::BTreeMap;
use std::sync::Mutex;

use biometrics::Counter;

use crate::slots::{ATTRIBUTE_COLUMNS, KEY_COLUMN, NUM_ATTRIBUTE_COLUMNS};
use crate::statement::{Operation, Statement};
use crate::{BenchmarkStore, RowSet, TableId, TableStore};

//////////////////////////////////////////// biometrics ////////////////////////////////////////////

static EXECUTE: Counter = Counter::new("lakebench.reference.execute");
static QUERY: Counter = Counter::new("lakebench.reference.query");

///////////////////////////////////////////// RowData //////////////////////////////////////////////

type RowData = [Option<String>; NUM_ATTRIBUTE_COLUMNS];

fn row_from_vec(row: &[Option<String>]) -> RowData {
    std::array::from_fn(|slot| row.get(slot).cloned().flatten())
}

///////////////////////////////////// ReferenceTableStore /////////////////////////////////////////

/// The in-memory store.  One table; rows sort by key so scans see key order.
pub struct ReferenceTableStore {
    table: TableId,
    rows: Mutex<BTreeMap<String, RowData>>,
}

impl ReferenceTableStore {
    pub fn new(table: TableId) -> Self {
        Self {
            table,
            rows: Mutex::new(BTreeMap::new()),
        }
    }

    /// The number of rows currently stored.
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_table(&self, table: &TableId) -> Result<(), String> {
        if *table != self.table {
            return Err(format!("unknown table: {}", table));
        }
        Ok(())
    }
}

impl TableStore for ReferenceTableStore {
    type Error = String;
    type RowSet = ReferenceRowSet;

    fn execute(&self, stmt: &Statement) -> Result<(), String> {
        EXECUTE.click();
        self.check_table(stmt.table())?;
        let mut rows = self.rows.lock().unwrap();
        match stmt.operation() {
            Operation::Insert { key, row } => {
                rows.insert(key.clone(), row_from_vec(row));
            }
            Operation::Update { key, assignments } => {
                // An update matching zero rows succeeds, as it would in SQL.
                if let Some(row) = rows.get_mut(key) {
                    for (slot, value) in assignments {
                        row[*slot] = Some(value.clone());
                    }
                }
            }
            Operation::Delete { key } => {
                rows.remove(key);
            }
        }
        Ok(())
    }

    fn query(&self, table: &TableId) -> Result<ReferenceRowSet, String> {
        QUERY.click();
        self.check_table(table)?;
        let rows = self.rows.lock().unwrap();
        Ok(ReferenceRowSet {
            rows: rows
                .iter()
                .map(|(key, row)| (key.clone(), row.clone()))
                .collect(),
        })
    }
}

impl BenchmarkStore for ReferenceTableStore {
    fn register_biometrics(&self, collector: &biometrics::Collector) {
        collector.register_counter(&EXECUTE);
        collector.register_counter(&QUERY);
    }
}

////////////////////////////////////////// ReferenceRowSet /////////////////////////////////////////

/// A snapshot of the table, narrowed by successive filters.  Rows stay in key order.
pub struct ReferenceRowSet {
    rows: Vec<(String, RowData)>,
}

impl RowSet for ReferenceRowSet {
    type Error = String;

    fn filter_key_eq(mut self, key: &str) -> Self {
        self.rows.retain(|(k, _)| k == key);
        self
    }

    fn filter_key_ge(mut self, key: &str) -> Self {
        self.rows.retain(|(k, _)| k.as_str() >= key);
        self
    }

    fn limit(mut self, count: usize) -> Self {
        self.rows.truncate(count);
        self
    }

    fn is_empty(&self) -> Result<bool, String> {
        Ok(self.rows.is_empty())
    }

    fn columns(&self) -> Vec<String> {
        let mut columns = Vec::with_capacity(1 + NUM_ATTRIBUTE_COLUMNS);
        columns.push(KEY_COLUMN.to_string());
        columns.extend(ATTRIBUTE_COLUMNS.iter().map(|c| c.to_string()));
        columns
    }

    fn project(&self, column: &str) -> Result<Vec<Vec<u8>>, String> {
        if column == KEY_COLUMN {
            return Ok(self.rows.iter().map(|(k, _)| k.as_bytes().to_vec()).collect());
        }
        let Some(slot) = crate::slots::slot_of(column) else {
            return Err(format!("unknown column: {}", column));
        };
        Ok(self
            .rows
            .iter()
            .map(|(_, row)| {
                row[slot]
                    .as_ref()
                    .map(|v| v.as_bytes().to_vec())
                    .unwrap_or_default()
            })
            .collect())
    }
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////
