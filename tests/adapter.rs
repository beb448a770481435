//! End-to-end adapter behavior against a store with injected failures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lakebench::reference::{ReferenceRowSet, ReferenceTableStore};
use lakebench::samples::{SampleRegistry, Snapshot};
use lakebench::statement::Statement;
use lakebench::{Adapter, AdapterOptions, OpKind, Outcome, Status, TableId, TableStore};

//////////////////////////////////////////// FlakyStore ////////////////////////////////////////////

/// Fails the next `failures` store calls, then delegates to the reference store.
struct FlakyStore {
    inner: ReferenceTableStore,
    failures: AtomicU64,
}

impl FlakyStore {
    fn new(table: TableId, failures: u64) -> Self {
        Self {
            inner: ReferenceTableStore::new(table),
            failures: AtomicU64::new(failures),
        }
    }

    fn trip(&self) -> Result<(), String> {
        loop {
            let remaining = self.failures.load(Ordering::Relaxed);
            if remaining == 0 {
                return Ok(());
            }
            if self
                .failures
                .compare_exchange(remaining, remaining - 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return Err("injected failure".to_string());
            }
        }
    }
}

impl TableStore for FlakyStore {
    type Error = String;
    type RowSet = ReferenceRowSet;

    fn execute(&self, stmt: &Statement) -> Result<(), String> {
        self.trip()?;
        self.inner.execute(stmt)
    }

    fn query(&self, table: &TableId) -> Result<ReferenceRowSet, String> {
        self.trip()?;
        self.inner.query(table)
    }
}

/////////////////////////////////////////////// util ///////////////////////////////////////////////

fn table() -> TableId {
    TableId::new("lakehouse.ycsb", "usertable")
}

fn adapter(failures: u64) -> (Adapter<FlakyStore>, Arc<SampleRegistry>) {
    let registry = Arc::new(SampleRegistry::new());
    let store = FlakyStore::new(table(), failures);
    let adapter = Adapter::new(store, AdapterOptions::default(), Arc::clone(&registry));
    (adapter, registry)
}

fn drain(adapter: Adapter<FlakyStore>, registry: Arc<SampleRegistry>) -> Snapshot {
    drop(adapter);
    Arc::try_unwrap(registry)
        .unwrap_or_else(|_| panic!("registry should have one owner"))
        .drain()
}

fn values(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(f, v)| (f.to_string(), v.to_string()))
        .collect()
}

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|f| f.to_string()).collect()
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////

#[test]
fn success_on_first_attempt_records_one_sample() {
    let (adapter, registry) = adapter(0);
    assert_eq!(Status::Ok, adapter.insert("user1", &values(&[("a", "x")])));
    let snapshot = drain(adapter, registry);
    assert_eq!(1, snapshot.samples(OpKind::Insert, Outcome::Success).len());
    assert!(snapshot.samples(OpKind::Insert, Outcome::Error).is_empty());
    assert_eq!(0, snapshot.redos());
}

#[test]
fn success_on_fourth_attempt_records_three_errors() {
    let (adapter, registry) = adapter(3);
    assert_eq!(Status::Ok, adapter.insert("user1", &values(&[("a", "x")])));
    let snapshot = drain(adapter, registry);
    assert_eq!(3, snapshot.samples(OpKind::Insert, Outcome::Error).len());
    assert_eq!(1, snapshot.samples(OpKind::Insert, Outcome::Success).len());
    assert_eq!(3, snapshot.redos());
}

#[test]
fn ten_failures_exhaust_the_operation() {
    let (adapter, registry) = adapter(10);
    assert_eq!(Status::Error, adapter.insert("user1", &values(&[("a", "x")])));
    let snapshot = drain(adapter, registry);
    assert_eq!(10, snapshot.samples(OpKind::Insert, Outcome::Error).len());
    assert!(snapshot.samples(OpKind::Insert, Outcome::Success).is_empty());
    assert_eq!(10, snapshot.redos());
}

#[test]
fn retries_stop_as_soon_as_an_attempt_succeeds() {
    // Nine failures fit under a ten-attempt ceiling.
    let (adapter, registry) = adapter(9);
    assert_eq!(Status::Ok, adapter.delete("user1"));
    let snapshot = drain(adapter, registry);
    assert_eq!(9, snapshot.samples(OpKind::Delete, Outcome::Error).len());
    assert_eq!(1, snapshot.samples(OpKind::Delete, Outcome::Success).len());
}

#[test]
fn read_of_absent_key_is_not_found_and_samples_success() {
    let (adapter, registry) = adapter(0);
    let mut record = HashMap::new();
    assert_eq!(Status::NotFound, adapter.read("ghost", &[], &mut record));
    assert!(record.is_empty());
    let snapshot = drain(adapter, registry);
    assert_eq!(1, snapshot.samples(OpKind::Read, Outcome::Success).len());
    assert!(snapshot.samples(OpKind::Read, Outcome::Error).is_empty());
}

#[test]
fn scan_past_the_last_key_is_not_found() {
    let (adapter, registry) = adapter(0);
    assert_eq!(Status::Ok, adapter.insert("user1", &[]));
    let mut records = Vec::new();
    assert_eq!(Status::NotFound, adapter.scan("user2", 10, &[], &mut records));
    assert!(records.is_empty());
    drain(adapter, registry);
}

#[test]
fn read_selects_requested_fields_by_position() {
    let (adapter, registry) = adapter(0);
    adapter.insert("user1", &values(&[("a", "x"), ("b", "y")]));
    let mut record = HashMap::new();
    assert_eq!(
        Status::Ok,
        adapter.read("user1", &fields(&["a", "b"]), &mut record)
    );
    assert_eq!(Some(&b"x".to_vec()), record.get("a"));
    assert_eq!(Some(&b"y".to_vec()), record.get("b"));
    drain(adapter, registry);
}

#[test]
fn read_without_fields_selects_store_columns() {
    let (adapter, registry) = adapter(0);
    adapter.insert("user1", &values(&[("a", "x")]));
    let mut record = HashMap::new();
    assert_eq!(Status::Ok, adapter.read("user1", &[], &mut record));
    assert_eq!(Some(&b"user1".to_vec()), record.get("YCSB_KEY"));
    assert_eq!(Some(&b"x".to_vec()), record.get("FIELD0"));
    drain(adapter, registry);
}

#[test]
fn crud_roundtrip() {
    let (adapter, registry) = adapter(0);
    assert_eq!(Status::Ok, adapter.insert("user1", &values(&[("a", "x")])));
    assert_eq!(Status::Ok, adapter.update("user1", &values(&[("a", "z")])));
    let mut record = HashMap::new();
    assert_eq!(
        Status::Ok,
        adapter.read("user1", &fields(&["a"]), &mut record)
    );
    assert_eq!(Some(&b"z".to_vec()), record.get("a"));
    assert_eq!(Status::Ok, adapter.delete("user1"));
    assert_eq!(Status::NotFound, adapter.read("user1", &[], &mut record));
    let snapshot = drain(adapter, registry);
    assert_eq!(2, snapshot.samples(OpKind::Read, Outcome::Success).len());
    assert_eq!(1, snapshot.samples(OpKind::Insert, Outcome::Success).len());
    assert_eq!(1, snapshot.samples(OpKind::Update, Outcome::Success).len());
    assert_eq!(1, snapshot.samples(OpKind::Delete, Outcome::Success).len());
}

#[test]
fn scan_returns_records_in_key_order() {
    let (adapter, registry) = adapter(0);
    for key in ["user3", "user1", "user2", "user4"] {
        adapter.insert(key, &values(&[("a", key)]));
    }
    let mut records = Vec::new();
    assert_eq!(
        Status::Ok,
        adapter.scan("user2", 2, &fields(&["a"]), &mut records)
    );
    assert_eq!(2, records.len());
    assert_eq!(Some(&b"user2".to_vec()), records[0].get("a"));
    assert_eq!(Some(&b"user3".to_vec()), records[1].get("a"));
    drain(adapter, registry);
}

#[test]
fn too_many_fields_fails_without_touching_the_store() {
    let (adapter, registry) = adapter(0);
    let eleven: Vec<(String, String)> = (0..11)
        .map(|i| (format!("f{}", i), format!("v{}", i)))
        .collect();
    assert_eq!(Status::Error, adapter.insert("user1", &eleven));
    assert_eq!(Status::Error, adapter.update("user1", &eleven));
    let eleven_names: Vec<String> = (0..11).map(|i| format!("f{}", i)).collect();
    let mut record = HashMap::new();
    assert_eq!(Status::Error, adapter.read("user1", &eleven_names, &mut record));
    let snapshot = drain(adapter, registry);
    assert!(snapshot.is_empty());
    assert_eq!(0, snapshot.redos());
}

#[test]
fn redo_totals_accumulate_across_operations() {
    let (adapter, registry) = adapter(5);
    // The first operation eats every injected failure before it succeeds.
    assert_eq!(Status::Ok, adapter.insert("user1", &values(&[("a", "x")])));
    assert_eq!(Status::Ok, adapter.delete("user1"));
    let snapshot = drain(adapter, registry);
    assert_eq!(5, snapshot.redos());
    let errors = snapshot.samples(OpKind::Insert, Outcome::Error).len()
        + snapshot.samples(OpKind::Delete, Outcome::Error).len();
    assert_eq!(5, errors);
}
