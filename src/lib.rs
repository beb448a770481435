//! lakebench provides a YCSB-style benchmark adapter for SQL-queryable table stores.
//!
//! The adapter translates the five generic benchmark operations (point read, range scan, insert,
//! update, delete) into statements against a [TableStore], wraps every store call in a bounded
//! immediate-retry loop, and records one latency sample per attempt.  At the end of a run the
//! samples drain into a plain-text report.

use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

#[allow(unused_imports)]
#[macro_use]
extern crate prototk_derive;

use biometrics::{Counter, Moments};
use tatl::{HeyListen, Stationary};
use zerror::{iotoz, Z};
use zerror_core::ErrorCore;

pub mod metrics;
pub mod report;
pub mod retry;
pub mod samples;
pub mod slots;
pub mod statement;
pub mod workload;

#[cfg(feature = "reference")]
pub mod reference;

pub use slots::{ATTRIBUTE_COLUMNS, KEY_COLUMN, NUM_ATTRIBUTE_COLUMNS};

use retry::Retry;
use samples::{Sample, SampleRegistry};
use statement::Statement;

//////////////////////////////////////////// biometrics ////////////////////////////////////////////

static READ: Counter = Counter::new("lakebench.requests.read");
static SCAN: Counter = Counter::new("lakebench.requests.scan");
static INSERT: Counter = Counter::new("lakebench.requests.insert");
static UPDATE: Counter = Counter::new("lakebench.requests.update");
static DELETE: Counter = Counter::new("lakebench.requests.delete");

static READ_LATENCY: Moments = Moments::new("lakebench.requests.read_latency_micros");
static SCAN_LATENCY: Moments = Moments::new("lakebench.requests.scan_latency_micros");
static INSERT_LATENCY: Moments = Moments::new("lakebench.requests.insert_latency_micros");
static UPDATE_LATENCY: Moments = Moments::new("lakebench.requests.update_latency_micros");
static DELETE_LATENCY: Moments = Moments::new("lakebench.requests.delete_latency_micros");

static REDO: Counter = Counter::new("lakebench.redo");

static EXHAUSTED: Counter = Counter::new("lakebench.exhausted");
static EXHAUSTED_MONITOR: Stationary = Stationary::new("lakebench.exhausted", &EXHAUSTED);

static TOO_MANY_FIELDS: Counter = Counter::new("lakebench.error.too_many_fields");
static TOO_MANY_FIELDS_MONITOR: Stationary =
    Stationary::new("lakebench.error.too_many_fields", &TOO_MANY_FIELDS);

/// Register this crate's biometrics.
pub fn register_biometrics(collector: &biometrics::Collector) {
    collector.register_counter(&READ);
    collector.register_counter(&SCAN);
    collector.register_counter(&INSERT);
    collector.register_counter(&UPDATE);
    collector.register_counter(&DELETE);
    collector.register_moments(&READ_LATENCY);
    collector.register_moments(&SCAN_LATENCY);
    collector.register_moments(&INSERT_LATENCY);
    collector.register_moments(&UPDATE_LATENCY);
    collector.register_moments(&DELETE_LATENCY);
    collector.register_counter(&REDO);
    collector.register_counter(&EXHAUSTED);
    collector.register_counter(&TOO_MANY_FIELDS);
}

/// Register this crate's monitors.
pub fn register_monitors(hey_listen: &mut HeyListen) {
    hey_listen.register_stationary(&EXHAUSTED_MONITOR);
    hey_listen.register_stationary(&TOO_MANY_FIELDS_MONITOR);
}

/////////////////////////////////////////////// Error //////////////////////////////////////////////

/// The lakebench Error type.  Store failures never take this form; they stay behind the
/// [TableStore] seam and surface to the harness only as [Status::Error].
#[derive(Clone, Message, zerror_derive::Z)]
pub enum Error {
    /// Success.  Used for Message default.  Should not be constructed otherwise.
    #[prototk(458752, message)]
    Success {
        /// The error core.
        #[prototk(1, message)]
        core: ErrorCore,
    },
    /// More fields were provided than there are attribute columns.
    #[prototk(458753, message)]
    TooManyFields {
        /// The error core.
        #[prototk(1, message)]
        core: ErrorCore,
        /// The number of fields provided.
        #[prototk(2, uint64)]
        fields: u64,
        /// The number of attribute columns.
        #[prototk(3, uint64)]
        limit: u64,
    },
    /// The shutdown report could not be created or written.
    #[prototk(458754, message)]
    ReportWrite {
        /// The error core.
        #[prototk(1, message)]
        core: ErrorCore,
        /// A hint as to what went wrong.
        #[prototk(2, string)]
        what: String,
    },
}

impl Default for Error {
    fn default() -> Self {
        Error::Success {
            core: ErrorCore::default(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(what: std::io::Error) -> Error {
        Error::ReportWrite {
            core: ErrorCore::default(),
            what: format!("{what:?}"),
        }
    }
}

iotoz! {Error}

////////////////////////////////////////////// Status //////////////////////////////////////////////

/// The status of one benchmark operation, as observed by the harness.  Individual attempt
/// failures are absorbed by the retry loop and never surface here.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Status {
    /// The operation succeeded.
    Ok,
    /// The query succeeded, but matched zero rows.
    NotFound,
    /// Every attempt failed.
    Error,
}

////////////////////////////////////////////// OpKind //////////////////////////////////////////////

/// The kind of benchmark operation.  Latency samples bucket by (kind, outcome).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum OpKind {
    Read,
    Scan,
    Insert,
    Update,
    Delete,
}

impl OpKind {
    /// Every operation kind, in report order.
    pub const ALL: [OpKind; 5] = [
        OpKind::Insert,
        OpKind::Update,
        OpKind::Delete,
        OpKind::Read,
        OpKind::Scan,
    ];

    pub fn index(self) -> usize {
        match self {
            OpKind::Read => 0,
            OpKind::Scan => 1,
            OpKind::Insert => 2,
            OpKind::Update => 3,
            OpKind::Delete => 4,
        }
    }

    fn counter(self) -> &'static Counter {
        match self {
            OpKind::Read => &READ,
            OpKind::Scan => &SCAN,
            OpKind::Insert => &INSERT,
            OpKind::Update => &UPDATE,
            OpKind::Delete => &DELETE,
        }
    }

    fn latency(self) -> &'static Moments {
        match self {
            OpKind::Read => &READ_LATENCY,
            OpKind::Scan => &SCAN_LATENCY,
            OpKind::Insert => &INSERT_LATENCY,
            OpKind::Update => &UPDATE_LATENCY,
            OpKind::Delete => &DELETE_LATENCY,
        }
    }
}

////////////////////////////////////////////// Outcome /////////////////////////////////////////////

/// Whether an attempt succeeded or failed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Outcome {
    Success,
    Error,
}

impl Outcome {
    pub fn index(self) -> usize {
        match self {
            Outcome::Success => 0,
            Outcome::Error => 1,
        }
    }
}

////////////////////////////////////////////// TableId /////////////////////////////////////////////

/// A namespace-qualified table name.  Immutable for the lifetime of an [Adapter].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TableId {
    namespace: String,
    table: String,
}

impl TableId {
    pub fn new(namespace: &str, table: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            table: table.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// The qualified name used to address the store.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.namespace, self.table)
    }
}

impl Display for TableId {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(fmt, "{}", self.qualified())
    }
}

///////////////////////////////////////////// TableStore ///////////////////////////////////////////

/// The table-store collaborator.  Everything below this seam---planning, transactions, sessions,
/// the wire protocol---belongs to the store.
pub trait TableStore {
    type Error: Debug;
    type RowSet: RowSet<Error = Self::Error>;

    /// Execute a mutating statement.
    fn execute(&self, stmt: &Statement) -> Result<(), Self::Error>;

    /// Query a table, returning a row set to be narrowed by key predicates.
    fn query(&self, table: &TableId) -> Result<Self::RowSet, Self::Error>;
}

////////////////////////////////////////////// RowSet //////////////////////////////////////////////

/// A filterable, selectable row set over one table.
pub trait RowSet: Sized {
    type Error: Debug;

    /// Narrow to rows whose key column equals `key`.
    fn filter_key_eq(self, key: &str) -> Self;

    /// Narrow to rows whose key column is greater than or equal to `key`.
    fn filter_key_ge(self, key: &str) -> Self;

    /// Keep at most `count` rows.
    fn limit(self, count: usize) -> Self;

    /// True iff no rows match.
    fn is_empty(&self) -> Result<bool, Self::Error>;

    /// The columns of the underlying table, key column included.
    fn columns(&self) -> Vec<String>;

    /// Project one column across the matched rows.  NULL cells project as empty values.
    fn project(&self, column: &str) -> Result<Vec<Vec<u8>>, Self::Error>;
}

/////////////////////////////////////////// BenchmarkStore /////////////////////////////////////////

/// A table store that a workload can drive.
pub trait BenchmarkStore: TableStore + Send + Sync {
    fn register_biometrics(&self, collector: &biometrics::Collector);
}

//////////////////////////////////////////// AdapterOptions ////////////////////////////////////////

/// Adapter configuration.  The attempt ceiling is configuration, not a constant.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "command_line", derive(arrrg_derive::CommandLine))]
pub struct AdapterOptions {
    /// The namespace qualifying the benchmark table.
    #[cfg_attr(
        feature = "command_line",
        arrrg(optional, "Namespace qualifying the benchmark table.", "NAMESPACE")
    )]
    pub namespace: String,
    /// The benchmark table name.
    #[cfg_attr(
        feature = "command_line",
        arrrg(optional, "Benchmark table name.", "TABLE")
    )]
    pub table: String,
    /// The number of attempts before an operation reports Error.
    #[cfg_attr(
        feature = "command_line",
        arrrg(optional, "Attempts per operation before giving up.", "N")
    )]
    pub max_attempts: u64,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            namespace: "lakehouse.ycsb".to_string(),
            table: "usertable".to_string(),
            max_attempts: 10,
        }
    }
}

////////////////////////////////////////////// Adapter /////////////////////////////////////////////

/// The benchmark-driver adapter.  One instance serves every worker thread; the sample registry
/// is injected so the harness can drain it after the workers join.
pub struct Adapter<TS: TableStore> {
    store: TS,
    table: TableId,
    options: AdapterOptions,
    samples: Arc<SampleRegistry>,
}

impl<TS: TableStore> Adapter<TS> {
    pub fn new(store: TS, options: AdapterOptions, samples: Arc<SampleRegistry>) -> Self {
        let table = TableId::new(&options.namespace, &options.table);
        Self {
            store,
            table,
            options,
            samples,
        }
    }

    pub fn table(&self) -> &TableId {
        &self.table
    }

    /// Read the record under `key`.  An empty `fields` slice selects every store column under its
    /// own name; otherwise each requested field reads from its positional attribute column.
    pub fn read(
        &self,
        key: &str,
        fields: &[String],
        result: &mut HashMap<String, Vec<u8>>,
    ) -> Status {
        let assignment = match slots::assign(fields) {
            Ok(assignment) => assignment,
            Err(_) => {
                TOO_MANY_FIELDS.click();
                return Status::Error;
            }
        };
        let store = &self.store;
        let table = &self.table;
        self.run_retries(OpKind::Read, || {
            result.clear();
            let rows = store.query(table)?.filter_key_eq(key);
            if rows.is_empty()? {
                return Ok(Status::NotFound);
            }
            if assignment.is_empty() {
                for column in rows.columns() {
                    let mut values = rows.project(&column)?;
                    if !values.is_empty() {
                        result.insert(column, values.swap_remove(0));
                    }
                }
            } else {
                for (field, column) in &assignment {
                    let mut values = rows.project(column)?;
                    if !values.is_empty() {
                        result.insert(field.to_string(), values.swap_remove(0));
                    }
                }
            }
            Ok(Status::Ok)
        })
    }

    /// Scan up to `record_count` records starting at `start_key`, inclusive.
    pub fn scan(
        &self,
        start_key: &str,
        record_count: usize,
        fields: &[String],
        result: &mut Vec<HashMap<String, Vec<u8>>>,
    ) -> Status {
        let assignment = match slots::assign(fields) {
            Ok(assignment) => assignment,
            Err(_) => {
                TOO_MANY_FIELDS.click();
                return Status::Error;
            }
        };
        let store = &self.store;
        let table = &self.table;
        self.run_retries(OpKind::Scan, || {
            result.clear();
            let rows = store
                .query(table)?
                .filter_key_ge(start_key)
                .limit(record_count);
            if rows.is_empty()? {
                return Ok(Status::NotFound);
            }
            let columns: Vec<(String, String)> = if assignment.is_empty() {
                rows.columns().into_iter().map(|c| (c.clone(), c)).collect()
            } else {
                assignment
                    .iter()
                    .map(|(field, column)| (field.to_string(), column.to_string()))
                    .collect()
            };
            let mut projected = Vec::with_capacity(columns.len());
            let mut records = 0usize;
            for (_, column) in &columns {
                let values = rows.project(column)?;
                records = std::cmp::max(records, values.len());
                projected.push(values);
            }
            for row in 0..records {
                let mut record = HashMap::new();
                for (idx, (field, _)) in columns.iter().enumerate() {
                    if let Some(value) = projected[idx].get(row) {
                        record.insert(field.clone(), value.clone());
                    }
                }
                result.push(record);
            }
            Ok(Status::Ok)
        })
    }

    /// Update the record under `key`, assigning each value to its positional attribute column.
    pub fn update(&self, key: &str, values: &[(String, String)]) -> Status {
        let stmt = match Statement::update(&self.table, key, values) {
            Ok(stmt) => stmt,
            Err(_) => {
                TOO_MANY_FIELDS.click();
                return Status::Error;
            }
        };
        let store = &self.store;
        self.run_retries(OpKind::Update, || {
            store.execute(&stmt)?;
            Ok(Status::Ok)
        })
    }

    /// Insert a record under `key`.  Unused trailing attribute columns are set to NULL so every
    /// row carries the key plus exactly ten attribute columns.
    pub fn insert(&self, key: &str, values: &[(String, String)]) -> Status {
        let stmt = match Statement::insert(&self.table, key, values) {
            Ok(stmt) => stmt,
            Err(_) => {
                TOO_MANY_FIELDS.click();
                return Status::Error;
            }
        };
        let store = &self.store;
        self.run_retries(OpKind::Insert, || {
            store.execute(&stmt)?;
            Ok(Status::Ok)
        })
    }

    /// Delete the record under `key`.
    pub fn delete(&self, key: &str) -> Status {
        let stmt = Statement::delete(&self.table, key);
        let store = &self.store;
        self.run_retries(OpKind::Delete, || {
            store.execute(&stmt)?;
            Ok(Status::Ok)
        })
    }

    /// Run one attempt closure under the retry policy.  Exactly one sample lands in the registry
    /// per attempt:  a success sample when the store interaction completes (NotFound included),
    /// an error sample when it fails.  Statement construction happens before this call and is
    /// never timed.
    fn run_retries<F: FnMut() -> Result<Status, TS::Error>>(
        &self,
        kind: OpKind,
        mut attempt: F,
    ) -> Status {
        let mut retry = Retry::new(self.options.max_attempts);
        while retry.attempting().is_some() {
            let start_ns = wall_clock_ns();
            let clock = Instant::now();
            match attempt() {
                Ok(status) => {
                    let duration_ns = clock.elapsed().as_nanos() as u64;
                    self.samples
                        .append(kind, Outcome::Success, Sample::new(start_ns, duration_ns));
                    kind.counter().click();
                    kind.latency().add(duration_ns as f64 / 1_000.0);
                    return status;
                }
                Err(_) => {
                    let duration_ns = clock.elapsed().as_nanos() as u64;
                    self.samples
                        .append(kind, Outcome::Error, Sample::new(start_ns, duration_ns));
                    self.samples.count_redo();
                    REDO.click();
                    retry.failed();
                }
            }
        }
        EXHAUSTED.click();
        Status::Error
    }
}

//////////////////////////////////////////// wall clock ////////////////////////////////////////////

fn wall_clock_ns() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("clock should never fail")
        .as_nanos() as u64
}
