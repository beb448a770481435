//! A workload that's capable of running something similar to YCSB.
//!
//! Five operations draw from a weighted distribution at a target throughput.  Load mode instead
//! enumerates every key once, inserting each, so a run phase can follow against a full table.

use std::collections::HashMap;
use std::fs::File;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use armnod::{
    CharSetChooser, ConstantLengthChooser, SeedChooser, SetStringChooser, SetStringChooserOnce,
    Armnod, CHAR_SET_ALNUM,
};
use biometrics::{Collector, Counter, Moments};
use guacamole::{FromGuacamole, Guacamole};
use zerror::Z;

use crate::metrics::PlainTextEmitter;
use crate::samples::SampleRegistry;
use crate::{report, Adapter, AdapterOptions, BenchmarkStore};

use super::Workload as WorkloadTrait;

//////////////////////////////////////////// biometrics ////////////////////////////////////////////

static INTERARRIVAL_TIME: Moments =
    Moments::new("lakebench.ycsb.target_interarrival_time_micros");
static STALL: Counter = Counter::new("lakebench.ycsb.stall");
static CATCHUP: Counter = Counter::new("lakebench.ycsb.catchup");
static FINISHED: Counter = Counter::new("lakebench.ycsb.finished");

fn register_biometrics(collector: &Collector) {
    collector.register_moments(&INTERARRIVAL_TIME);
    collector.register_counter(&STALL);
    collector.register_counter(&CATCHUP);
    collector.register_counter(&FINISHED);
}

/////////////////////////////////////////// shard_bounds ///////////////////////////////////////////

/// The half-open key-index range worker `index` of `threads` covers during load.
fn shard_bounds(cardinality: u64, index: u64, threads: u64) -> (u64, u64) {
    let start = cardinality / threads * index + std::cmp::min(index, cardinality % threads);
    let width = cardinality / threads + u64::from(index < cardinality % threads);
    (start, start + width)
}

/////////////////////////////////////////////// State //////////////////////////////////////////////

struct State {
    options: WorkloadOptions,
    started: Instant,
    stopped: AtomicU64,
}

impl State {
    fn run<TS: BenchmarkStore>(&self, index: u64, adapter: Arc<Adapter<TS>>) {
        let mut guac = Guacamole::new((u64::MAX / self.options.worker_threads) * index);
        let mut keys = self.keys(index);
        let mut values = self.values();
        let interarrival_time =
            self.options.target_throughput as f64 / self.options.worker_threads as f64;
        let total_weight = self.options.insert_weight
            + self.options.update_weight
            + self.options.delete_weight
            + self.options.read_weight
            + self.options.scan_weight;
        let insert_thresh = self.options.insert_weight / total_weight;
        let update_thresh = insert_thresh + (self.options.update_weight / total_weight);
        let delete_thresh = update_thresh + (self.options.delete_weight / total_weight);
        let read_thresh = delete_thresh + (self.options.read_weight / total_weight);
        let scan_thresh = read_thresh + (self.options.scan_weight / total_weight);
        let mut backlog = 0u64;
        while self.options.load || self.started.elapsed().as_secs() < self.options.duration_secs {
            let start = Instant::now();
            let next_request_micros = (0.0
                - f64::from_guacamole(&mut (), &mut guac).ln() / interarrival_time)
                * 1_000_000.0;
            let weight: f64 = f64::from_guacamole(&mut (), &mut guac);
            if self.options.load || weight < insert_thresh {
                if !self.insert(&adapter, &mut guac, &mut keys, &mut values) {
                    break;
                }
            } else if weight < update_thresh {
                self.update(&adapter, &mut guac, &mut keys, &mut values);
            } else if weight < delete_thresh {
                self.delete(&adapter, &mut guac, &mut keys);
            } else if weight < read_thresh {
                self.read(&adapter, &mut guac, &mut keys);
            } else if weight < scan_thresh {
                self.scan(&adapter, &mut guac, &mut keys);
            } else {
                std::thread::sleep(std::time::Duration::from_secs(1));
            }
            let elapsed_micros = start.elapsed().as_micros() as f64;
            if next_request_micros < elapsed_micros {
                backlog =
                    backlog.saturating_add((elapsed_micros - next_request_micros).ceil() as u64);
                STALL.click();
            } else {
                let delta = (next_request_micros - elapsed_micros) as u64;
                if delta < backlog {
                    backlog -= delta;
                } else if backlog > 0 {
                    CATCHUP.click();
                    backlog = 0;
                }
                std::thread::sleep(std::time::Duration::from_micros(delta));
            }
            INTERARRIVAL_TIME.add(next_request_micros);
        }
        self.stopped.fetch_add(1, Ordering::Relaxed);
        FINISHED.click();
    }

    fn keys(&self, index: u64) -> Armnod {
        let string: Box<dyn SeedChooser> = if self.options.load {
            let (start, limit) = shard_bounds(
                self.options.key_cardinality,
                index,
                self.options.worker_threads,
            );
            Box::new(SetStringChooserOnce::new(start, limit))
        } else {
            Box::new(SetStringChooser::new(self.options.key_cardinality))
        };
        Armnod {
            string,
            length: Box::new(ConstantLengthChooser::new(self.options.key_length as u32)),
            characters: Box::new(CharSetChooser::new(CHAR_SET_ALNUM)),
            buffer: Vec::new(),
        }
    }

    fn values(&self) -> Armnod {
        Armnod::random(self.options.value_length as u32)
    }

    fn fields(&self, guac: &mut Guacamole, values: &mut Armnod) -> Option<Vec<(String, String)>> {
        let mut fields = Vec::with_capacity(self.options.fields_per_record as usize);
        for i in 0..self.options.fields_per_record {
            fields.push((format!("field{}", i), values.choose(guac)?));
        }
        Some(fields)
    }

    fn insert<TS: BenchmarkStore>(
        &self,
        adapter: &Adapter<TS>,
        guac: &mut Guacamole,
        keys: &mut Armnod,
        values: &mut Armnod,
    ) -> bool {
        let key = keys.choose(guac);
        let fields = self.fields(guac, values);
        if let (Some(key), Some(fields)) = (key, fields) {
            adapter.insert(&key, &fields);
            true
        } else {
            false
        }
    }

    fn update<TS: BenchmarkStore>(
        &self,
        adapter: &Adapter<TS>,
        guac: &mut Guacamole,
        keys: &mut Armnod,
        values: &mut Armnod,
    ) {
        if let (Some(key), Some(fields)) = (keys.choose(guac), self.fields(guac, values)) {
            adapter.update(&key, &fields);
        }
    }

    fn delete<TS: BenchmarkStore>(
        &self,
        adapter: &Adapter<TS>,
        guac: &mut Guacamole,
        keys: &mut Armnod,
    ) {
        if let Some(key) = keys.choose(guac) {
            adapter.delete(&key);
        }
    }

    fn read<TS: BenchmarkStore>(
        &self,
        adapter: &Adapter<TS>,
        guac: &mut Guacamole,
        keys: &mut Armnod,
    ) {
        if let Some(key) = keys.choose(guac) {
            let mut record = HashMap::new();
            adapter.read(&key, &[], &mut record);
        }
    }

    fn scan<TS: BenchmarkStore>(
        &self,
        adapter: &Adapter<TS>,
        guac: &mut Guacamole,
        keys: &mut Armnod,
    ) {
        if let Some(key) = keys.choose(guac) {
            let mut records = Vec::new();
            adapter.scan(&key, self.options.scan_records as usize, &[], &mut records);
        }
    }
}

////////////////////////////////////////// WorkloadOptions /////////////////////////////////////////

/// YCSB workload options.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "command_line", derive(arrrg_derive::CommandLine))]
pub struct WorkloadOptions {
    /// The number of distinct keys to draw from.
    #[cfg_attr(
        feature = "command_line",
        arrrg(optional, "Number of distinct keys to draw from.", "KEYS")
    )]
    key_cardinality: u64,
    /// The length of every generated key.
    #[cfg_attr(feature = "command_line", arrrg(optional, "Length of generated keys.", "BYTES"))]
    key_length: u64,
    /// The length of every generated field value.
    #[cfg_attr(
        feature = "command_line",
        arrrg(optional, "Length of generated field values.", "BYTES")
    )]
    value_length: u64,
    /// The number of fields written per insert or update.
    #[cfg_attr(
        feature = "command_line",
        arrrg(optional, "Fields written per insert or update.", "FIELDS")
    )]
    fields_per_record: u64,
    /// The weight assigned to insert operations.
    #[cfg_attr(
        feature = "command_line",
        arrrg(optional, "Weight to assign to insert operations.", "WEIGHT")
    )]
    insert_weight: f64,
    /// The weight assigned to update operations.
    #[cfg_attr(
        feature = "command_line",
        arrrg(optional, "Weight to assign to update operations.", "WEIGHT")
    )]
    update_weight: f64,
    /// The weight assigned to delete operations.
    #[cfg_attr(
        feature = "command_line",
        arrrg(optional, "Weight to assign to delete operations.", "WEIGHT")
    )]
    delete_weight: f64,
    /// The weight assigned to read operations.
    #[cfg_attr(
        feature = "command_line",
        arrrg(optional, "Weight to assign to read operations.", "WEIGHT")
    )]
    read_weight: f64,
    /// The weight assigned to scan operations.
    #[cfg_attr(
        feature = "command_line",
        arrrg(optional, "Weight to assign to scan operations.", "WEIGHT")
    )]
    scan_weight: f64,
    /// The number of records per scan.
    #[cfg_attr(
        feature = "command_line",
        arrrg(optional, "Number of records per scan (constant).", "RECORDS")
    )]
    scan_records: u64,
    /// Change behavior to insert every key once instead of running for [duration_secs].
    #[cfg_attr(
        feature = "command_line",
        arrrg(flag, "Insert every key once instead of running for --duration-secs.")
    )]
    load: bool,
    /// The number of worker threads to spawn.
    #[cfg_attr(feature = "command_line", arrrg(optional, "Number of threads to run.", "THREADS"))]
    worker_threads: u64,
    /// The target throughput.
    #[cfg_attr(
        feature = "command_line",
        arrrg(optional, "Target throughput to sustain.", "OPS/SEC")
    )]
    target_throughput: u64,
    /// The number of seconds to run the test.
    #[cfg_attr(
        feature = "command_line",
        arrrg(optional, "Number of seconds to run the experiment.", "SECONDS")
    )]
    duration_secs: u64,
    /// The path to which metrics should be written in biometrics plaintext form.
    #[cfg_attr(
        feature = "command_line",
        arrrg(optional, "Metrics output (default: \"lakebench.txt\").", "FILE")
    )]
    metrics: String,
    /// The prefix for the end-of-run latency report.
    #[cfg_attr(
        feature = "command_line",
        arrrg(optional, "Prefix for the end-of-run latency report.", "PREFIX")
    )]
    report_prefix: String,
    /// The adapter options.
    #[cfg_attr(feature = "command_line", arrrg(nested))]
    adapter: AdapterOptions,
}

impl Default for WorkloadOptions {
    fn default() -> Self {
        Self {
            key_cardinality: 1_000_000,
            key_length: 20,
            value_length: 100,
            fields_per_record: 10,
            insert_weight: 0.0,
            update_weight: 0.05,
            delete_weight: 0.0,
            read_weight: 0.95,
            scan_weight: 0.0,
            scan_records: 10,
            load: false,
            worker_threads: 64,
            target_throughput: 10_000,
            duration_secs: 60,
            metrics: "lakebench.txt".to_string(),
            report_prefix: "lakebench-report-".to_string(),
            adapter: AdapterOptions::default(),
        }
    }
}

impl PartialEq for WorkloadOptions {
    fn eq(&self, other: &WorkloadOptions) -> bool {
        fn approx_eq(lhs: f64, rhs: f64) -> bool {
            (lhs - rhs).abs() <= 0.001 * lhs.abs().max(rhs.abs())
        }
        self.key_cardinality == other.key_cardinality
            && self.key_length == other.key_length
            && self.value_length == other.value_length
            && self.fields_per_record == other.fields_per_record
            && approx_eq(self.insert_weight, other.insert_weight)
            && approx_eq(self.update_weight, other.update_weight)
            && approx_eq(self.delete_weight, other.delete_weight)
            && approx_eq(self.read_weight, other.read_weight)
            && approx_eq(self.scan_weight, other.scan_weight)
            && self.scan_records == other.scan_records
            && self.load == other.load
            && self.worker_threads == other.worker_threads
            && self.target_throughput == other.target_throughput
            && self.duration_secs == other.duration_secs
            && self.metrics == other.metrics
            && self.report_prefix == other.report_prefix
            && self.adapter == other.adapter
    }
}

impl Eq for WorkloadOptions {}

///////////////////////////////////////////// Workload /////////////////////////////////////////////

/// The YCSB workload.
pub struct Workload<TS: BenchmarkStore> {
    options: WorkloadOptions,
    _phantom_ts: std::marker::PhantomData<TS>,
}

impl<TS: BenchmarkStore> Workload<TS> {
    /// Create a new workload from options.
    pub fn new(options: WorkloadOptions) -> Self {
        Self {
            options,
            _phantom_ts: std::marker::PhantomData,
        }
    }
}

impl<TS: BenchmarkStore + 'static> WorkloadTrait<TS> for Workload<TS> {
    fn run(&mut self, store: TS) {
        // Setup the biometrics.
        let mut metrics = PlainTextEmitter::new(
            File::create(&self.options.metrics).expect("metrics file should be writable"),
        );
        let collector = Collector::new();
        register_biometrics(&collector);
        crate::register_biometrics(&collector);
        store.register_biometrics(&collector);
        if let Err(e) = collector.emit(&mut metrics) {
            eprintln!("collector error: {}", e);
        }
        // Spawn the worker threads.
        let registry = Arc::new(SampleRegistry::new());
        let adapter = Arc::new(Adapter::new(
            store,
            self.options.adapter.clone(),
            Arc::clone(&registry),
        ));
        let state = Arc::new(State {
            options: self.options.clone(),
            started: Instant::now(),
            stopped: AtomicU64::new(0),
        });
        let mut threads = vec![];
        for idx in 0..self.options.worker_threads {
            let a = Arc::clone(&adapter);
            let s = Arc::clone(&state);
            threads.push(std::thread::spawn(move || {
                s.run(idx, a);
            }));
        }
        // Emit metrics until the end of the test.
        while (self.options.load || state.started.elapsed().as_secs() < self.options.duration_secs)
            && state.stopped.load(Ordering::Relaxed) < self.options.worker_threads
        {
            std::thread::sleep(std::time::Duration::from_millis(1000));
            if let Err(e) = collector.emit(&mut metrics) {
                eprintln!("collector error: {}", e);
            }
        }
        // Join the test threads.
        for thread in threads.into_iter() {
            thread.join().expect("thread should finish successfully");
        }
        // The workers joined and dropped their adapters, so the registry has one owner left once
        // the adapter goes.
        drop(adapter);
        let registry = Arc::try_unwrap(registry)
            .unwrap_or_else(|_| panic!("sample registry should have one owner"));
        let snapshot = registry.drain();
        match report::write_report(&self.options.report_prefix, &snapshot) {
            Ok(path) => {
                println!("report written to {}", path.display());
            }
            Err(err) => {
                eprintln!("could not write report: {}", err.long_form());
            }
        }
    }
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////
