//! Latency-sample accumulation.  Samples bucket by (operation kind, outcome) into lock-free
//! prepend-only lists so worker threads never contend on a mutex in the hot path.  The registry
//! drains exactly once, after the workers join, into an ordered [Snapshot].

use std::sync::atomic::{AtomicU64, Ordering};

use listfree::List;

use crate::{OpKind, Outcome};

////////////////////////////////////////////// Sample //////////////////////////////////////////////

/// One timed attempt:  a wall-clock start and a monotonic duration, both in nanoseconds.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Sample {
    start_ns: u64,
    duration_ns: u64,
}

impl Sample {
    pub fn new(start_ns: u64, duration_ns: u64) -> Self {
        Self {
            start_ns,
            duration_ns,
        }
    }

    pub fn start_ns(&self) -> u64 {
        self.start_ns
    }

    pub fn duration_ns(&self) -> u64 {
        self.duration_ns
    }
}

////////////////////////////////////////// SampleRegistry //////////////////////////////////////////

const NUM_BUCKETS: usize = OpKind::ALL.len() * 2;

fn bucket_index(kind: OpKind, outcome: Outcome) -> usize {
    kind.index() * 2 + outcome.index()
}

/// Accumulates samples across threads.  Append never blocks; the registry is meant to be shared
/// behind an Arc and drained once ownership returns to a single thread.
pub struct SampleRegistry {
    buckets: [List<Sample>; NUM_BUCKETS],
    redos: AtomicU64,
}

impl SampleRegistry {
    pub fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| List::default()),
            redos: AtomicU64::new(0),
        }
    }

    /// Record one sample under its (kind, outcome) bucket.
    pub fn append(&self, kind: OpKind, outcome: Outcome, sample: Sample) {
        self.buckets[bucket_index(kind, outcome)].prepend(sample);
    }

    /// Count one redone attempt.
    pub fn count_redo(&self) {
        self.redos.fetch_add(1, Ordering::Relaxed);
    }

    /// Consume the registry, yielding every bucket in per-thread insertion order.
    pub fn drain(self) -> Snapshot {
        let mut buckets = Vec::with_capacity(NUM_BUCKETS);
        for bucket in &self.buckets {
            // Lists iterate newest-first; reverse to recover insertion order.
            let mut samples: Vec<Sample> = bucket.iter().copied().collect();
            samples.reverse();
            buckets.push(samples);
        }
        Snapshot {
            buckets,
            redos: self.redos.load(Ordering::Relaxed),
        }
    }
}

impl Default for SampleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

///////////////////////////////////////////// Snapshot /////////////////////////////////////////////

/// A drained registry.  Immutable; this is what the report writer consumes.
pub struct Snapshot {
    buckets: Vec<Vec<Sample>>,
    redos: u64,
}

impl Snapshot {
    /// The samples recorded under (kind, outcome), oldest first.
    pub fn samples(&self, kind: OpKind, outcome: Outcome) -> &[Sample] {
        &self.buckets[bucket_index(kind, outcome)]
    }

    /// The total number of redone attempts.
    pub fn redos(&self) -> u64 {
        self.redos
    }

    /// The total number of samples across every bucket.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////
