//! Biometrics emitters for workloads.

use std::io::Write;
use std::sync::Mutex;

use biometrics::{Counter, Emitter, Gauge, Moments, TDigest};

///////////////////////////////////////// PlainTextEmitter /////////////////////////////////////////

/// An emitter that puts readings one-per-line.
///
/// Timestamps are seconds since the first emission rather than wall-clock time, so runs diff
/// cleanly against each other.
pub struct PlainTextEmitter<W: Write> {
    output: W,
    offset: Mutex<Option<f64>>,
}

impl<W: Write> PlainTextEmitter<W> {
    /// Create a new emitter around the output writer.
    pub fn new(output: W) -> Self {
        let offset = Mutex::new(None);
        Self { output, offset }
    }

    fn offset(&self, now: f64) -> u64 {
        let mut offset = self.offset.lock().unwrap();
        if offset.is_none() {
            *offset = Some(now);
        }
        // SAFETY(rescrv): Offset is guaranteed some at this point, so unwrap is safe.
        ((now - offset.unwrap()) / 1_000.0) as u64
    }
}

impl<W: Write> Emitter for PlainTextEmitter<W> {
    type Error = std::io::Error;

    fn emit_counter(&mut self, counter: &'static Counter, now: f64) -> Result<(), std::io::Error> {
        let offset = self.offset(now);
        self.output.write_fmt(format_args!(
            "{} {} {}\n",
            counter.what(),
            offset,
            counter.read()
        ))
    }

    fn emit_gauge(&mut self, gauge: &'static Gauge, now: f64) -> Result<(), std::io::Error> {
        let offset = self.offset(now);
        self.output.write_fmt(format_args!(
            "{} {} {}\n",
            gauge.what(),
            offset,
            gauge.read()
        ))
    }

    fn emit_moments(&mut self, moments: &'static Moments, now: f64) -> Result<(), std::io::Error> {
        let what = moments.what();
        let offset = self.offset(now);
        let moments = moments.read();
        self.output.write_fmt(format_args!(
            "{} {} {} {} {} {} {}\n",
            what,
            offset,
            moments.n(),
            moments.mean(),
            moments.variance(),
            moments.skewness(),
            moments.kurtosis(),
        ))
    }

    fn emit_t_digest(&mut self, _: &'static TDigest, _: f64) -> Result<(), std::io::Error> {
        // T-digests have no plaintext form.
        Ok(())
    }
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////
