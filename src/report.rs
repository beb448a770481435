//! The end-of-run report.  A drained [Snapshot] dumps to a fresh text file: one marker-delimited
//! section per non-empty (kind, outcome) bucket, one `start, duration` line per sample, and a
//! trailer carrying the redo total.  The format is fixed; downstream tooling parses it by marker.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use crate::samples::Snapshot;
use crate::{Error, OpKind, Outcome};

////////////////////////////////////////////// markers /////////////////////////////////////////////

// The error markers are irregular on purpose; report consumers match them verbatim.
fn marker(kind: OpKind, outcome: Outcome) -> &'static str {
    match (kind, outcome) {
        (OpKind::Insert, Outcome::Success) => "---inserts---",
        (OpKind::Update, Outcome::Success) => "---updates---",
        (OpKind::Delete, Outcome::Success) => "---deletes---",
        (OpKind::Read, Outcome::Success) => "---reads---",
        (OpKind::Scan, Outcome::Success) => "---scans---",
        (OpKind::Insert, Outcome::Error) => "---inserts-errors---",
        (OpKind::Update, Outcome::Error) => "---updates-errors---",
        (OpKind::Delete, Outcome::Error) => "---delete-errors---",
        (OpKind::Read, Outcome::Error) => "---read-errors---",
        (OpKind::Scan, Outcome::Error) => "---scan-errors---",
    }
}

const SECTION_END: &str = "-------------";

//////////////////////////////////////////// write_report ///////////////////////////////////////////

/// Render `snapshot` and write it to a freshly-created file whose name is `prefix` plus a random
/// suffix.  Existing files are never overwritten; name collisions redraw the suffix.  Returns the
/// path written.
pub fn write_report(prefix: &str, snapshot: &Snapshot) -> Result<PathBuf, Error> {
    let contents = render(snapshot);
    loop {
        let path = PathBuf::from(format!("{}{}.txt", prefix, rand::random::<u32>()));
        let file = OpenOptions::new().write(true).create_new(true).open(&path);
        let mut file = match file {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                continue;
            }
            Err(err) => {
                return Err(err.into());
            }
        };
        file.write_all(contents.as_bytes())?;
        file.flush()?;
        return Ok(path);
    }
}

/// The report text:  success sections for every operation, then error sections, empty buckets
/// skipped, trailer last with no trailing newline.
pub fn render(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    for outcome in [Outcome::Success, Outcome::Error] {
        for kind in OpKind::ALL {
            let samples = snapshot.samples(kind, outcome);
            if samples.is_empty() {
                continue;
            }
            out.push_str(marker(kind, outcome));
            out.push('\n');
            for sample in samples {
                out.push_str(&format!("{}, {}\n", sample.start_ns(), sample.duration_ns()));
            }
            out.push_str(SECTION_END);
            out.push('\n');
        }
    }
    out.push_str(&format!("--------->>>>{}<<<<---------", snapshot.redos()));
    out
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use crate::samples::{Sample, SampleRegistry};

    use super::*;

    fn prefix(name: &str) -> String {
        let mut path = std::env::temp_dir();
        path.push(format!("lakebench-report-{}-{}-", name, std::process::id()));
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn empty_snapshot_is_just_the_trailer() {
        let snapshot = SampleRegistry::new().drain();
        assert_eq!("--------->>>>0<<<<---------", render(&snapshot));
    }

    #[test]
    fn sections_render_in_fixed_order() {
        let registry = SampleRegistry::new();
        registry.append(OpKind::Read, Outcome::Success, Sample::new(5, 50));
        registry.append(OpKind::Insert, Outcome::Success, Sample::new(1, 10));
        registry.append(OpKind::Insert, Outcome::Success, Sample::new(2, 20));
        registry.append(OpKind::Delete, Outcome::Error, Sample::new(9, 90));
        registry.count_redo();
        let snapshot = registry.drain();
        let expected = "---inserts---\n\
                        1, 10\n\
                        2, 20\n\
                        -------------\n\
                        ---reads---\n\
                        5, 50\n\
                        -------------\n\
                        ---delete-errors---\n\
                        9, 90\n\
                        -------------\n\
                        --------->>>>1<<<<---------";
        assert_eq!(expected, render(&snapshot));
    }

    #[test]
    fn error_sections_follow_every_success_section() {
        let registry = SampleRegistry::new();
        registry.append(OpKind::Scan, Outcome::Success, Sample::new(1, 1));
        registry.append(OpKind::Insert, Outcome::Error, Sample::new(2, 2));
        let snapshot = registry.drain();
        let rendered = render(&snapshot);
        let scans = rendered.find("---scans---").unwrap();
        let insert_errors = rendered.find("---inserts-errors---").unwrap();
        assert!(scans < insert_errors);
    }

    #[test]
    fn empty_buckets_emit_no_markers() {
        let registry = SampleRegistry::new();
        registry.append(OpKind::Update, Outcome::Success, Sample::new(3, 30));
        let snapshot = registry.drain();
        let rendered = render(&snapshot);
        assert!(rendered.contains("---updates---"));
        assert!(!rendered.contains("---inserts---"));
        assert!(!rendered.contains("---updates-errors---"));
    }

    #[test]
    fn trailer_has_no_trailing_newline() {
        let registry = SampleRegistry::new();
        registry.append(OpKind::Read, Outcome::Success, Sample::new(1, 1));
        let snapshot = registry.drain();
        let rendered = render(&snapshot);
        assert!(rendered.ends_with("<<<<---------"));
    }

    #[test]
    fn write_report_never_overwrites() {
        let registry = SampleRegistry::new();
        registry.append(OpKind::Read, Outcome::Success, Sample::new(1, 1));
        let snapshot = registry.drain();
        let prefix = prefix("never-overwrites");
        let first = write_report(&prefix, &snapshot).unwrap();
        let second = write_report(&prefix, &snapshot).unwrap();
        assert_ne!(first, second);
        let first_contents = std::fs::read_to_string(&first).unwrap();
        let second_contents = std::fs::read_to_string(&second).unwrap();
        assert_eq!(first_contents, second_contents);
        assert_eq!(render(&snapshot), first_contents);
        std::fs::remove_file(first).unwrap();
        std::fs::remove_file(second).unwrap();
    }

    #[test]
    fn written_files_carry_the_txt_suffix() {
        let snapshot = SampleRegistry::new().drain();
        let prefix = prefix("txt-suffix");
        let path = write_report(&prefix, &snapshot).unwrap();
        assert!(path.to_str().unwrap().starts_with(&prefix));
        assert!(path.to_str().unwrap().ends_with(".txt"));
        std::fs::remove_file(path).unwrap();
    }
}
