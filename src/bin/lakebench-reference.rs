//! Run a workload against the in-memory reference store.  Useful for testing benchmark overhead
//! and report plumbing without an engine behind the adapter.

use arrrg::CommandLine;

use lakebench::reference::ReferenceTableStore;
use lakebench::{workload, AdapterOptions, TableId};

const USAGE: &str = "USAGE: lakebench-reference [--reference-options] workload [--workload-options]";

///////////////////////////////////////// ReferenceOptions /////////////////////////////////////////

#[derive(Clone, Debug, Default, Eq, PartialEq, arrrg_derive::CommandLine)]
struct ReferenceOptions {
    /// The adapter options naming the table the store serves.
    #[arrrg(nested)]
    adapter: AdapterOptions,
}

/////////////////////////////////////////////// main ///////////////////////////////////////////////

fn main() {
    let (options, free) = ReferenceOptions::from_command_line_relaxed();
    if free.is_empty() {
        eprintln!("missing workload");
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }
    let table = TableId::new(&options.adapter.namespace, &options.adapter.table);
    let store = ReferenceTableStore::new(table);
    let mut workload = workload::from_command_line(USAGE, &free);
    workload.run(store);
}
