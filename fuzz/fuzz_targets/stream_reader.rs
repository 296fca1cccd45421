#![no_main]

use libfuzzer_sys::fuzz_target;
use schedrecon::descriptor::RunDescriptor;
use schedrecon::event::EventKind;
use schedrecon::run::reconstruct_from_readers;
use std::collections::BTreeMap;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let mut pc = BTreeMap::new();
    for kind in EventKind::ALL {
        pc.insert(kind.as_str().to_string(), kind);
    }
    let mut tasks = BTreeMap::new();
    tasks.insert("a".to_string(), 1);
    tasks.insert("b".to_string(), 2);
    let descriptor = RunDescriptor::new(pc, tasks);

    // Whole stream including header; any outcome but a panic is acceptable
    let _ = reconstruct_from_readers(&descriptor, [(0u32, Cursor::new(data))]);
});
