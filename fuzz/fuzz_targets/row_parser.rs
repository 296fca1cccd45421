#![no_main]

use libfuzzer_sys::fuzz_target;
use schedrecon::stream_reader::parse_row;

fuzz_target!(|data: &[u8]| {
    if let Ok(line) = std::str::from_utf8(data) {
        // Malformed rows must surface as errors, never panics
        let _ = parse_row(0, 1, line);
    }
});
