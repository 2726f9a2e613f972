#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use zdw_decoder::DecodeEngine;
use zdw_wire::ByteSource;

// Fuzz target: full decode of an arbitrary stream.
//
// Drains every row the engine will produce. Catches bugs in:
// - Legacy chained and visitor dictionaries (bad back-references, cycles)
// - Flat dictionary offsets and unterminated values
// - Block header widths and bases
// - Delta bitmaps and value widths
// - Gzip/zstd detection on hostile prefixes
// - State handling after fatal errors
fuzz_target!(|data: &[u8]| {
    let Ok(src) = ByteSource::from_reader(Cursor::new(data.to_vec())) else {
        return;
    };
    let mut engine = DecodeEngine::new(src, "fuzz");
    if engine.read_header().is_err() {
        return;
    }
    let _ = engine.schema();
    loop {
        match engine.next_row() {
            Ok(Some(row)) => {
                let _ = row.joined_len();
            }
            Ok(None) => break,
            Err(_) => {
                assert!(engine.next_row().is_err() || engine.is_finished());
                break;
            }
        }
    }
});
