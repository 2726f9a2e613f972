#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use zdw_wire::{ByteSource, FileHeader};

// Fuzz target: FileHeader::read_from with arbitrary bytes.
//
// Catches bugs in:
// - Version range checking
// - NUL-terminated name scanning and the name length limit
// - Column type validation
// - Char size and decimal factor sections
fuzz_target!(|data: &[u8]| {
    if let Ok(mut src) = ByteSource::from_reader(Cursor::new(data.to_vec())) {
        let _ = FileHeader::read_from(&mut src);
    }
});
