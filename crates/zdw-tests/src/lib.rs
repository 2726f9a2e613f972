//! Shared fixtures for the integration suite and the benchmarks.

use std::io::Cursor;

use zdw_decoder::{DecodeEngine, DecodeError};
use zdw_testkit::{Cell, FixtureBuilder};
use zdw_wire::{ByteSource, ColumnType};

/// A hand-assembled version 9 file: columns `name varchar(3)` and
/// `age tiny`, one last block of three rows.
///
/// ```text
/// 0900                       version 9
/// 6e616d6500 61676500 00     "name" "age" end of names
/// 0004                       Varchar, Tiny
/// 0300                       char size of name
/// 0b00000000000000           chunk size 11
/// 00416e6e00426f00437900     "\0Ann\0Bo\0Cy\0"
/// 06000000 03000000          line length 6, 3 rows
/// 01 010500000000000000      name: 1 byte; age: 1 byte, base 5
/// 01                         last block
/// 03011a 030525 030801       rows
/// ```
pub const GOLDEN_HEX: &str = "0900 6e616d6500 61676500 00 0004 0300 0b00000000000000 \
     00416e6e00426f00437900 06000000 03000000 01 010500000000000000 01 \
     03011a 030525 030801";

/// Rows of [`GOLDEN_HEX`], tab separated.
pub const GOLDEN_LINES: [&str; 3] = ["Ann\t30", "Bo\t41", "Cy\t5"];

/// # Panics
///
/// Never for the constant above.
#[must_use]
pub fn golden_bytes() -> Vec<u8> {
    let digits: String = GOLDEN_HEX.split_whitespace().collect();
    hex::decode(digits).expect("golden fixture is valid hex")
}

/// Engine over in-memory bytes.
///
/// # Panics
///
/// If the first read from the cursor fails, which it cannot.
#[must_use]
pub fn engine_over(bytes: Vec<u8>, base_name: &str) -> DecodeEngine {
    let source = ByteSource::from_reader(Cursor::new(bytes)).expect("in-memory source");
    DecodeEngine::new(source, base_name)
}

/// Decode every row of `bytes` as tab-joined lines.
///
/// # Errors
///
/// The first error raised by the engine.
pub fn decode_lines(bytes: Vec<u8>) -> Result<Vec<String>, DecodeError> {
    let mut engine = engine_over(bytes, "fixture");
    engine.read_header()?;
    let mut lines = Vec::new();
    while let Some(row) = engine.next_row()? {
        lines.push(String::from_utf8_lossy(&row.to_line(b"\t")).into_owned());
    }
    Ok(lines)
}

/// A web-log style fixture with `blocks` blocks of `rows_per_block` rows,
/// mixing dictionary, unsigned and signed columns.
#[must_use]
pub fn weblog(version: u16, blocks: usize, rows_per_block: usize) -> FixtureBuilder {
    let mut builder = FixtureBuilder::new(version)
        .column("url", ColumnType::Varchar)
        .column("referrer", ColumnType::Text)
        .column("country", ColumnType::Char2)
        .column("status", ColumnType::Short)
        .column("bytes", ColumnType::LongLong)
        .column("offset", ColumnType::LongSigned);
    for block in 0..blocks {
        let rows = (0..rows_per_block)
            .map(|i| {
                let n = (block * rows_per_block + i) as u64;
                vec![
                    Cell::text(format!("https://example.com/page/{}", n % 37)),
                    if n % 5 == 0 {
                        Cell::Null
                    } else {
                        Cell::text(format!("https://search.example.org/?q=term{}", n % 11))
                    },
                    Cell::text(["US", "DE", "FR", "JP"][(n % 4) as usize]),
                    Cell::Unsigned(if n % 13 == 0 { 404 } else { 200 }),
                    Cell::Unsigned(1_000 + n * 17),
                    Cell::Signed(n as i64 - 500),
                ]
            })
            .collect();
        builder = builder.block(rows);
    }
    builder
}
