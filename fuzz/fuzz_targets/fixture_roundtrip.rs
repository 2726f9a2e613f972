#![no_main]

use std::io::Cursor;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use zdw_decoder::DecodeEngine;
use zdw_testkit::{Cell, FixtureBuilder};
use zdw_wire::{ByteSource, ColumnType};

#[derive(Debug, Arbitrary)]
struct FuzzRow {
    text: String,
    number: u32,
    delta: i16,
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    version: u8,
    blocks: Vec<Vec<FuzzRow>>,
}

// Fuzz target: well-formed files built from arbitrary rows must decode
// back to exactly those rows, for every format version.
fuzz_target!(|input: FuzzInput| {
    let version = u16::from(input.version % 11) + 1;
    let mut builder = FixtureBuilder::new(version)
        .column("text", ColumnType::Text)
        .column("number", ColumnType::Long)
        .column("delta", ColumnType::ShortSigned);
    let mut expected = Vec::new();
    for block in &input.blocks {
        let rows = block
            .iter()
            .map(|row| {
                let text: String = row.text.chars().filter(|&c| c != '\0').take(1_000).collect();
                expected.push(format!("{text}\t{}\t{}", row.number, row.delta));
                vec![
                    Cell::Text(text),
                    Cell::Unsigned(u64::from(row.number)),
                    Cell::Signed(i64::from(row.delta)),
                ]
            })
            .collect();
        builder = builder.block(rows);
    }

    let src = ByteSource::from_reader(Cursor::new(builder.build().bytes)).unwrap();
    let mut engine = DecodeEngine::new(src, "fuzz");
    engine.read_header().unwrap();
    let mut decoded = Vec::new();
    while let Some(row) = engine.next_row().unwrap() {
        decoded.push(String::from_utf8(row.to_line(b"\t")).unwrap());
    }
    assert_eq!(decoded, expected);
});
