//! End-to-end decoding: the hand-assembled golden file, compression
//! wrappers, and multi-block web-log fixtures through every public layer.

use std::fs;

use zdw_decoder::{BlockStatus, EngineState, InclusionRule};
use zdw_output::{ColumnSelection, FileUnconverter, OutputConfig, UnconvertOptions};
use zdw_tests::{GOLDEN_LINES, decode_lines, engine_over, golden_bytes, weblog};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn weblog_line(n: u64) -> String {
    let referrer = if n % 5 == 0 {
        String::new()
    } else {
        format!("https://search.example.org/?q=term{}", n % 11)
    };
    format!(
        "https://example.com/page/{}\t{}\t{}\t{}\t{}\t{}",
        n % 37,
        referrer,
        ["US", "DE", "FR", "JP"][(n % 4) as usize],
        if n % 13 == 0 { 404 } else { 200 },
        1_000 + n * 17,
        n as i64 - 500,
    )
}

// ── Golden file ───────────────────────────────────────────────────────────────

#[test]
fn golden_file_decodes_to_three_rows() {
    assert_eq!(decode_lines(golden_bytes()).unwrap(), GOLDEN_LINES);
}

#[test]
fn golden_file_step_by_step() {
    let mut engine = engine_over(golden_bytes(), "golden");
    engine.read_header().unwrap();
    assert_eq!(engine.version().map(|v| v.raw()), Some(9));
    assert_eq!(engine.output_column_names().unwrap(), vec!["name", "age"]);

    assert_eq!(engine.parse_next_block().unwrap(), BlockStatus::Block { rows: 3 });
    assert_eq!(engine.line_length(), 6);
    assert!(engine.is_last_block());

    let row = engine.read_next_row().unwrap();
    assert_eq!(row.column(0), Some(&b"Ann"[..]));
    assert_eq!(row.column(1), Some(&b"30"[..]));
    engine.read_next_row().unwrap();
    engine.read_next_row().unwrap();
    assert_eq!(engine.state(), EngineState::End);
    assert!(engine.is_finished());
}

#[test]
fn golden_file_through_the_file_unconverter() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("golden.zdw");
    fs::write(&input, golden_bytes()).unwrap();

    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();
    let mut unconverter =
        FileUnconverter::open(&input, OutputConfig::in_dir(&out), UnconvertOptions::default())
            .unwrap();
    let summary = unconverter.run(&ColumnSelection::default()).unwrap();

    assert_eq!(summary.base_name, "golden");
    assert_eq!(summary.rows, 3);
    assert_eq!(
        fs::read_to_string(out.join("golden.sql")).unwrap(),
        "Ann\t30\nBo\t41\nCy\t5\n"
    );
    assert_eq!(
        fs::read_to_string(out.join("golden.desc.sql")).unwrap(),
        "name\tvarchar(3)\nage\ttinyint(3) unsigned\n"
    );
}

#[test]
fn golden_file_with_virtual_columns() {
    let mut engine = engine_over(golden_bytes(), "golden");
    engine.read_header().unwrap();
    engine
        .set_columns_to_output(
            &["virtual_export_basename", "age", "virtual_export_row"],
            InclusionRule::FailOnInvalidColumn,
        )
        .unwrap();
    let mut lines = Vec::new();
    while let Some(row) = engine.next_row().unwrap() {
        lines.push(String::from_utf8(row.to_line(b",")).unwrap());
    }
    assert_eq!(lines, ["golden,30,1", "golden,41,2", "golden,5,3"]);
}

// ── Compression wrappers ──────────────────────────────────────────────────────

#[test]
fn gzip_and_zstd_decode_like_raw() {
    let builder = weblog(11, 2, 25);
    let raw = decode_lines(builder.build().bytes).unwrap();
    assert_eq!(raw.len(), 50);
    assert_eq!(decode_lines(builder.clone().gzip().build().bytes).unwrap(), raw);
    assert_eq!(decode_lines(builder.zstd().build().bytes).unwrap(), raw);
}

#[test]
fn compressed_input_file_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("hits.zdw.gz");
    fs::write(&input, weblog(10, 1, 4).gzip().build().bytes).unwrap();

    let options = UnconvertOptions {
        test_only: true,
        ..UnconvertOptions::default()
    };
    let mut unconverter =
        FileUnconverter::open(&input, OutputConfig::in_dir(dir.path()), options).unwrap();
    let summary = unconverter.run(&ColumnSelection::default()).unwrap();
    assert_eq!(summary.base_name, "hits");
    assert_eq!(summary.rows, 4);
}

// ── Multi-block files ─────────────────────────────────────────────────────────

#[test]
fn weblog_rows_across_blocks() {
    for version in [1, 4, 7, 8, 9, 11] {
        let lines = decode_lines(weblog(version, 3, 40).build().bytes).unwrap();
        let expected: Vec<String> = (0..120).map(weblog_line).collect();
        assert_eq!(lines, expected, "version {version}");
    }
}

#[test]
fn row_numbers_run_across_blocks() {
    let mut engine = engine_over(weblog(11, 3, 2).build().bytes, "w");
    engine.read_header().unwrap();
    engine
        .set_columns_to_output_csv("virtual_export_row,status", InclusionRule::FailOnInvalidColumn)
        .unwrap();
    let mut numbers = Vec::new();
    while let Some(row) = engine.next_row().unwrap() {
        numbers.push(String::from_utf8(row.column(0).unwrap().to_vec()).unwrap());
    }
    assert_eq!(numbers, ["1", "2", "3", "4", "5", "6"]);
    assert_eq!(engine.blocks_read(), 3);
}
