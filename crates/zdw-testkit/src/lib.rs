//! Fixture writer for ZDW decoder tests.
//!
//! [`FixtureBuilder`] lays out a complete file for any format version:
//! header, legacy dictionary sections or flat chunks, block headers with
//! minimal value widths, and delta-encoded rows. It can also wrap the
//! result in gzip or zstd, drop the last-block flag, or append trailing
//! garbage so tests can exercise the decoder's failure paths.

use std::collections::HashMap;
use std::io::Write;
use std::ops::Range;

use flate2::write::GzEncoder;
use zdw_wire::column_type::DEFAULT_CHAR_SIZE;
use zdw_wire::dictionary_section::FRAGMENT_LEN;
use zdw_wire::{ColumnType, FormatVersion, StorageClass};

/// One input value. `Null` and empty text are stored as 0.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Unsigned(u64),
    Signed(i64),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    fn display(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Text(s) => s.clone(),
            Self::Unsigned(v) => v.to_string(),
            Self::Signed(v) => v.to_string(),
        }
    }

    fn unsigned(&self) -> Option<u64> {
        match self {
            Self::Null => None,
            Self::Unsigned(v) => Some(*v),
            other => panic!("expected an unsigned cell, got {other:?}"),
        }
    }

    fn signed(&self) -> Option<i64> {
        match self {
            Self::Null => None,
            Self::Signed(v) => Some(*v),
            other => panic!("expected a signed cell, got {other:?}"),
        }
    }
}

/// A built file.
#[derive(Clone, Debug)]
pub struct Fixture {
    /// File bytes, compressed if a wrapper was requested.
    pub bytes: Vec<u8>,
    /// Uncompressed file bytes.
    pub raw: Vec<u8>,
    /// Length of the header proper, before any dictionary section.
    pub header_len: usize,
    /// Byte ranges in `raw` of every dictionary section, in file order.
    pub dictionary_ranges: Vec<Range<usize>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Wrap {
    Raw,
    Gzip,
    Zstd,
}

#[derive(Clone, Debug)]
struct ColumnSpec {
    name: String,
    column_type: ColumnType,
    char_size: u16,
}

/// Builder for well-formed (or deliberately broken) ZDW files.
///
/// ```rust
/// use zdw_testkit::{Cell, FixtureBuilder};
/// use zdw_wire::ColumnType;
///
/// let fixture = FixtureBuilder::new(9)
///     .column("name", ColumnType::Varchar)
///     .column("age", ColumnType::Tiny)
///     .block(vec![vec![Cell::text("Ann"), Cell::Unsigned(30)]])
///     .build();
/// assert!(!fixture.bytes.is_empty());
/// ```
#[derive(Clone, Debug)]
pub struct FixtureBuilder {
    version: u16,
    columns: Vec<ColumnSpec>,
    decimal_factor: f64,
    blocks: Vec<Vec<Vec<Cell>>>,
    last_block_flag: bool,
    trailing: Vec<u8>,
    wrap: Wrap,
}

impl FixtureBuilder {
    /// Start a file with the given raw version tag. Tags outside 1..=11
    /// are written as-is with an 11-style layout.
    #[must_use]
    pub fn new(version: u16) -> Self {
        Self {
            version,
            columns: Vec::new(),
            decimal_factor: 100.0,
            blocks: Vec::new(),
            last_block_flag: true,
            trailing: Vec::new(),
            wrap: Wrap::Raw,
        }
    }

    #[must_use]
    pub fn column(self, name: &str, column_type: ColumnType) -> Self {
        self.column_with_size(name, column_type, DEFAULT_CHAR_SIZE)
    }

    /// Add a column with an explicit char width (written for v4+).
    #[must_use]
    pub fn column_with_size(mut self, name: &str, column_type: ColumnType, char_size: u16) -> Self {
        self.columns.push(ColumnSpec {
            name: name.to_string(),
            column_type,
            char_size,
        });
        self
    }

    /// Factor written for v1–3 files (default 100).
    #[must_use]
    pub fn decimal_factor(mut self, factor: f64) -> Self {
        self.decimal_factor = factor;
        self
    }

    /// Append a block; each row holds one cell per column.
    #[must_use]
    pub fn block(mut self, rows: Vec<Vec<Cell>>) -> Self {
        self.blocks.push(rows);
        self
    }

    /// Leave the last-block flag clear on the final block.
    #[must_use]
    pub fn without_last_block_flag(mut self) -> Self {
        self.last_block_flag = false;
        self
    }

    /// Append bytes after the last block.
    #[must_use]
    pub fn trailing_bytes(mut self, bytes: &[u8]) -> Self {
        self.trailing.extend_from_slice(bytes);
        self
    }

    #[must_use]
    pub fn gzip(mut self) -> Self {
        self.wrap = Wrap::Gzip;
        self
    }

    #[must_use]
    pub fn zstd(mut self) -> Self {
        self.wrap = Wrap::Zstd;
        self
    }

    /// Lay out the file.
    ///
    /// # Panics
    ///
    /// Panics if a row has the wrong number of cells or a cell does not
    /// fit its column's storage class.
    #[must_use]
    pub fn build(&self) -> Fixture {
        let layout = FormatVersion::new(self.version.clamp(FormatVersion::MIN, FormatVersion::MAX))
            .expect("clamped version is in range");
        let classes: Vec<StorageClass> = self
            .columns
            .iter()
            .map(|c| c.column_type.storage(layout))
            .collect();

        let mut raw = Vec::new();
        self.write_header(&mut raw, layout);
        let header_len = raw.len();

        let mut dictionary = DictionaryWriter::new(layout);
        let encoded: Vec<EncodedBlock> = self
            .blocks
            .iter()
            .map(|rows| self.encode_block(rows, &classes, &mut dictionary))
            .collect();

        let mut dictionary_ranges = Vec::new();
        if let DictionaryWriter::Chained(chained) = &dictionary {
            let first = encoded.first().map(|b| b.sections.clone()).unwrap_or_default();
            let start = raw.len();
            chained.write_sections(&mut raw, &first);
            dictionary_ranges.push(start..raw.len());
        }

        for (i, block) in encoded.iter().enumerate() {
            let start = raw.len();
            match &dictionary {
                DictionaryWriter::Chained(chained) => {
                    let sections = if i == 0 {
                        Sections::default()
                    } else {
                        block.sections.clone()
                    };
                    chained.write_sections(&mut raw, &sections);
                }
                DictionaryWriter::Flat(_) => {
                    raw.extend_from_slice(&(block.chunk.len() as u64).to_le_bytes());
                    raw.extend_from_slice(&block.chunk);
                }
            }
            dictionary_ranges.push(start..raw.len());

            let last = i + 1 == encoded.len() && self.last_block_flag;
            block.write(&mut raw, &classes, last);
        }
        raw.extend_from_slice(&self.trailing);

        let bytes = match self.wrap {
            Wrap::Raw => raw.clone(),
            Wrap::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(&raw).expect("gzip into memory");
                encoder.finish().expect("gzip into memory")
            }
            Wrap::Zstd => zstd::encode_all(raw.as_slice(), 3).expect("zstd into memory"),
        };

        Fixture {
            bytes,
            raw,
            header_len,
            dictionary_ranges,
        }
    }

    fn write_header(&self, out: &mut Vec<u8>, layout: FormatVersion) {
        out.extend_from_slice(&self.version.to_le_bytes());
        for column in &self.columns {
            out.extend_from_slice(column.name.as_bytes());
            out.push(0);
        }
        out.push(0);
        out.extend(self.columns.iter().map(|c| c.column_type.to_wire_byte()));
        if layout.has_char_sizes() {
            for column in self.columns.iter().filter(|c| c.column_type.has_char_size()) {
                out.extend_from_slice(&column.char_size.to_le_bytes());
            }
        }
        if layout.has_decimal_factor() {
            out.extend_from_slice(&self.decimal_factor.to_le_bytes());
        }
    }

    fn encode_block(
        &self,
        rows: &[Vec<Cell>],
        classes: &[StorageClass],
        dictionary: &mut DictionaryWriter,
    ) -> EncodedBlock {
        let width = classes.len();
        let mark = dictionary.mark();
        if let DictionaryWriter::Flat(flat) = &mut *dictionary {
            flat.reset();
        }

        let mut bases = vec![0u64; width];
        let mut stored = vec![vec![0u64; width]; rows.len()];
        for (col, class) in classes.iter().enumerate() {
            let cells = rows.iter().map(|row| {
                assert_eq!(row.len(), width, "row width must match column count");
                &row[col]
            });
            match class {
                StorageClass::Unsigned => {
                    let values: Vec<Option<u64>> = cells.map(Cell::unsigned).collect();
                    let base = values.iter().flatten().min().copied().unwrap_or(0);
                    bases[col] = base;
                    for (r, v) in values.iter().enumerate() {
                        stored[r][col] = v.map_or(0, |v| v - base + 1);
                    }
                }
                StorageClass::Signed | StorageClass::Scaled => {
                    let values: Vec<Option<i64>> = cells.map(Cell::signed).collect();
                    let base = values.iter().flatten().min().copied().unwrap_or(0);
                    bases[col] = base as u64;
                    for (r, v) in values.iter().enumerate() {
                        stored[r][col] =
                            v.map_or(0, |v| (i128::from(v) - i128::from(base)) as u64 + 1);
                    }
                }
                StorageClass::Char2 => {
                    for (r, cell) in cells.enumerate() {
                        let text = cell.display();
                        let bytes = text.as_bytes();
                        assert!(bytes.len() <= 2, "char(2) value too long: {text:?}");
                        stored[r][col] = bytes
                            .iter()
                            .enumerate()
                            .fold(0, |acc, (i, b)| acc | u64::from(*b) << (8 * i));
                    }
                }
                StorageClass::Dictionary => {
                    for (r, cell) in cells.enumerate() {
                        let text = cell.display();
                        stored[r][col] = if text.is_empty() {
                            0
                        } else {
                            dictionary.intern(text.as_bytes())
                        };
                    }
                }
                StorageClass::Visitor => {
                    for (r, cell) in cells.enumerate() {
                        stored[r][col] = cell.unsigned().map_or(0, |id| dictionary.visitor(id));
                    }
                }
            }
        }

        let sizes = (0..width)
            .map(|col| {
                let max = stored.iter().map(|row| row[col]).max().unwrap_or(0);
                (64 - max.leading_zeros()).div_ceil(8) as u8
            })
            .collect();

        let line_length = rows
            .iter()
            .map(|row| {
                row.iter().map(|c| c.display().len()).sum::<usize>() + width.saturating_sub(1)
            })
            .max()
            .unwrap_or(0);

        EncodedBlock {
            sections: dictionary.sections_since(mark),
            chunk: match &*dictionary {
                DictionaryWriter::Flat(flat) => flat.chunk.clone(),
                DictionaryWriter::Chained(_) => Vec::new(),
            },
            line_length: line_length as u32,
            sizes,
            bases,
            stored,
        }
    }
}

// ── Block layout ──────────────────────────────────────────────────────

#[derive(Clone, Debug)]
struct EncodedBlock {
    sections: Sections,
    chunk: Vec<u8>,
    line_length: u32,
    sizes: Vec<u8>,
    bases: Vec<u64>,
    stored: Vec<Vec<u64>>,
}

impl EncodedBlock {
    fn write(&self, out: &mut Vec<u8>, classes: &[StorageClass], last: bool) {
        out.extend_from_slice(&self.line_length.to_le_bytes());
        out.extend_from_slice(&(self.stored.len() as u32).to_le_bytes());
        for (col, class) in classes.iter().enumerate() {
            out.push(self.sizes[col]);
            if class.has_base() {
                out.extend_from_slice(&self.bases[col].to_le_bytes());
            }
        }
        out.push(u8::from(last));

        let width = classes.len();
        let mut previous = vec![0u64; width];
        for row in &self.stored {
            let mut bitmap = vec![0u8; width.div_ceil(8)];
            for col in 0..width {
                if row[col] != previous[col] {
                    bitmap[col / 8] |= 1 << (col % 8);
                }
            }
            out.extend_from_slice(&bitmap);
            for col in 0..width {
                if row[col] != previous[col] {
                    let size = usize::from(self.sizes[col]);
                    out.extend_from_slice(&row[col].to_le_bytes()[..size]);
                }
            }
            previous.clone_from(row);
        }
    }
}

// ── Dictionaries ──────────────────────────────────────────────────────

/// Entry ranges added to a chained dictionary while encoding one block.
#[derive(Clone, Debug, Default)]
struct Sections {
    uniques: Range<usize>,
    visitors: Range<usize>,
}

#[derive(Clone, Debug)]
enum DictionaryWriter {
    Chained(ChainedWriter),
    Flat(FlatWriter),
}

impl DictionaryWriter {
    fn new(layout: FormatVersion) -> Self {
        if layout.uses_chained_dictionary() {
            Self::Chained(ChainedWriter {
                with_visitors: layout.uses_visitor_dictionary(),
                ..ChainedWriter::default()
            })
        } else {
            Self::Flat(FlatWriter::default())
        }
    }

    fn mark(&self) -> (usize, usize) {
        match self {
            Self::Chained(c) => (c.uniques.len(), c.visitors.len()),
            Self::Flat(_) => (0, 0),
        }
    }

    fn sections_since(&self, mark: (usize, usize)) -> Sections {
        match self {
            Self::Chained(c) => Sections {
                uniques: mark.0..c.uniques.len(),
                visitors: mark.1..c.visitors.len(),
            },
            Self::Flat(_) => Sections::default(),
        }
    }

    fn intern(&mut self, value: &[u8]) -> u64 {
        match self {
            Self::Chained(c) => u64::from(c.intern(value)),
            Self::Flat(f) => f.intern(value),
        }
    }

    fn visitor(&mut self, id: u64) -> u64 {
        match self {
            Self::Chained(c) if c.with_visitors => u64::from(c.visitor(id)),
            _ => panic!("visitor column needs a v1–7 layout"),
        }
    }
}

/// Legacy uniques/visitors writer; shares fragment prefixes between values.
#[derive(Clone, Debug, Default)]
struct ChainedWriter {
    with_visitors: bool,
    uniques: Vec<([u8; FRAGMENT_LEN], u32)>,
    fragments: HashMap<(u32, [u8; FRAGMENT_LEN]), u32>,
    visitors: Vec<(u64, u32)>,
    visitor_ids: HashMap<u64, u32>,
}

impl ChainedWriter {
    fn intern(&mut self, value: &[u8]) -> u32 {
        let mut prev = 0u32;
        for piece in value.chunks(FRAGMENT_LEN) {
            let mut chars = [0u8; FRAGMENT_LEN];
            chars[..piece.len()].copy_from_slice(piece);
            prev = match self.fragments.get(&(prev, chars)) {
                Some(&index) => index,
                None => {
                    self.uniques.push((chars, prev));
                    let index = self.uniques.len() as u32;
                    self.fragments.insert((prev, chars), index);
                    index
                }
            };
        }
        prev
    }

    fn visitor(&mut self, id: u64) -> u32 {
        if let Some(&index) = self.visitor_ids.get(&id) {
            return index;
        }
        self.visitors.push((id, 0));
        let index = self.visitors.len() as u32;
        self.visitor_ids.insert(id, index);
        index
    }

    fn write_sections(&self, out: &mut Vec<u8>, sections: &Sections) {
        out.extend_from_slice(&(sections.uniques.len() as u32).to_le_bytes());
        for (chars, prev) in &self.uniques[sections.uniques.clone()] {
            out.extend_from_slice(chars);
            out.extend_from_slice(&prev.to_le_bytes());
        }
        if self.with_visitors {
            out.extend_from_slice(&(sections.visitors.len() as u32).to_le_bytes());
            for (id, prev) in &self.visitors[sections.visitors.clone()] {
                out.extend_from_slice(&id.to_le_bytes());
                out.extend_from_slice(&prev.to_le_bytes());
            }
        }
    }
}

/// Per-block flat chunk writer. Offset 0 is a NUL pad byte.
#[derive(Clone, Debug, Default)]
struct FlatWriter {
    chunk: Vec<u8>,
    offsets: HashMap<Vec<u8>, u64>,
}

impl FlatWriter {
    fn reset(&mut self) {
        self.chunk.clear();
        self.chunk.push(0);
        self.offsets.clear();
    }

    fn intern(&mut self, value: &[u8]) -> u64 {
        if let Some(&offset) = self.offsets.get(value) {
            return offset;
        }
        let offset = self.chunk.len() as u64;
        self.chunk.extend_from_slice(value);
        self.chunk.push(0);
        self.offsets.insert(value.to_vec(), offset);
        offset
    }
}
