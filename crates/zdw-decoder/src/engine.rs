use std::io::Write;
use std::path::Path;

use tracing::{debug, warn};
use zdw_wire::{BlockHeader, ByteSource, Compression, FileHeader, FormatVersion};

use crate::catalog::{ColumnCatalog, InclusionRule, OutputColumn, ProjectionPlan};
use crate::dictionary::DictionaryStore;
use crate::error::DecodeError;
use crate::row::{BlockDecoder, RowBuffer, RowView, push_display, render_value};
use crate::sink::RowSink;

/// Suffixes stripped from an input file name to form its base name,
/// longest first.
const INPUT_SUFFIXES: [&str; 5] = [".zdw.gz", ".zdw.zst", ".zdw", ".gz", ".zst"];

/// Base name used for input read from stdin.
pub const STDIN_BASE_NAME: &str = "stdin";

/// Read-order state of a [`DecodeEngine`].
///
/// ```text
///  read_header ──► Begin ──parse_next_block──► ReadingRow
///                                              │        │
///            last row of a non-last block ◄────┘        └──► last row of the last block
///                     │                                           │
///                     ▼                                           ▼
///            ParsingBlockHeader ──parse_next_block──► …       Finishing ──source at EOF──► End
///
///  Begin / ParsingBlockHeader ──source at EOF──► End
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Begin,
    ParsingBlockHeader,
    ReadingRow,
    Finishing,
    End,
}

/// Outcome of [`DecodeEngine::parse_next_block`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockStatus {
    /// A block header was read; `rows` rows follow.
    Block { rows: u32 },
    /// The stream ended where a block was expected.
    EndOfStream,
}

/// Decoder for one ZDW stream.
///
/// Owns the byte source, the column catalog, the projection plan, the
/// dictionary and the row arena. Operations must follow the read order
/// `read_header` → (`parse_next_block` → `read_next_row`×N)* and fail with
/// a dedicated usage error otherwise. Format and I/O errors abort the
/// engine: the source and dictionary are released and every later call
/// returns [`DecodeError::AtEndOfFile`].
///
/// # Example
///
/// ```rust,no_run
/// use zdw_decoder::DecodeEngine;
///
/// let mut engine = DecodeEngine::open("events.zdw.gz")?;
/// engine.read_header()?;
/// while let Some(row) = engine.next_row()? {
///     println!("{}", String::from_utf8_lossy(&row.to_line(b"\t")));
/// }
/// # Ok::<(), zdw_decoder::DecodeError>(())
/// ```
#[derive(Debug)]
pub struct DecodeEngine {
    source: Option<ByteSource>,
    base_name: String,
    catalog: Option<ColumnCatalog>,
    plan: Option<ProjectionPlan>,
    dictionary: Option<DictionaryStore>,
    block: BlockDecoder,
    row: RowBuffer,
    state: EngineState,
    rows_read: u32,
    num_lines: u32,
    line_length: u32,
    last_block: bool,
    finished: bool,
    current_row_number: u64,
    blocks_read: u64,
}

impl DecodeEngine {
    /// Wrap an already opened source. `base_name` feeds the
    /// `virtual_export_basename` column.
    #[must_use]
    pub fn new(source: ByteSource, base_name: impl Into<String>) -> Self {
        Self {
            source: Some(source),
            base_name: base_name.into(),
            catalog: None,
            plan: None,
            dictionary: None,
            block: BlockDecoder::default(),
            row: RowBuffer::new(),
            state: EngineState::Begin,
            rows_read: 0,
            num_lines: 0,
            line_length: 0,
            last_block: false,
            finished: false,
            current_row_number: 0,
            blocks_read: 0,
        }
    }

    /// Open a file on disk; the base name is derived from its name.
    ///
    /// # Errors
    ///
    /// [`DecodeError::FileOpen`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DecodeError> {
        let path = path.as_ref();
        let source = ByteSource::open(path).map_err(|source| DecodeError::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(source, base_name_of(path)))
    }

    /// Decode standard input.
    ///
    /// # Errors
    ///
    /// [`DecodeError::FileOpen`] if the first read from stdin fails.
    pub fn stdin() -> Result<Self, DecodeError> {
        let source = ByteSource::stdin().map_err(|source| DecodeError::FileOpen {
            path: STDIN_BASE_NAME.into(),
            source,
        })?;
        Ok(Self::new(source, STDIN_BASE_NAME))
    }

    // ── Header ────────────────────────────────────────────────────────

    /// Read the file header and, for v1–8, the header dictionary section.
    ///
    /// Resets the projection to every on-disk column.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::HeaderAlreadyRead`] on a second call.
    /// - [`DecodeError::AtEndOfFile`] after an abort.
    /// - Wire errors (version, desc type, short read, corruption), which
    ///   abort the engine.
    pub fn read_header(&mut self) -> Result<(), DecodeError> {
        if self.is_aborted() {
            return Err(DecodeError::AtEndOfFile);
        }
        if self.catalog.is_some() {
            return Err(DecodeError::HeaderAlreadyRead);
        }
        let result = self.load_header();
        result.map_err(|e| self.fail(e))
    }

    fn load_header(&mut self) -> Result<(), DecodeError> {
        let src = self.source.as_mut().ok_or(DecodeError::AtEndOfFile)?;
        let header = FileHeader::read_from(src)?;
        let mut dictionary = DictionaryStore::for_version(header.version);
        if header.version.uses_chained_dictionary() {
            dictionary.load_section(src)?;
        }

        let catalog = ColumnCatalog::from_header(header);
        debug!(
            version = catalog.version().raw(),
            columns = catalog.len(),
            dictionary = dictionary.size(),
            "header ready"
        );
        self.plan = Some(ProjectionPlan::all(&catalog));
        self.catalog = Some(catalog);
        self.dictionary = Some(dictionary);
        self.state = EngineState::Begin;
        Ok(())
    }

    // ── Projection ────────────────────────────────────────────────────

    /// Choose which columns are emitted, and in what order.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::HeaderNotReadYet`] before [`read_header`].
    /// - [`DecodeError::BadRequestedColumn`] under
    ///   [`InclusionRule::FailOnInvalidColumn`].
    ///
    /// [`read_header`]: Self::read_header
    pub fn set_columns_to_output<S: AsRef<str>>(
        &mut self,
        names: &[S],
        rule: InclusionRule,
    ) -> Result<(), DecodeError> {
        let catalog = self.header()?;
        let plan = ProjectionPlan::build(catalog, names, rule)?;
        debug!(columns = plan.len(), ?rule, "projection set");
        self.plan = Some(plan);
        Ok(())
    }

    /// [`set_columns_to_output`](Self::set_columns_to_output) with a
    /// comma-separated list.
    ///
    /// # Errors
    ///
    /// As for `set_columns_to_output`.
    pub fn set_columns_to_output_csv(
        &mut self,
        csv: &str,
        rule: InclusionRule,
    ) -> Result<(), DecodeError> {
        let catalog = self.header()?;
        self.plan = Some(ProjectionPlan::build_csv(catalog, csv, rule)?);
        Ok(())
    }

    // ── Blocks ────────────────────────────────────────────────────────

    /// Read the next block's dictionary section and header.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::UnsupportedOperation`] while rows remain.
    /// - [`DecodeError::LongerThanExpected`] if bytes follow the last block.
    /// - [`DecodeError::AtEndOfFile`] once the engine has ended.
    /// - Wire or corruption errors, which abort the engine.
    pub fn parse_next_block(&mut self) -> Result<BlockStatus, DecodeError> {
        let result = self.load_block();
        result.map_err(|e| self.fail(e))
    }

    fn load_block(&mut self) -> Result<BlockStatus, DecodeError> {
        self.projection()?;
        match self.state {
            EngineState::ReadingRow => {
                return Err(DecodeError::UnsupportedOperation(
                    "rows remain in the current block",
                ));
            }
            EngineState::Finishing => {
                return Err(DecodeError::LongerThanExpected {
                    offset: self.source.as_ref().map_or(0, ByteSource::offset),
                });
            }
            EngineState::End => return Err(DecodeError::AtEndOfFile),
            EngineState::Begin | EngineState::ParsingBlockHeader => {}
        }

        let src = self.source.as_mut().ok_or(DecodeError::AtEndOfFile)?;
        if src.is_end_of_stream()? {
            warn!(
                blocks = self.blocks_read,
                "stream ended without a last-block flag"
            );
            self.finish();
            return Ok(BlockStatus::EndOfStream);
        }

        let (Some(catalog), Some(dictionary)) = (self.catalog.as_ref(), self.dictionary.as_mut())
        else {
            return Err(DecodeError::Processing("decoder state missing".into()));
        };
        dictionary.load_section(src)?;
        let header = BlockHeader::read_from(src, catalog.classes())?;
        self.block.reset(&header);

        self.blocks_read += 1;
        self.rows_read = 0;
        self.num_lines = header.num_lines;
        self.line_length = header.line_length;
        self.last_block = header.last_block;
        self.state = EngineState::ReadingRow;
        debug!(
            block = self.blocks_read,
            rows = header.num_lines,
            last = header.last_block,
            dictionary = dictionary.size(),
            "parsed block header"
        );

        if self.num_lines == 0 {
            self.end_block()?;
        }
        Ok(BlockStatus::Block {
            rows: header.num_lines,
        })
    }

    fn end_block(&mut self) -> Result<(), DecodeError> {
        if !self.last_block {
            self.state = EngineState::ParsingBlockHeader;
            return Ok(());
        }
        self.state = EngineState::Finishing;
        let src = self.source.as_mut().ok_or(DecodeError::AtEndOfFile)?;
        if src.is_end_of_stream()? {
            self.finish();
        }
        Ok(())
    }

    // ── Rows ──────────────────────────────────────────────────────────

    /// Decode the next row of the current block into the row arena.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::RowCount`] when the current block has no rows left.
    /// - [`DecodeError::AtEndOfFile`] after the last row of the file.
    /// - Wire or corruption errors, which abort the engine.
    pub fn read_next_row(&mut self) -> Result<RowView<'_>, DecodeError> {
        if let Err(e) = self.decode_row() {
            return Err(self.fail(e));
        }
        Ok(self.row.view())
    }

    fn decode_row(&mut self) -> Result<(), DecodeError> {
        self.projection()?;
        match self.state {
            EngineState::Begin | EngineState::ParsingBlockHeader => {
                return Err(DecodeError::RowCount {
                    num_lines: self.num_lines,
                });
            }
            EngineState::Finishing | EngineState::End => return Err(DecodeError::AtEndOfFile),
            EngineState::ReadingRow => {}
        }

        let src = self.source.as_mut().ok_or(DecodeError::AtEndOfFile)?;
        self.block.read_row(src)?;
        self.rows_read += 1;
        self.current_row_number += 1;
        self.render_row()?;

        if self.rows_read == self.num_lines {
            self.end_block()?;
        }
        Ok(())
    }

    fn render_row(&mut self) -> Result<(), DecodeError> {
        let (Some(catalog), Some(plan), Some(dictionary)) =
            (self.catalog.as_ref(), self.plan.as_ref(), self.dictionary.as_ref())
        else {
            return Err(DecodeError::Processing("decoder state missing".into()));
        };

        self.row.clear();
        for column in plan.outputs() {
            let start = self.row.open_column();
            let out = self.row.bytes_mut();
            match column {
                OutputColumn::Disk(i) => render_value(
                    out,
                    catalog.classes()[*i],
                    self.block.value(*i),
                    self.block.base(*i),
                    dictionary,
                    catalog.decimal_factor(),
                )?,
                OutputColumn::Missing(_) => {}
                OutputColumn::VirtualBaseName => out.extend_from_slice(self.base_name.as_bytes()),
                OutputColumn::VirtualRow => push_display(out, self.current_row_number),
            }
            self.row.close_column(start);
        }
        Ok(())
    }

    /// Decode one row and hand it to `sink`.
    ///
    /// # Errors
    ///
    /// As for [`read_next_row`](Self::read_next_row), plus
    /// [`DecodeError::Output`] if the sink fails.
    pub fn decode_row_into<S: RowSink + ?Sized>(&mut self, sink: &mut S) -> Result<(), DecodeError> {
        let delivered = {
            let row = self.read_next_row()?;
            sink.accept_row(&row)
        };
        delivered.map_err(|e| self.fail(DecodeError::Output(e)))
    }

    /// Next row of the file, parsing block headers as needed.
    ///
    /// Returns `Ok(None)` once the stream is drained.
    ///
    /// # Errors
    ///
    /// Any error from [`parse_next_block`](Self::parse_next_block) or
    /// [`read_next_row`](Self::read_next_row).
    pub fn next_row(&mut self) -> Result<Option<RowView<'_>>, DecodeError> {
        if !self.advance()? {
            return Ok(None);
        }
        self.read_next_row().map(Some)
    }

    /// Parse block headers until a row is ready to decode.
    ///
    /// Returns `Ok(false)` once the stream is drained.
    ///
    /// # Errors
    ///
    /// Any error from [`parse_next_block`](Self::parse_next_block), and
    /// [`DecodeError::AtEndOfFile`] after an abort.
    pub fn advance(&mut self) -> Result<bool, DecodeError> {
        loop {
            match self.state {
                EngineState::ReadingRow => return Ok(true),
                EngineState::Begin | EngineState::ParsingBlockHeader | EngineState::Finishing => {
                    if self.parse_next_block()? == BlockStatus::EndOfStream {
                        return Ok(false);
                    }
                }
                EngineState::End if self.finished => return Ok(false),
                EngineState::End => return Err(DecodeError::AtEndOfFile),
            }
        }
    }

    // ── Schema ────────────────────────────────────────────────────────

    /// Write `name<separator>type<delimiter>` for every output column.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::HeaderNotReadYet`] before the header is read.
    /// - [`DecodeError::AtEndOfFile`] after an abort.
    /// - [`DecodeError::NoColumnsToOutput`] for an empty projection.
    /// - [`DecodeError::Output`] if `out` fails.
    pub fn write_schema<W: Write + ?Sized>(
        &self,
        out: &mut W,
        separator: &str,
        delimiter: &str,
    ) -> Result<(), DecodeError> {
        let (catalog, plan) = self.projection()?;
        for (name, desc_type) in plan.names(catalog).into_iter().zip(plan.desc_types(catalog)) {
            write!(out, "{name}{separator}{desc_type}{delimiter}").map_err(DecodeError::Output)?;
        }
        Ok(())
    }

    /// Schema as `name\ttype\n` lines.
    ///
    /// # Errors
    ///
    /// As for [`write_schema`](Self::write_schema).
    pub fn schema(&self) -> Result<String, DecodeError> {
        let mut out = Vec::new();
        self.write_schema(&mut out, "\t", "\n")?;
        String::from_utf8(out).map_err(|e| DecodeError::Processing(e.to_string()))
    }

    // ── Queries ───────────────────────────────────────────────────────

    /// Output column names in output order.
    ///
    /// # Errors
    ///
    /// [`DecodeError::HeaderNotReadYet`] before the header is read,
    /// [`DecodeError::AtEndOfFile`] after an abort.
    pub fn output_column_names(&self) -> Result<Vec<&str>, DecodeError> {
        let catalog = self.header()?;
        let plan = self.plan.as_ref().ok_or(DecodeError::HeaderNotReadYet)?;
        Ok(plan.names(catalog))
    }

    /// Number of output columns, 0 before the header is read.
    #[must_use]
    pub fn num_output_columns(&self) -> usize {
        self.plan.as_ref().map_or(0, ProjectionPlan::len)
    }

    /// Whether any on-disk column is called `name`.
    #[must_use]
    pub fn has_column_name(&self, name: &str) -> bool {
        self.catalog.as_ref().is_some_and(|c| c.find(name).is_some())
    }

    #[must_use]
    pub fn catalog(&self) -> Option<&ColumnCatalog> {
        self.catalog.as_ref()
    }

    #[must_use]
    pub fn plan(&self) -> Option<&ProjectionPlan> {
        self.plan.as_ref()
    }

    #[must_use]
    pub fn version(&self) -> Option<FormatVersion> {
        self.catalog.as_ref().map(ColumnCatalog::version)
    }

    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    #[must_use]
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// True once the stream has been fully consumed without error.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The last-block flag of the most recently parsed block.
    #[must_use]
    pub fn is_last_block(&self) -> bool {
        self.last_block
    }

    /// Wrapper detected around the stream, while the source is open.
    #[must_use]
    pub fn compression(&self) -> Option<Compression> {
        self.source.as_ref().map(ByteSource::compression)
    }

    /// Whether the byte source is still held.
    #[must_use]
    pub fn is_read_open(&self) -> bool {
        self.source.is_some()
    }

    /// Longest line of the current block, as declared by its header.
    #[must_use]
    pub fn line_length(&self) -> u32 {
        self.line_length
    }

    /// Rows declared by the current block.
    #[must_use]
    pub fn num_lines(&self) -> u32 {
        self.num_lines
    }

    /// Rows decoded from the current block.
    #[must_use]
    pub fn rows_read(&self) -> u32 {
        self.rows_read
    }

    /// Rows decoded from the whole file; the number of the last row.
    #[must_use]
    pub fn current_row_number(&self) -> u64 {
        self.current_row_number
    }

    #[must_use]
    pub fn blocks_read(&self) -> u64 {
        self.blocks_read
    }

    // ── Internals ─────────────────────────────────────────────────────

    /// The catalog, unless the header is unread or the engine aborted.
    fn header(&self) -> Result<&ColumnCatalog, DecodeError> {
        if self.is_aborted() {
            return Err(DecodeError::AtEndOfFile);
        }
        self.catalog.as_ref().ok_or(DecodeError::HeaderNotReadYet)
    }

    fn projection(&self) -> Result<(&ColumnCatalog, &ProjectionPlan), DecodeError> {
        let catalog = self.header()?;
        let Some(plan) = self.plan.as_ref() else {
            return Err(DecodeError::HeaderNotReadYet);
        };
        if plan.is_empty() {
            return Err(DecodeError::NoColumnsToOutput);
        }
        Ok((catalog, plan))
    }

    // Released without reaching the end of the stream.
    fn is_aborted(&self) -> bool {
        self.source.is_none() && !self.finished
    }

    fn finish(&mut self) {
        self.state = EngineState::End;
        self.finished = true;
        self.source = None;
    }

    fn fail(&mut self, err: DecodeError) -> DecodeError {
        if err.is_fatal() {
            debug!(error = %err, code = err.code().value(), "aborting decode");
            self.source = None;
            self.dictionary = None;
            self.row.clear();
            self.state = EngineState::End;
        }
        err
    }
}

/// Base name of an input path: the file name without its directory and
/// without a `.zdw`, `.zdw.gz`, `.zdw.zst`, `.gz` or `.zst` suffix.
#[must_use]
pub fn base_name_of(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    INPUT_SUFFIXES
        .iter()
        .find_map(|suffix| file_name.strip_suffix(suffix))
        .filter(|stem| !stem.is_empty())
        .map_or_else(|| file_name.clone(), str::to_string)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use zdw_testkit::{Cell, FixtureBuilder};
    use zdw_wire::ColumnType;

    use super::*;

    fn engine(bytes: Vec<u8>) -> DecodeEngine {
        DecodeEngine::new(ByteSource::from_reader(Cursor::new(bytes)).unwrap(), "fixture")
    }

    fn people(version: u16) -> Vec<u8> {
        FixtureBuilder::new(version)
            .column("name", ColumnType::Varchar)
            .column("age", ColumnType::Tiny)
            .block(vec![
                vec![Cell::text("Ann"), Cell::Unsigned(30)],
                vec![Cell::text("Bo"), Cell::Unsigned(41)],
                vec![Cell::text("Cy"), Cell::Unsigned(5)],
            ])
            .build()
            .bytes
    }

    fn drain(engine: &mut DecodeEngine) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(row) = engine.next_row().unwrap() {
            lines.push(String::from_utf8(row.to_line(b"\t")).unwrap());
        }
        lines
    }

    #[test]
    fn decodes_rows_and_finishes() {
        let mut engine = engine(people(9));
        engine.read_header().unwrap();
        assert_eq!(engine.parse_next_block().unwrap(), BlockStatus::Block { rows: 3 });

        let row = engine.read_next_row().unwrap();
        assert_eq!(row.to_line(b"\t"), b"Ann\t30");
        engine.read_next_row().unwrap();
        assert!(!engine.is_finished());
        let row = engine.read_next_row().unwrap();
        assert_eq!(row.to_line(b"\t"), b"Cy\t5");

        assert!(engine.is_last_block());
        assert!(engine.is_finished());
        assert_eq!(engine.state(), EngineState::End);
        assert!(!engine.is_read_open());
        assert_eq!(engine.current_row_number(), 3);
    }

    #[test]
    fn operations_before_header() {
        let mut engine = engine(people(9));
        assert!(matches!(engine.read_next_row(), Err(DecodeError::HeaderNotReadYet)));
        assert!(matches!(engine.parse_next_block(), Err(DecodeError::HeaderNotReadYet)));
        assert!(matches!(engine.schema(), Err(DecodeError::HeaderNotReadYet)));
        assert!(matches!(
            engine.set_columns_to_output(&["age"], InclusionRule::FailOnInvalidColumn),
            Err(DecodeError::HeaderNotReadYet)
        ));
        assert!(engine.is_read_open());
    }

    #[test]
    fn header_twice() {
        let mut engine = engine(people(9));
        engine.read_header().unwrap();
        assert!(matches!(engine.read_header(), Err(DecodeError::HeaderAlreadyRead)));
        assert!(engine.is_read_open());
    }

    #[test]
    fn row_before_block_and_block_mid_rows() {
        let mut engine = engine(people(9));
        engine.read_header().unwrap();
        assert!(matches!(engine.read_next_row(), Err(DecodeError::RowCount { .. })));
        engine.parse_next_block().unwrap();
        engine.read_next_row().unwrap();
        assert!(matches!(
            engine.parse_next_block(),
            Err(DecodeError::UnsupportedOperation(_))
        ));
        // usage errors leave the engine usable
        assert_eq!(engine.read_next_row().unwrap().to_line(b"\t"), b"Bo\t41");
    }

    #[test]
    fn reading_past_the_end() {
        let mut engine = engine(people(9));
        engine.read_header().unwrap();
        assert_eq!(drain(&mut engine).len(), 3);
        assert!(matches!(engine.read_next_row(), Err(DecodeError::AtEndOfFile)));
        assert!(matches!(engine.parse_next_block(), Err(DecodeError::AtEndOfFile)));
        assert!(engine.next_row().unwrap().is_none());
    }

    #[test]
    fn row_count_guard_between_blocks() {
        let bytes = FixtureBuilder::new(10)
            .column("n", ColumnType::Long)
            .block(vec![vec![Cell::Unsigned(1)]])
            .block(vec![vec![Cell::Unsigned(2)]])
            .build()
            .bytes;
        let mut engine = engine(bytes);
        engine.read_header().unwrap();
        engine.parse_next_block().unwrap();
        engine.read_next_row().unwrap();
        assert_eq!(engine.state(), EngineState::ParsingBlockHeader);
        assert!(matches!(
            engine.read_next_row(),
            Err(DecodeError::RowCount { num_lines: 1 })
        ));
        engine.parse_next_block().unwrap();
        assert_eq!(engine.read_next_row().unwrap().to_line(b"\t"), b"2");
        assert!(engine.is_finished());
    }

    #[test]
    fn trailing_bytes_are_longer_than_expected() {
        let bytes = FixtureBuilder::new(9)
            .column("n", ColumnType::Long)
            .block(vec![vec![Cell::Unsigned(7)]])
            .trailing_bytes(&[0xAB, 0xCD])
            .build()
            .bytes;
        let mut engine = engine(bytes);
        engine.read_header().unwrap();
        engine.parse_next_block().unwrap();
        engine.read_next_row().unwrap();
        assert_eq!(engine.state(), EngineState::Finishing);
        assert!(!engine.is_finished());

        let err = engine.parse_next_block().unwrap_err();
        assert!(matches!(err, DecodeError::LongerThanExpected { .. }));
        assert!(!engine.is_read_open());
        assert!(matches!(engine.read_next_row(), Err(DecodeError::AtEndOfFile)));
    }

    #[test]
    fn missing_last_block_flag_reports_end_of_stream() {
        let bytes = FixtureBuilder::new(9)
            .column("n", ColumnType::Long)
            .block(vec![vec![Cell::Unsigned(7)]])
            .without_last_block_flag()
            .build()
            .bytes;
        let mut engine = engine(bytes);
        engine.read_header().unwrap();
        engine.parse_next_block().unwrap();
        engine.read_next_row().unwrap();
        assert!(!engine.is_finished());
        assert_eq!(engine.parse_next_block().unwrap(), BlockStatus::EndOfStream);
        assert!(engine.is_finished());
        assert_eq!(engine.state(), EngineState::End);
    }

    #[test]
    fn zero_row_blocks_are_skipped() {
        let bytes = FixtureBuilder::new(9)
            .column("n", ColumnType::Long)
            .block(vec![])
            .block(vec![vec![Cell::Unsigned(3)]])
            .build()
            .bytes;
        let mut engine = engine(bytes);
        engine.read_header().unwrap();
        assert_eq!(engine.parse_next_block().unwrap(), BlockStatus::Block { rows: 0 });
        assert_eq!(engine.state(), EngineState::ParsingBlockHeader);
        assert_eq!(drain(&mut engine), vec!["3"]);
    }

    #[test]
    fn projection_and_virtual_columns() {
        let mut engine = engine(people(9));
        engine.read_header().unwrap();
        engine
            .set_columns_to_output_csv(
                "virtual_export_row, age, virtual_export_basename",
                InclusionRule::FailOnInvalidColumn,
            )
            .unwrap();
        assert_eq!(
            drain(&mut engine),
            vec!["1\t30\tfixture", "2\t41\tfixture", "3\t5\tfixture"]
        );
    }

    #[test]
    fn empty_projection_fails_later() {
        let mut engine = engine(people(9));
        engine.read_header().unwrap();
        engine
            .set_columns_to_output(&["name", "age"], InclusionRule::ExcludeSpecifiedColumns)
            .unwrap();
        assert!(matches!(engine.parse_next_block(), Err(DecodeError::NoColumnsToOutput)));
        assert!(matches!(engine.read_next_row(), Err(DecodeError::NoColumnsToOutput)));
        assert!(matches!(engine.schema(), Err(DecodeError::NoColumnsToOutput)));
        assert!(engine.is_read_open());
    }

    #[test]
    fn bad_column_leaves_previous_projection() {
        let mut engine = engine(people(9));
        engine.read_header().unwrap();
        let err = engine
            .set_columns_to_output(&["age", "zip"], InclusionRule::FailOnInvalidColumn)
            .unwrap_err();
        assert!(matches!(err, DecodeError::BadRequestedColumn { .. }));
        assert_eq!(engine.num_output_columns(), 2);
    }

    #[test]
    fn schema_is_repeatable() {
        let mut engine = engine(people(9));
        engine.read_header().unwrap();
        let first = engine.schema().unwrap();
        assert_eq!(first, "name\tvarchar(255)\nage\ttinyint(3) unsigned\n");
        assert_eq!(engine.schema().unwrap(), first);

        let mut custom = Vec::new();
        engine.write_schema(&mut custom, ": ", ";").unwrap();
        assert_eq!(custom, b"name: varchar(255);age: tinyint(3) unsigned;");
    }

    #[test]
    fn unsupported_version_aborts() {
        let mut engine = engine(vec![0x0C, 0x00, b'a', 0, 0, 4]);
        let err = engine.read_header().unwrap_err();
        assert_eq!(err.code(), crate::ErrCode::UnsupportedZdwVersion);
        assert!(!engine.is_read_open());
        assert!(matches!(engine.read_header(), Err(DecodeError::AtEndOfFile)));
        assert!(matches!(engine.read_next_row(), Err(DecodeError::AtEndOfFile)));
    }

    #[test]
    fn every_version_decodes_the_same_rows() {
        for version in FormatVersion::MIN..=FormatVersion::MAX {
            let mut engine = engine(people(version));
            engine.read_header().unwrap();
            assert_eq!(engine.version().map(FormatVersion::raw), Some(version));
            assert_eq!(
                drain(&mut engine),
                vec!["Ann\t30", "Bo\t41", "Cy\t5"],
                "version {version}"
            );
            assert!(engine.is_finished(), "version {version}");
        }
    }

    #[test]
    fn base_names() {
        assert_eq!(base_name_of(Path::new("/data/hits.zdw.gz")), "hits");
        assert_eq!(base_name_of(Path::new("hits.zdw.zst")), "hits");
        assert_eq!(base_name_of(Path::new("hits.zdw")), "hits");
        assert_eq!(base_name_of(Path::new("dir/hits.gz")), "hits");
        assert_eq!(base_name_of(Path::new("hits.csv")), "hits.csv");
        assert_eq!(base_name_of(Path::new(".zdw")), ".zdw");
    }

    #[test]
    fn engine_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<DecodeEngine>();
    }
}
