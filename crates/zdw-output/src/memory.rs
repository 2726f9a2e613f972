use std::mem;
use std::ops::Range;
use std::path::{Path, PathBuf};

use zdw_decoder::{DecodeEngine, DecodeError, InclusionRule, OutputColumn, RowView};

use crate::config::OutputConfig;
use crate::desc;
use crate::sink::MemorySink;

/// Widest rendering of `virtual_export_row` (`u64::MAX`).
const ROW_NUMBER_WIDTH: usize = 20;

/// A row returned by [`MemoryUnconverter::get_row`]; borrows the engine's
/// row arena until the next call.
pub type MemoryRow<'a> = RowView<'a>;

/// Who owns the row storage handed back to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferMode {
    /// Rows are lent out of the engine's arena ([`MemoryUnconverter::get_row`]).
    Internal,
    /// Rows are copied into caller buffers ([`MemoryUnconverter::get_row_into`]).
    CallerOwned,
}

/// Row-at-a-time access to a ZDW stream, for callers embedding the
/// decoder.
///
/// The header is read on construction. Block headers are parsed as rows
/// are requested, so callers only ever ask for the next row.
///
/// # Example
///
/// ```rust,no_run
/// use zdw_output::{BufferMode, MemoryUnconverter};
///
/// let mut rows = MemoryUnconverter::open("events.zdw", BufferMode::Internal)?;
/// while rows.has_next_row()? {
///     let row = rows.get_row()?;
///     println!("{} columns", row.len());
/// }
/// # Ok::<(), zdw_decoder::DecodeError>(())
/// ```
#[derive(Debug)]
pub struct MemoryUnconverter {
    engine: DecodeEngine,
    mode: BufferMode,
    last_row_len: usize,
}

impl MemoryUnconverter {
    /// Wrap `engine`, reading its header if that has not happened yet.
    ///
    /// # Errors
    ///
    /// Any header error from [`DecodeEngine::read_header`].
    pub fn new(mut engine: DecodeEngine, mode: BufferMode) -> Result<Self, DecodeError> {
        if engine.catalog().is_none() {
            engine.read_header()?;
        }
        Ok(Self {
            engine,
            mode,
            last_row_len: 0,
        })
    }

    /// # Errors
    ///
    /// [`DecodeError::FileOpen`] or any header error.
    pub fn open(path: impl AsRef<Path>, mode: BufferMode) -> Result<Self, DecodeError> {
        Self::new(DecodeEngine::open(path)?, mode)
    }

    #[must_use]
    pub fn mode(&self) -> BufferMode {
        self.mode
    }

    #[must_use]
    pub fn engine(&self) -> &DecodeEngine {
        &self.engine
    }

    /// # Errors
    ///
    /// As for [`DecodeEngine::set_columns_to_output`].
    pub fn set_columns_to_output<S: AsRef<str>>(
        &mut self,
        names: &[S],
        rule: InclusionRule,
    ) -> Result<(), DecodeError> {
        self.engine.set_columns_to_output(names, rule)
    }

    /// Whether another row is available, parsing block headers as needed.
    ///
    /// # Errors
    ///
    /// Any block-level error from the engine.
    pub fn has_next_row(&mut self) -> Result<bool, DecodeError> {
        self.engine.advance()
    }

    /// Next row, borrowed from the engine.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::UnsupportedOperation`] in caller-owned mode.
    /// - [`DecodeError::AtEndOfFile`] once the stream is drained.
    /// - Any decode error from the engine.
    pub fn get_row(&mut self) -> Result<MemoryRow<'_>, DecodeError> {
        if self.mode != BufferMode::Internal {
            return Err(DecodeError::UnsupportedOperation(
                "get_row requires the internal buffer mode",
            ));
        }
        if !self.engine.advance()? {
            return Err(DecodeError::AtEndOfFile);
        }
        let row = self.engine.read_next_row()?;
        self.last_row_len = row.joined_len();
        Ok(row)
    }

    /// Decode the next row into caller-owned buffers and return its column
    /// count. `bytes` receives the column values back to back and `spans`
    /// their ranges; both are overwritten.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::UnsupportedOperation`] in internal mode.
    /// - [`DecodeError::AtEndOfFile`] once the stream is drained.
    /// - Any decode error from the engine.
    pub fn get_row_into(
        &mut self,
        bytes: &mut Vec<u8>,
        spans: &mut Vec<Range<usize>>,
    ) -> Result<usize, DecodeError> {
        if self.mode != BufferMode::CallerOwned {
            return Err(DecodeError::UnsupportedOperation(
                "get_row_into requires the caller-owned buffer mode",
            ));
        }
        if !self.engine.advance()? {
            return Err(DecodeError::AtEndOfFile);
        }

        let mut sink = MemorySink::with_buffers(mem::take(bytes), mem::take(spans));
        let decoded = self.engine.decode_row_into(&mut sink);
        (*bytes, *spans) = sink.into_parts();
        decoded?;

        self.last_row_len = RowView::new(bytes, spans).joined_len();
        Ok(spans.len())
    }

    #[must_use]
    pub fn num_output_columns(&self) -> usize {
        self.engine.num_output_columns()
    }

    /// Longest line of the current block, widened by the virtual columns
    /// and their separators.
    #[must_use]
    pub fn line_length(&self) -> usize {
        let virtual_width: usize = self.engine.plan().map_or(0, |plan| {
            plan.outputs()
                .iter()
                .map(|column| match column {
                    OutputColumn::VirtualBaseName => self.engine.base_name().len() + 1,
                    OutputColumn::VirtualRow => ROW_NUMBER_WIDTH + 1,
                    OutputColumn::Disk(_) | OutputColumn::Missing(_) => 0,
                })
                .sum()
        });
        self.engine.line_length() as usize + virtual_width
    }

    /// Joined length of the last returned row, tab separators included.
    #[must_use]
    pub fn current_row_length(&self) -> usize {
        self.last_row_len
    }

    /// # Errors
    ///
    /// [`DecodeError::AtEndOfFile`] after the engine aborted.
    pub fn column_names(&self) -> Result<Vec<&str>, DecodeError> {
        self.engine.output_column_names()
    }

    #[must_use]
    pub fn has_column_name(&self, name: &str) -> bool {
        self.engine.has_column_name(name)
    }

    /// Write `<dir>/<basename>.desc.sql`.
    ///
    /// # Errors
    ///
    /// As for [`desc::write_desc_file`].
    pub fn output_desc_to_file(&self, dir: impl AsRef<Path>) -> Result<PathBuf, DecodeError> {
        desc::write_desc_file(&self.engine, &OutputConfig::in_dir(dir))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use zdw_decoder::ErrCode;
    use zdw_testkit::{Cell, FixtureBuilder};
    use zdw_wire::{ByteSource, ColumnType};

    use super::*;

    fn unconverter(mode: BufferMode) -> MemoryUnconverter {
        let bytes = FixtureBuilder::new(9)
            .column("name", ColumnType::Varchar)
            .column("age", ColumnType::Tiny)
            .block(vec![
                vec![Cell::text("Ann"), Cell::Unsigned(30)],
                vec![Cell::text("Bo"), Cell::Unsigned(41)],
            ])
            .build()
            .bytes;
        let source = ByteSource::from_reader(Cursor::new(bytes)).unwrap();
        MemoryUnconverter::new(DecodeEngine::new(source, "people"), mode).unwrap()
    }

    #[test]
    fn internal_rows_until_end_of_file() {
        let mut rows = unconverter(BufferMode::Internal);
        assert_eq!(rows.get_row().unwrap().to_line(b"\t"), b"Ann\t30");
        assert_eq!(rows.current_row_length(), 6);
        let row = rows.get_row().unwrap();
        assert_eq!(row.column(0), Some(&b"Bo"[..]));
        assert_eq!(row.column(1), Some(&b"41"[..]));
        assert_eq!(rows.get_row().unwrap_err().code(), ErrCode::AtEndOfFile);
        assert!(!rows.has_next_row().unwrap());
    }

    #[test]
    fn caller_buffers_are_reused() {
        let mut rows = unconverter(BufferMode::CallerOwned);
        let mut bytes = Vec::with_capacity(64);
        let mut spans = Vec::new();
        assert_eq!(rows.get_row_into(&mut bytes, &mut spans).unwrap(), 2);
        assert_eq!(bytes, b"Ann30");
        assert_eq!(spans, vec![0..3, 3..5]);
        assert!(bytes.capacity() >= 64);

        rows.get_row_into(&mut bytes, &mut spans).unwrap();
        assert_eq!(bytes, b"Bo41");
        assert_eq!(rows.current_row_length(), 5);
        assert!(matches!(
            rows.get_row_into(&mut bytes, &mut spans),
            Err(DecodeError::AtEndOfFile)
        ));
    }

    #[test]
    fn mode_mismatch_is_unsupported() {
        let mut internal = unconverter(BufferMode::Internal);
        let err = internal
            .get_row_into(&mut Vec::new(), &mut Vec::new())
            .unwrap_err();
        assert_eq!(err.code(), ErrCode::UnsupportedOperation);

        let mut caller = unconverter(BufferMode::CallerOwned);
        assert_eq!(caller.get_row().unwrap_err().code(), ErrCode::UnsupportedOperation);
        // still usable in its own mode
        assert_eq!(caller.get_row_into(&mut Vec::new(), &mut Vec::new()).unwrap(), 2);
    }

    #[test]
    fn line_length_counts_virtual_columns() {
        let mut rows = unconverter(BufferMode::Internal);
        rows.set_columns_to_output(
            &["name", "virtual_export_basename", "virtual_export_row"],
            InclusionRule::FailOnInvalidColumn,
        )
        .unwrap();
        assert!(rows.has_next_row().unwrap());
        let block_length = rows.engine().line_length() as usize;
        assert_eq!(rows.line_length(), block_length + "people".len() + 1 + 21);

        let row = rows.get_row().unwrap();
        assert_eq!(row.to_line(b"\t"), b"Ann\tpeople\t1");
    }

    #[test]
    fn column_queries_and_desc() {
        let dir = tempfile::tempdir().unwrap();
        let rows = unconverter(BufferMode::Internal);
        assert_eq!(rows.num_output_columns(), 2);
        assert_eq!(rows.column_names().unwrap(), vec!["name", "age"]);
        assert!(rows.has_column_name("age"));
        assert!(!rows.has_column_name("virtual_export_row"));
        let path = rows.output_desc_to_file(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("people.desc.sql"));
    }

    #[test]
    fn bad_column_is_reported() {
        let mut rows = unconverter(BufferMode::Internal);
        let err = rows
            .set_columns_to_output(&["zip"], InclusionRule::FailOnInvalidColumn)
            .unwrap_err();
        assert_eq!(err.code(), ErrCode::BadRequestedColumn);
    }
}
