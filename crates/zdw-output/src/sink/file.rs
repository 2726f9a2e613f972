use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use zdw_decoder::{RowSink, RowView};

use crate::config::OutputConfig;
use crate::error::OutputError;

/// Line-oriented sink over any writer.
///
/// Each row is written as its columns joined by the separator (tab by
/// default) followed by `\n`. Output is buffered; call [`finish`] to flush
/// and surface the final write error. Dropping the sink flushes on a best
/// effort basis.
///
/// [`finish`]: Self::finish
#[derive(Debug)]
pub struct FileSink<W: Write> {
    writer: BufWriter<W>,
    separator: Vec<u8>,
    path: Option<PathBuf>,
    lines: u64,
}

impl FileSink<File> {
    /// Create (or truncate) `path`.
    ///
    /// # Errors
    ///
    /// [`OutputError::Create`] if the file cannot be created.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, OutputError> {
        let path = path.as_ref();
        let mut sink = Self::new(create_file(path)?);
        sink.path = Some(path.to_path_buf());
        Ok(sink)
    }
}

fn create_file(path: &Path) -> Result<File, OutputError> {
    let file = File::create(path).map_err(|source| OutputError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "created output file");
    Ok(file)
}

impl FileSink<Box<dyn Write + Send>> {
    /// Data sink for one input: stdout when `config.to_stdout` is set,
    /// otherwise `config.data_path(input_base)`.
    ///
    /// # Errors
    ///
    /// [`OutputError::Create`] if the data file cannot be created.
    pub fn for_config(config: &OutputConfig, input_base: &str) -> Result<Self, OutputError> {
        let (writer, path): (Box<dyn Write + Send>, _) = if config.to_stdout {
            (Box::new(io::stdout()), None)
        } else {
            let path = config.data_path(input_base);
            (Box::new(create_file(&path)?), Some(path))
        };
        let mut sink = Self::new(writer).with_separator(config.column_separator.as_bytes());
        sink.path = path;
        Ok(sink)
    }
}

impl<W: Write> FileSink<W> {
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            separator: b"\t".to_vec(),
            path: None,
            lines: 0,
        }
    }

    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<Vec<u8>>) -> Self {
        self.separator = separator.into();
        self
    }

    pub(crate) fn separator(&self) -> &[u8] {
        &self.separator
    }

    /// Path of the data file, `None` for stdout or a plain writer.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn lines_written(&self) -> u64 {
        self.lines
    }

    /// Flush buffered lines and return the underlying writer.
    ///
    /// # Errors
    ///
    /// [`OutputError::Write`] if the final flush fails.
    pub fn finish(self) -> Result<W, OutputError> {
        self.writer
            .into_inner()
            .map_err(|e| OutputError::Write(e.into_error()))
    }
}

impl<W: Write> RowSink for FileSink<W> {
    fn accept_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.writer.write_all(line)?;
        self.writer.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }

    fn accept_row(&mut self, row: &RowView<'_>) -> io::Result<()> {
        row.write_joined(&mut self.writer, &self.separator)?;
        self.writer.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::ops::Range;

    use super::*;

    fn row<'a>(bytes: &'a [u8], spans: &'a [Range<usize>]) -> RowView<'a> {
        RowView::new(bytes, spans)
    }

    #[test]
    fn rows_are_tab_joined_lines() {
        let mut sink = FileSink::new(Vec::new());
        sink.accept_row(&row(b"Ann30", &[0..3, 3..5])).unwrap();
        sink.accept_row(&row(b"5", &[0..0, 0..1])).unwrap();
        sink.accept_line(b"raw").unwrap();
        assert_eq!(sink.lines_written(), 3);
        assert_eq!(sink.finish().unwrap(), b"Ann\t30\n\t5\nraw\n");
    }

    #[test]
    fn custom_separator() {
        let mut sink = FileSink::new(Vec::new()).with_separator(",");
        sink.accept_row(&row(b"abc", &[0..1, 1..2, 2..3])).unwrap();
        assert_eq!(sink.finish().unwrap(), b"a,b,c\n");
    }

    #[test]
    fn create_in_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileSink::create(dir.path().join("no/such/dir/out.sql")).unwrap_err();
        assert!(matches!(err, OutputError::Create { .. }));
    }

    #[test]
    fn config_sink_writes_data_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = OutputConfig::in_dir(dir.path());
        let mut sink = FileSink::for_config(&config, "hits").unwrap();
        assert_eq!(sink.path(), Some(dir.path().join("hits.sql").as_path()));
        sink.accept_row(&row(b"xy", &[0..1, 1..2])).unwrap();
        drop(sink.finish().unwrap());
        let written = std::fs::read(dir.path().join("hits.sql")).unwrap();
        assert_eq!(written, b"x\ty\n");
    }
}
