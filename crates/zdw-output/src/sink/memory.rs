use std::io;
use std::ops::Range;

use zdw_decoder::{RowSink, RowView};

/// Sink that keeps only the most recent row.
///
/// The buffers can be handed in and taken back out, so a caller can
/// decode straight into storage it owns.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    bytes: Vec<u8>,
    spans: Vec<Range<usize>>,
    rows: u64,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse caller-owned buffers; their contents are discarded on the
    /// first accepted row.
    #[must_use]
    pub fn with_buffers(bytes: Vec<u8>, spans: Vec<Range<usize>>) -> Self {
        Self {
            bytes,
            spans,
            rows: 0,
        }
    }

    /// The most recent row; empty before any row was accepted.
    #[must_use]
    pub fn row(&self) -> RowView<'_> {
        RowView::new(&self.bytes, &self.spans)
    }

    #[must_use]
    pub fn rows_accepted(&self) -> u64 {
        self.rows
    }

    #[must_use]
    pub fn into_parts(self) -> (Vec<u8>, Vec<Range<usize>>) {
        (self.bytes, self.spans)
    }
}

impl RowSink for MemorySink {
    /// Stores `line` as a single column.
    fn accept_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.bytes.clear();
        self.bytes.extend_from_slice(line);
        self.spans.clear();
        self.spans.push(0..line.len());
        self.rows += 1;
        Ok(())
    }

    fn accept_row(&mut self, row: &RowView<'_>) -> io::Result<()> {
        self.bytes.clear();
        self.bytes.extend_from_slice(row.bytes());
        self.spans.clear();
        self.spans.extend_from_slice(row.spans());
        self.rows += 1;
        Ok(())
    }
}
