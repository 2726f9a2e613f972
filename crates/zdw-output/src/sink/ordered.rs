use std::collections::BTreeMap;
use std::io::{self, Write};

use zdw_decoder::{RowSink, RowView};

use crate::error::OutputError;
use crate::sink::FileSink;

/// [`FileSink`] that emits lines strictly in sequence-number order.
///
/// Lines submitted ahead of their turn wait in a reorder buffer until
/// every earlier sequence number has been written:
///
/// ```text
///   accept_line_at(2, c)   pending {2:c}         written: -
///   accept_line_at(0, a)   pending {2:c}         written: a
///   accept_line_at(1, b)   pending {}            written: a b c
/// ```
///
/// `accept_line` and `accept_row` take the sequence number after the
/// highest one seen so far.
#[derive(Debug)]
pub struct OrderedFileSink<W: Write> {
    inner: FileSink<W>,
    next_seq: u64,
    next_assigned: u64,
    pending: BTreeMap<u64, Vec<u8>>,
}

impl<W: Write> OrderedFileSink<W> {
    #[must_use]
    pub fn new(inner: FileSink<W>) -> Self {
        Self {
            inner,
            next_seq: 0,
            next_assigned: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Submit `line` as sequence number `seq`.
    ///
    /// # Errors
    ///
    /// - [`OutputError::DuplicateSequence`] if `seq` was already submitted.
    /// - [`OutputError::Write`] if writing a ready line fails.
    pub fn accept_line_at(&mut self, seq: u64, line: &[u8]) -> Result<(), OutputError> {
        if seq < self.next_seq || self.pending.contains_key(&seq) {
            return Err(OutputError::DuplicateSequence { seq });
        }
        self.next_assigned = self.next_assigned.max(seq.saturating_add(1));
        if seq != self.next_seq {
            self.pending.insert(seq, line.to_vec());
            return Ok(());
        }

        self.inner.accept_line(line)?;
        self.next_seq += 1;
        while let Some(ready) = self.pending.remove(&self.next_seq) {
            self.inner.accept_line(&ready)?;
            self.next_seq += 1;
        }
        Ok(())
    }

    /// Lines held back waiting for an earlier sequence number.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Next sequence number to be written.
    #[must_use]
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Flush and return the writer.
    ///
    /// # Errors
    ///
    /// - [`OutputError::SequenceGap`] if lines are still held back.
    /// - [`OutputError::Write`] if the final flush fails.
    pub fn finish(self) -> Result<W, OutputError> {
        if !self.pending.is_empty() {
            return Err(OutputError::SequenceGap {
                expected: self.next_seq,
                pending: self.pending.len(),
            });
        }
        self.inner.finish()
    }
}

impl<W: Write> RowSink for OrderedFileSink<W> {
    fn accept_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.accept_line_at(self.next_assigned, line)
            .map_err(io::Error::other)
    }

    fn accept_row(&mut self, row: &RowView<'_>) -> io::Result<()> {
        let line = row.to_line(self.inner.separator());
        self.accept_line(&line)
    }
}
