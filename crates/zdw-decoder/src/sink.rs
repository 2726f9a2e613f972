use std::io;

use crate::row::RowView;

/// Destination for decoded rows.
///
/// Implementations decide how a row is delivered: appended to a file,
/// reordered by sequence number, or kept in memory. The engine calls
/// [`accept_row`](Self::accept_row) once per decoded row; callers that
/// already hold a formatted line use [`accept_line`](Self::accept_line).
pub trait RowSink {
    /// Accept one fully formatted line, without its terminator.
    ///
    /// # Errors
    ///
    /// Returns the `io::Error` from the underlying writer.
    fn accept_line(&mut self, line: &[u8]) -> io::Result<()>;

    /// Accept one decoded row as separate columns.
    ///
    /// # Errors
    ///
    /// Returns the `io::Error` from the underlying writer.
    fn accept_row(&mut self, row: &RowView<'_>) -> io::Result<()>;
}

impl<S: RowSink + ?Sized> RowSink for &mut S {
    fn accept_line(&mut self, line: &[u8]) -> io::Result<()> {
        (**self).accept_line(line)
    }

    fn accept_row(&mut self, row: &RowView<'_>) -> io::Result<()> {
        (**self).accept_row(row)
    }
}
