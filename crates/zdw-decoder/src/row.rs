use std::io::{self, Write};
use std::ops::Range;

use zdw_wire::{BlockHeader, ByteSource, ColumnStats, StorageClass};

use crate::dictionary::DictionaryStore;
use crate::error::DecodeError;

/// Largest power of ten rendered as exact fixed-point text.
const MAX_DECIMAL_EXPONENT: u32 = 18;

// ── Row arena ─────────────────────────────────────────────────────────

/// Engine-owned storage for the most recently decoded row.
///
/// All output columns are rendered back to back into one byte buffer;
/// `spans` records where each column starts and ends. The buffer is
/// cleared and reused for every row.
#[derive(Clone, Debug, Default)]
pub struct RowBuffer {
    bytes: Vec<u8>,
    spans: Vec<Range<usize>>,
}

impl RowBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
        self.spans.clear();
    }

    /// Open a new column, returning its start offset for [`close_column`].
    ///
    /// [`close_column`]: Self::close_column
    pub(crate) fn open_column(&mut self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut Vec<u8> {
        &mut self.bytes
    }

    pub(crate) fn close_column(&mut self, start: usize) {
        self.spans.push(start..self.bytes.len());
    }

    #[must_use]
    pub fn view(&self) -> RowView<'_> {
        RowView {
            bytes: &self.bytes,
            spans: &self.spans,
        }
    }
}

/// Borrowed view of one decoded row, valid until the next decode call.
#[derive(Clone, Copy, Debug)]
pub struct RowView<'a> {
    bytes: &'a [u8],
    spans: &'a [Range<usize>],
}

impl<'a> RowView<'a> {
    /// Build a view over caller-held storage.
    ///
    /// Every span must lie within `bytes`.
    #[must_use]
    pub fn new(bytes: &'a [u8], spans: &'a [Range<usize>]) -> Self {
        Self { bytes, spans }
    }

    /// Number of output columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    #[must_use]
    pub fn column(&self, index: usize) -> Option<&'a [u8]> {
        self.spans
            .get(index)
            .and_then(|span| self.bytes.get(span.clone()))
    }

    pub fn columns(&self) -> impl Iterator<Item = &'a [u8]> + 'a {
        let bytes = self.bytes;
        self.spans.iter().map(move |span| &bytes[span.clone()])
    }

    /// Column bytes laid out back to back, without separators.
    #[must_use]
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    #[must_use]
    pub fn spans(&self) -> &'a [Range<usize>] {
        self.spans
    }

    /// Length of the row once joined with a one-byte separator, excluding
    /// the line terminator.
    #[must_use]
    pub fn joined_len(&self) -> usize {
        self.bytes.len() + self.spans.len().saturating_sub(1)
    }

    /// Write the columns joined by `separator`, without a line terminator.
    ///
    /// # Errors
    ///
    /// Returns the writer's `io::Error`.
    pub fn write_joined<W: Write + ?Sized>(&self, out: &mut W, separator: &[u8]) -> io::Result<()> {
        for (i, column) in self.columns().enumerate() {
            if i > 0 {
                out.write_all(separator)?;
            }
            out.write_all(column)?;
        }
        Ok(())
    }

    /// The columns joined by `separator` as an owned line.
    #[must_use]
    pub fn to_line(&self, separator: &[u8]) -> Vec<u8> {
        let mut line = Vec::with_capacity(self.joined_len());
        for (i, column) in self.columns().enumerate() {
            if i > 0 {
                line.extend_from_slice(separator);
            }
            line.extend_from_slice(column);
        }
        line
    }
}

// ── Block state ───────────────────────────────────────────────────────

/// Per-block column state: declared value widths, bases, and the current
/// stored value of every on-disk column.
#[derive(Clone, Debug, Default)]
pub struct BlockDecoder {
    stats: Vec<ColumnStats>,
    values: Vec<u64>,
    bitmap: Vec<u8>,
}

impl BlockDecoder {
    /// Start a new block: take its stats and reset every value to 0.
    pub fn reset(&mut self, header: &BlockHeader) {
        self.stats.clone_from(&header.stats);
        self.values.clear();
        self.values.resize(header.stats.len(), 0);
        self.bitmap.clear();
        self.bitmap.resize(header.bitmap_len(), 0);
    }

    /// Read one row's changed-columns bitmap and changed values.
    ///
    /// Unchanged columns keep the value from the previous row.
    ///
    /// # Errors
    ///
    /// Returns the wire error on a short read.
    pub fn read_row(&mut self, src: &mut ByteSource) -> Result<(), DecodeError> {
        src.read_exact_bytes(&mut self.bitmap)?;
        for (i, value) in self.values.iter_mut().enumerate() {
            if self.bitmap[i / 8] >> (i % 8) & 1 == 1 {
                *value = src.read_uint(self.stats[i].size)?;
            }
        }
        Ok(())
    }

    /// Stored value of on-disk column `index` in the current row.
    #[must_use]
    pub fn value(&self, index: usize) -> u64 {
        self.values[index]
    }

    #[must_use]
    pub fn base(&self, index: usize) -> u64 {
        self.stats[index].base
    }
}

// ── Rendering ─────────────────────────────────────────────────────────

/// Append the display text of one stored value to `out`.
///
/// A stored value of 0 always renders as nothing.
///
/// # Errors
///
/// `CorruptedData` for a bad dictionary reference or an unsigned value
/// that overflows `u64`.
pub fn render_value(
    out: &mut Vec<u8>,
    class: StorageClass,
    stored: u64,
    base: u64,
    dictionary: &DictionaryStore,
    decimal_factor: Option<f64>,
) -> Result<(), DecodeError> {
    if stored == 0 {
        return Ok(());
    }
    match class {
        StorageClass::Dictionary => dictionary.resolve_text(stored, out)?,
        StorageClass::Unsigned => {
            let value = base.checked_add(stored - 1).ok_or_else(|| {
                DecodeError::corrupted(format!("value {stored} overflows base {base}"))
            })?;
            push_display(out, value);
        }
        StorageClass::Signed => push_display(out, signed_value(stored, base)),
        StorageClass::Scaled => {
            let factor = decimal_factor
                .ok_or_else(|| DecodeError::Processing("scaled column without a factor".into()))?;
            push_scaled(out, signed_value(stored, base), factor);
        }
        StorageClass::Char2 => {
            for byte in [stored as u8, (stored >> 8) as u8] {
                if byte == 0 {
                    break;
                }
                out.push(byte);
            }
        }
        StorageClass::Visitor => push_display(out, dictionary.resolve_visitor(stored)?),
    }
    Ok(())
}

#[allow(clippy::cast_possible_wrap)]
fn signed_value(stored: u64, base: u64) -> i64 {
    (base as i64).wrapping_add((stored - 1) as i64)
}

pub(crate) fn push_display(out: &mut Vec<u8>, value: impl std::fmt::Display) {
    // Writing into a Vec cannot fail.
    let _ = write!(out, "{value}");
}

/// Render `value / factor`. Power-of-ten factors give exact fixed-point
/// text with trailing fractional zeros trimmed.
#[allow(clippy::cast_precision_loss)]
fn push_scaled(out: &mut Vec<u8>, value: i64, factor: f64) {
    let Some(exponent) = decimal_exponent(factor) else {
        push_display(out, value as f64 / factor);
        return;
    };

    let scale = 10u64.pow(exponent);
    let magnitude = value.unsigned_abs();
    let whole = magnitude / scale;
    let fraction = magnitude % scale;

    if value < 0 {
        out.push(b'-');
    }
    push_display(out, whole);
    if fraction != 0 {
        let digits = format!("{fraction:0width$}", width = exponent as usize);
        out.push(b'.');
        out.extend_from_slice(digits.trim_end_matches('0').as_bytes());
    }
}

#[allow(clippy::cast_precision_loss, clippy::float_cmp)]
fn decimal_exponent(factor: f64) -> Option<u32> {
    (0..=MAX_DECIMAL_EXPONENT).find(|&e| 10u64.pow(e) as f64 == factor)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use zdw_wire::FormatVersion;

    use super::*;

    fn render(class: StorageClass, stored: u64, base: u64, factor: Option<f64>) -> String {
        let dict = DictionaryStore::for_version(FormatVersion::new(9).unwrap());
        let mut out = Vec::new();
        render_value(&mut out, class, stored, base, &dict, factor).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn zero_is_always_empty() {
        assert_eq!(render(StorageClass::Unsigned, 0, 100, None), "");
        assert_eq!(render(StorageClass::Signed, 0, 100, None), "");
        assert_eq!(render(StorageClass::Dictionary, 0, 0, None), "");
    }

    #[test]
    fn unsigned_adds_base() {
        assert_eq!(render(StorageClass::Unsigned, 1, 30, None), "30");
        assert_eq!(render(StorageClass::Unsigned, 12, 30, None), "41");
    }

    #[test]
    fn unsigned_overflow_is_corrupted() {
        let dict = DictionaryStore::for_version(FormatVersion::new(9).unwrap());
        let mut out = Vec::new();
        let result = render_value(&mut out, StorageClass::Unsigned, 3, u64::MAX, &dict, None);
        assert!(matches!(result, Err(DecodeError::CorruptedData { .. })));
    }

    #[test]
    fn signed_wraps_from_negative_base() {
        let base = (-10i64) as u64;
        assert_eq!(render(StorageClass::Signed, 1, base, None), "-10");
        assert_eq!(render(StorageClass::Signed, 16, base, None), "5");
    }

    #[test]
    fn scaled_power_of_ten_is_exact() {
        let base = (-1234i64) as u64;
        assert_eq!(render(StorageClass::Scaled, 1, base, Some(100.0)), "-12.34");
        assert_eq!(render(StorageClass::Scaled, 1, 150, Some(100.0)), "1.5");
        assert_eq!(render(StorageClass::Scaled, 1, 300, Some(100.0)), "3");
        assert_eq!(render(StorageClass::Scaled, 1, 5, Some(1000.0)), "0.005");
        assert_eq!(render(StorageClass::Scaled, 1, (-5i64) as u64, Some(100.0)), "-0.05");
        assert_eq!(render(StorageClass::Scaled, 1, 7, Some(1.0)), "7");
    }

    #[test]
    fn scaled_other_factor_uses_float_text() {
        assert_eq!(render(StorageClass::Scaled, 1, 3, Some(2.0)), "1.5");
    }

    #[test]
    fn char2_stops_at_nul() {
        assert_eq!(render(StorageClass::Char2, u64::from(u16::from_le_bytes(*b"US")), 0, None), "US");
        assert_eq!(render(StorageClass::Char2, u64::from(b'X'), 0, None), "X");
    }

    #[test]
    fn block_decoder_keeps_unchanged_values() {
        let header = BlockHeader {
            line_length: 0,
            num_lines: 2,
            stats: vec![ColumnStats { size: 1, base: 0 }, ColumnStats { size: 2, base: 0 }],
            last_block: true,
        };
        let mut block = BlockDecoder::default();
        block.reset(&header);

        // row 1: both changed; row 2: only column 0
        let bytes = vec![0b11, 0x07, 0x34, 0x12, 0b01, 0x09];
        let mut src = ByteSource::from_reader(Cursor::new(bytes)).unwrap();
        block.read_row(&mut src).unwrap();
        assert_eq!((block.value(0), block.value(1)), (7, 0x1234));
        block.read_row(&mut src).unwrap();
        assert_eq!((block.value(0), block.value(1)), (9, 0x1234));

        block.reset(&header);
        assert_eq!((block.value(0), block.value(1)), (0, 0));
    }

    #[test]
    fn row_view_joins_columns() {
        let mut row = RowBuffer::new();
        for text in [&b"Ann"[..], b"", b"30"] {
            let start = row.open_column();
            row.bytes_mut().extend_from_slice(text);
            row.close_column(start);
        }
        let view = row.view();
        assert_eq!(view.len(), 3);
        assert_eq!(view.column(1), Some(&b""[..]));
        assert_eq!(view.to_line(b"\t"), b"Ann\t\t30");
        assert_eq!(view.joined_len(), 7);

        let mut out = Vec::new();
        view.write_joined(&mut out, b",").unwrap();
        assert_eq!(out, b"Ann,,30");
    }
}
