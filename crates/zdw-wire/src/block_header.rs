use crate::column_type::StorageClass;
use crate::error::WireError;
use crate::source::ByteSource;

/// Widest per-column value a row may carry, in bytes.
pub const MAX_VALUE_WIDTH: u8 = 8;

/// Per-column statistics from a block header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColumnStats {
    /// Bytes used by each changed value of this column in the block's rows.
    pub size: u8,
    /// Offset added to stored values (numeric classes only).
    pub base: u64,
}

/// Fixed part of a block, read after the block's dictionary section.
///
/// ```text
/// line_length:u32
/// num_lines:u32
/// per column: size:u8 [base:u64 when the storage class has a base]
/// last_block:u8   (0 or 1)
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    /// Longest rendered line in the block, in bytes.
    pub line_length: u32,
    /// Number of rows that follow.
    pub num_lines: u32,
    /// One entry per on-disk column.
    pub stats: Vec<ColumnStats>,
    pub last_block: bool,
}

impl BlockHeader {
    /// Read a block header for columns with the given storage classes.
    ///
    /// # Errors
    ///
    /// - [`WireError::UnexpectedEof`] on a short read.
    /// - [`WireError::Corrupted`] for a value width above
    ///   [`MAX_VALUE_WIDTH`] or a last-block flag other than 0 or 1.
    pub fn read_from(src: &mut ByteSource, classes: &[StorageClass]) -> Result<Self, WireError> {
        let line_length = src.read_u32()?;
        let num_lines = src.read_u32()?;

        let mut stats = Vec::with_capacity(classes.len());
        for (column, class) in classes.iter().enumerate() {
            let offset = src.offset();
            let size = src.read_u8()?;
            if size > MAX_VALUE_WIDTH {
                return Err(WireError::corrupted(
                    offset,
                    format!("column {column} declares {size}-byte values"),
                ));
            }
            let base = if class.has_base() { src.read_u64()? } else { 0 };
            stats.push(ColumnStats { size, base });
        }

        let offset = src.offset();
        let last_block = match src.read_u8()? {
            0 => false,
            1 => true,
            other => {
                return Err(WireError::corrupted(
                    offset,
                    format!("last-block flag {other}"),
                ));
            }
        };

        Ok(Self {
            line_length,
            num_lines,
            stats,
            last_block,
        })
    }

    /// Bytes occupied by the changed-columns bitmap of each row.
    #[must_use]
    pub fn bitmap_len(&self) -> usize {
        self.stats.len().div_ceil(8)
    }
}
