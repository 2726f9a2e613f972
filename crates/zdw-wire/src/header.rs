use std::fmt;

use tracing::debug;

use crate::column_type::ColumnType;
use crate::error::WireError;
use crate::source::ByteSource;

/// Longest column name the header may carry, in bytes.
pub const MAX_COLUMN_NAME_LEN: usize = 255;

/// ZDW format revision, read from the first two bytes of the stream.
///
/// Each revision selects exactly one dictionary encoding and decides which
/// optional header sections are present:
///
/// ```text
/// ┌─────────┬──────────────┬──────────┬────────────┬────────────┐
/// │ Version │ Dictionary   │ Visitors │ Char sizes │ Dec factor │
/// ├─────────┼──────────────┼──────────┼────────────┼────────────┤
/// │ 1 – 3   │ chained      │ yes      │ no         │ yes        │
/// │ 4 – 7   │ chained      │ yes      │ yes        │ no         │
/// │ 8       │ chained      │ no       │ yes        │ no         │
/// │ 9 – 11  │ flat chunks  │ no       │ yes        │ no         │
/// └─────────┴──────────────┴──────────┴────────────┴────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FormatVersion(u16);

impl FormatVersion {
    /// Oldest supported revision.
    pub const MIN: u16 = 1;

    /// Newest supported revision.
    pub const MAX: u16 = 11;

    /// Validate a raw version tag.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::UnsupportedVersion`] outside `MIN..=MAX`.
    pub fn new(raw: u16) -> Result<Self, WireError> {
        if (Self::MIN..=Self::MAX).contains(&raw) {
            Ok(Self(raw))
        } else {
            Err(WireError::UnsupportedVersion {
                version: raw,
                min: Self::MIN,
                max: Self::MAX,
            })
        }
    }

    #[must_use]
    pub fn raw(self) -> u16 {
        self.0
    }

    #[must_use]
    pub fn uses_chained_dictionary(self) -> bool {
        self.0 <= 8
    }

    #[must_use]
    pub fn uses_visitor_dictionary(self) -> bool {
        self.0 <= 7
    }

    #[must_use]
    pub fn uses_flat_dictionary(self) -> bool {
        self.0 >= 9
    }

    #[must_use]
    pub fn has_decimal_factor(self) -> bool {
        self.0 <= 3
    }

    #[must_use]
    pub fn has_char_sizes(self) -> bool {
        self.0 >= 4
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One on-disk column, in header order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub column_type: ColumnType,
    /// Declared character width for `Varchar`/`Char` columns (v4+).
    pub char_size: Option<u16>,
}

impl ColumnDescriptor {
    /// Desc-file type text for this column.
    #[must_use]
    pub fn desc_type(&self) -> String {
        self.column_type.desc_type(self.char_size)
    }
}

/// Parsed file header: version, column catalog and decimal factor.
///
/// ```text
/// version:u16
/// names:(bytes NUL)* NUL             terminated by an empty name
/// types:u8 × n
/// char_sizes:u16 × (#Varchar+#Char)  v4+
/// decimal_factor:f64                 v1–3
/// ```
///
/// The legacy dictionary sections that follow the header in v1–8 are
/// read by the decoder, not here.
#[derive(Clone, Debug, PartialEq)]
pub struct FileHeader {
    pub version: FormatVersion,
    pub columns: Vec<ColumnDescriptor>,
    pub decimal_factor: Option<f64>,
}

impl FileHeader {
    /// Read the header from the start of `src`.
    ///
    /// # Errors
    ///
    /// - [`WireError::UnsupportedVersion`] for a tag outside 1..=11.
    /// - [`WireError::UnexpectedDescType`] for an unknown type byte.
    /// - [`WireError::UnexpectedEof`] if the stream ends inside the header.
    /// - [`WireError::Corrupted`] for zero columns, a non-UTF-8 or overlong
    ///   name, or a decimal factor that is not a positive finite number.
    pub fn read_from(src: &mut ByteSource) -> Result<Self, WireError> {
        let version = FormatVersion::new(src.read_u16()?)?;

        let mut names = Vec::new();
        loop {
            let start = src.offset();
            let raw = src.read_nul_terminated(MAX_COLUMN_NAME_LEN)?;
            if raw.is_empty() {
                break;
            }
            let name = String::from_utf8(raw)
                .map_err(|_| WireError::corrupted(start, "column name is not UTF-8"))?;
            names.push(name);
        }
        if names.is_empty() {
            return Err(WireError::corrupted(src.offset(), "header declares no columns"));
        }

        let mut types = Vec::with_capacity(names.len());
        for column in 0..names.len() {
            let value = src.read_u8()?;
            let column_type = ColumnType::from_wire_byte(value)
                .ok_or(WireError::UnexpectedDescType { column, value })?;
            types.push(column_type);
        }

        let mut columns = Vec::with_capacity(names.len());
        for (name, column_type) in names.into_iter().zip(types) {
            let char_size = if version.has_char_sizes() && column_type.has_char_size() {
                Some(src.read_u16()?)
            } else {
                None
            };
            columns.push(ColumnDescriptor {
                name,
                column_type,
                char_size,
            });
        }

        let decimal_factor = if version.has_decimal_factor() {
            let offset = src.offset();
            let factor = src.read_f64()?;
            if !factor.is_finite() || factor <= 0.0 {
                return Err(WireError::corrupted(
                    offset,
                    format!("invalid decimal factor {factor}"),
                ));
            }
            Some(factor)
        } else {
            None
        };

        debug!(
            version = version.raw(),
            columns = columns.len(),
            "read ZDW header"
        );

        Ok(Self {
            version,
            columns,
            decimal_factor,
        })
    }
}
