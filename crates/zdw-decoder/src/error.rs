use std::fmt;
use std::io;
use std::path::PathBuf;

use zdw_wire::WireError;

/// Stable result codes shared by the library and the `zdw` binary.
///
/// The numeric values never change: the CLI uses them as its process exit
/// status, and 0 always means success.
///
/// ```text
/// ┌───────┬───────────────────────┬──────────┐
/// │ Value │ Code                  │ Category │
/// ├───────┼───────────────────────┼──────────┤
/// │   0   │ Ok                    │ –        │
/// │   1   │ BadParameter          │ internal │
/// │   2   │ GzreadFailed          │ I/O      │
/// │   3   │ FileCreationErr       │ I/O      │
/// │   4   │ FileOpenErr           │ I/O      │
/// │   5   │ UnsupportedZdwVersion │ format   │
/// │   6   │ ZdwLongerThanExpected │ format   │
/// │   7   │ UnexpectedDescType    │ format   │
/// │   8   │ RowCountErr           │ usage    │
/// │   9   │ CorruptedData         │ format   │
/// │  10   │ HeaderNotReadYet      │ usage    │
/// │  11   │ HeaderAlreadyRead     │ usage    │
/// │  12   │ AtEndOfFile           │ usage    │
/// │  13   │ BadRequestedColumn    │ usage    │
/// │  14   │ NoColumnsToOutput     │ usage    │
/// │  15   │ ProcessingError       │ internal │
/// │  16   │ UnsupportedOperation  │ usage    │
/// └───────┴───────────────────────┴──────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrCode {
    Ok = 0,
    BadParameter = 1,
    GzreadFailed = 2,
    FileCreationErr = 3,
    FileOpenErr = 4,
    UnsupportedZdwVersion = 5,
    ZdwLongerThanExpected = 6,
    UnexpectedDescType = 7,
    RowCountErr = 8,
    CorruptedData = 9,
    HeaderNotReadYet = 10,
    HeaderAlreadyRead = 11,
    AtEndOfFile = 12,
    BadRequestedColumn = 13,
    NoColumnsToOutput = 14,
    ProcessingError = 15,
    UnsupportedOperation = 16,
}

/// Broad grouping of result codes. Everything but `Usage` aborts a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    Success,
    Usage,
    Format,
    Io,
    Internal,
}

impl ErrCode {
    /// Every code, in value order.
    pub const ALL: [Self; 17] = [
        Self::Ok,
        Self::BadParameter,
        Self::GzreadFailed,
        Self::FileCreationErr,
        Self::FileOpenErr,
        Self::UnsupportedZdwVersion,
        Self::ZdwLongerThanExpected,
        Self::UnexpectedDescType,
        Self::RowCountErr,
        Self::CorruptedData,
        Self::HeaderNotReadYet,
        Self::HeaderAlreadyRead,
        Self::AtEndOfFile,
        Self::BadRequestedColumn,
        Self::NoColumnsToOutput,
        Self::ProcessingError,
        Self::UnsupportedOperation,
    ];

    #[must_use]
    pub fn value(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn from_value(value: u8) -> Option<Self> {
        Self::ALL.get(usize::from(value)).copied()
    }

    /// Fixed one-line description printed by the CLI.
    #[must_use]
    pub fn text(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::BadParameter => "Bad parameter",
            Self::GzreadFailed => "Read failed",
            Self::FileCreationErr => "Could not create output file",
            Self::FileOpenErr => "Could not open input file",
            Self::UnsupportedZdwVersion => "Unsupported ZDW version",
            Self::ZdwLongerThanExpected => "ZDW longer than expected",
            Self::UnexpectedDescType => "Unexpected desc type",
            Self::RowCountErr => "Row count error",
            Self::CorruptedData => "Corrupted data",
            Self::HeaderNotReadYet => "Header not read yet",
            Self::HeaderAlreadyRead => "Header already read",
            Self::AtEndOfFile => "At end of file",
            Self::BadRequestedColumn => "Bad requested column",
            Self::NoColumnsToOutput => "No columns to output",
            Self::ProcessingError => "Processing error",
            Self::UnsupportedOperation => "Unsupported operation",
        }
    }

    #[must_use]
    pub fn category(self) -> ErrorCategory {
        match self {
            Self::Ok => ErrorCategory::Success,
            Self::GzreadFailed | Self::FileCreationErr | Self::FileOpenErr => ErrorCategory::Io,
            Self::UnsupportedZdwVersion
            | Self::ZdwLongerThanExpected
            | Self::UnexpectedDescType
            | Self::CorruptedData => ErrorCategory::Format,
            Self::BadParameter | Self::ProcessingError => ErrorCategory::Internal,
            Self::RowCountErr
            | Self::HeaderNotReadYet
            | Self::HeaderAlreadyRead
            | Self::AtEndOfFile
            | Self::BadRequestedColumn
            | Self::NoColumnsToOutput
            | Self::UnsupportedOperation => ErrorCategory::Usage,
        }
    }
}

impl fmt::Display for ErrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Errors returned by the decode engine and its adapters.
///
/// Each variant maps to exactly one [`ErrCode`] through [`code`]. Usage
/// errors leave the engine untouched; every other category aborts it.
///
/// ```text
///   DecodeError
///   ├── HeaderNotReadYet         ← block/row/schema call before read_header
///   ├── HeaderAlreadyRead        ← read_header called twice
///   ├── RowCount                 ← row requested past the block's row count
///   ├── AtEndOfFile              ← stream drained or engine aborted
///   ├── BadRequestedColumn       ← unknown name under the fail rule
///   ├── NoColumnsToOutput        ← projection selects nothing
///   ├── UnsupportedOperation     ← call invalid in the current mode/state
///   ├── LongerThanExpected       ← bytes after the last block
///   ├── MissingLastBlock         ← stream ended before a last-block flag
///   ├── CorruptedData            ← dictionary or value check failed
///   ├── FileOpen                 ← input could not be opened
///   ├── FileCreation             ← output could not be created
///   ├── Output(io::Error)        ← sink write failed
///   ├── BadParameter             ← invalid argument
///   ├── Processing               ← invariant violated
///   └── Wire(WireError)          ← byte-level failure from zdw-wire
/// ```
///
/// [`code`]: DecodeError::code
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("header has not been read")]
    HeaderNotReadYet,

    #[error("header has already been read")]
    HeaderAlreadyRead,

    /// All `num_lines` rows of the current block were already read.
    #[error("no rows left in the current block ({num_lines} declared)")]
    RowCount { num_lines: u32 },

    #[error("at end of file")]
    AtEndOfFile,

    #[error("requested column `{name}` does not exist")]
    BadRequestedColumn { name: String },

    #[error("projection selects no columns")]
    NoColumnsToOutput,

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    /// The last block was decoded but the stream carries more bytes.
    #[error("data continues after the last block (offset {offset})")]
    LongerThanExpected { offset: u64 },

    /// The stream ended where a block was expected; the file is cut short.
    #[error("stream ended after {blocks} blocks without a last-block flag")]
    MissingLastBlock { blocks: u64 },

    #[error("corrupted data: {reason}")]
    CorruptedData { reason: String },

    #[error("cannot open {}: {source}", path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot create {}: {source}", path.display())]
    FileCreation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing a decoded row or desc line failed.
    #[error("output write failed: {0}")]
    Output(#[source] io::Error),

    #[error("bad parameter: {0}")]
    BadParameter(String),

    #[error("processing error: {0}")]
    Processing(String),

    #[error(transparent)]
    Wire(#[from] WireError),
}

impl DecodeError {
    pub(crate) fn corrupted(reason: impl Into<String>) -> Self {
        Self::CorruptedData {
            reason: reason.into(),
        }
    }

    /// The stable result code for this error.
    #[must_use]
    pub fn code(&self) -> ErrCode {
        match self {
            Self::HeaderNotReadYet => ErrCode::HeaderNotReadYet,
            Self::HeaderAlreadyRead => ErrCode::HeaderAlreadyRead,
            Self::RowCount { .. } => ErrCode::RowCountErr,
            Self::AtEndOfFile => ErrCode::AtEndOfFile,
            Self::BadRequestedColumn { .. } => ErrCode::BadRequestedColumn,
            Self::NoColumnsToOutput => ErrCode::NoColumnsToOutput,
            Self::UnsupportedOperation(_) => ErrCode::UnsupportedOperation,
            Self::LongerThanExpected { .. } => ErrCode::ZdwLongerThanExpected,
            Self::MissingLastBlock { .. } => ErrCode::GzreadFailed,
            Self::CorruptedData { .. } => ErrCode::CorruptedData,
            Self::FileOpen { .. } => ErrCode::FileOpenErr,
            Self::FileCreation { .. } | Self::Output(_) => ErrCode::FileCreationErr,
            Self::BadParameter(_) => ErrCode::BadParameter,
            Self::Processing(_) => ErrCode::ProcessingError,
            Self::Wire(wire) => match wire {
                WireError::UnexpectedEof { .. } | WireError::Io(_) => ErrCode::GzreadFailed,
                WireError::UnsupportedVersion { .. } => ErrCode::UnsupportedZdwVersion,
                WireError::UnexpectedDescType { .. } => ErrCode::UnexpectedDescType,
                WireError::Corrupted { .. } => ErrCode::CorruptedData,
            },
        }
    }

    /// Whether this error aborts the file (format, I/O and internal errors).
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self.code().category(),
            ErrorCategory::Usage | ErrorCategory::Success
        )
    }
}
