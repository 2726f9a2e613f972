/// Errors raised while reading ZDW bytes off a [`ByteSource`].
///
/// These are byte-level failures: the stream ended early, a header field
/// held a value the format does not allow, or the underlying reader failed.
/// The decoder maps each variant onto a stable result code.
///
/// ```text
///   WireError
///   ├── UnexpectedEof        ← short read of a mandatory field
///   ├── UnsupportedVersion   ← version tag outside 1..=11
///   ├── UnexpectedDescType   ← unknown column storage type byte
///   ├── Corrupted            ← internal consistency check failed
///   └── Io(std::io::Error)   ← reader or decompressor failure
/// ```
///
/// [`ByteSource`]: crate::source::ByteSource
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Input ended before a mandatory field could be read.
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEof { offset: u64 },

    /// The header's version tag is outside the supported range.
    #[error("unsupported ZDW version {version} (supported: {min}..={max})")]
    UnsupportedVersion { version: u16, min: u16, max: u16 },

    /// A column type byte did not name a known storage type.
    #[error("unexpected desc type {value} for column {column}")]
    UnexpectedDescType { column: usize, value: u8 },

    /// A structural invariant of the format was violated.
    #[error("corrupted data at offset {offset}: {reason}")]
    Corrupted { offset: u64, reason: String },

    /// I/O error from the underlying reader or decompressor.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl WireError {
    /// Build a [`WireError::Corrupted`] at `offset`.
    #[must_use]
    pub fn corrupted(offset: u64, reason: impl Into<String>) -> Self {
        Self::Corrupted {
            offset,
            reason: reason.into(),
        }
    }
}
