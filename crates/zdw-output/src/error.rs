use std::io;
use std::path::PathBuf;

use zdw_decoder::DecodeError;

/// Errors raised while writing decoded output.
///
/// Every variant folds into a [`DecodeError`] so callers see one error
/// type and one result code per failed file.
///
/// ```text
/// ┌───────────────────┬───────────────────────────────────────┬──────────────────┐
/// │ Variant           │ Cause                                 │ DecodeError      │
/// ├───────────────────┼───────────────────────────────────────┼──────────────────┤
/// │ Create            │ Data or desc file cannot be created   │ FileCreation     │
/// │ Write             │ Writing or flushing output failed     │ Output           │
/// │ SequenceGap       │ Ordered sink finished with holes      │ Processing       │
/// │ DuplicateSequence │ Sequence number submitted twice       │ BadParameter     │
/// └───────────────────┴───────────────────────────────────────┴──────────────────┘
/// ```
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("cannot create {}: {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("write failed: {0}")]
    Write(#[from] io::Error),

    /// `finish` was called while lines after `expected` are still held.
    #[error("missing line {expected}, {pending} later lines held back")]
    SequenceGap { expected: u64, pending: usize },

    #[error("line {seq} was already submitted")]
    DuplicateSequence { seq: u64 },
}

impl From<OutputError> for DecodeError {
    fn from(err: OutputError) -> Self {
        match err {
            OutputError::Create { path, source } => DecodeError::FileCreation { path, source },
            OutputError::Write(e) => DecodeError::Output(e),
            gap @ OutputError::SequenceGap { .. } => DecodeError::Processing(gap.to_string()),
            dup @ OutputError::DuplicateSequence { .. } => DecodeError::BadParameter(dup.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use zdw_decoder::ErrCode;

    use super::*;

    #[test]
    fn codes_after_conversion() {
        let create = OutputError::Create {
            path: "/nope/x.sql".into(),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert_eq!(DecodeError::from(create).code(), ErrCode::FileCreationErr);

        let write = OutputError::Write(io::Error::from(io::ErrorKind::BrokenPipe));
        assert_eq!(DecodeError::from(write).code(), ErrCode::FileCreationErr);

        let gap = OutputError::SequenceGap {
            expected: 3,
            pending: 2,
        };
        assert_eq!(DecodeError::from(gap).code(), ErrCode::ProcessingError);

        let dup = OutputError::DuplicateSequence { seq: 0 };
        assert_eq!(DecodeError::from(dup).code(), ErrCode::BadParameter);
    }
}
