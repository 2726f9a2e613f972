#![warn(clippy::pedantic)]

pub mod block_header;
pub mod column_type;
pub mod dictionary_section;
pub mod error;
pub mod header;
pub mod source;

pub use block_header::{BlockHeader, ColumnStats};
pub use column_type::{ColumnType, StorageClass};
pub use error::WireError;
pub use header::{ColumnDescriptor, FileHeader, FormatVersion};
pub use source::{ByteSource, Compression};
