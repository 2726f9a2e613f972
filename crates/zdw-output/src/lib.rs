#![warn(clippy::pedantic)]

pub mod config;
pub mod desc;
pub mod error;
pub mod memory;
pub mod sink;
pub mod unconvert;

pub use config::{ColumnSelection, OutputConfig, UnconvertOptions, DEFAULT_EXTENSION};
pub use error::OutputError;
pub use memory::{BufferMode, MemoryRow, MemoryUnconverter};
pub use sink::{FileSink, MemorySink, OrderedFileSink};
pub use unconvert::{FileUnconverter, UnconvertSummary};
