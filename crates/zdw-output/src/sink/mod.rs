//! [`RowSink`](zdw_decoder::RowSink) implementations.
//!
//! ```text
//! ┌─────────────────┬───────────────────────────────────────────────┐
//! │ Sink            │ Delivery                                      │
//! ├─────────────────┼───────────────────────────────────────────────┤
//! │ FileSink        │ Buffered lines to a file or stdout            │
//! │ OrderedFileSink │ Same, reordered by sequence number            │
//! │ MemorySink      │ Keeps only the most recent row                │
//! └─────────────────┴───────────────────────────────────────────────┘
//! ```

mod file;
mod memory;
mod ordered;

pub use file::FileSink;
pub use memory::MemorySink;
pub use ordered::OrderedFileSink;
