#![warn(clippy::pedantic)]

pub mod catalog;
pub mod dictionary;
pub mod engine;
pub mod error;
pub mod row;
pub mod sink;

pub use catalog::{ColumnCatalog, InclusionRule, OutputColumn, ProjectionPlan, VIRTUAL_BASENAME, VIRTUAL_ROW};
pub use engine::{BlockStatus, DecodeEngine, EngineState, base_name_of};
pub use error::{DecodeError, ErrCode, ErrorCategory};
pub use row::{RowBuffer, RowView};
pub use sink::RowSink;
