//! Logical type catalog and runtime values.
//!
//! One `DataType` enum is used everywhere: descriptor parsing, relational
//! metadata, text conversion and the frame codec all agree on the same
//! per-type byte widths and SQL type codes.

mod data_type;
mod value;

pub use data_type::{DataType, Operation, SqlType};
pub use value::Value;
