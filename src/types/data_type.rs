//! # Logical Column Types
//!
//! The canonical `DataType` enum for descriptors, relational metadata and the
//! frame codec, plus the stable mutation operation codes.
//!
//! ## Type Table
//!
//! | Type | SQL type | Fixed size (bytes) | Frame width |
//! |------|----------|--------------------|-------------|
//! | STRING | VARCHAR | - | rejected |
//! | HEX | VARCHAR | - | declared limit |
//! | ASCII | VARCHAR | - | declared limit |
//! | BYTE | TINYINT | 1 | 1 |
//! | SHORT | SMALLINT | 2 | 2 |
//! | INT | INTEGER | 4 | 4 |
//! | LONG | BIGINT | 8 | 8 |
//! | TIMESTAMP | TIMESTAMP | 8 (millis since epoch) | 8 |
//! | DOUBLE | DOUBLE | 8 | 8 |
//! | FLOAT | FLOAT | 4 | 4 |
//! | BOOLEAN | BOOLEAN | 1 | 1 |
//!
//! The two string sub-encodings (HEX, ASCII) exist for the frame codec: a
//! plain STRING column has no decidable fixed width, while hex and ascii
//! columns occupy exactly their declared byte limit.

use crate::error::Error;
use eyre::Result;
use serde::Deserialize;

/// Logical column type as declared in a schema description.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    String,
    Hex,
    Ascii,
    Byte,
    Short,
    Int,
    Long,
    Timestamp,
    Double,
    Float,
    Boolean,
}

/// Relational type code bound to statement parameters and result columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    VarChar,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Timestamp,
    Double,
    Float,
    Boolean,
}

impl DataType {
    /// Returns the relational type code for this logical type.
    pub fn sql_type(self) -> SqlType {
        match self {
            DataType::String | DataType::Hex | DataType::Ascii => SqlType::VarChar,
            DataType::Byte => SqlType::TinyInt,
            DataType::Short => SqlType::SmallInt,
            DataType::Int => SqlType::Integer,
            DataType::Long => SqlType::BigInt,
            DataType::Timestamp => SqlType::Timestamp,
            DataType::Double => SqlType::Double,
            DataType::Float => SqlType::Float,
            DataType::Boolean => SqlType::Boolean,
        }
    }

    /// Returns the fixed byte width of this type, or None for the string
    /// types whose width comes from the column's declared limit.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            DataType::String | DataType::Hex | DataType::Ascii => None,
            DataType::Byte | DataType::Boolean => Some(1),
            DataType::Short => Some(2),
            DataType::Int | DataType::Float => Some(4),
            DataType::Long | DataType::Timestamp | DataType::Double => Some(8),
        }
    }

    /// Returns the frame field width for a column of this type with the
    /// given declared byte limit.
    ///
    /// STRING is rejected: only the hex/ascii sub-encodings have a decidable
    /// fixed width. Hex/ascii with a zero limit is a schema defect.
    pub fn frame_width(self, name: &str, limit: u32) -> Result<usize> {
        match self {
            DataType::String => Err(Error::schema(format!(
                "{name}: STRING column has no fixed frame width, use HEX or ASCII"
            ))),
            DataType::Hex | DataType::Ascii => {
                if limit == 0 {
                    Err(Error::schema(format!("{name}: invalid column length = 0")))
                } else {
                    Ok(limit as usize)
                }
            }
            DataType::Byte | DataType::Boolean => Ok(1),
            DataType::Short => Ok(2),
            DataType::Int | DataType::Float => Ok(4),
            DataType::Long | DataType::Timestamp | DataType::Double => Ok(8),
        }
    }

    pub fn is_string(self) -> bool {
        matches!(self, DataType::String | DataType::Hex | DataType::Ascii)
    }
}

/// Mutation operation codes.
///
/// The integer values are a wire contract: they dispatch statement selection
/// and are bound as the second parameter of stored-procedure calls. Changing
/// them breaks every stored procedure relying on the convention.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Insert = 0,
    Update = 1,
    Delete = 2,
    Retrieve = 3,
    Unknown = 4,
}

impl Operation {
    /// Returns the stable integer code for this operation.
    pub fn code(self) -> i32 {
        self as i32
    }
}
