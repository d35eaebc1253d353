//! # Runtime Value Representation
//!
//! `Value` is the fully-owned runtime representation of one column value.
//! Rows materialized from the backend, staged inserts and frame decode
//! results all use it.
//!
//! Timestamps are a single representation everywhere: milliseconds since the
//! Unix epoch, rendered in the server text format `yyyy-MM-dd hh:mm:ss`
//! (UTC) when converted to or from text.

use super::DataType;
use eyre::{bail, Result, WrapErr};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

/// Server text format for TIMESTAMP values.
const SERVER_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Fully-owned runtime value for one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
    Double(f64),
    Float(f32),
    Bool(bool),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Parses a text field into a typed value. Empty text is Null.
    ///
    /// TIMESTAMP text must be in the server format `yyyy-MM-dd hh:mm:ss`.
    /// The error names the offending text; callers annotate the column.
    pub fn parse_text(text: &str, ty: DataType) -> Result<Value> {
        if text.is_empty() {
            return Ok(Value::Null);
        }
        let value = match ty {
            DataType::String | DataType::Hex | DataType::Ascii => {
                Value::String(text.to_string())
            }
            DataType::Byte => Value::Byte(
                text.parse::<i8>()
                    .wrap_err_with(|| format!("not a BYTE: {text:?}"))?,
            ),
            DataType::Short => Value::Short(
                text.parse::<i16>()
                    .wrap_err_with(|| format!("not a SHORT: {text:?}"))?,
            ),
            DataType::Int => Value::Int(
                text.parse::<i32>()
                    .wrap_err_with(|| format!("not an INT: {text:?}"))?,
            ),
            DataType::Long => Value::Long(
                text.parse::<i64>()
                    .wrap_err_with(|| format!("not a LONG: {text:?}"))?,
            ),
            DataType::Timestamp => Value::Timestamp(parse_timestamp(text)?),
            DataType::Double => Value::Double(
                text.parse::<f64>()
                    .wrap_err_with(|| format!("not a DOUBLE: {text:?}"))?,
            ),
            DataType::Float => Value::Float(
                text.parse::<f32>()
                    .wrap_err_with(|| format!("not a FLOAT: {text:?}"))?,
            ),
            DataType::Boolean => Value::Bool(
                text.parse::<bool>()
                    .wrap_err_with(|| format!("not a BOOLEAN: {text:?}"))?,
            ),
        };
        Ok(value)
    }

    /// Renders this value as text, timestamps in the server format.
    /// Null has no text.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Byte(v) => Some(v.to_string()),
            Value::Short(v) => Some(v.to_string()),
            Value::Int(v) => Some(v.to_string()),
            Value::Long(v) => Some(v.to_string()),
            Value::Timestamp(millis) => Some(format_timestamp(*millis)),
            Value::Double(v) => Some(v.to_string()),
            Value::Float(v) => Some(v.to_string()),
            Value::Bool(v) => Some(v.to_string()),
        }
    }

    /// Reads this value as a row count. Null counts as zero.
    pub fn as_row_count(&self) -> Result<u64> {
        match self {
            Value::Null => Ok(0),
            Value::Byte(v) => Ok(u64::try_from(*v as i64).unwrap_or(0)),
            Value::Short(v) => Ok(u64::try_from(*v as i64).unwrap_or(0)),
            Value::Int(v) => Ok(u64::try_from(*v as i64).unwrap_or(0)),
            Value::Long(v) => Ok(u64::try_from(*v).unwrap_or(0)),
            other => bail!("row count column holds a non-integer value: {other:?}"),
        }
    }
}

fn parse_timestamp(text: &str) -> Result<i64> {
    let dt = PrimitiveDateTime::parse(text, SERVER_FORMAT)
        .wrap_err_with(|| format!("not a TIMESTAMP: {text:?}"))?;
    Ok((dt.assume_utc().unix_timestamp_nanos() / 1_000_000) as i64)
}

fn format_timestamp(millis: i64) -> String {
    match OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000) {
        Ok(dt) => dt
            .format(SERVER_FORMAT)
            .unwrap_or_else(|_| millis.to_string()),
        Err(_) => millis.to_string(),
    }
}
