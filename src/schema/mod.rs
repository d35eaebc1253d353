//! # Schema Descriptors
//!
//! Declarative table and column descriptions, parsed from JSON. The field
//! names are a binding contract with existing descriptor files:
//!
//! ```text
//! {
//!   "name": "person_buffer",
//!   "table": {
//!       "updateTableName": "person",     update target table or a stored
//!                                        procedure call ("? = call save")
//!       "select": "SELECT ... FROM person",
//!       "key": "id",                     primary key column
//!       "rowCountColumn": "row_count",   query column carrying total rows
//!       "pageSize": 50,                  server page size (needs rowCountColumn)
//!       "argType": ["INT", "TIMESTAMP"]  retrieval argument types
//!   },
//!   "columns": [
//!       {
//!           "name": "id", "dbName": "person.id", "type": "INT",
//!           "update": false, "required": true, "limit": 0, "style": "edit",
//!           "values": [], "dddbName": "", "dddbDisplayColumn": "", "dddbDataColumn": ""
//!       },
//!       ...
//!   ]
//! }
//! ```
//!
//! Descriptors are plain data. All derived state (positional indices, the
//! updatable set, resolved dropdown values) lives on the immutable
//! [`CompiledSchema`] produced by [`CompiledSchema::compile`]; a descriptor
//! is never mutated after parse.

mod compile;

pub use compile::{ColumnMeta, CompiledSchema};

use crate::error::Error;
use crate::types::DataType;
use eyre::Result;
use serde::Deserialize;
use std::path::Path;

/// One display-value/data-value pair of a dropdown column.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ValuePair {
    #[serde(rename = "displayValue")]
    pub display: String,
    #[serde(rename = "dataValue")]
    pub data: String,
}

/// Column presentation style. Opaque to the engine except for `Dddb`,
/// which triggers nested value resolution at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Style {
    Edit,
    Ddlb,
    Dddb,
    Checkbox,
    Radiobutton,
    Pwd,
    EditDate,
    EditTime,
    EditTs,
    /// Empty or unknown style string; nonvisual columns.
    #[default]
    Unstyled,
}

// Unknown style strings degrade to Unstyled rather than rejecting the
// descriptor; styles are presentation hints, not engine contract.
impl<'de> Deserialize<'de> for Style {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Style, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Ok(match text.as_str() {
            "edit" => Style::Edit,
            "ddlb" => Style::Ddlb,
            "dddb" => Style::Dddb,
            "checkbox" => Style::Checkbox,
            "radiobutton" => Style::Radiobutton,
            "pwd" => Style::Pwd,
            "edit_date" => Style::EditDate,
            "edit_time" => Style::EditTime,
            "edit_ts" => Style::EditTs,
            _ => Style::Unstyled,
        })
    }
}

/// Declarative column description.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnDesc {
    pub name: String,
    #[serde(default)]
    pub caption: String,
    #[serde(rename = "dbName", default)]
    pub db_name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default)]
    pub update: bool,
    #[serde(default)]
    pub required: bool,
    /// Column length limit in bytes; 0 means unbounded.
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub style: Style,
    #[serde(default)]
    pub values: Vec<ValuePair>,
    #[serde(rename = "dddbName", default)]
    pub dddb_name: String,
    #[serde(rename = "dddbDisplayColumn", default)]
    pub dddb_display_col: String,
    #[serde(rename = "dddbDataColumn", default)]
    pub dddb_data_col: String,
}

/// Declarative table description.
#[derive(Debug, Clone, Deserialize)]
pub struct TableDesc {
    #[serde(rename = "updateTableName", default)]
    pub update_table: String,
    #[serde(rename = "select")]
    pub query: String,
    #[serde(rename = "key")]
    pub key_col: String,
    #[serde(rename = "rowCountColumn", default)]
    pub row_count_col: String,
    #[serde(rename = "pageSize", default)]
    pub page_size: u32,
    #[serde(rename = "argType", default)]
    pub arg_types: Vec<DataType>,
}

/// A complete schema description: name, table section, ordered columns.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaDesc {
    pub name: String,
    #[serde(default)]
    pub title: String,
    pub table: TableDesc,
    pub columns: Vec<ColumnDesc>,
}

impl SchemaDesc {
    /// Parses a descriptor from its JSON text.
    pub fn from_json(json: &str) -> Result<SchemaDesc> {
        let desc: SchemaDesc = serde_json::from_str(json)
            .map_err(|e| Error::schema(format!("descriptor parse failure: {e}")))?;
        Ok(desc)
    }

    /// Parses a descriptor from a JSON stream.
    pub fn from_reader(reader: impl std::io::Read) -> Result<SchemaDesc> {
        let desc: SchemaDesc = serde_json::from_reader(reader)
            .map_err(|e| Error::schema(format!("descriptor parse failure: {e}")))?;
        Ok(desc)
    }

    /// Loads and parses a descriptor file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<SchemaDesc> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::schema(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&json)
    }
}
