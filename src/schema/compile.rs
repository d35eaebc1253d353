//! # Schema Compilation
//!
//! One-shot translation of a parsed [`SchemaDesc`] into an immutable
//! [`CompiledSchema`]: positional column indices, the name lookup map, the
//! updatable column set and resolved dropdown values are all computed here,
//! once, and shared behind an `Arc` afterwards. Buffers never mutate their
//! schema.
//!
//! ## Dropdown Resolution
//!
//! A column styled `dddb` names another schema whose rows supply its
//! display/data value pairs. Resolution compiles the named schema, runs its
//! query through the environment and harvests the two named columns. Because
//! a dddb schema may itself contain dddb columns, resolution recurses; a
//! name set threaded through the recursion rejects cycles instead of looping.

use super::{ColumnDesc, SchemaDesc, Style, ValuePair};
use crate::backend::Environment;
use crate::error::Error;
use crate::types::{DataType, SqlType};
use eyre::Result;
use hashbrown::{HashMap, HashSet};
use std::sync::Arc;

/// Compiled per-column metadata.
#[derive(Debug, Clone)]
pub struct ColumnMeta {
    pub name: String,
    pub caption: String,
    pub db_name: String,
    pub data_type: DataType,
    pub sql_type: SqlType,
    pub nullable: bool,
    /// Zero-based position in the result row.
    pub index: usize,
    /// Declared byte limit; 0 means unbounded.
    pub limit: u32,
    pub style: Style,
    pub updatable: bool,
    /// Dropdown value pairs, resolved at compile time for dddb columns.
    pub values: Vec<ValuePair>,
}

/// Immutable compiled form of a schema description.
///
/// Shared via `Arc` between the owning buffer, its frames and any nested
/// dropdown buffers compiled from it.
#[derive(Debug)]
pub struct CompiledSchema {
    name: String,
    title: String,
    query: String,
    update_table: String,
    key_col: String,
    key_index: Option<usize>,
    row_count_col: String,
    row_count_index: Option<usize>,
    page_size: u32,
    arg_types: Vec<DataType>,
    columns: Vec<ColumnMeta>,
    by_name: HashMap<String, usize>,
    updatable: Vec<usize>,
}

impl CompiledSchema {
    /// Compiles a descriptor, resolving dddb dropdown values through `env`.
    pub fn compile(desc: &SchemaDesc, env: &Environment) -> Result<Arc<CompiledSchema>> {
        let mut in_progress = HashSet::new();
        in_progress.insert(desc.name.clone());
        Self::compile_inner(desc, env, &mut in_progress)
    }

    fn compile_inner(
        desc: &SchemaDesc,
        env: &Environment,
        in_progress: &mut HashSet<String>,
    ) -> Result<Arc<CompiledSchema>> {
        if desc.table.query.trim().is_empty() {
            return Err(Error::schema(format!("{}: empty select statement", desc.name)));
        }
        if desc.columns.is_empty() {
            return Err(Error::schema(format!("{}: no columns", desc.name)));
        }

        let mut columns = Vec::with_capacity(desc.columns.len());
        let mut by_name = HashMap::with_capacity(desc.columns.len());
        for (index, col) in desc.columns.iter().enumerate() {
            if col.name.is_empty() {
                return Err(Error::schema(format!(
                    "{}: column {index} has no name",
                    desc.name
                )));
            }
            if by_name.insert(col.name.clone(), index).is_some() {
                return Err(Error::schema(format!(
                    "{}: duplicate column {}",
                    desc.name, col.name
                )));
            }
            let values = resolve_values(&desc.name, col, env, in_progress)?;
            columns.push(ColumnMeta {
                name: col.name.clone(),
                caption: col.caption.clone(),
                db_name: col.db_name.clone(),
                data_type: col.data_type,
                sql_type: col.data_type.sql_type(),
                nullable: !col.required,
                index,
                limit: col.limit,
                style: col.style,
                updatable: col.update,
                values,
            });
        }

        let key_index = by_name.get(desc.table.key_col.as_str()).copied();
        let updatable: Vec<usize> = columns
            .iter()
            .filter(|c| c.updatable)
            .map(|c| c.index)
            .collect();

        if !desc.table.update_table.is_empty() {
            if desc.table.key_col.is_empty() {
                tracing::warn!(schema = %desc.name, "update table without a key column, buffer is read-only");
            } else if key_index.is_none() {
                return Err(Error::schema(format!(
                    "{}: key column {} is not in the column list",
                    desc.name, desc.table.key_col
                )));
            }
            if updatable.is_empty() {
                tracing::warn!(schema = %desc.name, "update table without updatable columns, buffer is read-only");
            }
            let table_prefix = format!("{}.", desc.table.update_table);
            for col in columns.iter().filter(|c| c.updatable) {
                if col.db_name.is_empty() {
                    tracing::warn!(
                        schema = %desc.name,
                        column = %col.name,
                        "updatable column without a db column name"
                    );
                } else if !col.db_name.starts_with(&table_prefix) {
                    tracing::warn!(
                        schema = %desc.name,
                        column = %col.name,
                        db_name = %col.db_name,
                        "db column name is not qualified by the update table"
                    );
                }
            }
        }

        let row_count_index = if desc.table.row_count_col.is_empty() {
            None
        } else {
            match by_name.get(desc.table.row_count_col.as_str()).copied() {
                Some(i) => Some(i),
                None => {
                    return Err(Error::schema(format!(
                        "{}: row count column {} is not in the column list",
                        desc.name, desc.table.row_count_col
                    )));
                }
            }
        };
        if desc.table.page_size > 0 && row_count_index.is_none() {
            tracing::warn!(
                schema = %desc.name,
                "page size without a row count column, server paging disabled"
            );
        }

        Ok(Arc::new(CompiledSchema {
            name: desc.name.clone(),
            title: desc.title.clone(),
            query: desc.table.query.clone(),
            update_table: desc.table.update_table.clone(),
            key_col: desc.table.key_col.clone(),
            key_index,
            row_count_col: desc.table.row_count_col.clone(),
            row_count_index,
            page_size: desc.table.page_size,
            arg_types: desc.table.arg_types.clone(),
            columns,
            by_name,
            updatable,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// The select statement rows are retrieved with.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Update target: a table name, a procedure call, or empty (read-only).
    pub fn update_table(&self) -> &str {
        &self.update_table
    }

    pub fn key_col(&self) -> &str {
        &self.key_col
    }

    pub fn key_index(&self) -> Option<usize> {
        self.key_index
    }

    pub fn row_count_index(&self) -> Option<usize> {
        self.row_count_index
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// True when retrievals should page on the server: a positive page size
    /// together with a row count column.
    pub fn server_paging(&self) -> bool {
        self.page_size > 0 && self.row_count_index.is_some()
    }

    /// Declared types of the retrieval arguments, in positional order.
    pub fn arg_types(&self) -> &[DataType] {
        &self.arg_types
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.by_name.get(name).map(|&i| &self.columns[i])
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Positions of the updatable columns, in declaration order.
    pub fn updatable(&self) -> &[usize] {
        &self.updatable
    }

    /// Names of the updatable columns, in declaration order.
    pub fn updatable_names(&self) -> impl Iterator<Item = &str> {
        self.updatable.iter().map(|&i| self.columns[i].name.as_str())
    }
}

/// Resolves the value pairs of one column. Non-dddb columns keep their
/// declared pairs verbatim.
fn resolve_values(
    schema: &str,
    col: &ColumnDesc,
    env: &Environment,
    in_progress: &mut HashSet<String>,
) -> Result<Vec<ValuePair>> {
    if col.style != Style::Dddb {
        return Ok(col.values.clone());
    }
    if col.dddb_name.is_empty() {
        return Err(Error::schema(format!(
            "{schema}.{}: dddb column without a source schema name",
            col.name
        )));
    }
    if col.dddb_display_col.is_empty() || col.dddb_data_col.is_empty() {
        return Err(Error::schema(format!(
            "{schema}.{}: dddb column without display/data column names",
            col.name
        )));
    }
    if !in_progress.insert(col.dddb_name.clone()) {
        return Err(Error::schema(format!(
            "{schema}.{}: dropdown cycle through {}",
            col.name, col.dddb_name
        )));
    }
    let nested_desc = env.schemas().descriptor(&col.dddb_name)?;
    let nested = CompiledSchema::compile_inner(&nested_desc, env, in_progress)?;
    in_progress.remove(&col.dddb_name);

    let mut buffer = crate::engine::DataBuffer::new(nested, env.clone());
    buffer.retrieve(&[])?;
    let pairs = buffer.value_pairs(&col.dddb_display_col, &col.dddb_data_col)?;
    tracing::debug!(
        schema = %schema,
        column = %col.name,
        source = %col.dddb_name,
        pairs = pairs.len(),
        "resolved dropdown values"
    );
    Ok(pairs)
}
