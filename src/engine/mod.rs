//! # Data Buffer Engine
//!
//! `DataBuffer` is the live container: compiled schema, row store, mutation
//! plan and retrieval state in one place. It owns the full lifecycle of one
//! buffer:
//!
//! ```text
//! retrieve(args) ──▶ rows installed, cursor on row 1
//!      │
//!      ├─ next_page / previous_page      (server paging only)
//!      │
//! edit values / insert_row
//!      │
//! save / save_row / save_batch ──▶ generated DML or procedure call
//! ```
//!
//! ## Connection Discipline
//!
//! Connections are checked out per operation and dropped when it finishes.
//! Server paging is the exception: the retrieval connection stays open so
//! `next_page` and `previous_page` see a stable window, and is released by
//! [`DataBuffer::close`] (or drop). The open/closed state is explicit in
//! [`PagingConn`]; there is exactly one release path.
//!
//! ## Save Semantics
//!
//! Saves operate on the current row. A read-only plan saves nothing; a
//! Retrieve or Unknown operation saves nothing. Inserts capture generated
//! keys into the return-value list; updates capture the key column text;
//! procedure calls capture the procedure's return value and any warning.

use crate::backend::{Connection, Environment, PageWindow};
use crate::error::Error;
use crate::rowset::RowStore;
use crate::schema::{CompiledSchema, ValuePair};
use crate::sql::{AppendWhere, MutationPlan, MutationStatement, QueryRewriter};
use crate::types::{Operation, Value};
use eyre::Result;
use std::sync::Arc;

/// Paged-retrieval connection state.
enum PagingConn {
    Closed,
    Open(Box<dyn Connection>),
}

/// Schema-driven, scrollable, writable row container.
pub struct DataBuffer {
    schema: Arc<CompiledSchema>,
    env: Environment,
    store: RowStore,
    plan: MutationPlan,
    /// Effective select text; starts as the schema query, replaced by
    /// `set_predicate` / `set_command`.
    command: String,
    /// Arguments of the last retrieval, re-bound by page fetches.
    args: Vec<Value>,
    /// Current page, one-based. Meaningful only under server paging.
    page: u32,
    /// Total row count reported by the row count column, when paging.
    total_rows: u64,
    paging: PagingConn,
    return_value: Vec<String>,
    rewriter: Box<dyn QueryRewriter>,
}

impl DataBuffer {
    /// Creates a buffer over a compiled schema. The mutation plan is frozen
    /// here; the buffer is empty until the first retrieval.
    pub fn new(schema: Arc<CompiledSchema>, env: Environment) -> DataBuffer {
        let plan = MutationPlan::build(&schema);
        let store = RowStore::new(schema.column_count());
        let command = schema.query().to_string();
        DataBuffer {
            schema,
            env,
            store,
            plan,
            command,
            args: Vec::new(),
            page: 1,
            total_rows: 0,
            paging: PagingConn::Closed,
            return_value: Vec::new(),
            rewriter: Box::new(AppendWhere),
        }
    }

    /// Loads, compiles and wraps the named schema in one step.
    pub fn open(name: &str, env: &Environment) -> Result<DataBuffer> {
        let desc = env.descriptor(name)?;
        let schema = CompiledSchema::compile(&desc, env)?;
        Ok(DataBuffer::new(schema, env.clone()))
    }

    pub fn schema(&self) -> &CompiledSchema {
        &self.schema
    }

    pub fn plan(&self) -> &MutationPlan {
        &self.plan
    }

    /// The select text the next retrieval will run.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Replaces the select text outright.
    pub fn set_command(&mut self, sql: impl Into<String>) {
        self.command = sql.into();
    }

    /// Narrows the schema query with an extra predicate via the rewriter.
    /// Always starts from the schema query, so predicates do not stack.
    pub fn set_predicate(&mut self, predicate: &str) {
        self.command = self.rewriter.rewrite(self.schema.query(), predicate);
    }

    pub fn set_rewriter(&mut self, rewriter: Box<dyn QueryRewriter>) {
        self.rewriter = rewriter;
    }

    /// Return values captured by the last save: generated keys, key text or
    /// procedure results.
    pub fn return_value(&self) -> &[String] {
        &self.return_value
    }

    // ------------------------------------------------------------------
    // Retrieval and paging
    // ------------------------------------------------------------------

    /// Runs the current command and installs the result rows. Returns the
    /// retrieved row count: the row-count column's total under server
    /// paging, the in-memory size otherwise.
    ///
    /// Under server paging this resets to page 1, holds the connection open
    /// for subsequent page fetches and reads the total row count from the
    /// row count column of the first row.
    pub fn retrieve(&mut self, args: &[Value]) -> Result<u64> {
        self.args = args.to_vec();
        tracing::debug!(schema = %self.schema.name(), sql = %self.command, "retrieve");
        if self.schema.server_paging() {
            self.page = 1;
            self.total_rows = 0;
            let window = PageWindow {
                offset: 0,
                limit: self.schema.page_size() as u64,
            };
            let rows = self.paged_query(window)?;
            self.install_page(rows);
            Ok(self.total_rows)
        } else {
            self.close_conn();
            let mut conn = self.env.connect(Operation::Retrieve)?;
            let rows = conn
                .query(&self.command, &self.args, None)
                .map_err(|e| e.wrap_err(Error::Statement(self.command.clone())))?;
            self.store.install(rows);
            Ok(self.store.row_count() as u64)
        }
    }

    /// Retrieves with an extra predicate. A blank predicate restores the
    /// plain schema query; otherwise the rewriter folds it in.
    pub fn retrieve_where(&mut self, args: &[Value], predicate: &str) -> Result<u64> {
        if predicate.trim().is_empty() {
            self.command = self.schema.query().to_string();
        } else {
            self.set_predicate(predicate);
        }
        self.retrieve(args)
    }

    /// Fetches the next page of a paged retrieval. Returns false, leaving
    /// the buffer unchanged, when paging is off or no further rows exist.
    pub fn next_page(&mut self) -> Result<bool> {
        if !self.schema.server_paging() || matches!(self.paging, PagingConn::Closed) {
            return Ok(false);
        }
        let size = self.schema.page_size() as u64;
        let window = PageWindow {
            offset: self.page as u64 * size,
            limit: size,
        };
        let rows = self.paged_query(window)?;
        if rows.is_empty() {
            return Ok(false);
        }
        self.store.install(rows);
        self.page += 1;
        Ok(true)
    }

    /// Fetches the previous page of a paged retrieval. Returns false on the
    /// first page or when paging is off.
    pub fn previous_page(&mut self) -> Result<bool> {
        if !self.schema.server_paging()
            || matches!(self.paging, PagingConn::Closed)
            || self.page <= 1
        {
            return Ok(false);
        }
        let size = self.schema.page_size() as u64;
        let window = PageWindow {
            offset: (self.page as u64 - 2) * size,
            limit: size,
        };
        let rows = self.paged_query(window)?;
        if rows.is_empty() {
            return Ok(false);
        }
        self.store.install(rows);
        self.page -= 1;
        Ok(true)
    }

    /// Current page number, one-based.
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Total rows reported by the row count column on the last paged
    /// retrieval.
    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    /// Runs the command through the held paging connection, opening it on
    /// first use.
    fn paged_query(&mut self, window: PageWindow) -> Result<Vec<Vec<Value>>> {
        if matches!(self.paging, PagingConn::Closed) {
            self.paging = PagingConn::Open(self.env.connect(Operation::Retrieve)?);
        }
        let PagingConn::Open(conn) = &mut self.paging else {
            unreachable!("paging connection opened above");
        };
        conn.query(&self.command, &self.args, Some(window))
            .map_err(|e| e.wrap_err(Error::Statement(self.command.clone())))
    }

    /// Installs a page and harvests the total row count from its first row.
    fn install_page(&mut self, rows: Vec<Vec<Value>>) {
        self.store.install(rows);
        let (Some(idx), Some(row)) = (self.schema.row_count_index(), self.store.current()) else {
            return;
        };
        match row.get(idx).map(Value::as_row_count) {
            Some(Ok(n)) => self.total_rows = n,
            Some(Err(e)) => {
                tracing::warn!(schema = %self.schema.name(), error = %e, "bad row count value")
            }
            None => {
                tracing::warn!(schema = %self.schema.name(), "result row narrower than the schema")
            }
        }
    }

    /// Releases the paging connection, if open. The single release path.
    pub fn close_conn(&mut self) {
        if matches!(self.paging, PagingConn::Open(_)) {
            tracing::debug!(schema = %self.schema.name(), "releasing paging connection");
            self.paging = PagingConn::Closed;
        }
    }

    /// Releases backend resources and drops the buffered rows. The buffer
    /// stays usable; the next paged retrieval opens a fresh connection.
    pub fn close(&mut self) {
        self.close_conn();
        self.store.clear();
    }

    // ------------------------------------------------------------------
    // Row access
    // ------------------------------------------------------------------

    pub fn store(&self) -> &RowStore {
        &self.store
    }

    /// Positional store write, for codec paths that already resolved the
    /// column index.
    pub(crate) fn store_set(&mut self, col: usize, value: Value) -> bool {
        self.store.set_value(col, value)
    }

    pub fn row_count(&self) -> usize {
        self.store.row_count()
    }

    pub fn cursor(&self) -> usize {
        self.store.cursor()
    }

    pub fn relative(&mut self, delta: i64) -> bool {
        self.store.relative(delta)
    }

    pub fn move_to(&mut self, row: usize) -> bool {
        self.store.move_to(row)
    }

    pub fn first(&mut self) -> bool {
        self.store.first()
    }

    pub fn last(&mut self) -> bool {
        self.store.last()
    }

    pub fn next(&mut self) -> bool {
        self.store.next()
    }

    pub fn previous(&mut self) -> bool {
        self.store.previous()
    }

    /// Stages one all-null insert row and makes it current. Returns its
    /// one-based row number.
    pub fn insert_row(&mut self) -> usize {
        self.store.insert_row()
    }

    /// Stages `n` insert rows; the last one becomes current. Returns the
    /// row number of the first staged row.
    pub fn insert_rows(&mut self, n: usize) -> usize {
        let first = self.store.row_count() + 1;
        for _ in 0..n {
            self.store.insert_row();
        }
        first
    }

    /// Stages fully-populated rows, values in column declaration order.
    /// Returns the buffer's new row count.
    pub fn insert_data(&mut self, rows: Vec<Vec<Value>>) -> Result<usize> {
        for row in rows {
            eyre::ensure!(
                row.len() == self.schema.column_count(),
                "row of {} values for a {}-column schema",
                row.len(),
                self.schema.column_count()
            );
            self.store.insert_row();
            for (i, value) in row.into_iter().enumerate() {
                self.store.set_value(i, value);
            }
        }
        Ok(self.store.row_count())
    }

    /// Value of the named column in the current row.
    pub fn value(&self, column: &str) -> Option<&Value> {
        let idx = self.schema.column_index(column)?;
        self.store.value(idx)
    }

    /// Text rendering of the named column in the current row. None when
    /// the value is null or there is no current row.
    pub fn text(&self, column: &str) -> Option<String> {
        self.value(column).and_then(Value::to_text)
    }

    /// Stores a value into the named column of the current row.
    pub fn set_value(&mut self, column: &str, value: Value) -> Result<()> {
        let idx = self
            .schema
            .column_index(column)
            .ok_or_else(|| Error::schema(format!("no such column: {column}")))?;
        if !self.store.set_value(idx, value) {
            eyre::bail!("no current row");
        }
        Ok(())
    }

    /// Parses text per the column's declared type and stores it.
    pub fn set_text(&mut self, column: &str, text: &str) -> Result<()> {
        let meta = self
            .schema
            .column(column)
            .ok_or_else(|| Error::schema(format!("no such column: {column}")))?;
        let value = Value::parse_text(text, meta.data_type)
            .map_err(|_| Error::conversion(column, text))?;
        let idx = meta.index;
        if !self.store.set_value(idx, value) {
            eyre::bail!("no current row");
        }
        Ok(())
    }

    /// Every row rendered as text, in row order. Null values render as None.
    pub fn data_as_text(&self) -> Vec<Vec<Option<String>>> {
        self.store
            .rows()
            .map(|row| row.iter().map(Value::to_text).collect())
            .collect()
    }

    /// Harvests display/data pairs from two named columns across all rows.
    /// Null values contribute empty strings.
    pub fn value_pairs(&self, display_col: &str, data_col: &str) -> Result<Vec<ValuePair>> {
        let display = self
            .schema
            .column_index(display_col)
            .ok_or_else(|| Error::schema(format!("no such column: {display_col}")))?;
        let data = self
            .schema
            .column_index(data_col)
            .ok_or_else(|| Error::schema(format!("no such column: {data_col}")))?;
        Ok(self
            .store
            .rows()
            .map(|row| ValuePair {
                display: row.get(display).and_then(Value::to_text).unwrap_or_default(),
                data: row.get(data).and_then(Value::to_text).unwrap_or_default(),
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Saving
    // ------------------------------------------------------------------

    /// Saves the current row under the given operation. Returns the rows
    /// affected; zero for read-only plans, non-mutating operations or when
    /// no row is current.
    pub fn save(&mut self, op: Operation) -> Result<u64> {
        let Some(stmt) = self.plan.statement(op) else {
            return Ok(0);
        };
        let Some(params) = self.bind_params(stmt)? else {
            return Ok(0);
        };
        let stmt = stmt.clone();
        tracing::debug!(schema = %self.schema.name(), sql = %stmt.text, op = op.code(), "save");
        let mut conn = self.env.connect(op)?;
        // The return-value list is replaced only once the statement has
        // succeeded; a failed save keeps the previous capture.
        if self.plan.is_procedure() {
            let result = conn
                .call(&stmt.text, op, &params)
                .map_err(|e| e.wrap_err(Error::Statement(stmt.text.clone())))?;
            self.return_value.clear();
            if let Some(ret) = result.return_value {
                self.return_value.push(ret);
            }
            if let Some(warning) = result.warning {
                self.return_value.push(warning);
            }
            return Ok(result.rows_affected);
        }
        let want_keys = op == Operation::Insert;
        let result = conn
            .execute(&stmt.text, &params, want_keys)
            .map_err(|e| e.wrap_err(Error::Statement(stmt.text.clone())))?;
        self.return_value.clear();
        match op {
            Operation::Insert => {
                self.return_value
                    .extend(result.generated_keys.iter().filter_map(Value::to_text));
            }
            Operation::Update => {
                if let Some(key) = self
                    .schema
                    .key_index()
                    .and_then(|i| self.store.value(i))
                    .and_then(Value::to_text)
                {
                    self.return_value.push(key);
                }
            }
            _ => {}
        }
        Ok(result.rows_affected)
    }

    /// Moves to a row and saves it. A row outside the buffer saves nothing.
    pub fn save_row(&mut self, row: usize, op: Operation) -> Result<u64> {
        if !self.store.move_to(row) {
            return Ok(0);
        }
        self.save(op)
    }

    /// Saves every row under one operation as a single driver batch.
    /// Returns the total rows affected.
    pub fn save_batch(&mut self, op: Operation) -> Result<u64> {
        let Some(stmt) = self.plan.statement(op) else {
            return Ok(0);
        };
        if self.store.is_empty() {
            return Ok(0);
        }
        let stmt = stmt.clone();
        let cursor = self.store.cursor();
        let mut batch = Vec::with_capacity(self.store.row_count());
        for row in 1..=self.store.row_count() {
            self.store.move_to(row);
            if let Some(params) = self.bind_params(&stmt)? {
                batch.push(params);
            }
        }
        self.store.move_to(cursor);
        tracing::debug!(
            schema = %self.schema.name(),
            sql = %stmt.text,
            rows = batch.len(),
            "batch save"
        );
        let mut conn = self.env.connect(op)?;
        let affected = if self.plan.is_procedure() {
            let rows: Vec<(Operation, Vec<Value>)> =
                batch.into_iter().map(|p| (op, p)).collect();
            conn.call_batch(&stmt.text, &rows)
        } else {
            conn.execute_batch(&stmt.text, &batch)
        }
        .map_err(|e| {
            let detail = e.root_cause().to_string();
            e.wrap_err(Error::Batch {
                statement: stmt.text.clone(),
                detail,
            })
        })?;
        Ok(affected)
    }

    /// Binds the statement's parameter columns from the current row, in
    /// binding order. None when no row is current.
    fn bind_params(&self, stmt: &MutationStatement) -> Result<Option<Vec<Value>>> {
        if self.store.cursor() == 0 {
            return Ok(None);
        }
        let mut params = Vec::with_capacity(stmt.params.len());
        for name in &stmt.params {
            let idx = self
                .schema
                .column_index(name)
                .ok_or_else(|| Error::schema(format!("no such column: {name}")))?;
            let value = self.store.value(idx).cloned().unwrap_or(Value::Null);
            params.push(value);
        }
        Ok(Some(params))
    }
}

impl Drop for DataBuffer {
    fn drop(&mut self) {
        self.close_conn();
    }
}
