//! # Backend Abstraction
//!
//! The engine never talks to a database driver directly. It goes through
//! three seams, all object-safe so applications can plug in pools, drivers
//! and descriptor stores of their choosing:
//!
//! | Trait | Supplies |
//! |-------|----------|
//! | [`Connector`] | connections, keyed by the operation that needs one |
//! | [`Connection`] | queries, DML, batches and procedure calls |
//! | [`SchemaSource`] | schema descriptors by name |
//!
//! An [`Environment`] bundles one connector with one schema source and is
//! cheaply cloned into every buffer.
//!
//! Connections are checked out per call and dropped immediately, with one
//! exception: a buffer retrieving with server paging holds its connection
//! open across page fetches so the page window stays consistent.

use crate::schema::SchemaDesc;
use crate::types::{Operation, Value};
use eyre::Result;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Window of rows to fetch from a paged query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// Rows to skip before the first returned row.
    pub offset: u64,
    /// Maximum rows to return.
    pub limit: u64,
}

/// Outcome of a single DML execution.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// Keys generated by the statement, when they were requested.
    pub generated_keys: Vec<Value>,
}

/// Outcome of a stored-procedure call.
#[derive(Debug, Clone, Default)]
pub struct ProcResult {
    pub rows_affected: u64,
    /// The procedure's return value, rendered as text.
    pub return_value: Option<String>,
    /// First warning raised by the call, if any.
    pub warning: Option<String>,
}

/// One checked-out database connection.
pub trait Connection {
    /// Runs a select and materializes every row in the window (all rows when
    /// `page` is None). Arguments bind positionally.
    fn query(
        &mut self,
        sql: &str,
        args: &[Value],
        page: Option<PageWindow>,
    ) -> Result<Vec<Vec<Value>>>;

    /// Runs one DML statement. When `want_keys` is set the result carries
    /// any keys the statement generated.
    fn execute(&mut self, sql: &str, params: &[Value], want_keys: bool) -> Result<ExecResult>;

    /// Runs one DML statement once per parameter row, as a single batch.
    /// Returns the total rows affected.
    fn execute_batch(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<u64>;

    /// Calls a stored procedure with the operation code bound ahead of the
    /// column parameters.
    fn call(&mut self, call: &str, op: Operation, params: &[Value]) -> Result<ProcResult>;

    /// Calls a stored procedure once per row, as a single batch. Each row
    /// carries its own operation code.
    fn call_batch(&mut self, call: &str, rows: &[(Operation, Vec<Value>)]) -> Result<u64>;
}

/// Hands out connections. Implementations are typically pools; the operation
/// lets them route reads and writes differently.
pub trait Connector: Send + Sync {
    fn connect(&self, op: Operation) -> Result<Box<dyn Connection>>;
}

/// Supplies schema descriptors by name.
pub trait SchemaSource: Send + Sync {
    fn descriptor(&self, name: &str) -> Result<SchemaDesc>;
}

/// Descriptor store backed by a directory of `<name>.json` files.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> DirSource {
        DirSource { root: root.into() }
    }
}

impl SchemaSource for DirSource {
    fn descriptor(&self, name: &str) -> Result<SchemaDesc> {
        SchemaDesc::from_path(self.root.join(format!("{name}.json")))
    }
}

/// Shared runtime context: one connector, one schema source.
#[derive(Clone)]
pub struct Environment {
    connector: Arc<dyn Connector>,
    schemas: Arc<dyn SchemaSource>,
}

impl Environment {
    pub fn new(connector: Arc<dyn Connector>, schemas: Arc<dyn SchemaSource>) -> Environment {
        Environment { connector, schemas }
    }

    /// An environment with no backend. Every connection or descriptor
    /// request fails; useful for compiling self-contained schemas.
    pub fn unconnected() -> Environment {
        Environment {
            connector: Arc::new(Unconnected),
            schemas: Arc::new(Unconnected),
        }
    }

    pub fn connector(&self) -> &dyn Connector {
        self.connector.as_ref()
    }

    pub fn schemas(&self) -> &dyn SchemaSource {
        self.schemas.as_ref()
    }

    /// Checks out a connection for one operation.
    pub fn connect(&self, op: Operation) -> Result<Box<dyn Connection>> {
        self.connector.connect(op)
    }

    /// Loads and parses the named descriptor.
    pub fn descriptor(&self, name: &str) -> Result<SchemaDesc> {
        self.schemas.descriptor(name)
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment").finish_non_exhaustive()
    }
}

struct Unconnected;

impl Connector for Unconnected {
    fn connect(&self, _op: Operation) -> Result<Box<dyn Connection>> {
        eyre::bail!("no connector configured")
    }
}

impl SchemaSource for Unconnected {
    fn descriptor(&self, name: &str) -> Result<SchemaDesc> {
        eyre::bail!("no schema source configured, cannot load {name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_source_reads_named_descriptor_files() {
        let dir = tempfile::tempdir().unwrap();
        let json = r#"{
            "name": "ping",
            "table": {"select": "select 1", "key": ""},
            "columns": [{"name": "one", "type": "INT"}]
        }"#;
        std::fs::write(dir.path().join("ping.json"), json).unwrap();

        let source = DirSource::new(dir.path());
        let desc = source.descriptor("ping").unwrap();
        assert_eq!(desc.name, "ping");
        assert!(source.descriptor("absent").is_err());
    }

    #[test]
    fn unconnected_environment_refuses_everything() {
        let env = Environment::unconnected();
        assert!(env.connect(Operation::Retrieve).is_err());
        assert!(env.descriptor("anything").is_err());
    }
}
