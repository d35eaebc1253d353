//! Shared test backend: an in-memory connector that serves canned rows,
//! records every statement it sees and counts connection checkouts.

use rowbuf::{
    Connection, Connector, Environment, ExecResult, Operation, PageWindow, ProcResult,
    SchemaDesc, SchemaSource, Value,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
pub struct Recorded {
    /// Select statements, in execution order.
    pub queries: Vec<String>,
    /// DML statements with their bound parameters.
    pub executes: Vec<(String, Vec<Value>)>,
    /// Batched DML: statement text and batch size.
    pub batches: Vec<(String, usize)>,
    /// Procedure calls: call text and operation code.
    pub calls: Vec<(String, i32)>,
}

/// Canned backend. Every connection it hands out serves the same rows and
/// writes into the same statement log.
pub struct MockBackend {
    rows: Vec<Vec<Value>>,
    generated_keys: Vec<Value>,
    proc_return: Option<String>,
    proc_warning: Option<String>,
    connects: AtomicUsize,
    fail_writes: Arc<AtomicBool>,
    recorded: Arc<Mutex<Recorded>>,
}

impl MockBackend {
    pub fn new(rows: Vec<Vec<Value>>) -> Arc<MockBackend> {
        let mut backend = MockBackend::plain();
        backend.rows = rows;
        Arc::new(backend)
    }

    pub fn with_generated_keys(keys: Vec<Value>) -> Arc<MockBackend> {
        let mut backend = MockBackend::plain();
        backend.generated_keys = keys;
        Arc::new(backend)
    }

    pub fn with_proc_results(ret: &str, warning: Option<&str>) -> Arc<MockBackend> {
        let mut backend = MockBackend::plain();
        backend.proc_return = Some(ret.to_string());
        backend.proc_warning = warning.map(str::to_string);
        Arc::new(backend)
    }

    fn plain() -> MockBackend {
        MockBackend {
            rows: Vec::new(),
            generated_keys: Vec::new(),
            proc_return: None,
            proc_warning: None,
            connects: AtomicUsize::new(0),
            fail_writes: Arc::default(),
            recorded: Arc::default(),
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Makes every subsequent write (execute/call/batch) fail.
    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub fn recorded(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap()
    }
}

impl Connector for MockBackend {
    fn connect(&self, _op: Operation) -> eyre::Result<Box<dyn Connection>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConn {
            rows: self.rows.clone(),
            keys: self.generated_keys.clone(),
            proc_return: self.proc_return.clone(),
            proc_warning: self.proc_warning.clone(),
            fail_writes: Arc::clone(&self.fail_writes),
            recorded: Arc::clone(&self.recorded),
        }))
    }
}

struct MockConn {
    rows: Vec<Vec<Value>>,
    keys: Vec<Value>,
    proc_return: Option<String>,
    proc_warning: Option<String>,
    fail_writes: Arc<AtomicBool>,
    recorded: Arc<Mutex<Recorded>>,
}

impl MockConn {
    fn check_writable(&self) -> eyre::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            eyre::bail!("constraint violation");
        }
        Ok(())
    }
}

impl Connection for MockConn {
    fn query(
        &mut self,
        sql: &str,
        _args: &[Value],
        page: Option<PageWindow>,
    ) -> eyre::Result<Vec<Vec<Value>>> {
        self.recorded.lock().unwrap().queries.push(sql.to_string());
        let rows = match page {
            None => self.rows.clone(),
            Some(w) => self
                .rows
                .iter()
                .skip(w.offset as usize)
                .take(w.limit as usize)
                .cloned()
                .collect(),
        };
        Ok(rows)
    }

    fn execute(
        &mut self,
        sql: &str,
        params: &[Value],
        want_keys: bool,
    ) -> eyre::Result<ExecResult> {
        self.check_writable()?;
        self.recorded
            .lock()
            .unwrap()
            .executes
            .push((sql.to_string(), params.to_vec()));
        Ok(ExecResult {
            rows_affected: 1,
            generated_keys: if want_keys { self.keys.clone() } else { Vec::new() },
        })
    }

    fn execute_batch(&mut self, sql: &str, rows: &[Vec<Value>]) -> eyre::Result<u64> {
        self.check_writable()?;
        self.recorded
            .lock()
            .unwrap()
            .batches
            .push((sql.to_string(), rows.len()));
        Ok(rows.len() as u64)
    }

    fn call(&mut self, call: &str, op: Operation, _params: &[Value]) -> eyre::Result<ProcResult> {
        self.check_writable()?;
        self.recorded
            .lock()
            .unwrap()
            .calls
            .push((call.to_string(), op.code()));
        Ok(ProcResult {
            rows_affected: 1,
            return_value: self.proc_return.clone(),
            warning: self.proc_warning.clone(),
        })
    }

    fn call_batch(&mut self, call: &str, rows: &[(Operation, Vec<Value>)]) -> eyre::Result<u64> {
        self.check_writable()?;
        let mut recorded = self.recorded.lock().unwrap();
        for (op, _) in rows {
            recorded.calls.push((call.to_string(), op.code()));
        }
        Ok(rows.len() as u64)
    }
}

/// Descriptor store over literal JSON strings.
pub struct MapSource {
    descriptors: HashMap<String, String>,
}

impl MapSource {
    pub fn new(entries: &[(&str, &str)]) -> Arc<MapSource> {
        Arc::new(MapSource {
            descriptors: entries
                .iter()
                .map(|(name, json)| (name.to_string(), json.to_string()))
                .collect(),
        })
    }
}

impl SchemaSource for MapSource {
    fn descriptor(&self, name: &str) -> eyre::Result<SchemaDesc> {
        let json = self
            .descriptors
            .get(name)
            .ok_or_else(|| eyre::eyre!("no descriptor named {name}"))?;
        SchemaDesc::from_json(json)
    }
}

/// Environment over a mock backend with no descriptor store.
pub fn env(backend: &Arc<MockBackend>) -> Environment {
    Environment::new(backend.clone(), MapSource::new(&[]))
}

/// Environment over a mock backend and literal descriptors.
pub fn env_with_schemas(backend: &Arc<MockBackend>, entries: &[(&str, &str)]) -> Environment {
    Environment::new(backend.clone(), MapSource::new(entries))
}
