//! End-to-end buffer behavior over a recording mock backend: retrieval,
//! server paging, saving and dropdown resolution.

mod common;

use common::{env, env_with_schemas, MockBackend};
use rowbuf::{CompiledSchema, DataBuffer, Operation, SchemaDesc, Value};
use std::sync::Arc;

const PERSON: &str = r#"{
    "name": "person_buffer",
    "table": {
        "updateTableName": "person",
        "select": "select id, name, age from person",
        "key": "id"
    },
    "columns": [
        {"name": "id", "type": "INT", "required": true},
        {"name": "name", "type": "STRING", "update": true, "limit": 20},
        {"name": "age", "type": "INT", "update": true}
    ]
}"#;

const PAGED: &str = r#"{
    "name": "event_log",
    "table": {
        "select": "select id, label, total from events",
        "key": "id",
        "rowCountColumn": "total",
        "pageSize": 10
    },
    "columns": [
        {"name": "id", "type": "INT"},
        {"name": "label", "type": "STRING", "limit": 20},
        {"name": "total", "type": "INT"}
    ]
}"#;

fn person_rows() -> Vec<Vec<Value>> {
    vec![
        vec![Value::Int(1), Value::String("ann".into()), Value::Int(34)],
        vec![Value::Int(2), Value::String("bo".into()), Value::Int(19)],
    ]
}

fn person_buffer(backend: &Arc<MockBackend>) -> DataBuffer {
    let desc = SchemaDesc::from_json(PERSON).unwrap();
    let env = env(backend);
    let schema = CompiledSchema::compile(&desc, &env).unwrap();
    DataBuffer::new(schema, env)
}

fn paged_buffer(backend: &Arc<MockBackend>) -> DataBuffer {
    let desc = SchemaDesc::from_json(PAGED).unwrap();
    let env = env(backend);
    let schema = CompiledSchema::compile(&desc, &env).unwrap();
    DataBuffer::new(schema, env)
}

mod retrieval {
    use super::*;

    #[test]
    fn installs_rows_and_positions_cursor() {
        let backend = MockBackend::new(person_rows());
        let mut db = person_buffer(&backend);
        assert_eq!(db.retrieve(&[]).unwrap(), 2);
        assert_eq!(db.cursor(), 1);
        assert_eq!(db.text("name").as_deref(), Some("ann"));
        assert!(db.next());
        assert_eq!(db.text("name").as_deref(), Some("bo"));
        assert_eq!(backend.connect_count(), 1);
    }

    #[test]
    fn predicate_narrows_the_schema_query_without_stacking() {
        let backend = MockBackend::new(person_rows());
        let mut db = person_buffer(&backend);
        db.set_predicate("age > 21");
        db.set_predicate("age > 30");
        db.retrieve(&[]).unwrap();
        assert_eq!(
            backend.recorded().queries,
            ["select id, name, age from person where (age > 30)"]
        );
    }

    #[test]
    fn empty_result_leaves_no_current_row() {
        let backend = MockBackend::new(Vec::new());
        let mut db = person_buffer(&backend);
        assert_eq!(db.retrieve(&[]).unwrap(), 0);
        assert_eq!(db.cursor(), 0);
        assert!(db.text("name").is_none());
    }

    #[test]
    fn open_compiles_the_named_descriptor() {
        let backend = MockBackend::new(person_rows());
        let env = env_with_schemas(&backend, &[("person_buffer", PERSON)]);
        let mut db = DataBuffer::open("person_buffer", &env).unwrap();
        assert_eq!(db.schema().name(), "person_buffer");
        assert_eq!(db.retrieve(&[]).unwrap(), 2);
        assert!(DataBuffer::open("missing", &env).is_err());
    }
}

mod paging {
    use super::*;

    fn event_rows(total: usize) -> Vec<Vec<Value>> {
        (0..total)
            .map(|i| {
                vec![
                    Value::Int(i as i32),
                    Value::String(format!("event-{i}")),
                    Value::Int(total as i32),
                ]
            })
            .collect()
    }

    #[test]
    fn first_page_carries_the_total_row_count() {
        let backend = MockBackend::new(event_rows(25));
        let mut db = paged_buffer(&backend);
        assert_eq!(db.retrieve(&[]).unwrap(), 25);
        assert_eq!(db.row_count(), 10);
        assert_eq!(db.page(), 1);
        assert_eq!(db.total_rows(), 25);
        assert_eq!(db.value("id"), Some(&Value::Int(0)));
    }

    #[test]
    fn page_fetches_share_one_connection() {
        let backend = MockBackend::new(event_rows(25));
        let mut db = paged_buffer(&backend);
        db.retrieve(&[]).unwrap();

        assert!(db.next_page().unwrap());
        assert_eq!(db.page(), 2);
        assert_eq!(db.value("id"), Some(&Value::Int(10)));

        assert!(db.next_page().unwrap());
        assert_eq!(db.page(), 3);
        assert_eq!(db.row_count(), 5);

        // Past the last page: unchanged.
        assert!(!db.next_page().unwrap());
        assert_eq!(db.page(), 3);
        assert_eq!(db.row_count(), 5);

        assert!(db.previous_page().unwrap());
        assert_eq!(db.page(), 2);
        assert_eq!(db.value("id"), Some(&Value::Int(10)));

        assert_eq!(backend.connect_count(), 1);
    }

    #[test]
    fn first_page_refuses_previous() {
        let backend = MockBackend::new(event_rows(5));
        let mut db = paged_buffer(&backend);
        db.retrieve(&[]).unwrap();
        assert!(!db.previous_page().unwrap());
        assert_eq!(db.page(), 1);
    }

    #[test]
    fn close_releases_the_held_connection() {
        let backend = MockBackend::new(event_rows(25));
        let mut db = paged_buffer(&backend);
        db.retrieve(&[]).unwrap();
        db.close();
        assert!(!db.next_page().unwrap());

        // A fresh retrieval opens a fresh connection.
        db.retrieve(&[]).unwrap();
        assert_eq!(backend.connect_count(), 2);
    }

    #[test]
    fn unpaged_schemas_have_no_pages() {
        let backend = MockBackend::new(person_rows());
        let mut db = person_buffer(&backend);
        db.retrieve(&[]).unwrap();
        assert!(!db.next_page().unwrap());
        assert!(!db.previous_page().unwrap());
    }

    #[test]
    fn narrow_result_rows_do_not_break_the_row_count() {
        // Rows missing the declared row-count column entirely.
        let backend = MockBackend::new(vec![vec![Value::Int(0)], vec![Value::Int(1)]]);
        let mut db = paged_buffer(&backend);
        assert_eq!(db.retrieve(&[]).unwrap(), 0);
        assert_eq!(db.row_count(), 2);
        assert_eq!(db.total_rows(), 0);
    }

    #[test]
    fn retrieve_resets_to_the_first_page() {
        let backend = MockBackend::new(event_rows(25));
        let mut db = paged_buffer(&backend);
        db.retrieve(&[]).unwrap();
        assert!(db.next_page().unwrap());
        db.retrieve(&[]).unwrap();
        assert_eq!(db.page(), 1);
        assert_eq!(db.value("id"), Some(&Value::Int(0)));
    }
}

mod saving {
    use super::*;

    #[test]
    fn insert_binds_updatable_columns_and_captures_keys() {
        let backend = MockBackend::with_generated_keys(vec![Value::Int(7)]);
        let mut db = person_buffer(&backend);
        db.insert_row();
        db.set_text("name", "cara").unwrap();
        db.set_text("age", "28").unwrap();

        assert_eq!(db.save(Operation::Insert).unwrap(), 1);
        let recorded = backend.recorded();
        assert_eq!(
            recorded.executes,
            [(
                "insert into person(name,age) values(?,?)".to_string(),
                vec![Value::String("cara".into()), Value::Int(28)],
            )]
        );
        drop(recorded);
        assert_eq!(db.return_value(), ["7"]);
    }

    #[test]
    fn update_keys_on_the_primary_key_and_reports_it() {
        let backend = MockBackend::new(person_rows());
        let mut db = person_buffer(&backend);
        db.retrieve(&[]).unwrap();
        db.set_text("name", "anne").unwrap();

        assert_eq!(db.save(Operation::Update).unwrap(), 1);
        let recorded = backend.recorded();
        assert_eq!(
            recorded.executes,
            [(
                "update person set name = ?,age = ? where id = ?".to_string(),
                vec![Value::String("anne".into()), Value::Int(34), Value::Int(1)],
            )]
        );
        drop(recorded);
        assert_eq!(db.return_value(), ["1"]);
    }

    #[test]
    fn delete_binds_only_the_key() {
        let backend = MockBackend::new(person_rows());
        let mut db = person_buffer(&backend);
        db.retrieve(&[]).unwrap();
        db.last();
        db.save(Operation::Delete).unwrap();
        assert_eq!(
            backend.recorded().executes,
            [(
                "delete from person where id = ?".to_string(),
                vec![Value::Int(2)],
            )]
        );
    }

    #[test]
    fn failed_save_keeps_the_previous_return_values() {
        let backend = MockBackend::with_generated_keys(vec![Value::Int(7)]);
        let mut db = person_buffer(&backend);
        db.insert_row();
        db.set_text("name", "gil").unwrap();
        db.save(Operation::Insert).unwrap();
        assert_eq!(db.return_value(), ["7"]);

        backend.fail_writes(true);
        db.insert_row();
        assert!(db.save(Operation::Insert).is_err());
        assert_eq!(db.return_value(), ["7"]);
    }

    #[test]
    fn retrieve_operation_saves_nothing() {
        let backend = MockBackend::new(person_rows());
        let mut db = person_buffer(&backend);
        db.retrieve(&[]).unwrap();
        assert_eq!(db.save(Operation::Retrieve).unwrap(), 0);
        assert_eq!(db.save(Operation::Unknown).unwrap(), 0);
        assert!(backend.recorded().executes.is_empty());
    }

    #[test]
    fn read_only_schemas_save_nothing() {
        let backend = MockBackend::new(Vec::new());
        let json = PERSON.replace("\"updateTableName\": \"person\",", "");
        let desc = SchemaDesc::from_json(&json).unwrap();
        let env = env(&backend);
        let schema = CompiledSchema::compile(&desc, &env).unwrap();
        let mut db = DataBuffer::new(schema, env);
        db.insert_row();
        assert_eq!(db.save(Operation::Insert).unwrap(), 0);
        assert_eq!(backend.connect_count(), 0);
    }

    #[test]
    fn save_row_outside_the_buffer_is_a_noop() {
        let backend = MockBackend::new(person_rows());
        let mut db = person_buffer(&backend);
        db.retrieve(&[]).unwrap();
        assert_eq!(db.save_row(99, Operation::Update).unwrap(), 0);
        assert!(backend.recorded().executes.is_empty());
    }

    #[test]
    fn batch_save_makes_one_round_trip() {
        let backend = MockBackend::new(person_rows());
        let mut db = person_buffer(&backend);
        db.retrieve(&[]).unwrap();
        let first = db.insert_rows(2);
        assert_eq!(first, 3);
        db.set_text("name", "dan").unwrap();

        assert_eq!(db.save_batch(Operation::Insert).unwrap(), 4);
        let recorded = backend.recorded();
        assert_eq!(
            recorded.batches,
            [("insert into person(name,age) values(?,?)".to_string(), 4)]
        );
        assert!(recorded.executes.is_empty());
    }
}

mod procedures {
    use super::*;

    fn proc_buffer(backend: &Arc<MockBackend>) -> DataBuffer {
        let json = PERSON.replace("\"person\",", "\"? = call save_person\",");
        let desc = SchemaDesc::from_json(&json).unwrap();
        let env = env(backend);
        let schema = CompiledSchema::compile(&desc, &env).unwrap();
        DataBuffer::new(schema, env)
    }

    #[test]
    fn mutations_route_through_the_call_with_the_op_code() {
        let backend = MockBackend::with_proc_results("42", Some("stale row"));
        let mut db = proc_buffer(&backend);
        db.insert_row();
        db.set_text("name", "eve").unwrap();

        assert_eq!(db.save(Operation::Insert).unwrap(), 1);
        assert_eq!(
            backend.recorded().calls,
            [("{ ? = call save_person(?,?,?) }".to_string(), 0)]
        );
        assert_eq!(db.return_value(), ["42", "stale row"]);
    }

    #[test]
    fn keyless_procedure_schemas_stay_writable() {
        let json = PERSON
            .replace("\"person\",", "\"? = call save_person\",")
            .replace("\"key\": \"id\"", "\"key\": \"\"");
        let backend = MockBackend::with_proc_results("9", None);
        let desc = SchemaDesc::from_json(&json).unwrap();
        let env = env(&backend);
        let schema = CompiledSchema::compile(&desc, &env).unwrap();
        let mut db = DataBuffer::new(schema, env);
        assert!(!db.plan().is_read_only());

        db.insert_row();
        db.set_text("name", "fay").unwrap();
        assert_eq!(db.save(Operation::Insert).unwrap(), 1);
        assert_eq!(
            backend.recorded().calls,
            [("{ ? = call save_person(?,?,?) }".to_string(), 0)]
        );
        assert_eq!(db.return_value(), ["9"]);
    }

    #[test]
    fn batch_calls_carry_one_op_code_per_row() {
        let backend = MockBackend::with_proc_results("0", None);
        let mut db = proc_buffer(&backend);
        db.insert_rows(3);
        assert_eq!(db.save_batch(Operation::Update).unwrap(), 3);
        let recorded = backend.recorded();
        assert_eq!(recorded.calls.len(), 3);
        assert!(recorded.calls.iter().all(|(sql, op)| {
            sql == "{ ? = call save_person(?,?,?) }" && *op == Operation::Update.code()
        }));
    }
}

mod dropdowns {
    use super::*;

    const ORDERS: &str = r#"{
        "name": "orders",
        "table": {"select": "select id, dept from orders", "key": "id"},
        "columns": [
            {"name": "id", "type": "INT"},
            {"name": "dept", "type": "INT", "style": "dddb",
             "dddbName": "depts",
             "dddbDisplayColumn": "dept_name", "dddbDataColumn": "dept_id"}
        ]
    }"#;

    const DEPTS: &str = r#"{
        "name": "depts",
        "table": {"select": "select dept_id, dept_name from dept", "key": "dept_id"},
        "columns": [
            {"name": "dept_id", "type": "INT"},
            {"name": "dept_name", "type": "STRING", "limit": 30}
        ]
    }"#;

    #[test]
    fn dddb_columns_resolve_through_their_source_schema() {
        let backend = MockBackend::new(vec![
            vec![Value::Int(1), Value::String("ops".into())],
            vec![Value::Int(2), Value::String("lab".into())],
        ]);
        let env = env_with_schemas(&backend, &[("orders", ORDERS), ("depts", DEPTS)]);
        let desc = SchemaDesc::from_json(ORDERS).unwrap();
        let schema = CompiledSchema::compile(&desc, &env).unwrap();

        let dept = schema.column("dept").unwrap();
        let pairs: Vec<(&str, &str)> = dept
            .values
            .iter()
            .map(|p| (p.display.as_str(), p.data.as_str()))
            .collect();
        assert_eq!(pairs, [("ops", "1"), ("lab", "2")]);
        assert_eq!(
            backend.recorded().queries,
            ["select dept_id, dept_name from dept"]
        );
    }

    #[test]
    fn value_pairs_tolerate_narrow_rows() {
        let backend = MockBackend::new(vec![vec![Value::Int(1)]]);
        let mut db = super::person_buffer(&backend);
        db.retrieve(&[]).unwrap();
        let pairs = db.value_pairs("name", "id").unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].display, "");
        assert_eq!(pairs[0].data, "1");
    }

    #[test]
    fn mutually_recursive_dropdowns_are_rejected() {
        let a = r#"{
            "name": "a",
            "table": {"select": "select x from a", "key": "x"},
            "columns": [{"name": "x", "type": "INT", "style": "dddb",
                         "dddbName": "b",
                         "dddbDisplayColumn": "y", "dddbDataColumn": "y"}]
        }"#;
        let b = r#"{
            "name": "b",
            "table": {"select": "select y from b", "key": "y"},
            "columns": [{"name": "y", "type": "INT", "style": "dddb",
                         "dddbName": "a",
                         "dddbDisplayColumn": "x", "dddbDataColumn": "x"}]
        }"#;
        let backend = MockBackend::new(vec![vec![Value::Int(1)]]);
        let env = env_with_schemas(&backend, &[("a", a), ("b", b)]);
        let desc = SchemaDesc::from_json(a).unwrap();
        let err = CompiledSchema::compile(&desc, &env).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }
}
