//! # Mutation Statement Planning
//!
//! A compiled schema either cannot write at all, writes through a stored
//! procedure, or writes through generated DML against its update table. The
//! decision is made once per schema and frozen as a [`MutationPlan`]:
//!
//! ```text
//! update_table                 plan
//! ---------------------------  ----------------------------------------
//! "" or no updatable columns   ReadOnly
//! contains "call"              Procedure { call: "{ <target>(?, ...) }" }
//! otherwise                    Direct { insert, update, delete }
//! ```
//!
//! Direct plans bind updatable columns in declaration order. The update and
//! delete statements key on the schema's primary key column; inserts carry
//! every updatable column. Procedure calls get one placeholder per updatable
//! column plus a leading operation-code placeholder.

mod rewrite;

pub use rewrite::{AppendWhere, QueryRewriter};

use crate::schema::CompiledSchema;
use crate::types::Operation;
use smallvec::SmallVec;

/// One executable mutation statement: text plus the names of the columns
/// bound to its placeholders, in binding order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationStatement {
    pub text: String,
    pub params: SmallVec<[String; 8]>,
}

/// Frozen write strategy for one schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationPlan {
    /// No update table or no updatable columns; saves are no-ops.
    ReadOnly,
    /// All mutations route through one stored procedure; the operation code
    /// is bound before the column parameters.
    Procedure { call: MutationStatement },
    /// Generated DML against the update table.
    Direct {
        insert: MutationStatement,
        update: MutationStatement,
        delete: MutationStatement,
    },
}

impl MutationPlan {
    /// Builds the plan for a compiled schema.
    ///
    /// A procedure target never consults the key column; only the generated
    /// update/delete statements need one.
    pub fn build(schema: &CompiledSchema) -> MutationPlan {
        let target = schema.update_table();
        let columns: SmallVec<[String; 8]> =
            schema.updatable_names().map(str::to_string).collect();
        if target.is_empty() || columns.is_empty() {
            return MutationPlan::ReadOnly;
        }
        if target.contains("call") {
            return MutationPlan::Procedure {
                call: procedure_call(target, &columns),
            };
        }
        if schema.key_index().is_none() {
            return MutationPlan::ReadOnly;
        }
        MutationPlan::Direct {
            insert: insert_statement(target, &columns),
            update: update_statement(target, &columns, schema.key_col()),
            delete: delete_statement(target, schema.key_col()),
        }
    }

    /// Picks the statement for a mutation operation. Retrieve and Unknown
    /// rows have nothing to execute.
    pub fn statement(&self, op: Operation) -> Option<&MutationStatement> {
        match self {
            MutationPlan::ReadOnly => None,
            MutationPlan::Procedure { call } => match op {
                Operation::Insert | Operation::Update | Operation::Delete => Some(call),
                Operation::Retrieve | Operation::Unknown => None,
            },
            MutationPlan::Direct {
                insert,
                update,
                delete,
            } => match op {
                Operation::Insert => Some(insert),
                Operation::Update => Some(update),
                Operation::Delete => Some(delete),
                Operation::Retrieve | Operation::Unknown => None,
            },
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, MutationPlan::ReadOnly)
    }

    pub fn is_procedure(&self) -> bool {
        matches!(self, MutationPlan::Procedure { .. })
    }
}

fn placeholders(n: usize) -> String {
    let mut s = String::with_capacity(n * 2);
    for i in 0..n {
        if i > 0 {
            s.push(',');
        }
        s.push('?');
    }
    s
}

fn procedure_call(target: &str, columns: &[String]) -> MutationStatement {
    // One placeholder for the operation code, then one per column.
    let text = format!("{{ {target}({}) }}", placeholders(columns.len() + 1));
    MutationStatement {
        text,
        params: columns.iter().cloned().collect(),
    }
}

fn insert_statement(table: &str, columns: &[String]) -> MutationStatement {
    let text = format!(
        "insert into {table}({}) values({})",
        columns.join(","),
        placeholders(columns.len())
    );
    MutationStatement {
        text,
        params: columns.iter().cloned().collect(),
    }
}

fn update_statement(table: &str, columns: &[String], key: &str) -> MutationStatement {
    let text = format!(
        "update {table} set {} where {key} = ?",
        columns.join(" = ?,") + " = ?"
    );
    let mut params: SmallVec<[String; 8]> = columns.iter().cloned().collect();
    params.push(key.to_string());
    MutationStatement { text, params }
}

fn delete_statement(table: &str, key: &str) -> MutationStatement {
    MutationStatement {
        text: format!("delete from {table} where {key} = ?"),
        params: SmallVec::from_iter([key.to_string()]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Environment;
    use crate::schema::{CompiledSchema, SchemaDesc};

    fn compile(json: &str) -> std::sync::Arc<CompiledSchema> {
        let desc = SchemaDesc::from_json(json).unwrap();
        CompiledSchema::compile(&desc, &Environment::unconnected()).unwrap()
    }

    const DIRECT: &str = r#"{
        "name": "person_buffer",
        "table": {
            "updateTableName": "person",
            "select": "select id, name, age from person",
            "key": "id"
        },
        "columns": [
            {"name": "id", "type": "INT", "update": true},
            {"name": "name", "type": "STRING", "update": true, "limit": 20},
            {"name": "age", "type": "INT", "update": true}
        ]
    }"#;

    #[test]
    fn direct_plan_generates_exact_dml() {
        let schema = compile(DIRECT);
        let MutationPlan::Direct {
            insert,
            update,
            delete,
        } = MutationPlan::build(&schema)
        else {
            panic!("expected a direct plan");
        };
        assert_eq!(insert.text, "insert into person(id,name,age) values(?,?,?)");
        assert_eq!(
            update.text,
            "update person set id = ?,name = ?,age = ? where id = ?"
        );
        assert_eq!(delete.text, "delete from person where id = ?");
        assert_eq!(insert.params.as_slice(), ["id", "name", "age"]);
        assert_eq!(update.params.as_slice(), ["id", "name", "age", "id"]);
        assert_eq!(delete.params.as_slice(), ["id"]);
    }

    #[test]
    fn procedure_target_routes_everything_through_one_call() {
        let json = DIRECT.replace("\"person\",", "\"? = call save_person\",");
        let schema = compile(&json);
        let plan = MutationPlan::build(&schema);
        let MutationPlan::Procedure { call } = &plan else {
            panic!("expected a procedure plan");
        };
        assert_eq!(call.text, "{ ? = call save_person(?,?,?,?) }");
        for op in [Operation::Insert, Operation::Update, Operation::Delete] {
            assert_eq!(plan.statement(op), Some(call));
        }
        assert_eq!(plan.statement(Operation::Retrieve), None);
    }

    #[test]
    fn procedure_plans_do_not_need_a_key_column() {
        let json = DIRECT
            .replace("\"person\",", "\"? = call save_person\",")
            .replace("\"key\": \"id\"", "\"key\": \"\"");
        let schema = compile(&json);
        let plan = MutationPlan::build(&schema);
        let MutationPlan::Procedure { call } = &plan else {
            panic!("expected a procedure plan");
        };
        assert_eq!(call.text, "{ ? = call save_person(?,?,?,?) }");
    }

    #[test]
    fn direct_plans_need_a_key_column() {
        let json = DIRECT.replace("\"key\": \"id\"", "\"key\": \"\"");
        let schema = compile(&json);
        assert!(MutationPlan::build(&schema).is_read_only());
    }

    #[test]
    fn missing_update_table_is_read_only() {
        let json = DIRECT.replace("\"updateTableName\": \"person\",", "");
        let schema = compile(&json);
        assert!(MutationPlan::build(&schema).is_read_only());
    }

    #[test]
    fn no_updatable_columns_is_read_only() {
        let json = DIRECT.replace("\"update\": true", "\"update\": false");
        let schema = compile(&json);
        assert!(MutationPlan::build(&schema).is_read_only());
    }
}
