//! Retrieval query rewriting.
//!
//! Buffers retrieve with a fixed select statement; callers can narrow a
//! retrieval by supplying an extra predicate. The rewriter decides how that
//! predicate is folded into the statement text. [`AppendWhere`] is the stock
//! implementation; callers with generated or vendor-specific SQL can supply
//! their own.

/// Folds an extra predicate into a select statement.
pub trait QueryRewriter: Send + Sync {
    /// Returns `query` narrowed by `predicate`. An empty predicate returns
    /// the query unchanged.
    fn rewrite(&self, query: &str, predicate: &str) -> String;
}

/// Textual rewriter: parenthesizes the predicate and splices it in ahead of
/// any trailing `order by` / `group by` clause, with `and` when the
/// statement already has a `where` clause.
///
/// This is string surgery, not parsing; it assumes the statement is a plain
/// select without subqueries after the last `where`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppendWhere;

impl QueryRewriter for AppendWhere {
    fn rewrite(&self, query: &str, predicate: &str) -> String {
        let predicate = predicate.trim();
        if predicate.is_empty() {
            return query.to_string();
        }
        let (head, tail) = split_at_tail_clause(query);
        let joiner = if head.to_ascii_lowercase().contains(" where ") {
            "and"
        } else {
            "where"
        };
        format!("{} {joiner} ({predicate}){tail}", head.trim_end())
    }
}

/// Splits a statement before its trailing `order by` / `group by` clause.
/// The tail keeps its leading space so the pieces re-concatenate verbatim.
fn split_at_tail_clause(query: &str) -> (&str, &str) {
    let lower = query.to_ascii_lowercase();
    let cut = [" order by ", " group by "]
        .iter()
        .filter_map(|kw| lower.rfind(kw))
        .min();
    match cut {
        Some(i) => query.split_at(i),
        None => (query, ""),
    }
}
