//! # Row Storage and Cursor
//!
//! `RowStore` holds the materialized rows of one buffer together with a
//! one-based cursor. Row 0 means "no current row"; after a retrieval the
//! cursor sits on the first row when there is one.
//!
//! Cursor motion never fails loudly: a move that would land outside the row
//! set returns `false` and leaves the cursor where it was. This mirrors how
//! scrolling result sets behave and lets callers probe with `relative`
//! without bookkeeping.
//!
//! The store is schema-agnostic. It knows the column count, nothing else;
//! name-to-position mapping lives on the compiled schema.

use crate::types::Value;

/// Materialized rows plus a one-based cursor.
#[derive(Debug, Clone)]
pub struct RowStore {
    columns: usize,
    rows: Vec<Vec<Value>>,
    /// One-based current row; 0 when no row is current.
    cursor: usize,
}

impl RowStore {
    pub fn new(columns: usize) -> RowStore {
        RowStore {
            columns,
            rows: Vec::new(),
            cursor: 0,
        }
    }

    /// Replaces the contents with freshly retrieved rows and puts the
    /// cursor on the first row (or nowhere when empty).
    pub fn install(&mut self, rows: Vec<Vec<Value>>) {
        self.rows = rows;
        self.cursor = if self.rows.is_empty() { 0 } else { 1 };
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.cursor = 0;
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.columns
    }

    /// Current row number, one-based; 0 when no row is current.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Moves the cursor by `delta` rows. Returns false and stays put when
    /// the target is outside the row set.
    pub fn relative(&mut self, delta: i64) -> bool {
        let target = self.cursor as i64 + delta;
        if target >= 1 && target <= self.rows.len() as i64 {
            self.cursor = target as usize;
            true
        } else {
            false
        }
    }

    /// Moves the cursor to the given one-based row.
    pub fn move_to(&mut self, row: usize) -> bool {
        self.relative(row as i64 - self.cursor as i64)
    }

    pub fn first(&mut self) -> bool {
        self.move_to(1)
    }

    pub fn last(&mut self) -> bool {
        self.move_to(self.rows.len())
    }

    pub fn next(&mut self) -> bool {
        self.relative(1)
    }

    pub fn previous(&mut self) -> bool {
        self.relative(-1)
    }

    /// Appends an all-null staging row and makes it current. Returns its
    /// one-based row number.
    pub fn insert_row(&mut self) -> usize {
        self.rows.push(vec![Value::Null; self.columns]);
        self.cursor = self.rows.len();
        self.cursor
    }

    /// Value at `col` in the current row. None when no row is current or
    /// the column is out of range.
    pub fn value(&self, col: usize) -> Option<&Value> {
        self.current().and_then(|row| row.get(col))
    }

    /// Stores `value` at `col` in the current row. Returns false when no
    /// row is current or the column is out of range.
    pub fn set_value(&mut self, col: usize, value: Value) -> bool {
        if self.cursor == 0 || col >= self.columns {
            return false;
        }
        self.rows[self.cursor - 1][col] = value;
        true
    }

    /// The current row, if any.
    pub fn current(&self) -> Option<&[Value]> {
        if self.cursor == 0 {
            None
        } else {
            Some(&self.rows[self.cursor - 1])
        }
    }

    /// Clones the current row.
    pub fn row_snapshot(&self) -> Option<Vec<Value>> {
        self.current().map(<[Value]>::to_vec)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Value]> {
        self.rows.iter().map(Vec::as_slice)
    }
}
