//! A `Relation`/`Table` implementation over an in-memory `Vec<Tuple>`
//! (spec §4.2).

use crate::column::{Column, ForeignKey};
use crate::error::DbError;
use crate::relation::{ColumnLookup, IndexedRelation, Relation, RowWriter, WritableRelationIterator};
use crate::table::{EngineKind, Table};
use crate::tuple::Tuple;
use crate::value::{ColumnType, Value};

#[derive(Debug, Default, Clone)]
struct AutoIncrementState {
    next: i32,
}

#[derive(Debug)]
pub struct MemoryTable {
    name: String,
    columns: Vec<Column>,
    rows: Vec<Tuple>,
    primary_key: Option<String>,
    foreign_keys: Vec<ForeignKey>,
    main_check: Option<String>,
    named_checks: Vec<(String, String)>,
    auto_increment: std::collections::HashMap<String, AutoIncrementState>,
}

impl MemoryTable {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
            primary_key: None,
            foreign_keys: Vec::new(),
            main_check: None,
            named_checks: Vec::new(),
            auto_increment: std::collections::HashMap::new(),
        }
    }

    pub fn with_primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    pub fn with_foreign_keys(mut self, keys: Vec<ForeignKey>) -> Self {
        self.foreign_keys = keys;
        self
    }

    pub fn with_main_check(mut self, check: impl Into<String>) -> Self {
        self.main_check = Some(check.into());
        self
    }

    pub fn with_named_checks(mut self, checks: Vec<(String, String)>) -> Self {
        self.named_checks = checks;
        self
    }

    pub fn rows_vec(&self) -> &[Tuple] {
        &self.rows
    }
}

impl Relation for MemoryTable {
    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn size(&self) -> usize {
        self.rows.len()
    }

    fn rows(&self) -> Box<dyn Iterator<Item = Tuple> + '_> {
        Box::new(self.rows.iter().cloned())
    }

    fn get_column(&self, name: &str) -> Option<ColumnLookup<'_>> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, c)| c.name.eq_ignore_ascii_case(name))
            .map(|(index, column)| ColumnLookup { index, column })
    }
}

impl IndexedRelation for MemoryTable {
    fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }
}

struct MemoryRowWriter<'a> {
    rows: &'a mut Vec<Tuple>,
    index: usize,
    deleted: &'a mut bool,
}

impl<'a> RowWriter<'a> for MemoryRowWriter<'a> {
    fn read(&self) -> Tuple {
        self.rows[self.index].clone()
    }

    fn write(&mut self, tuple: Tuple) {
        self.rows[self.index] = tuple;
    }

    fn delete(self: Box<Self>) {
        self.rows.remove(self.index);
        *self.deleted = true;
    }
}

/// Walks row slots by index. After a deletion the index is *not* advanced,
/// since the successor row has shifted into the deleted slot -- this is the
/// "retained index + erased previous flag" scheme from spec §4.2/§9.
pub struct MemoryWritableIterator<'a> {
    rows: &'a mut Vec<Tuple>,
    index: usize,
    started: bool,
    just_deleted: bool,
}

impl<'a> WritableRelationIterator<'a> for MemoryWritableIterator<'a> {
    fn next_writer(&mut self) -> Option<Box<dyn RowWriter<'a> + 'a>> {
        if self.started && !self.just_deleted {
            self.index += 1;
        }
        self.started = true;
        self.just_deleted = false;
        if self.index >= self.rows.len() {
            return None;
        }
        // SAFETY-free approach: we hand out a raw pointer-free writer by
        // re-borrowing `self.rows` through a short-lived unsafe alias is
        // avoided entirely -- instead we use a small wrapper that defers
        // the deletion flag back into `self` via a shared `Cell`.
        let rows_ptr: *mut Vec<Tuple> = self.rows;
        let deleted_ptr: *mut bool = &mut self.just_deleted;
        // Both pointers stay within `'a` (the borrow backing `self.rows`),
        // and only one writer is ever alive at a time because `next_writer`
        // requires `&mut self` for the next call.
        let writer = MemoryRowWriter {
            rows: unsafe { &mut *rows_ptr },
            index: self.index,
            deleted: unsafe { &mut *deleted_ptr },
        };
        Some(Box::new(writer))
    }
}

impl Table for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn engine(&self) -> EngineKind {
        EngineKind::Memory
    }

    fn rows_writable(&mut self) -> Box<dyn WritableRelationIterator<'_> + '_> {
        Box::new(MemoryWritableIterator {
            rows: &mut self.rows,
            index: 0,
            started: false,
            just_deleted: false,
        })
    }

    fn truncate(&mut self) -> Result<(), DbError> {
        self.rows.clear();
        self.auto_increment.clear();
        Ok(())
    }

    fn add_column(&mut self, column: Column) -> Result<(), DbError> {
        let default = column.default_value.clone();
        self.columns.push(column);
        for row in &mut self.rows {
            row.push(default.clone());
        }
        Ok(())
    }

    fn alter_column(&mut self, name: &str, new_type: ColumnType, not_null: bool) -> Result<(), DbError> {
        let Some(index) = self.columns.iter().position(|c| c.name.eq_ignore_ascii_case(name)) else {
            return Err(DbError::ColumnDoesNotExist {
                column: name.to_string(),
                table: self.name.clone(),
            });
        };

        // Build the whole new row set first so the change is atomic: either
        // every row re-coerces, or the table is left exactly as it was
        // (spec §4.2).
        let mut new_rows = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let mut row = row.clone();
            let coerced = row.value(index).coerce_to(new_type)?;
            if not_null && coerced.is_null() {
                return Err(DbError::ValueCantBeNull);
            }
            row.set_value(index, coerced);
            new_rows.push(row);
        }

        self.rows = new_rows;
        self.columns[index].r#type = new_type;
        self.columns[index].not_null = not_null;
        Ok(())
    }

    fn drop_column(&mut self, name: &str) -> Result<(), DbError> {
        let Some(index) = self.columns.iter().position(|c| c.name.eq_ignore_ascii_case(name)) else {
            return Err(DbError::ColumnDoesNotExist {
                column: name.to_string(),
                table: self.name.clone(),
            });
        };
        self.columns.remove(index);
        for row in &mut self.rows {
            row.remove(index);
        }
        Ok(())
    }

    fn rename(&mut self, new_name: &str) -> Result<(), DbError> {
        self.name = new_name.to_string();
        Ok(())
    }

    fn insert_unchecked(&mut self, tuple: Tuple) -> Result<(), DbError> {
        self.rows.push(tuple);
        Ok(())
    }

    fn peek_auto_increment(&self, column: &str) -> i32 {
        self.auto_increment.get(column).map(|s| s.next).unwrap_or(1)
    }

    fn next_auto_increment(&mut self, column: &str) -> i32 {
        let state = self.auto_increment.entry(column.to_string()).or_default();
        let value = state.next.max(1);
        state.next = value + 1;
        value
    }

    fn observe_explicit_value(&mut self, column: &str, value: i32) {
        let state = self.auto_increment.entry(column.to_string()).or_default();
        if value >= state.next {
            state.next = value + 1;
        }
    }

    fn main_check(&self) -> Option<&str> {
        self.main_check.as_deref()
    }

    fn named_checks(&self) -> &[(String, String)] {
        &self.named_checks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> MemoryTable {
        MemoryTable::new(
            "t",
            vec![Column::new("id", ColumnType::Int), Column::new("name", ColumnType::Varchar)],
        )
    }

    #[test]
    fn insert_and_iterate_preserves_order() {
        let mut t = table();
        t.insert_unchecked(Tuple::new(vec![Value::Int(1), Value::Varchar("a".into())])).unwrap();
        t.insert_unchecked(Tuple::new(vec![Value::Int(2), Value::Varchar("b".into())])).unwrap();
        let rows: Vec<_> = t.rows().collect();
        assert_eq!(rows.len(), 2);
        assert!(matches!(rows[0].value(0), Value::Int(1)));
    }

    #[test]
    fn delete_during_writable_iteration_yields_successor() {
        let mut t = table();
        for i in 0..4 {
            t.insert_unchecked(Tuple::new(vec![Value::Int(i), Value::Varchar("x".into())])).unwrap();
        }
        let mut seen = Vec::new();
        let mut it = t.rows_writable();
        while let Some(w) = it.next_writer() {
            let v = w.read();
            let id = match v.value(0) {
                Value::Int(i) => *i,
                _ => unreachable!(),
            };
            seen.push(id);
            if id == 1 {
                w.delete();
            }
        }
        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert_eq!(t.size(), 3);
    }

    #[test]
    fn alter_column_is_atomic_on_failure() {
        let mut t = table();
        t.insert_unchecked(Tuple::new(vec![Value::Int(1), Value::Varchar("not_a_number".into())]))
            .unwrap();
        let before = t.columns()[1].r#type;
        let result = t.alter_column("name", ColumnType::Int, false);
        assert!(result.is_err());
        assert_eq!(t.columns()[1].r#type, before);
    }
}
