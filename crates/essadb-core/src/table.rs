//! `Table`: a `Relation` plus schema/row mutation (spec §3).

use crate::column::Column;
use crate::error::DbError;
use crate::relation::{IndexedRelation, Relation, WritableRelationIterator};
use crate::tuple::Tuple;
use crate::value::ColumnType;

/// Which storage engine backs a table (CREATE TABLE's `ENGINE = ...`
/// clause, spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineKind {
    #[default]
    Memory,
    Edb,
}

pub trait Table: IndexedRelation {
    fn name(&self) -> &str;

    fn engine(&self) -> EngineKind;

    /// A writable cursor that supports in-place overwrite and deletion
    /// (spec §3/§4.2).
    fn rows_writable(&mut self) -> Box<dyn WritableRelationIterator<'_> + '_>;

    fn truncate(&mut self) -> Result<(), DbError>;

    fn add_column(&mut self, column: Column) -> Result<(), DbError>;

    /// Adjusts the schema and re-interprets existing cells. Values that
    /// fail the new type make the whole operation fail atomically -- either
    /// all rows succeed or the schema is left unchanged (spec §4.2).
    fn alter_column(&mut self, name: &str, new_type: ColumnType, not_null: bool) -> Result<(), DbError>;

    fn drop_column(&mut self, name: &str) -> Result<(), DbError>;

    fn rename(&mut self, new_name: &str) -> Result<(), DbError>;

    /// Integrity-checked insert; goes through the tuple integrity gate in
    /// `essadb-exec`. Tables only implement the unchecked primitive.
    fn insert_unchecked(&mut self, tuple: Tuple) -> Result<(), DbError>;

    /// The next value `AUTO_INCREMENT` would hand out for `column`, without
    /// consuming it. Exposed for the tuple integrity gate.
    fn peek_auto_increment(&self, column: &str) -> i32;

    /// Consumes and returns a fresh monotonically increasing integer for
    /// `column`, bumping the per-column counter past any explicitly set
    /// value it has already observed (spec §3/§4.9).
    fn next_auto_increment(&mut self, column: &str) -> i32;

    /// Lets the integrity gate record an explicitly-provided value so a
    /// later auto-increment jumps past it.
    fn observe_explicit_value(&mut self, column: &str, value: i32);

    fn main_check(&self) -> Option<&str>;

    fn named_checks(&self) -> &[(String, String)];
}

/// Blanket helper used by the integrity gate and DDL to find a column's
/// index without repeating `get_column` at call sites.
pub fn column_index(relation: &dyn Relation, name: &str) -> Option<usize> {
    relation.get_column(name).map(|lookup| lookup.index)
}
