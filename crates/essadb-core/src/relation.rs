//! `Relation`: the read/mutate-iteration capability set shared by memory
//! tables, EDB tables, join results and non-owning wrappers (spec §3/§4.1).

use crate::column::Column;
use crate::tuple::Tuple;

/// A single writable row slot: can be read, overwritten, or deleted while
/// iterating.
pub trait RowWriter<'a> {
    fn read(&self) -> Tuple;
    fn write(&mut self, tuple: Tuple);
    fn delete(self: Box<Self>);
}

/// A cursor over writable row slots. Deleting the current slot during
/// iteration must still produce, on the next call, what had been the
/// successor row (spec §4.2) -- implementations achieve this with a
/// retained index and an "erased previous" flag rather than mutating the
/// container while holding a live borrow into it (spec §9).
pub trait WritableRelationIterator<'a> {
    fn next_writer(&mut self) -> Option<Box<dyn RowWriter<'a> + 'a>>;
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnLookup<'a> {
    pub index: usize,
    pub column: &'a Column,
}

/// The read/mutate-iteration contract shared by every table-like thing: a
/// memory-backed table, an EDB-backed table, a materialized join result, or
/// a non-owning wrapper that borrows another relation without copying
/// (spec §3).
pub trait Relation {
    fn columns(&self) -> &[Column];

    fn size(&self) -> usize;

    /// A fresh, single-pass, read-only iterator over this relation's rows.
    fn rows(&self) -> Box<dyn Iterator<Item = Tuple> + '_>;

    fn find_first_matching_tuple(&self, column_index: usize, value: &crate::value::Value) -> Option<Tuple> {
        self.rows()
            .find(|tuple| tuple.value(column_index).values_equal(value))
    }

    fn get_column(&self, name: &str) -> Option<ColumnLookup<'_>> {
        self.columns()
            .iter()
            .enumerate()
            .find(|(_, c)| c.name.eq_ignore_ascii_case(name))
            .map(|(index, column)| ColumnLookup { index, column })
    }
}

/// Optional primary key + foreign keys carried by tables that participate in
/// referential integrity (spec §3).
pub trait IndexedRelation: Relation {
    fn primary_key(&self) -> Option<&str>;
    fn foreign_keys(&self) -> &[crate::column::ForeignKey];
}
