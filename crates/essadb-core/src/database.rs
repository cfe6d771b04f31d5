//! `Database`: a unique-name -> `Table` registry (spec §3).

use essadb_helpers::IndexMap;

use crate::column::Column;
use crate::error::DbError;
use crate::memory_table::MemoryTable;
use crate::table::Table;

/// Owns every table exclusively; dropping the `Database` drops them all
/// (spec §3 lifecycles).
#[derive(Default)]
pub struct Database {
    tables: IndexMap<String, Box<dyn Table>>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.keys().any(|n| n.eq_ignore_ascii_case(name))
    }

    fn find_key(&self, name: &str) -> Option<String> {
        self.tables
            .keys()
            .find(|n| n.eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn table(&self, name: &str) -> Result<&dyn Table, DbError> {
        let key = self.find_key(name).ok_or_else(|| DbError::NonexistentTable(name.to_string()))?;
        Ok(self.tables.get(&key).unwrap().as_ref())
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut dyn Table, DbError> {
        let key = self.find_key(name).ok_or_else(|| DbError::NonexistentTable(name.to_string()))?;
        Ok(self.tables.get_mut(&key).unwrap().as_mut())
    }

    pub fn create_memory_table(&mut self, name: &str, columns: Vec<Column>) -> Result<(), DbError> {
        if self.contains(name) {
            return Err(DbError::TableAlreadyExists(name.to_string()));
        }
        self.tables.insert(name.to_string(), Box::new(MemoryTable::new(name, columns)));
        Ok(())
    }

    /// Registers an already-constructed table, e.g. one built by
    /// `essadb-storage` for `ENGINE = EDB`, or the materialized result of
    /// `SELECT ... INTO`.
    pub fn register_table(&mut self, table: Box<dyn Table>) -> Result<(), DbError> {
        let name = table.name().to_string();
        if self.contains(&name) {
            return Err(DbError::TableAlreadyExists(name));
        }
        self.tables.insert(name, table);
        Ok(())
    }

    pub fn drop_table(&mut self, name: &str) -> Result<(), DbError> {
        let key = self.find_key(name).ok_or_else(|| DbError::NonexistentTable(name.to_string()))?;
        self.tables.shift_remove(&key);
        Ok(())
    }

    /// `SELECT ... INTO t` drops a pre-existing `t` before creating the new
    /// one (spec §4.6/§9 -- frozen behavior, append was considered and
    /// rejected as an Open Question).
    pub fn drop_if_exists(&mut self, name: &str) {
        if let Some(key) = self.find_key(name) {
            self.tables.shift_remove(&key);
        }
    }
}
