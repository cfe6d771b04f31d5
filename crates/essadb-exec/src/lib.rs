//! Top-level statement dispatch (spec §4.6/§4.8): turns a parsed
//! `Statement` into a `ValueOrResultSet` against a mutable `Database`.
//! Everything below this module is engine-internal; this is the one
//! entry point `essadb-cli-lib` (and any other frontend) calls.

pub mod config;
pub mod ddl;
pub mod dml;
pub mod error;
pub mod gate;

use essadb_ast::{execute_select, FrameStack, Statement, UnionMode, UnionStatement, ValueOrResultSet};
use essadb_core::{Database, DbError, ResultSet, Tuple};

pub use config::EngineConfig;
pub use error::{AtOffset, SQLError};

/// Reopens every `*.edb` file under `config.data_dir` as a registered
/// table. The `Database` itself is never persisted (spec §5: it is an
/// in-process registry); the only thing that survives a process restart
/// is the EDB files on disk, so a frontend that wants to pick up where it
/// left off calls this once at startup instead of tracking table names
/// itself.
pub fn open_database(config: &EngineConfig) -> Result<Database, DbError> {
    let mut db = Database::new();
    let entries = match std::fs::read_dir(&config.data_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(db),
        Err(e) => return Err(DbError::Other(format!("reading '{}': {e}", config.data_dir.display()))),
    };
    for entry in entries {
        let entry = entry.map_err(|e| DbError::Other(e.to_string()))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("edb") {
            continue;
        }
        let table = essadb_storage::EdbTable::open(&path)?;
        db.register_table(Box::new(table))?;
    }
    Ok(db)
}

/// Executes one parsed statement against `db`. `SELECT` and `UNION`
/// produce a `ResultSet`; every other statement is executed for its
/// side effect and reported back as an empty result set, mirroring the
/// `ValueOrResultSet` contract of spec §6 (no statement currently
/// produces a bare `Value`, but the type is kept for that contract).
pub fn execute_statement(db: &mut Database, stmt: &Statement, config: &EngineConfig) -> Result<ValueOrResultSet, DbError> {
    match stmt {
        Statement::Select(select) => {
            let mut frames = FrameStack::new();
            let rs = execute_select(select, db, &mut frames)?;
            if let Some(into) = &select.into {
                db.drop_if_exists(into);
                let columns: Vec<essadb_core::Column> = rs
                    .column_names
                    .iter()
                    .map(|name| essadb_core::Column::new(name.clone(), infer_into_type(&rs, name)))
                    .collect();
                db.create_memory_table(into, columns)?;
                let table = db.table_mut(into)?;
                for row in &rs.rows {
                    table.insert_unchecked(row.clone())?;
                }
            }
            Ok(ValueOrResultSet::ResultSet(rs))
        }
        Statement::Union(union) => Ok(ValueOrResultSet::ResultSet(execute_union(db, union)?)),
        Statement::Insert(insert) => {
            dml::insert(db, insert)?;
            Ok(ValueOrResultSet::ResultSet(ResultSet::empty()))
        }
        Statement::Update(update) => {
            dml::update(db, update)?;
            Ok(ValueOrResultSet::ResultSet(ResultSet::empty()))
        }
        Statement::Delete(delete) => {
            dml::delete(db, delete)?;
            Ok(ValueOrResultSet::ResultSet(ResultSet::empty()))
        }
        Statement::CreateTable(create) => {
            ddl::create_table(db, create, config)?;
            Ok(ValueOrResultSet::ResultSet(ResultSet::empty()))
        }
        Statement::DropTable(name) => {
            ddl::drop_table(db, name)?;
            Ok(ValueOrResultSet::ResultSet(ResultSet::empty()))
        }
        Statement::TruncateTable(name) => {
            ddl::truncate_table(db, name)?;
            Ok(ValueOrResultSet::ResultSet(ResultSet::empty()))
        }
        Statement::AlterTable(alter) => {
            ddl::alter_table(db, alter)?;
            Ok(ValueOrResultSet::ResultSet(ResultSet::empty()))
        }
        Statement::Import(import) => {
            ddl::import(db, import)?;
            Ok(ValueOrResultSet::ResultSet(ResultSet::empty()))
        }
        Statement::ShowTables => Ok(ValueOrResultSet::ResultSet(ddl::show_tables(db))),
    }
}

/// A column that only ever held `Null` in the materialized result (e.g. an
/// empty `SELECT ... INTO`) still needs a concrete storage type; `Varchar`
/// is the most permissive, matching CSV import's own `Null`-first inference
/// (spec §4.8).
fn infer_into_type(rs: &ResultSet, name: &str) -> essadb_core::ColumnType {
    let index = rs.column_names.iter().position(|c| c == name).unwrap();
    for row in &rs.rows {
        match row.value(index) {
            essadb_core::Value::Int(_) => return essadb_core::ColumnType::Int,
            essadb_core::Value::Float(_) => return essadb_core::ColumnType::Float,
            essadb_core::Value::Varchar(_) => return essadb_core::ColumnType::Varchar,
            essadb_core::Value::Bool(_) => return essadb_core::ColumnType::Bool,
            essadb_core::Value::Time(_) => return essadb_core::ColumnType::Time,
            essadb_core::Value::Null => continue,
        }
    }
    essadb_core::ColumnType::Varchar
}

/// `UNION [ALL]` (spec §4.8): both sides must project identical column
/// name sequences; without `ALL`, rows are de-duplicated against the left
/// side's already-kept rows (tuple equality, first-occurrence-preserving,
/// same rule as plain `DISTINCT`).
fn execute_union(db: &Database, union: &UnionStatement) -> Result<ResultSet, DbError> {
    let mut left_frames = FrameStack::new();
    let left = execute_select(&union.left, db, &mut left_frames)?;
    let mut right_frames = FrameStack::new();
    let right = execute_select(&union.right, db, &mut right_frames)?;

    if left.column_names != right.column_names {
        return Err(DbError::UnionColumnMismatch);
    }

    let mut rows: Vec<Tuple> = left.rows;
    for row in right.rows {
        match union.mode {
            UnionMode::All => rows.push(row),
            UnionMode::Distinct => {
                if !rows.iter().any(|existing| existing.tuple_equal(&row)) {
                    rows.push(row);
                }
            }
        }
    }

    Ok(ResultSet::new(left.column_names, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use essadb_ast::{SelectColumns, SelectStatement};
    use essadb_core::{Column, ColumnType, Value};

    fn select_all(table: &str) -> SelectStatement {
        SelectStatement {
            columns: SelectColumns::Star,
            from: Some(essadb_ast::TableExpression::Named {
                name: table.to_string(),
                alias: None,
            }),
            ..Default::default()
        }
    }

    fn db_with_two_tables() -> Database {
        let mut db = Database::new();
        db.create_memory_table("a", vec![Column::new("id", ColumnType::Int)]).unwrap();
        db.create_memory_table("b", vec![Column::new("id", ColumnType::Int)]).unwrap();
        gate::insert_checked(&mut db, "a", vec![("id".into(), Value::Int(1))]).unwrap();
        gate::insert_checked(&mut db, "a", vec![("id".into(), Value::Int(2))]).unwrap();
        gate::insert_checked(&mut db, "b", vec![("id".into(), Value::Int(2))]).unwrap();
        gate::insert_checked(&mut db, "b", vec![("id".into(), Value::Int(3))]).unwrap();
        db
    }

    #[test]
    fn union_distinct_drops_duplicates_against_left() {
        let db = db_with_two_tables();
        let union = UnionStatement {
            left: Box::new(select_all("a")),
            right: Box::new(select_all("b")),
            mode: UnionMode::Distinct,
        };
        let rs = execute_union(&db, &union).unwrap();
        assert_eq!(rs.rows.len(), 3);
    }

    #[test]
    fn union_all_keeps_duplicates() {
        let db = db_with_two_tables();
        let union = UnionStatement {
            left: Box::new(select_all("a")),
            right: Box::new(select_all("b")),
            mode: UnionMode::All,
        };
        let rs = execute_union(&db, &union).unwrap();
        assert_eq!(rs.rows.len(), 4);
    }

    #[test]
    fn union_column_mismatch_fails() {
        let mut db = db_with_two_tables();
        db.create_memory_table("c", vec![Column::new("other", ColumnType::Int)]).unwrap();
        let union = UnionStatement {
            left: Box::new(select_all("a")),
            right: Box::new(select_all("c")),
            mode: UnionMode::Distinct,
        };
        assert!(execute_union(&db, &union).is_err());
    }

    #[test]
    fn select_into_creates_memory_table() {
        let mut db = db_with_two_tables();
        let mut select = select_all("a");
        select.into = Some("copy".into());
        let stmt = Statement::Select(select);
        execute_statement(&mut db, &stmt, &EngineConfig::default()).unwrap();
        let copy = db.table("copy").unwrap();
        assert_eq!(copy.size(), 2);
    }

    #[test]
    fn select_into_drops_preexisting_table() {
        let mut db = db_with_two_tables();
        db.create_memory_table("copy", vec![Column::new("junk", ColumnType::Varchar)]).unwrap();
        gate::insert_checked(&mut db, "copy", vec![("junk".into(), Value::Varchar("x".into()))]).unwrap();
        let mut select = select_all("a");
        select.into = Some("copy".into());
        let stmt = Statement::Select(select);
        execute_statement(&mut db, &stmt, &EngineConfig::default()).unwrap();
        let copy = db.table("copy").unwrap();
        assert_eq!(copy.columns().len(), 1);
        assert_eq!(copy.columns()[0].name, "id");
        assert_eq!(copy.size(), 2);
    }
}
