//! `CREATE`/`DROP`/`TRUNCATE`/`ALTER TABLE`, `IMPORT` and `SHOW TABLES`
//! (spec §4.8). DDL manipulates the `Database`'s table registry directly;
//! the per-engine mechanics (rewriting an EDB file's schema, growing a
//! `MemoryTable`'s rows) live behind the `Table` trait, so this module
//! never distinguishes the two engines except when creating a table.

use essadb_ast::{expression, CreateTableStatement, EngineChoice, FrameStack, ImportStatement};
use essadb_core::{Column, DbError, ForeignKey, MemoryTable, Relation, ResultSet, Table, Value};
use essadb_storage::EdbTable;

use crate::config::EngineConfig;
use crate::gate;

/// `CREATE TABLE t (...)`: builds the `Column` list, primary key and
/// foreign keys straight from the parsed `ColumnDef`s, evaluates each
/// `DEFAULT` expression once (against an empty frame -- defaults may only
/// reference literals and scalar functions, never table columns), renders
/// `CHECK` expressions back to text for storage, and either builds a
/// `MemoryTable` or creates a new EDB file depending on `ENGINE = ...`.
pub fn create_table(db: &mut essadb_core::Database, stmt: &CreateTableStatement, config: &EngineConfig) -> Result<(), DbError> {
    if db.contains(&stmt.name) {
        return Err(DbError::TableAlreadyExists(stmt.name.clone()));
    }

    let mut primary_key = None;
    let mut foreign_keys = Vec::new();
    let mut columns = Vec::with_capacity(stmt.columns.len());
    for def in &stmt.columns {
        let default_value = match &def.default_value {
            Some(expr) => expression::evaluate(expr, db, &mut FrameStack::new())?,
            None => Value::Null,
        };
        if def.primary_key {
            primary_key = Some(def.name.clone());
        }
        if let Some((ref_table, ref_column)) = &def.references {
            foreign_keys.push(ForeignKey {
                local_column: def.name.clone(),
                referenced_table: ref_table.clone(),
                referenced_column: ref_column.clone(),
            });
        }
        columns.push(Column {
            name: def.name.clone(),
            r#type: def.r#type,
            auto_increment: def.auto_increment,
            unique: def.unique,
            not_null: def.not_null,
            default_value,
        });
    }

    let main_check = stmt.main_check.as_ref().map(|e| e.to_string());
    let named_checks: Vec<(String, String)> = stmt.named_checks.iter().map(|(name, e)| (name.clone(), e.to_string())).collect();

    match stmt.engine {
        EngineChoice::Memory => {
            let table = MemoryTable::new(&stmt.name, columns)
                .with_foreign_keys(foreign_keys)
                .with_named_checks(named_checks);
            let table = match (primary_key, main_check) {
                (Some(pk), Some(check)) => table.with_primary_key(pk).with_main_check(check),
                (Some(pk), None) => table.with_primary_key(pk),
                (None, Some(check)) => table.with_main_check(check),
                (None, None) => table,
            };
            db.register_table(Box::new(table))
        }
        EngineChoice::Edb => {
            let path = config.edb_path(&stmt.name);
            let table = EdbTable::create(
                &path,
                &stmt.name,
                columns,
                primary_key,
                foreign_keys,
                main_check,
                named_checks,
                config.edb_block_size,
            )?;
            db.register_table(Box::new(table))
        }
    }
}

pub fn drop_table(db: &mut essadb_core::Database, name: &str) -> Result<(), DbError> {
    db.drop_table(name)
}

pub fn truncate_table(db: &mut essadb_core::Database, name: &str) -> Result<(), DbError> {
    db.table_mut(name)?.truncate()
}

/// `ALTER TABLE`: dispatches to the `Table` trait, which owns the
/// per-engine "restructure" protocol for EDB tables (spec §4.7/§4.8).
pub fn alter_table(db: &mut essadb_core::Database, stmt: &essadb_ast::AlterTableStatement) -> Result<(), DbError> {
    let table = db.table_mut(&stmt.table)?;
    match &stmt.action {
        essadb_ast::AlterAction::AddColumn(def) => {
            let default_value = Value::Null;
            table.add_column(Column {
                name: def.name.clone(),
                r#type: def.r#type,
                auto_increment: def.auto_increment,
                unique: def.unique,
                not_null: def.not_null,
                default_value,
            })
        }
        essadb_ast::AlterAction::AlterColumn { name, r#type, not_null } => table.alter_column(name, *r#type, *not_null),
        essadb_ast::AlterAction::DropColumn(name) => table.drop_column(name),
    }
}

pub fn show_tables(db: &essadb_core::Database) -> ResultSet {
    let rows = db
        .table_names()
        .map(|name| essadb_core::Tuple::new(vec![Value::Varchar(name.to_string())]))
        .collect();
    ResultSet::new(vec!["table_name".to_string()], rows)
}

/// `IMPORT`: reads a CSV file and inserts every row through the tuple
/// integrity gate (spec §4.8). If the target table doesn't exist yet, its
/// schema is inferred from the file and a memory-backed table is created
/// to hold it; otherwise rows are coerced to the existing schema.
pub fn import(db: &mut essadb_core::Database, stmt: &ImportStatement) -> Result<(), DbError> {
    let text = std::fs::read_to_string(&stmt.file_path).map_err(|e| {
        DbError::Other(format!("failed to read '{}': {e}", stmt.file_path))
    })?;
    let csv = essadb_storage::csv::parse(&text)?;

    if !db.contains(&stmt.table) {
        let types = essadb_storage::csv::infer_column_types(csv.header.len(), &csv.rows);
        let columns: Vec<Column> = csv.header.iter().zip(types.iter()).map(|(name, ty)| Column::new(name.clone(), *ty)).collect();
        db.create_memory_table(&stmt.table, columns)?;
    }

    let types: Vec<_> = db.table(&stmt.table)?.columns().iter().map(|c| c.r#type).collect();
    for row in csv.rows {
        let values = essadb_storage::csv::coerce_row(row, &types)?;
        let pairs = csv.header.iter().cloned().zip(values).collect();
        gate::insert_checked(db, &stmt.table, pairs)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use essadb_ast::ColumnDef;
    use essadb_core::ColumnType;

    fn col(name: &str, ty: ColumnType) -> ColumnDef {
        ColumnDef {
            name: name.to_string(),
            r#type: ty,
            not_null: false,
            unique: false,
            auto_increment: false,
            default_value: None,
            primary_key: false,
            references: None,
        }
    }

    #[test]
    fn create_memory_table_registers_columns() {
        let mut db = essadb_core::Database::new();
        let stmt = CreateTableStatement {
            name: "t".into(),
            columns: vec![col("id", ColumnType::Int), col("name", ColumnType::Varchar)],
            main_check: None,
            named_checks: vec![],
            engine: EngineChoice::Memory,
        };
        create_table(&mut db, &stmt, &EngineConfig::default()).unwrap();
        let table = db.table("t").unwrap();
        assert_eq!(table.columns().len(), 2);
    }

    #[test]
    fn show_tables_lists_registered_names() {
        let mut db = essadb_core::Database::new();
        db.create_memory_table("a", vec![]).unwrap();
        db.create_memory_table("b", vec![]).unwrap();
        let rs = show_tables(&db);
        assert_eq!(rs.rows.len(), 2);
    }

    #[test]
    fn truncate_clears_rows_but_keeps_schema() {
        let mut db = essadb_core::Database::new();
        db.create_memory_table("t", vec![Column::new("id", ColumnType::Int)]).unwrap();
        gate::insert_checked(&mut db, "t", vec![("id".into(), Value::Int(1))]).unwrap();
        truncate_table(&mut db, "t").unwrap();
        let table = db.table("t").unwrap();
        assert_eq!(table.size(), 0);
        assert_eq!(table.columns().len(), 1);
    }
}
