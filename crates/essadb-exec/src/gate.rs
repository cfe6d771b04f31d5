//! The tuple integrity gate (spec §4.9): the single code path every
//! user-visible `INSERT` flows through, enforcing NOT NULL, UNIQUE,
//! AUTO_INCREMENT, DEFAULT, PRIMARY KEY, FOREIGN KEY and CHECK.

use essadb_ast::{expression, Frame, FrameStack, FromSchema, RowType, TupleWithSource};
use essadb_core::{Database, DbError, IndexedRelation, Relation, Table, Tuple, Value};

/// Runs every row of `pairs` through the gate and calls `insert_unchecked`
/// on success. `pairs` may list columns in any order and omit columns
/// entirely (spec §4.9 step 1: missing columns default to `Null`).
pub fn insert_checked(db: &mut Database, table_name: &str, pairs: Vec<(String, Value)>) -> Result<(), DbError> {
    let tuple = place_and_substitute(db, table_name, pairs)?;
    check_primary_key(db, table_name, &tuple)?;
    check_foreign_keys(db, table_name, &tuple)?;
    check_expressions(db, table_name, &tuple)?;
    db.table_mut(table_name)?.insert_unchecked(tuple)
}

/// Steps 1-4: place the supplied values, then for every column left `Null`
/// either auto-increment, apply the declared `default_value`, or fail NOT
/// NULL -- whichever applies first (spec §4.9). Also runs step 2 (UNIQUE)
/// while the table is still held mutably, since it only needs `rows()`.
fn place_and_substitute(db: &mut Database, table_name: &str, pairs: Vec<(String, Value)>) -> Result<Tuple, DbError> {
    let table = db.table_mut(table_name)?;
    let mut values = vec![Value::Null; table.columns().len()];
    for (name, value) in pairs {
        let lookup = table.get_column(&name).ok_or_else(|| DbError::ColumnDoesNotExist {
            column: name.clone(),
            table: table_name.to_string(),
        })?;
        let index = lookup.index;
        let auto_increment = lookup.column.auto_increment;
        if let (Value::Int(v), true) = (&value, auto_increment) {
            table.observe_explicit_value(&name, *v);
        }
        values[index] = value;
    }

    // Step 2: UNIQUE, checked against the values as placed so far.
    for (index, column) in table.columns().iter().enumerate() {
        if column.unique && table.find_first_matching_tuple(index, &values[index]).is_some() {
            return Err(DbError::NotValidUniqueValue);
        }
    }

    // Steps 3+4 collapsed: a NOT NULL column with a non-null DEFAULT is
    // satisfied by the default rather than failing outright (the spec's
    // separately-numbered steps 3 and 4 would otherwise make step 4's own
    // NOT NULL branch unreachable).
    let columns = table.columns().to_vec();
    for (index, column) in columns.iter().enumerate() {
        if !values[index].is_null() {
            continue;
        }
        if column.auto_increment && column.r#type == essadb_core::ColumnType::Int {
            values[index] = Value::Int(table.next_auto_increment(&column.name));
        } else if column.not_null && column.default_value.is_null() {
            return Err(DbError::ValueCantBeNull);
        } else {
            values[index] = column.default_value.clone();
        }
    }

    Ok(Tuple::new(values))
}

/// Step 5: a primary key must be non-null and unique across the relation.
fn check_primary_key(db: &Database, table_name: &str, tuple: &Tuple) -> Result<(), DbError> {
    let table = db.table(table_name)?;
    let Some(pk_name) = table.primary_key() else {
        return Ok(());
    };
    let lookup = table.get_column(pk_name).ok_or_else(|| DbError::ColumnDoesNotExist {
        column: pk_name.to_string(),
        table: table_name.to_string(),
    })?;
    let value = tuple.value(lookup.index);
    if value.is_null() {
        return Err(DbError::PrimaryKeyMayNotBeNull);
    }
    if table.find_first_matching_tuple(lookup.index, value).is_some() {
        return Err(DbError::PrimaryKeyMustBeUnique);
    }
    Ok(())
}

/// Step 6: a foreign key value is null or it exists in the referenced
/// column of the referenced table.
fn check_foreign_keys(db: &Database, table_name: &str, tuple: &Tuple) -> Result<(), DbError> {
    let table = db.table(table_name)?;
    for fk in table.foreign_keys() {
        let lookup = table.get_column(&fk.local_column).ok_or_else(|| DbError::ColumnDoesNotExist {
            column: fk.local_column.clone(),
            table: table_name.to_string(),
        })?;
        let value = tuple.value(lookup.index);
        if value.is_null() {
            continue;
        }
        let referenced = db.table(&fk.referenced_table)?;
        let ref_lookup = referenced.get_column(&fk.referenced_column).ok_or_else(|| DbError::ColumnDoesNotExist {
            column: fk.referenced_column.clone(),
            table: fk.referenced_table.clone(),
        })?;
        if referenced.find_first_matching_tuple(ref_lookup.index, value).is_none() {
            return Err(DbError::ForeignKeyViolation {
                column: fk.local_column.clone(),
                table: fk.referenced_table.clone(),
            });
        }
    }
    Ok(())
}

/// Step 7: the table's main `CHECK` expression and every named
/// `CONSTRAINT ... CHECK` are evaluated against a frame whose row is the
/// proposed tuple. Check text is stored on the table as its parsed
/// `Expression`'s `Display` form (`essadb_core::Table` cannot depend on
/// `essadb-ast`), so it is re-parsed here.
fn check_expressions(db: &Database, table_name: &str, tuple: &Tuple) -> Result<(), DbError> {
    let table = db.table(table_name)?;
    let schema = FromSchema::from_columns(Some(table_name), table.columns());

    let mut checks: Vec<(String, String)> = Vec::new();
    if let Some(main) = table.main_check() {
        checks.push((main.to_string(), main.to_string()));
    }
    checks.extend(table.named_checks().iter().cloned());

    for (name, text) in checks {
        let expr = essadb_parser::parse_expression(&text).map_err(|e| DbError::Other(e.message()))?;
        let mut frames = FrameStack::new();
        let mut frame = Frame::new(schema.clone(), RowType::FromTable);
        frame.row = TupleWithSource::new(tuple.clone());
        let result = frames.push_scoped(frame, |frames| expression::evaluate(&expr, db, frames))?;
        if !result.to_bool() {
            return Err(DbError::CheckViolation(name));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use essadb_core::{Column, ColumnType, MemoryTable};

    fn db_with_table() -> Database {
        let mut db = Database::new();
        let col = Column::new("id", ColumnType::Int).not_null().unique();
        let name_col = Column::new("name", ColumnType::Varchar);
        let t = MemoryTable::new("t", vec![col, name_col]).with_primary_key("id");
        db.register_table(Box::new(t)).unwrap();
        db
    }

    #[test]
    fn rejects_null_in_not_null_column() {
        let mut db = db_with_table();
        let err = insert_checked(&mut db, "t", vec![("name".into(), Value::Varchar("a".into()))]).unwrap_err();
        assert!(matches!(err, DbError::ValueCantBeNull | DbError::PrimaryKeyMayNotBeNull));
    }

    #[test]
    fn duplicate_unique_value_fails() {
        let mut db = db_with_table();
        insert_checked(&mut db, "t", vec![("id".into(), Value::Int(1))]).unwrap();
        let err = insert_checked(&mut db, "t", vec![("id".into(), Value::Int(1))]).unwrap_err();
        assert!(matches!(err, DbError::NotValidUniqueValue | DbError::PrimaryKeyMustBeUnique));
    }

    #[test]
    fn missing_column_defaults_to_null() {
        let mut db = db_with_table();
        insert_checked(&mut db, "t", vec![("id".into(), Value::Int(1))]).unwrap();
        let table = db.table("t").unwrap();
        let row = table.rows().next().unwrap();
        assert!(matches!(row.value(1), Value::Null));
    }

    #[test]
    fn auto_increment_picks_value_past_explicit_ones() {
        let mut db = Database::new();
        let id = Column::new("id", ColumnType::Int).auto_increment().unique();
        let t = MemoryTable::new("t", vec![id, Column::new("name", ColumnType::Varchar)]).with_primary_key("id");
        db.register_table(Box::new(t)).unwrap();

        insert_checked(&mut db, "t", vec![("id".into(), Value::Int(5))]).unwrap();
        insert_checked(&mut db, "t", vec![]).unwrap();
        let table = db.table("t").unwrap();
        let rows: Vec<_> = table.rows().collect();
        assert!(matches!(rows[1].value(0), Value::Int(6)));
    }
}
