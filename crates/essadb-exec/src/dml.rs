//! `INSERT`, `UPDATE`, `DELETE` (spec §4.8). `INSERT` is the only one that
//! goes through the tuple integrity gate; `UPDATE`/`DELETE` mutate existing
//! rows directly. Both run in two passes -- decide against a read-only
//! borrow of the whole `Database` (so `WHERE`/`SET` can still reference
//! scalar functions and sub-selects over other tables), then apply the
//! decision through a writable cursor once the database is free to borrow
//! mutably again.

use essadb_ast::{expression, Frame, FrameStack, FromSchema, InsertSource, InsertStatement, RowType, TupleWithSource};
use essadb_ast::{DeleteStatement, UpdateStatement};
use essadb_core::{Database, DbError, Relation, Table, Tuple};

use crate::gate;

/// `INSERT INTO t (cols) VALUES (...), (...)` or `INSERT INTO t SELECT ...`.
/// Every resulting row is run through [`gate::insert_checked`]. Column
/// names default to the target table's declared order when the statement
/// omits an explicit column list.
pub fn insert(db: &mut Database, stmt: &InsertStatement) -> Result<(), DbError> {
    let target_columns: Vec<String> = if stmt.columns.is_empty() {
        db.table(&stmt.table)?.columns().iter().map(|c| c.name.clone()).collect()
    } else {
        stmt.columns.clone()
    };

    match &stmt.source {
        InsertSource::Values(rows) => {
            for row in rows {
                let mut frames = FrameStack::new();
                let mut values = Vec::with_capacity(row.len());
                for expr in row {
                    values.push(expression::evaluate(expr, db, &mut frames)?);
                }
                let pairs = target_columns.iter().cloned().zip(values).collect();
                gate::insert_checked(db, &stmt.table, pairs)?;
            }
        }
        InsertSource::Select(select) => {
            let rs = essadb_ast::execute_select(select, db, &mut FrameStack::new())?;
            for row in rs.rows {
                let pairs = target_columns.iter().cloned().zip(row.into_values()).collect();
                gate::insert_checked(db, &stmt.table, pairs)?;
            }
        }
    }
    Ok(())
}

/// `UPDATE t SET c = e [WHERE w]` (spec §4.8): iterates all rows, binds a
/// frame over `t` for each, evaluates `e` and overwrites column `c` when
/// `WHERE` holds (default true when absent). No integrity gate runs here.
pub fn update(db: &mut Database, stmt: &UpdateStatement) -> Result<(), DbError> {
    let schema = FromSchema::from_columns(Some(&stmt.table), db.table(&stmt.table)?.columns());
    let assignment_indices: Vec<usize> = {
        let table = db.table(&stmt.table)?;
        stmt.assignments
            .iter()
            .map(|a| {
                table
                    .get_column(&a.column)
                    .map(|l| l.index)
                    .ok_or_else(|| DbError::ColumnDoesNotExist { column: a.column.clone(), table: stmt.table.clone() })
            })
            .collect::<Result<_, _>>()?
    };

    let mut new_rows: Vec<Option<Tuple>> = Vec::new();
    {
        let table = db.table(&stmt.table)?;
        for tuple in table.rows() {
            let mut frames = FrameStack::new();
            let mut frame = Frame::new(schema.clone(), RowType::FromTable);
            frame.row = TupleWithSource::new(tuple.clone());
            let keep = match &stmt.where_clause {
                Some(expr) => frames.push_scoped(frame.clone(), |frames| expression::evaluate(expr, db, frames))?.to_bool(),
                None => true,
            };
            if !keep {
                new_rows.push(None);
                continue;
            }
            let mut updated = tuple;
            for (assignment, &index) in stmt.assignments.iter().zip(&assignment_indices) {
                let value = frames.push_scoped(frame.clone(), |frames| expression::evaluate(&assignment.value, db, frames))?;
                updated.set_value(index, value);
            }
            new_rows.push(Some(updated));
        }
    }

    let table = db.table_mut(&stmt.table)?;
    let mut it = table.rows_writable();
    let mut index = 0usize;
    while let Some(writer) = it.next_writer() {
        if let Some(new_tuple) = new_rows.get(index).cloned().flatten() {
            writer.write(new_tuple);
        }
        index += 1;
    }
    Ok(())
}

/// `DELETE FROM t [WHERE w]` (spec §4.8): decides per row against a
/// snapshot of the table, then deletes matched rows through the
/// deletion-safe writable cursor in a single forward pass.
pub fn delete(db: &mut Database, stmt: &DeleteStatement) -> Result<(), DbError> {
    let schema = FromSchema::from_columns(Some(&stmt.table), db.table(&stmt.table)?.columns());
    let mut matched: Vec<bool> = Vec::new();
    {
        let table = db.table(&stmt.table)?;
        for tuple in table.rows() {
            let mut frames = FrameStack::new();
            let mut frame = Frame::new(schema.clone(), RowType::FromTable);
            frame.row = TupleWithSource::new(tuple);
            let keep = match &stmt.where_clause {
                Some(expr) => frames.push_scoped(frame, |frames| expression::evaluate(expr, db, frames))?.to_bool(),
                None => true,
            };
            matched.push(keep);
        }
    }

    let table = db.table_mut(&stmt.table)?;
    let mut it = table.rows_writable();
    let mut index = 0usize;
    while let Some(writer) = it.next_writer() {
        if matched.get(index).copied().unwrap_or(false) {
            writer.delete();
        }
        index += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use essadb_ast::{CompareOp, Expression};
    use essadb_core::{Column, ColumnType, Value};

    fn db_with_rows() -> Database {
        let mut db = Database::new();
        db.create_memory_table("t", vec![Column::new("id", ColumnType::Int), Column::new("name", ColumnType::Varchar)])
            .unwrap();
        for (id, name) in [(1, "a"), (2, "b"), (3, "c")] {
            gate::insert_checked(&mut db, "t", vec![("id".into(), Value::Int(id)), ("name".into(), Value::Varchar(name.into()))]).unwrap();
        }
        db
    }

    #[test]
    fn insert_values_positional_by_declared_order() {
        let mut db = Database::new();
        db.create_memory_table("t", vec![Column::new("id", ColumnType::Int), Column::new("name", ColumnType::Varchar)])
            .unwrap();
        let stmt = InsertStatement {
            table: "t".into(),
            columns: vec![],
            source: InsertSource::Values(vec![vec![Expression::Literal(Value::Int(1)), Expression::Literal(Value::Varchar("x".into()))]]),
        };
        insert(&mut db, &stmt).unwrap();
        let table = db.table("t").unwrap();
        let row = table.rows().next().unwrap();
        assert!(matches!(row.value(0), Value::Int(1)));
    }

    #[test]
    fn update_sets_matching_rows_only() {
        let mut db = db_with_rows();
        let stmt = UpdateStatement {
            table: "t".into(),
            assignments: vec![essadb_ast::UpdateAssignment {
                column: "name".into(),
                value: Expression::Literal(Value::Varchar("updated".into())),
            }],
            where_clause: Some(Expression::BinaryOp {
                lhs: Box::new(Expression::Identifier { table: None, name: "id".into() }),
                op: CompareOp::Gt,
                rhs: Box::new(Expression::Literal(Value::Int(1))),
            }),
        };
        update(&mut db, &stmt).unwrap();
        let table = db.table("t").unwrap();
        let rows: Vec<_> = table.rows().collect();
        assert!(matches!(rows[0].value(1), Value::Varchar(ref s) if s == "a"));
        assert!(matches!(rows[1].value(1), Value::Varchar(ref s) if s == "updated"));
        assert!(matches!(rows[2].value(1), Value::Varchar(ref s) if s == "updated"));
    }

    #[test]
    fn delete_removes_matching_rows() {
        let mut db = db_with_rows();
        let stmt = DeleteStatement {
            table: "t".into(),
            where_clause: Some(Expression::BinaryOp {
                lhs: Box::new(Expression::Identifier { table: None, name: "id".into() }),
                op: CompareOp::Eq,
                rhs: Box::new(Expression::Literal(Value::Int(2))),
            }),
        };
        delete(&mut db, &stmt).unwrap();
        let table = db.table("t").unwrap();
        assert_eq!(table.size(), 2);
    }
}
