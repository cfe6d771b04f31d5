//! The SELECT pipeline (spec §4.6): FROM -> WHERE -> GROUP BY -> HAVING ->
//! ORDER BY -> DISTINCT -> TOP -> (INTO is handled by the caller, which
//! owns a mutable `Database`). Lives in `essadb-ast` rather than a
//! dedicated executor crate because `Expression::ScalarSelect` and
//! `TableExpression::SubSelect` must call back into it recursively.

use essadb_core::{Column, ColumnType, Database, DbError, ResultSet, Tuple, Value};

use crate::expression::{self, Expression};
use crate::frame::{Frame, FrameStack, FromSchema, ProjectionAliases, RowType, TupleWithSource};
use crate::statement::{OrderDirection, SelectColumn, SelectColumns, SelectStatement};
use crate::table_expr;

/// Expands `SELECT *` into positional `IndexExpression`s over `schema`'s
/// columns (spec §4.6 step 2); fails if `*` is used with no FROM.
fn expand_columns(columns: &SelectColumns, from_columns: Option<&[Column]>) -> Result<Vec<SelectColumn>, DbError> {
    match columns {
        SelectColumns::Exprs(cols) => Ok(cols.clone()),
        SelectColumns::Star => {
            let cols = from_columns.ok_or(DbError::StarWithoutTable)?;
            Ok(cols
                .iter()
                .enumerate()
                .map(|(i, c)| SelectColumn {
                    expr: Expression::IndexExpression {
                        position: i,
                        label: c.name.clone(),
                    },
                    alias: None,
                })
                .collect())
        }
    }
}

fn group_key(row: &Tuple, schema: &FromSchema, group_cols: &[String]) -> Result<Tuple, DbError> {
    let mut values = Vec::with_capacity(group_cols.len());
    for name in group_cols {
        let index = schema.resolve(name, None).ok_or_else(|| DbError::ColumnDoesNotExist {
            column: name.clone(),
            table: "<group by>".into(),
        })?;
        values.push(row.value(index).clone());
    }
    Ok(Tuple::new(values))
}

struct Group {
    key: Tuple,
    rows: Vec<Tuple>,
}

fn build_groups(rows: Vec<Tuple>, schema: &FromSchema, group_cols: &[String]) -> Result<Vec<Group>, DbError> {
    let mut groups: Vec<Group> = Vec::new();
    for row in rows {
        let key = group_key(&row, schema, group_cols)?;
        match groups.iter_mut().find(|g| g.key.tuple_equal(&key)) {
            Some(g) => g.rows.push(row),
            None => groups.push(Group { key, rows: vec![row] }),
        }
    }
    Ok(groups)
}

pub fn execute_select(select: &SelectStatement, db: &Database, frames: &mut FrameStack) -> Result<ResultSet, DbError> {
    // 1. FROM
    let (source, from_schema) = match &select.from {
        Some(expr) => {
            let (src, schema) = table_expr::evaluate(expr, db, frames)?;
            (Some(src), schema)
        }
        None => (None, FromSchema::empty()),
    };
    let from_columns: Option<Vec<Column>> = source.as_ref().map(|s| s.relation().columns().to_vec());

    // 2. Expand `*`
    let projection = expand_columns(&select.columns, from_columns.as_deref())?;

    // Rows surviving WHERE (or the single synthetic empty row with no FROM).
    let all_rows: Vec<Tuple> = match &source {
        Some(src) => src.relation().rows().collect(),
        None => vec![Tuple::new(vec![])],
    };

    // 3. Push a frame governed by the FROM expression.
    let base_frame = Frame::new(from_schema.clone(), RowType::FromTable);
    let filtered = frames.push_scoped(base_frame, |frames| -> Result<Vec<Tuple>, DbError> {
        let mut kept = Vec::with_capacity(all_rows.len());
        for row in all_rows {
            if let Some(where_expr) = &select.where_clause {
                frames.top_mut().unwrap().row = TupleWithSource::with_source(row.clone(), row.clone());
                if !expression::evaluate(where_expr, db, frames)?.to_bool() {
                    continue;
                }
            }
            kept.push(row);
        }
        Ok(kept)
    })?;

    // 5. Group rows.
    let group_cols: &[String] = select.group_by.as_ref().map(|g| g.columns.as_slice()).unwrap_or(&[]);
    let is_partition = select.group_by.as_ref().is_some_and(|g| g.is_partition);
    let mut groups = build_groups(filtered, &from_schema, group_cols)?;

    // 6. Decide whether to aggregate.
    let has_group_by = select.group_by.is_some() && !is_partition;
    let has_aggregate_projection = projection.iter().any(|c| c.expr.contains_aggregate());
    let aggregating = has_group_by || has_aggregate_projection;

    if aggregating && groups.is_empty() && !is_partition {
        groups.push(Group {
            key: Tuple::new(vec![]),
            rows: Vec::new(),
        });
    }

    let mut output_rows: Vec<Tuple> = Vec::new();

    for group in &groups {
        if aggregating {
            let projected = frames.push_scoped(Frame::new(from_schema.clone(), RowType::FromTable), |frames| {
                frames.top_mut().unwrap().row_group = Some(group.rows.clone());
                let mut values = Vec::with_capacity(projection.len());
                for col in &projection {
                    if col.expr.contains_aggregate() {
                        frames.top_mut().unwrap().row = TupleWithSource::default();
                        values.push(expression::evaluate(&col.expr, db, frames)?);
                    } else if is_group_by_column(&col.expr, group_cols) {
                        let first = group.rows.first().cloned().unwrap_or_default();
                        frames.top_mut().unwrap().row = TupleWithSource::with_source(first.clone(), first);
                        values.push(expression::evaluate(&col.expr, db, frames)?);
                    } else {
                        return Err(DbError::NotAggregateOrGroupBy(col.expr.to_string()));
                    }
                }
                Ok::<_, DbError>(Tuple::new(values))
            })?;

            if let Some(having) = &select.having {
                let aliases = ProjectionAliases::new(
                    projection
                        .iter()
                        .enumerate()
                        .map(|(i, c)| (c.display_name(), i))
                        .collect(),
                );
                let source_row = group.rows.first().cloned();
                let mut having_frame = Frame::new(from_schema.clone(), RowType::FromResultSet).with_projection(aliases);
                having_frame.row = match source_row {
                    Some(s) => TupleWithSource::with_source(projected.clone(), s),
                    None => TupleWithSource::new(projected.clone()),
                };
                let keep = frames.push_scoped(having_frame, |frames| expression::evaluate(having, db, frames))?;
                if !keep.to_bool() {
                    continue;
                }
            }

            output_rows.push(projected);
        } else {
            for row in &group.rows {
                let projected = frames.push_scoped(Frame::new(from_schema.clone(), RowType::FromTable), |frames| {
                    frames.top_mut().unwrap().row = TupleWithSource::with_source(row.clone(), row.clone());
                    let mut values = Vec::with_capacity(projection.len());
                    for col in &projection {
                        values.push(expression::evaluate(&col.expr, db, frames)?);
                    }
                    Ok::<_, DbError>(Tuple::new(values))
                })?;
                output_rows.push(projected);
            }
        }
    }

    let column_names: Vec<String> = projection.iter().map(SelectColumn::display_name).collect();

    // 8. DISTINCT (first-occurrence preserving, O(n^2) is acceptable).
    let mut rows = output_rows;
    if select.distinct {
        let mut deduped: Vec<Tuple> = Vec::with_capacity(rows.len());
        for row in rows {
            if !deduped.iter().any(|r: &Tuple| r.tuple_equal(&row)) {
                deduped.push(row);
            }
        }
        rows = deduped;
    }

    // 9. ORDER BY: stable sort, Null smallest, evaluated against the output
    // row (projection aliases resolvable, same as HAVING's frame).
    if !select.order_by.is_empty() {
        let aliases = ProjectionAliases::new(
            projection
                .iter()
                .enumerate()
                .map(|(i, c)| (c.display_name(), i))
                .collect(),
        );
        let mut keyed: Vec<(Vec<Value>, Tuple)> = Vec::with_capacity(rows.len());
        for row in rows {
            let mut frame = Frame::new(FromSchema::empty(), RowType::FromResultSet).with_projection(aliases.clone());
            frame.row = TupleWithSource::new(row.clone());
            let key = frames.push_scoped(frame, |frames| -> Result<Vec<Value>, DbError> {
                let mut key = Vec::with_capacity(select.order_by.len());
                for ord in &select.order_by {
                    key.push(expression::evaluate(&ord.expr, db, frames)?);
                }
                Ok(key)
            })?;
            keyed.push((key, row));
        }
        keyed.sort_by(|a, b| {
            for (i, ord) in select.order_by.iter().enumerate() {
                // Same ordering expression evaluated per row, so the two
                // sides share a type; a coercion failure here would mean
                // the expression itself is inconsistent across rows, which
                // `expression::evaluate` above would already have rejected.
                let cmp = a.0[i].compare(&b.0[i]).unwrap_or(std::cmp::Ordering::Equal);
                let cmp = if ord.direction == OrderDirection::Desc { cmp.reverse() } else { cmp };
                if cmp != std::cmp::Ordering::Equal {
                    return cmp;
                }
            }
            std::cmp::Ordering::Equal
        });
        rows = keyed.into_iter().map(|(_, row)| row).collect();
    }

    // 10. TOP.
    if let Some(top) = select.top {
        let n = if top.percent {
            (rows.len() as f64 * (top.count as f64).min(100.0) / 100.0).floor() as usize
        } else {
            top.count as usize
        };
        rows.truncate(n.min(rows.len()));
    }

    Ok(ResultSet::new(column_names, rows))
}

fn is_group_by_column(expr: &Expression, group_cols: &[String]) -> bool {
    matches!(expr, Expression::Identifier { name, .. } if group_cols.iter().any(|g| g.eq_ignore_ascii_case(name)))
}

/// `Value::column_type` return isn't needed by the pipeline, but downstream
/// DDL code constructs `Column`s from `ResultSet`s (`SELECT ... INTO`); kept
/// here so the mapping lives next to the pipeline that produces it.
pub fn infer_result_columns(rs: &ResultSet) -> Vec<Column> {
    rs.column_names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let ty = rs
                .rows
                .iter()
                .find_map(|r| r.value(i).column_type())
                .unwrap_or(ColumnType::Varchar);
            Column::new(name.clone(), ty)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use essadb_core::{Column as Col, ColumnType as CT, MemoryTable, Table};
    use crate::expression::{AggregateFn, ArithOp};
    use crate::statement::{GroupBy, SelectColumns};
    use crate::table_expr::TableExpression;

    fn test_db() -> Database {
        let mut db = Database::new();
        let mut t = MemoryTable::new("test", vec![Col::new("id", CT::Int), Col::new("group", CT::Varchar)]);
        let rows: Vec<(Option<i32>, &str)> = vec![
            (Some(1), "AA"),
            (Some(2), "C"),
            (Some(3), "B"),
            (Some(4), "C"),
            (None, "AA"),
            (Some(2), "C"),
            (Some(6), "AA"),
            (Some(7), "B"),
        ];
        for (id, g) in rows {
            let id_val = id.map(Value::Int).unwrap_or(Value::Null);
            t.insert_unchecked(Tuple::new(vec![id_val, Value::Varchar(g.into())])).unwrap();
        }
        db.register_table(Box::new(t)).unwrap();
        db
    }

    fn col(name: &str) -> Expression {
        Expression::Identifier {
            name: name.into(),
            table: None,
        }
    }

    #[test]
    fn aggregate_scenario_one() {
        let db = test_db();
        let mut frames = FrameStack::new();
        let select = SelectStatement {
            columns: SelectColumns::Exprs(vec![
                SelectColumn {
                    expr: Expression::Aggregate {
                        func: AggregateFn::Count,
                        expr: Box::new(col("id")),
                    },
                    alias: None,
                },
                SelectColumn {
                    expr: Expression::Aggregate {
                        func: AggregateFn::Sum,
                        expr: Box::new(col("id")),
                    },
                    alias: None,
                },
                SelectColumn {
                    expr: Expression::Aggregate {
                        func: AggregateFn::Min,
                        expr: Box::new(col("id")),
                    },
                    alias: None,
                },
                SelectColumn {
                    expr: Expression::Aggregate {
                        func: AggregateFn::Max,
                        expr: Box::new(col("id")),
                    },
                    alias: None,
                },
                SelectColumn {
                    expr: Expression::Aggregate {
                        func: AggregateFn::Avg,
                        expr: Box::new(col("id")),
                    },
                    alias: None,
                },
            ]),
            from: Some(TableExpression::Named {
                name: "test".into(),
                alias: None,
            }),
            ..Default::default()
        };
        let rs = execute_select(&select, &db, &mut frames).unwrap();
        assert_eq!(rs.rows.len(), 1);
        assert!(matches!(rs.rows[0].value(0), Value::Int(7)));
        assert!(matches!(rs.rows[0].value(1), Value::Float(f) if (*f - 25.0).abs() < 1e-6));
        assert!(matches!(rs.rows[0].value(2), Value::Float(f) if (*f - 1.0).abs() < 1e-6));
        assert!(matches!(rs.rows[0].value(3), Value::Float(f) if (*f - 7.0).abs() < 1e-6));
        assert!(matches!(rs.rows[0].value(4), Value::Float(f) if (*f - 3.125).abs() < 1e-6));
    }

    #[test]
    fn group_by_scenario_two() {
        let db = test_db();
        let mut frames = FrameStack::new();
        let select = SelectStatement {
            columns: SelectColumns::Exprs(vec![
                SelectColumn {
                    expr: col("group"),
                    alias: None,
                },
                SelectColumn {
                    expr: Expression::Aggregate {
                        func: AggregateFn::Count,
                        expr: Box::new(col("id")),
                    },
                    alias: None,
                },
            ]),
            from: Some(TableExpression::Named {
                name: "test".into(),
                alias: None,
            }),
            group_by: Some(GroupBy {
                columns: vec!["group".into()],
                is_partition: false,
            }),
            ..Default::default()
        };
        let rs = execute_select(&select, &db, &mut frames).unwrap();
        assert_eq!(rs.rows.len(), 3);
        let counts: std::collections::HashMap<String, i32> = rs
            .rows
            .iter()
            .map(|r| {
                let g = match r.value(0) {
                    Value::Varchar(s) => s.clone(),
                    _ => unreachable!(),
                };
                let c = match r.value(1) {
                    Value::Int(i) => *i,
                    _ => unreachable!(),
                };
                (g, c)
            })
            .collect();
        assert_eq!(counts.get("AA"), Some(&2));
        assert_eq!(counts.get("B"), Some(&2));
        assert_eq!(counts.get("C"), Some(&3));
    }

    #[test]
    fn between_and_order_by_scenario_three() {
        let db = test_db();
        let mut frames = FrameStack::new();
        let select = SelectStatement {
            columns: SelectColumns::Exprs(vec![SelectColumn {
                expr: col("id"),
                alias: None,
            }]),
            from: Some(TableExpression::Named {
                name: "test".into(),
                alias: None,
            }),
            where_clause: Some(Expression::Between {
                lhs: Box::new(col("id")),
                min: Box::new(Expression::Literal(Value::Int(2))),
                max: Box::new(Expression::Literal(Value::Int(4))),
            }),
            order_by: vec![crate::statement::OrderExpr {
                expr: col("id"),
                direction: OrderDirection::Asc,
            }],
            ..Default::default()
        };
        let rs = execute_select(&select, &db, &mut frames).unwrap();
        let ids: Vec<i32> = rs
            .rows
            .iter()
            .map(|r| match r.value(0) {
                Value::Int(i) => *i,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(ids, vec![2, 2, 3, 4]);
    }

    #[test]
    fn is_null_scenario_four() {
        let db = test_db();
        let mut frames = FrameStack::new();
        let select = SelectStatement {
            columns: SelectColumns::Exprs(vec![SelectColumn {
                expr: col("id"),
                alias: None,
            }]),
            from: Some(TableExpression::Named {
                name: "test".into(),
                alias: None,
            }),
            where_clause: Some(Expression::Is {
                lhs: Box::new(col("id")),
                check: crate::expression::IsCheck::Null,
            }),
            ..Default::default()
        };
        let rs = execute_select(&select, &db, &mut frames).unwrap();
        assert_eq!(rs.rows.len(), 1);
        assert!(matches!(rs.rows[0].value(0), Value::Null));
    }

    #[test]
    fn top_percent_scenario_five() {
        let db = test_db();
        let mut frames = FrameStack::new();
        let select = SelectStatement {
            columns: SelectColumns::Exprs(vec![SelectColumn {
                expr: col("id"),
                alias: None,
            }]),
            from: Some(TableExpression::Named {
                name: "test".into(),
                alias: None,
            }),
            top: Some(crate::statement::TopSpec { count: 75, percent: true }),
            order_by: vec![crate::statement::OrderExpr {
                expr: col("id"),
                direction: OrderDirection::Desc,
            }],
            ..Default::default()
        };
        let rs = execute_select(&select, &db, &mut frames).unwrap();
        assert_eq!(rs.rows.len(), 6);
    }

    #[test]
    fn star_without_from_fails() {
        let db = Database::new();
        let mut frames = FrameStack::new();
        let select = SelectStatement {
            columns: SelectColumns::Star,
            ..Default::default()
        };
        assert!(execute_select(&select, &db, &mut frames).is_err());
    }

    #[test]
    fn arithmetic_projection_without_from() {
        let db = Database::new();
        let mut frames = FrameStack::new();
        let select = SelectStatement {
            columns: SelectColumns::Exprs(vec![SelectColumn {
                expr: Expression::ArithmeticOp {
                    lhs: Box::new(Expression::Literal(Value::Int(1))),
                    op: ArithOp::Add,
                    rhs: Box::new(Expression::Literal(Value::Int(1))),
                },
                alias: Some("two".into()),
            }]),
            ..Default::default()
        };
        let rs = execute_select(&select, &db, &mut frames).unwrap();
        assert_eq!(rs.column_names, vec!["two"]);
        assert!(matches!(rs.rows[0].value(0), Value::Int(2)));
    }
}
