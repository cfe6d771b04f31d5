//! Table expression AST: `FROM` sources -- table reference, equi-join,
//! cross join, sub-select (spec §4.5/§4.6 joins).

use essadb_core::{Column, ColumnType, Database, DbError, Relation, Table, Tuple};

use crate::frame::{FrameStack, FromSchema};
use crate::statement::SelectStatement;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Outer,
}

#[derive(Debug, Clone)]
pub struct JoinOn {
    pub left_column: String,
    pub right_column: String,
}

#[derive(Debug, Clone)]
pub enum TableExpression {
    Named {
        name: String,
        alias: Option<String>,
    },
    SubSelect {
        select: Box<SelectStatement>,
        alias: String,
    },
    Join {
        left: Box<TableExpression>,
        right: Box<TableExpression>,
        kind: JoinKind,
        on: JoinOn,
    },
    Cross {
        left: Box<TableExpression>,
        right: Box<TableExpression>,
    },
}

impl TableExpression {
    pub fn alias(&self) -> Option<&str> {
        match self {
            TableExpression::Named { name, alias } => Some(alias.as_deref().unwrap_or(name)),
            TableExpression::SubSelect { alias, .. } => Some(alias),
            TableExpression::Join { .. } | TableExpression::Cross { .. } => None,
        }
    }
}

/// An owned in-memory relation returned for materialized sources (joins,
/// cross joins, sub-selects): a plain column list plus a row vector.
pub struct MaterializedRelation {
    columns: Vec<Column>,
    rows: Vec<Tuple>,
}

impl Relation for MaterializedRelation {
    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn size(&self) -> usize {
        self.rows.len()
    }

    fn rows(&self) -> Box<dyn Iterator<Item = Tuple> + '_> {
        Box::new(self.rows.iter().cloned())
    }
}

/// A thin, non-owning `Relation` wrapper that borrows a `Table` from the
/// `Database` without copying rows (spec §3 "non-owning wrapper").
pub struct TableRef<'a> {
    table: &'a dyn Table,
}

impl<'a> Relation for TableRef<'a> {
    fn columns(&self) -> &[Column] {
        self.table.columns()
    }

    fn size(&self) -> usize {
        self.table.size()
    }

    fn rows(&self) -> Box<dyn Iterator<Item = Tuple> + '_> {
        self.table.rows()
    }
}

pub enum EvaluatedSource<'a> {
    Borrowed(TableRef<'a>),
    Owned(MaterializedRelation),
}

impl<'a> EvaluatedSource<'a> {
    pub fn relation(&self) -> &dyn Relation {
        match self {
            EvaluatedSource::Borrowed(r) => r,
            EvaluatedSource::Owned(r) => r,
        }
    }

    pub fn into_rows(self) -> Vec<Tuple> {
        match self {
            EvaluatedSource::Borrowed(r) => r.table.rows().collect(),
            EvaluatedSource::Owned(r) => r.rows,
        }
    }
}

/// Evaluates a table expression into a relation plus the schema used for
/// identifier resolution (spec §4.6 step 1). Joins and sub-selects
/// materialize; a plain table reference borrows the database's table.
pub fn evaluate<'a>(
    expr: &TableExpression,
    db: &'a Database,
    frames: &mut FrameStack,
) -> Result<(EvaluatedSource<'a>, FromSchema), DbError> {
    match expr {
        TableExpression::Named { name, alias } => {
            let table = db.table(name)?;
            let schema_name = alias.as_deref().unwrap_or(name.as_str());
            let schema = FromSchema::from_columns(Some(schema_name), table.columns());
            Ok((EvaluatedSource::Borrowed(TableRef { table }), schema))
        }

        TableExpression::SubSelect { select, alias } => {
            let rs = crate::select::execute_select(select, db, frames)?;
            let columns: Vec<Column> = rs
                .column_names
                .iter()
                .map(|n| Column::new(n.clone(), ColumnType::Varchar))
                .collect();
            let schema = FromSchema::from_columns(Some(alias), &columns);
            Ok((
                EvaluatedSource::Owned(MaterializedRelation { columns, rows: rs.rows }),
                schema,
            ))
        }

        TableExpression::Cross { left, right } => {
            let (left_src, left_schema) = evaluate(left, db, frames)?;
            let (right_src, right_schema) = evaluate(right, db, frames)?;
            let left_columns = left_src.relation().columns().to_vec();
            let right_columns = right_src.relation().columns().to_vec();
            let left_rows = left_src.into_rows();
            let right_rows = right_src.into_rows();

            let mut rows = Vec::with_capacity(left_rows.len() * right_rows.len());
            for l in &left_rows {
                for r in &right_rows {
                    rows.push(l.joined_with(r));
                }
            }
            let mut columns = left_columns;
            columns.extend(right_columns);
            let schema = FromSchema::join(left_schema, right_schema);
            Ok((EvaluatedSource::Owned(MaterializedRelation { columns, rows }), schema))
        }

        TableExpression::Join { left, right, kind, on } => {
            let (left_src, left_schema) = evaluate(left, db, frames)?;
            let (right_src, right_schema) = evaluate(right, db, frames)?;
            let left_columns = left_src.relation().columns().to_vec();
            let right_columns = right_src.relation().columns().to_vec();

            let left_col = left_schema
                .resolve(&on.left_column, None)
                .ok_or_else(|| DbError::ColumnDoesNotExist {
                    column: on.left_column.clone(),
                    table: "<join left>".into(),
                })?;
            let right_col_absolute = right_schema
                .resolve(&on.right_column, None)
                .ok_or_else(|| DbError::ColumnDoesNotExist {
                    column: on.right_column.clone(),
                    table: "<join right>".into(),
                })?;
            let right_col = right_col_absolute; // right_schema is 0-based on its own columns before join-shift

            let left_rows = left_src.into_rows();
            let right_rows = right_src.into_rows();
            let rows = equi_join(&left_rows, left_columns.len(), left_col, &right_rows, right_columns.len(), right_col, *kind)?;

            let mut columns = left_columns;
            columns.extend(right_columns);
            let schema = FromSchema::join(left_schema, right_schema);
            Ok((EvaluatedSource::Owned(MaterializedRelation { columns, rows }), schema))
        }
    }
}

/// Sort-merge equi-join. Matches per spec §4.6: INNER emits only matched
/// pairs; LEFT/RIGHT always emit their named side, padding the other with
/// nulls when unmatched; OUTER emits both unmatched sides plus matches.
#[allow(clippy::too_many_arguments)]
fn equi_join(
    left_rows: &[Tuple],
    left_width: usize,
    left_col: usize,
    right_rows: &[Tuple],
    right_width: usize,
    right_col: usize,
    kind: JoinKind,
) -> Result<Vec<Tuple>, DbError> {
    // Each side is sorted against itself (same column, same type), so a
    // coercion failure can't happen here.
    let mut left_idx: Vec<usize> = (0..left_rows.len()).collect();
    left_idx.sort_by(|&a, &b| {
        left_rows[a]
            .value(left_col)
            .compare(left_rows[b].value(left_col))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut right_idx: Vec<usize> = (0..right_rows.len()).collect();
    right_idx.sort_by(|&a, &b| {
        right_rows[a]
            .value(right_col)
            .compare(right_rows[b].value(right_col))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut out = Vec::new();
    let mut li = 0usize;
    let mut ri = 0usize;

    let null_right = || Tuple::with_len(right_width);
    let null_left = || Tuple::with_len(left_width);

    while li < left_idx.len() || ri < right_idx.len() {
        let lv = left_idx.get(li).map(|&i| left_rows[i].value(left_col));
        let rv = right_idx.get(ri).map(|&i| right_rows[i].value(right_col));

        let cmp = match (lv, rv) {
            (Some(l), Some(r)) => Some(l.compare(r)?),
            (Some(_), None) => Some(std::cmp::Ordering::Less),
            (None, Some(_)) => Some(std::cmp::Ordering::Greater),
            (None, None) => None,
        };

        match cmp {
            None => break,
            Some(std::cmp::Ordering::Less) => {
                let row = &left_rows[left_idx[li]];
                if matches!(kind, JoinKind::Left | JoinKind::Outer) {
                    out.push(row.joined_with(&null_right()));
                }
                li += 1;
            }
            Some(std::cmp::Ordering::Greater) => {
                let row = &right_rows[right_idx[ri]];
                if matches!(kind, JoinKind::Right | JoinKind::Outer) {
                    out.push(null_left().joined_with(row));
                }
                ri += 1;
            }
            Some(std::cmp::Ordering::Equal) => {
                let key = left_rows[left_idx[li]].value(left_col).clone();
                let l_start = li;
                while li < left_idx.len() && left_rows[left_idx[li]].value(left_col).values_equal(&key) {
                    li += 1;
                }
                let r_start = ri;
                while ri < right_idx.len() && right_rows[right_idx[ri]].value(right_col).values_equal(&key) {
                    ri += 1;
                }
                for &l in &left_idx[l_start..li] {
                    for &r in &right_idx[r_start..ri] {
                        out.push(left_rows[l].joined_with(&right_rows[r]));
                    }
                }
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use essadb_core::{Column as Col, ColumnType as CT, Value};

    fn t(id: i32) -> Tuple {
        Tuple::new(vec![Value::Int(id)])
    }

    #[test]
    fn inner_join_only_emits_matches() {
        let left = vec![t(1), t(2)];
        let right = vec![t(2), t(3)];
        let rows = equi_join(&left, 1, 0, &right, 1, 0, JoinKind::Inner).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(matches!(rows[0].value(0), Value::Int(2)));
    }

    #[test]
    fn left_join_pads_unmatched() {
        let left = vec![t(1), t(2)];
        let right = vec![t(2)];
        let rows = equi_join(&left, 1, 0, &right, 1, 0, JoinKind::Left).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().any(|r| matches!(r.value(1), Value::Null)));
    }

    #[test]
    fn schema_join_shifts_right_indices() {
        let left = FromSchema::from_columns(Some("l"), &[Col::new("a", CT::Int)]);
        let right = FromSchema::from_columns(Some("r"), &[Col::new("b", CT::Int)]);
        let joined = FromSchema::join(left, right);
        assert_eq!(joined.resolve("a", Some("l")), Some(0));
        assert_eq!(joined.resolve("b", Some("r")), Some(1));
    }
}
