//! The expression AST and its evaluator (spec §4.5): a closed, polymorphic
//! family of nodes sharing one capability set (evaluate, to_string,
//! referenced_columns, contains_aggregate).

use essadb_core::{ColumnType, Database, DbError, Value};

use crate::frame::{FrameStack, RowType};
use crate::functions;
use crate::like::like_matches;
use crate::statement::SelectStatement;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    Like,
    Match,
}

impl CompareOp {
    fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
            CompareOp::And => "AND",
            CompareOp::Or => "OR",
            CompareOp::Like => "LIKE",
            CompareOp::Match => "MATCH",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    fn as_str(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl AggregateFn {
    fn as_str(self) -> &'static str {
        match self {
            AggregateFn::Count => "COUNT",
            AggregateFn::Sum => "SUM",
            AggregateFn::Min => "MIN",
            AggregateFn::Max => "MAX",
            AggregateFn::Avg => "AVG",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsCheck {
    Null,
    NotNull,
}

#[derive(Debug, Clone)]
pub struct CaseArm {
    pub when: Expression,
    pub then: Expression,
}

/// The expression AST: a closed family of node kinds (spec §4.5, §9
/// "polymorphism -> sum types + small trait"). `IndexExpression` is an
/// internal node injected when expanding `SELECT *`.
#[derive(Debug, Clone)]
pub enum Expression {
    Literal(Value),
    Identifier {
        name: String,
        table: Option<String>,
    },
    BinaryOp {
        lhs: Box<Expression>,
        op: CompareOp,
        rhs: Box<Expression>,
    },
    ArithmeticOp {
        lhs: Box<Expression>,
        op: ArithOp,
        rhs: Box<Expression>,
    },
    UnaryMinus(Box<Expression>),
    Not(Box<Expression>),
    Between {
        lhs: Box<Expression>,
        min: Box<Expression>,
        max: Box<Expression>,
    },
    In {
        lhs: Box<Expression>,
        args: Vec<Expression>,
    },
    Is {
        lhs: Box<Expression>,
        check: IsCheck,
    },
    Case {
        arms: Vec<CaseArm>,
        else_branch: Option<Box<Expression>>,
    },
    Function {
        name: String,
        args: Vec<Expression>,
    },
    Aggregate {
        func: AggregateFn,
        expr: Box<Expression>,
    },
    ScalarSelect(Box<SelectStatement>),
    /// Injected for `SELECT *`: reads the `position`-th value of the
    /// current row without a name lookup; `label` is only used for display.
    IndexExpression {
        position: usize,
        label: String,
    },
}

impl Expression {
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expression::Aggregate { .. } => true,
            Expression::Literal(_) | Expression::Identifier { .. } | Expression::IndexExpression { .. } => false,
            Expression::BinaryOp { lhs, rhs, .. } | Expression::ArithmeticOp { lhs, rhs, .. } => {
                lhs.contains_aggregate() || rhs.contains_aggregate()
            }
            Expression::UnaryMinus(e) | Expression::Not(e) => e.contains_aggregate(),
            Expression::Between { lhs, min, max } => {
                lhs.contains_aggregate() || min.contains_aggregate() || max.contains_aggregate()
            }
            Expression::In { lhs, args } => lhs.contains_aggregate() || args.iter().any(Expression::contains_aggregate),
            Expression::Is { lhs, .. } => lhs.contains_aggregate(),
            Expression::Case { arms, else_branch } => {
                arms.iter().any(|a| a.when.contains_aggregate() || a.then.contains_aggregate())
                    || else_branch.as_ref().is_some_and(|e| e.contains_aggregate())
            }
            Expression::Function { args, .. } => args.iter().any(Expression::contains_aggregate),
            Expression::ScalarSelect(_) => false,
        }
    }

    pub fn referenced_columns(&self, out: &mut Vec<(Option<String>, String)>) {
        match self {
            Expression::Identifier { name, table } => out.push((table.clone(), name.clone())),
            Expression::Literal(_) | Expression::IndexExpression { .. } | Expression::ScalarSelect(_) => {}
            Expression::BinaryOp { lhs, rhs, .. } | Expression::ArithmeticOp { lhs, rhs, .. } => {
                lhs.referenced_columns(out);
                rhs.referenced_columns(out);
            }
            Expression::UnaryMinus(e) | Expression::Not(e) => e.referenced_columns(out),
            Expression::Between { lhs, min, max } => {
                lhs.referenced_columns(out);
                min.referenced_columns(out);
                max.referenced_columns(out);
            }
            Expression::In { lhs, args } => {
                lhs.referenced_columns(out);
                for a in args {
                    a.referenced_columns(out);
                }
            }
            Expression::Is { lhs, .. } => lhs.referenced_columns(out),
            Expression::Case { arms, else_branch } => {
                for a in arms {
                    a.when.referenced_columns(out);
                    a.then.referenced_columns(out);
                }
                if let Some(e) = else_branch {
                    e.referenced_columns(out);
                }
            }
            Expression::Function { args, .. } => {
                for a in args {
                    a.referenced_columns(out);
                }
            }
            Expression::Aggregate { expr, .. } => expr.referenced_columns(out),
        }
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Literal(v) => match v {
                Value::Varchar(s) => write!(f, "'{s}'"),
                other => write!(f, "{other}"),
            },
            Expression::Identifier { name, table } => match table {
                Some(t) => write!(f, "{t}.{name}"),
                None => write!(f, "{name}"),
            },
            Expression::BinaryOp { lhs, op, rhs } => write!(f, "{lhs} {} {rhs}", op.as_str()),
            Expression::ArithmeticOp { lhs, op, rhs } => write!(f, "{lhs} {} {rhs}", op.as_str()),
            Expression::UnaryMinus(e) => write!(f, "-{e}"),
            Expression::Not(e) => write!(f, "NOT {e}"),
            Expression::Between { lhs, min, max } => write!(f, "{lhs} BETWEEN {min} AND {max}"),
            Expression::In { lhs, args } => {
                write!(f, "{lhs} IN (")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
            Expression::Is { lhs, check } => match check {
                IsCheck::Null => write!(f, "{lhs} IS NULL"),
                IsCheck::NotNull => write!(f, "{lhs} IS NOT NULL"),
            },
            Expression::Case { arms, else_branch } => {
                write!(f, "CASE")?;
                for arm in arms {
                    write!(f, " WHEN {} THEN {}", arm.when, arm.then)?;
                }
                if let Some(e) = else_branch {
                    write!(f, " ELSE {e}")?;
                }
                write!(f, " END")
            }
            Expression::Function { name, args } => {
                write!(f, "{name}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
            Expression::Aggregate { func, expr } => write!(f, "{}({expr})", func.as_str()),
            Expression::ScalarSelect(_) => write!(f, "(SELECT ...)"),
            Expression::IndexExpression { label, .. } => write!(f, "{label}"),
        }
    }
}

/// Evaluates `expr` against `db`/`frames` per spec §4.5. Correlated
/// sub-queries and aggregates push/pop frames internally.
pub fn evaluate(expr: &Expression, db: &Database, frames: &mut FrameStack) -> Result<Value, DbError> {
    match expr {
        Expression::Literal(v) => Ok(v.clone()),

        Expression::Identifier { name, table } => {
            let index = resolve_identifier(name, table.as_deref(), frames)?;
            Ok(read_resolved(frames, index))
        }

        Expression::IndexExpression { position, .. } => {
            let frame = frames.top().ok_or(DbError::InvalidIdentifier)?;
            Ok(frame.row.tuple.value(*position).clone())
        }

        Expression::UnaryMinus(inner) => evaluate(inner, db, frames)?.neg(),

        Expression::Not(inner) => Ok(Value::Bool(!evaluate(inner, db, frames)?.to_bool())),

        Expression::ArithmeticOp { lhs, op, rhs } => {
            let l = evaluate(lhs, db, frames)?;
            let r = evaluate(rhs, db, frames)?;
            match op {
                ArithOp::Add => l.add(&r),
                ArithOp::Sub => l.sub(&r),
                ArithOp::Mul => l.mul(&r),
                ArithOp::Div => l.div(&r),
            }
        }

        Expression::BinaryOp { lhs, op, rhs } => {
            if *op == CompareOp::And {
                let l = evaluate(lhs, db, frames)?;
                if !l.to_bool() {
                    return Ok(Value::Bool(false));
                }
                return Ok(Value::Bool(evaluate(rhs, db, frames)?.to_bool()));
            }
            if *op == CompareOp::Or {
                let l = evaluate(lhs, db, frames)?;
                if l.to_bool() {
                    return Ok(Value::Bool(true));
                }
                return Ok(Value::Bool(evaluate(rhs, db, frames)?.to_bool()));
            }

            let l = evaluate(lhs, db, frames)?;
            let r = evaluate(rhs, db, frames)?;
            if matches!(op, CompareOp::Like | CompareOp::Match) {
                return eval_pattern(*op, &l, &r);
            }
            if l.is_null() || r.is_null() {
                return Ok(match op {
                    CompareOp::Eq => Value::Bool(l.is_null() && r.is_null()),
                    CompareOp::Ne => Value::Bool(!(l.is_null() && r.is_null())),
                    _ => Value::Null,
                });
            }
            let ord = l.compare(&r)?;
            let result = match op {
                CompareOp::Eq => ord.is_eq(),
                CompareOp::Ne => !ord.is_eq(),
                CompareOp::Lt => ord.is_lt(),
                CompareOp::Gt => ord.is_gt(),
                CompareOp::Le => ord.is_le(),
                CompareOp::Ge => ord.is_ge(),
                CompareOp::And | CompareOp::Or | CompareOp::Like | CompareOp::Match => unreachable!(),
            };
            Ok(Value::Bool(result))
        }

        Expression::Between { lhs, min, max } => {
            let v = evaluate(lhs, db, frames)?;
            let lo = evaluate(min, db, frames)?;
            let hi = evaluate(max, db, frames)?;
            if v.is_null() || lo.is_null() || hi.is_null() {
                return Ok(Value::Null);
            }
            Ok(Value::Bool(v.compare(&lo)?.is_ge() && v.compare(&hi)?.is_le()))
        }

        Expression::In { lhs, args } => {
            let v = evaluate(lhs, db, frames)?;
            if v.is_null() {
                return Ok(Value::Null);
            }
            for a in args {
                let candidate = evaluate(a, db, frames)?;
                if !candidate.is_null() && v.compare(&candidate)?.is_eq() {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }

        Expression::Is { lhs, check } => {
            let v = evaluate(lhs, db, frames)?;
            Ok(Value::Bool(match check {
                IsCheck::Null => v.is_null(),
                IsCheck::NotNull => !v.is_null(),
            }))
        }

        Expression::Case { arms, else_branch } => {
            for arm in arms {
                if evaluate(&arm.when, db, frames)?.to_bool() {
                    return evaluate(&arm.then, db, frames);
                }
            }
            match else_branch {
                Some(e) => evaluate(e, db, frames),
                None => Ok(Value::Null),
            }
        }

        Expression::Function { name, args } => {
            let handler = functions::lookup(name)
                .ok_or_else(|| DbError::Other(format!("unknown function '{name}'")))?;
            let values = args.iter().map(|a| evaluate(a, db, frames)).collect::<Result<Vec<_>, _>>()?;
            handler(&values)
        }

        Expression::Aggregate { func, expr } => eval_aggregate(*func, expr, db, frames),

        Expression::ScalarSelect(select) => {
            let rs = crate::select::execute_select(select, db, frames)?;
            if rs.rows.len() != 1 || rs.column_names.len() != 1 {
                return Err(DbError::ScalarSelectCardinality);
            }
            Ok(rs.rows[0].value(0).clone())
        }
    }
}

fn eval_pattern(op: CompareOp, lhs: &Value, rhs: &Value) -> Result<Value, DbError> {
    if lhs.is_null() || rhs.is_null() {
        return Ok(Value::Null);
    }
    let (Some(text), Some(pattern)) = (lhs.as_str(), rhs.as_str()) else {
        return Err(DbError::no_matching_operator(op.as_str(), ColumnType::Varchar));
    };
    let matched = match op {
        CompareOp::Like => like_matches(text, pattern),
        CompareOp::Match => fancy_regex::Regex::new(pattern)
            .map_err(|e| DbError::Other(format!("invalid MATCH pattern: {e}")))?
            .is_match(text)
            .unwrap_or(false),
        _ => unreachable!(),
    };
    Ok(Value::Bool(matched))
}

/// Identifier resolution rule 1/2/3 (spec §4.5): in a `FromResultSet` frame
/// an unqualified name first tries the frame's projection aliases, falling
/// back to the source tuple; otherwise frames are walked innermost ->
/// outermost via their `FromSchema`.
fn resolve_identifier(name: &str, qualifier: Option<&str>, frames: &FrameStack) -> Result<ResolvedIndex, DbError> {
    if qualifier.is_none() {
        if let Some(frame) = frames.top() {
            if frame.row_type == RowType::FromResultSet {
                if let Some(projection) = &frame.projection {
                    if let Some(index) = projection.resolve(name) {
                        return Ok(ResolvedIndex::Projection(index));
                    }
                }
                if let Some(source) = &frame.row.source {
                    if let Some(index) = frame.schema.resolve(name, None) {
                        let _ = source;
                        return Ok(ResolvedIndex::Source(frames.depth() - 1, index));
                    }
                }
            }
        }
    }
    match frames.resolve(name, qualifier) {
        Some((depth, index)) => Ok(ResolvedIndex::Table(depth, index)),
        None => Err(DbError::InvalidIdentifier),
    }
}

enum ResolvedIndex {
    Projection(usize),
    Source(usize, usize),
    Table(usize, usize),
}

fn read_resolved(frames: &FrameStack, resolved: ResolvedIndex) -> Value {
    match resolved {
        ResolvedIndex::Projection(index) => frames.top().unwrap().row.tuple.value(index).clone(),
        ResolvedIndex::Source(depth, index) => {
            let frame = frames.frame_at(depth);
            frame
                .row
                .source
                .as_ref()
                .map(|t| t.value(index).clone())
                .unwrap_or(Value::Null)
        }
        ResolvedIndex::Table(depth, index) => frames.frame_at(depth).row.tuple.value(index).clone(),
    }
}

/// Aggregate evaluation over the current frame's `row_group` span: a fresh
/// frame with the same schema is pushed and walked row-by-row with
/// `source: None` (spec §4.6 "Aggregates").
fn eval_aggregate(func: AggregateFn, inner: &Expression, db: &Database, frames: &mut FrameStack) -> Result<Value, DbError> {
    let Some(top) = frames.top() else {
        return Err(DbError::Other("aggregate used outside a row group".into()));
    };
    let schema = top.schema.clone();
    let rows = top.row_group.clone().unwrap_or_default();

    let mut count = 0usize;
    let mut sum = 0f64;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for row in &rows {
        let frame = crate::frame::Frame::new(schema.clone(), RowType::FromTable);
        let mut frame = frame;
        frame.row.tuple = row.clone();
        frame.row.source = None;
        frames.push(frame);
        let value = evaluate(inner, db, frames);
        frames.pop();
        let value = value?;
        if value.is_null() {
            continue;
        }
        count += 1;
        if let Some(v) = value.as_f64() {
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
    }

    Ok(match func {
        AggregateFn::Count => Value::Int(count as i32),
        AggregateFn::Sum => Value::Float(sum as f32),
        AggregateFn::Avg => Value::Float((sum / count.max(1) as f64) as f32),
        AggregateFn::Min => Value::Float(min as f32),
        AggregateFn::Max => Value::Float(max as f32),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use essadb_core::{Column, ColumnType as CT, MemoryTable, Table, Tuple};

    fn db_with_test_table() -> Database {
        let mut db = Database::new();
        let mut t = MemoryTable::new("test", vec![Column::new("id", CT::Int), Column::new("v", CT::Varchar)]);
        t.insert_unchecked(Tuple::new(vec![Value::Int(1), Value::Varchar("a".into())])).unwrap();
        db.register_table(Box::new(t)).unwrap();
        db
    }

    #[test]
    fn literal_roundtrips() {
        let db = Database::new();
        let mut frames = FrameStack::new();
        let v = evaluate(&Expression::Literal(Value::Int(5)), &db, &mut frames).unwrap();
        assert!(matches!(v, Value::Int(5)));
    }

    #[test]
    fn and_short_circuits_on_false() {
        let db = db_with_test_table();
        let mut frames = FrameStack::new();
        let expr = Expression::BinaryOp {
            lhs: Box::new(Expression::Literal(Value::Bool(false))),
            op: CompareOp::And,
            rhs: Box::new(Expression::Identifier {
                name: "nonexistent".into(),
                table: None,
            }),
        };
        let v = evaluate(&expr, &db, &mut frames).unwrap();
        assert!(matches!(v, Value::Bool(false)));
    }

    #[test]
    fn null_equals_null() {
        let db = Database::new();
        let mut frames = FrameStack::new();
        let expr = Expression::BinaryOp {
            lhs: Box::new(Expression::Literal(Value::Null)),
            op: CompareOp::Eq,
            rhs: Box::new(Expression::Literal(Value::Null)),
        };
        assert!(matches!(evaluate(&expr, &db, &mut frames).unwrap(), Value::Bool(true)));
    }
}
