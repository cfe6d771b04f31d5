//! Expression/table-expression/statement AST, evaluator and scalar
//! function registry for essadb (spec §4.5/§4.6/§4.5.1).

pub mod error;
pub mod expression;
pub mod frame;
pub mod functions;
pub mod like;
pub mod select;
pub mod statement;
pub mod table_expr;

pub use error::SQLParseError;
pub use expression::{AggregateFn, ArithOp, CaseArm, CompareOp, Expression, IsCheck};
pub use frame::{Frame, FrameStack, FromSchema, ProjectionAliases, RowType, TupleWithSource};
pub use select::execute_select;
pub use statement::{
    AlterAction, AlterTableStatement, ColumnDef, CreateTableStatement, DeleteStatement, EngineChoice, GroupBy,
    ImportStatement, InsertSource, InsertStatement, OrderDirection, OrderExpr, SelectColumn, SelectColumns,
    SelectStatement, Statement, TopSpec, UnionMode, UnionStatement, UpdateAssignment, UpdateStatement,
    ValueOrResultSet,
};
pub use table_expr::{EvaluatedSource, JoinKind, JoinOn, TableExpression};
