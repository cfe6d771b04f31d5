//! Statement AST: every top-level SQL form the parser can produce
//! (spec §4.4/§4.8).

use essadb_core::{ColumnType, Value};

use crate::expression::Expression;
use crate::table_expr::TableExpression;

#[derive(Debug, Clone)]
pub struct SelectColumn {
    pub expr: Expression,
    pub alias: Option<String>,
}

impl SelectColumn {
    /// Column name per spec §4.6 step 12: the alias if given, else the
    /// expression's `to_string()`.
    pub fn display_name(&self) -> String {
        self.alias.clone().unwrap_or_else(|| self.expr.to_string())
    }
}

#[derive(Debug, Clone)]
pub enum SelectColumns {
    Star,
    Exprs(Vec<SelectColumn>),
}

#[derive(Debug, Clone, Copy)]
pub struct TopSpec {
    pub count: u32,
    pub percent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct OrderExpr {
    pub expr: Expression,
    pub direction: OrderDirection,
}

#[derive(Debug, Clone)]
pub struct GroupBy {
    pub columns: Vec<String>,
    /// `PARTITION BY` disables grouping in this engine (spec §9 Open
    /// Question, frozen behavior).
    pub is_partition: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SelectStatement {
    pub distinct: bool,
    pub top: Option<TopSpec>,
    pub columns: SelectColumns,
    pub into: Option<String>,
    pub from: Option<TableExpression>,
    pub where_clause: Option<Expression>,
    pub group_by: Option<GroupBy>,
    pub having: Option<Expression>,
    pub order_by: Vec<OrderExpr>,
}

impl Default for SelectColumns {
    fn default() -> Self {
        SelectColumns::Star
    }
}

#[derive(Debug, Clone)]
pub enum InsertSource {
    Values(Vec<Vec<Expression>>),
    Select(Box<SelectStatement>),
}

#[derive(Debug, Clone)]
pub struct InsertStatement {
    pub table: String,
    pub columns: Vec<String>,
    pub source: InsertSource,
}

#[derive(Debug, Clone)]
pub struct UpdateAssignment {
    pub column: String,
    pub value: Expression,
}

#[derive(Debug, Clone)]
pub struct UpdateStatement {
    pub table: String,
    pub assignments: Vec<UpdateAssignment>,
    pub where_clause: Option<Expression>,
}

#[derive(Debug, Clone)]
pub struct DeleteStatement {
    pub table: String,
    pub where_clause: Option<Expression>,
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub r#type: ColumnType,
    pub not_null: bool,
    pub unique: bool,
    pub auto_increment: bool,
    pub default_value: Option<Expression>,
    pub primary_key: bool,
    pub references: Option<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineChoice {
    #[default]
    Memory,
    Edb,
}

#[derive(Debug, Clone)]
pub struct CreateTableStatement {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub main_check: Option<Expression>,
    pub named_checks: Vec<(String, Expression)>,
    pub engine: EngineChoice,
}

#[derive(Debug, Clone)]
pub enum AlterAction {
    AddColumn(ColumnDef),
    AlterColumn { name: String, r#type: ColumnType, not_null: bool },
    DropColumn(String),
}

#[derive(Debug, Clone)]
pub struct AlterTableStatement {
    pub table: String,
    pub action: AlterAction,
}

#[derive(Debug, Clone)]
pub struct ImportStatement {
    pub table: String,
    pub file_path: String,
}

#[derive(Debug, Clone, Copy)]
pub enum UnionMode {
    Distinct,
    All,
}

#[derive(Debug, Clone)]
pub struct UnionStatement {
    pub left: Box<SelectStatement>,
    pub right: Box<SelectStatement>,
    pub mode: UnionMode,
}

#[derive(Debug, Clone)]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    CreateTable(CreateTableStatement),
    DropTable(String),
    TruncateTable(String),
    AlterTable(AlterTableStatement),
    Import(ImportStatement),
    ShowTables,
    Union(UnionStatement),
}

/// Either a bare scalar (not produced by any current statement form, but
/// kept for the `ValueOrResultSet` contract spec §6 names) or a result set.
#[derive(Debug, Clone)]
pub enum ValueOrResultSet {
    Value(Value),
    ResultSet(essadb_core::ResultSet),
}
