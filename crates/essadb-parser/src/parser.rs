//! Recursive-descent / precedence-climbing parser (spec §4.4): turns a
//! normalized token stream into a `Statement`.
//!
//! Precedence, loosest to tightest: `OR` -> `AND` -> `NOT` -> comparison
//! (`= != < > <= >= LIKE MATCH IN BETWEEN IS [NOT] NULL`) -> additive
//! (`+ -`) -> multiplicative (`* /`) -> unary minus -> primary (literal,
//! identifier/member access, function call, parenthesized/sub-select,
//! `CASE`).

use essadb_core::{ColumnType, Date, Value};
use essadb_lexer::{Keyword, Lexer, Punct, Token, TokenKind};

use essadb_ast::{
    AggregateFn, AlterAction, AlterTableStatement, ArithOp, CaseArm, ColumnDef, CompareOp, CreateTableStatement,
    DeleteStatement, EngineChoice, Expression, GroupBy, ImportStatement, InsertSource, InsertStatement, IsCheck,
    JoinKind, JoinOn, OrderDirection, OrderExpr, SQLParseError, SelectColumn, SelectColumns, SelectStatement,
    Statement, TableExpression, TopSpec, UnionMode, UnionStatement, UpdateAssignment, UpdateStatement,
};

use crate::error::ParseError;
use crate::token_fixup::normalize;

/// Parses a single SQL statement. Trailing `;` is tolerated; anything else
/// left over after the statement is a parse error.
pub fn parse(sql: &str) -> Result<Statement, ParseError> {
    let tokens = normalize(Lexer::tokenize(sql)?);
    let mut parser = Parser::new(tokens);
    let stmt = parser.parse_statement()?;
    parser.eat_punct(Punct::Semicolon);
    parser.expect_eof()?;
    Ok(stmt)
}

/// Parses a bare expression, no surrounding statement. Used to round-trip a
/// `CHECK` constraint through its stored textual form (`Table::main_check`/
/// `named_checks` hold the expression's `Display` text, since `essadb-core`
/// cannot depend on `essadb-ast`) back into an `Expression` the tuple
/// integrity gate can evaluate (spec §4.9).
pub fn parse_expression(sql: &str) -> Result<Expression, ParseError> {
    let tokens = normalize(Lexer::tokenize(sql)?);
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_or()?;
    parser.expect_eof()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn offset(&self) -> usize {
        self.current().start_offset
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn is_punct(&self, p: Punct) -> bool {
        self.current().is_punct(p)
    }

    fn is_keyword(&self, k: Keyword) -> bool {
        self.current().is_keyword(k)
    }

    fn eat_punct(&mut self, p: Punct) -> bool {
        if self.is_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, k: Keyword) -> bool {
        if self.is_keyword(k) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: Punct) -> Result<(), SQLParseError> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", p.as_str())))
        }
    }

    fn expect_keyword(&mut self, k: Keyword) -> Result<(), SQLParseError> {
        if self.eat_keyword(k) {
            Ok(())
        } else {
            Err(self.error(format!("expected keyword {k}")))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, SQLParseError> {
        if self.current().kind == TokenKind::Identifier {
            Ok(self.advance().text.to_string())
        } else {
            Err(self.error("expected an identifier"))
        }
    }

    fn expect_eof(&mut self) -> Result<(), SQLParseError> {
        if self.current().is_eof() {
            Ok(())
        } else {
            Err(self.error("unexpected trailing input"))
        }
    }

    fn error(&self, message: impl Into<String>) -> SQLParseError {
        SQLParseError::new(message.into(), self.offset())
    }

    // ---- statements ----------------------------------------------------

    fn parse_statement(&mut self) -> Result<Statement, SQLParseError> {
        match self.current().kind {
            TokenKind::Keyword(Keyword::Select) => self.parse_select_or_union(),
            TokenKind::Keyword(Keyword::Insert) => self.parse_insert().map(Statement::Insert),
            TokenKind::Keyword(Keyword::Update) => self.parse_update().map(Statement::Update),
            TokenKind::Keyword(Keyword::Delete) => self.parse_delete().map(Statement::Delete),
            TokenKind::Keyword(Keyword::Create) => self.parse_create_table().map(Statement::CreateTable),
            TokenKind::Keyword(Keyword::Drop) => {
                self.advance();
                self.expect_keyword(Keyword::Table)?;
                Ok(Statement::DropTable(self.expect_identifier()?))
            }
            TokenKind::Keyword(Keyword::Truncate) => {
                self.advance();
                self.expect_keyword(Keyword::Table)?;
                Ok(Statement::TruncateTable(self.expect_identifier()?))
            }
            TokenKind::Keyword(Keyword::Alter) => self.parse_alter_table().map(Statement::AlterTable),
            TokenKind::Keyword(Keyword::Import) => self.parse_import().map(Statement::Import),
            TokenKind::Keyword(Keyword::Show) => {
                self.advance();
                self.expect_keyword(Keyword::Tables)?;
                Ok(Statement::ShowTables)
            }
            _ => Err(self.error("expected a statement")),
        }
    }

    fn parse_select_or_union(&mut self) -> Result<Statement, SQLParseError> {
        let left = self.parse_select()?;
        if self.eat_keyword(Keyword::Union) {
            let mode = if self.eat_keyword(Keyword::All) {
                UnionMode::All
            } else {
                UnionMode::Distinct
            };
            let right = self.parse_select()?;
            return Ok(Statement::Union(UnionStatement {
                left: Box::new(left),
                right: Box::new(right),
                mode,
            }));
        }
        Ok(Statement::Select(left))
    }

    fn parse_select(&mut self) -> Result<SelectStatement, SQLParseError> {
        self.expect_keyword(Keyword::Select)?;
        let distinct = self.eat_keyword(Keyword::Distinct);

        let top = if self.eat_keyword(Keyword::Top) {
            let count = self.expect_int()?;
            let percent = self.eat_keyword(Keyword::Perc);
            Some(TopSpec {
                count: count.max(0) as u32,
                percent,
            })
        } else {
            None
        };

        let columns = self.parse_select_columns()?;

        let into = if self.eat_keyword(Keyword::Into) {
            Some(self.expect_identifier()?)
        } else {
            None
        };

        let from = if self.eat_keyword(Keyword::From) {
            Some(self.parse_table_expr()?)
        } else {
            None
        };

        let where_clause = if self.eat_keyword(Keyword::Where) {
            Some(self.parse_or()?)
        } else {
            None
        };

        let group_by = self.parse_group_by()?;

        let having = if self.eat_keyword(Keyword::Having) {
            Some(self.parse_or()?)
        } else {
            None
        };

        let order_by = if self.eat_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            self.parse_order_list()?
        } else {
            Vec::new()
        };

        Ok(SelectStatement {
            distinct,
            top,
            columns,
            into,
            from,
            where_clause,
            group_by,
            having,
            order_by,
        })
    }

    fn parse_select_columns(&mut self) -> Result<SelectColumns, SQLParseError> {
        if self.is_punct(Punct::Star) {
            self.advance();
            return Ok(SelectColumns::Star);
        }
        let mut columns = Vec::new();
        loop {
            let expr = self.parse_or()?;
            let alias = if self.eat_keyword(Keyword::As) {
                Some(self.expect_identifier()?)
            } else if self.current().kind == TokenKind::Identifier {
                Some(self.advance().text.to_string())
            } else {
                None
            };
            columns.push(SelectColumn { expr, alias });
            if !self.eat_punct(Punct::Comma) {
                break;
            }
        }
        Ok(SelectColumns::Exprs(columns))
    }

    /// `GROUP BY` is a reserved keyword; `PARTITION BY` is recognized
    /// contextually off a plain identifier spelled "partition" immediately
    /// followed by `BY` (there is no reserved `PARTITION` keyword, spec
    /// §4.3 keyword list).
    fn parse_group_by(&mut self) -> Result<Option<GroupBy>, SQLParseError> {
        if self.eat_keyword(Keyword::Group) {
            self.expect_keyword(Keyword::By)?;
            return Ok(Some(GroupBy {
                columns: self.parse_identifier_list()?,
                is_partition: false,
            }));
        }
        if self.current().kind == TokenKind::Identifier && self.current().text.eq_ignore_ascii_case("partition") {
            self.advance();
            self.expect_keyword(Keyword::By)?;
            return Ok(Some(GroupBy {
                columns: self.parse_identifier_list()?,
                is_partition: true,
            }));
        }
        Ok(None)
    }

    fn parse_identifier_list(&mut self) -> Result<Vec<String>, SQLParseError> {
        let mut out = vec![self.expect_identifier()?];
        while self.eat_punct(Punct::Comma) {
            out.push(self.expect_identifier()?);
        }
        Ok(out)
    }

    fn parse_order_list(&mut self) -> Result<Vec<OrderExpr>, SQLParseError> {
        let mut out = Vec::new();
        loop {
            let expr = self.parse_or()?;
            let direction = if self.eat_keyword(Keyword::Desc) {
                OrderDirection::Desc
            } else {
                self.eat_keyword(Keyword::Asc);
                OrderDirection::Asc
            };
            out.push(OrderExpr { expr, direction });
            if !self.eat_punct(Punct::Comma) {
                break;
            }
        }
        Ok(out)
    }

    fn expect_int(&mut self) -> Result<i32, SQLParseError> {
        if self.current().kind == TokenKind::Int {
            let text = self.advance().text;
            text.parse::<i32>().map_err(|_| self.error("invalid integer literal"))
        } else {
            Err(self.error("expected an integer literal"))
        }
    }

    // ---- table expressions ---------------------------------------------

    fn parse_table_expr(&mut self) -> Result<TableExpression, SQLParseError> {
        let mut left = self.parse_table_primary()?;
        loop {
            let kind = if self.eat_keyword(Keyword::Inner) {
                Some(JoinKind::Inner)
            } else if self.eat_keyword(Keyword::Left) {
                self.eat_keyword(Keyword::Outer);
                Some(JoinKind::Left)
            } else if self.eat_keyword(Keyword::Right) {
                self.eat_keyword(Keyword::Outer);
                Some(JoinKind::Right)
            } else if self.eat_keyword(Keyword::Outer) {
                Some(JoinKind::Outer)
            } else if self.eat_keyword(Keyword::Full) {
                self.eat_keyword(Keyword::Outer);
                Some(JoinKind::Outer)
            } else {
                None
            };

            if let Some(kind) = kind {
                self.expect_keyword(Keyword::Join)?;
                let right = self.parse_table_primary()?;
                self.expect_keyword(Keyword::On)?;
                let on = self.parse_join_on()?;
                left = TableExpression::Join {
                    left: Box::new(left),
                    right: Box::new(right),
                    kind,
                    on,
                };
                continue;
            }

            if self.eat_keyword(Keyword::Join) {
                let right = self.parse_table_primary()?;
                self.expect_keyword(Keyword::On)?;
                let on = self.parse_join_on()?;
                left = TableExpression::Join {
                    left: Box::new(left),
                    right: Box::new(right),
                    kind: JoinKind::Inner,
                    on,
                };
                continue;
            }

            if self.eat_keyword(Keyword::Cross) {
                self.expect_keyword(Keyword::Join)?;
                let right = self.parse_table_primary()?;
                left = TableExpression::Cross {
                    left: Box::new(left),
                    right: Box::new(right),
                };
                continue;
            }

            if self.is_punct(Punct::Comma) {
                self.advance();
                let right = self.parse_table_primary()?;
                left = TableExpression::Cross {
                    left: Box::new(left),
                    right: Box::new(right),
                };
                continue;
            }

            break;
        }
        Ok(left)
    }

    fn parse_join_on(&mut self) -> Result<JoinOn, SQLParseError> {
        let left_column = self.parse_qualified_column()?;
        self.expect_punct(Punct::Eq)?;
        let right_column = self.parse_qualified_column()?;
        Ok(JoinOn { left_column, right_column })
    }

    /// `t.c` or plain `c`; only the column name is kept (the `FromSchema`
    /// on each side already disambiguates by its own alias).
    fn parse_qualified_column(&mut self) -> Result<String, SQLParseError> {
        let first = self.expect_identifier()?;
        if self.eat_punct(Punct::Dot) {
            self.expect_identifier()
        } else {
            Ok(first)
        }
    }

    fn parse_table_primary(&mut self) -> Result<TableExpression, SQLParseError> {
        if self.eat_punct(Punct::LParen) {
            let select = self.parse_select()?;
            self.expect_punct(Punct::RParen)?;
            self.eat_keyword(Keyword::As);
            let alias = self.expect_identifier()?;
            return Ok(TableExpression::SubSelect {
                select: Box::new(select),
                alias,
            });
        }
        let name = self.expect_identifier()?;
        let alias = if self.eat_keyword(Keyword::As) {
            Some(self.expect_identifier()?)
        } else if self.current().kind == TokenKind::Identifier {
            Some(self.advance().text.to_string())
        } else {
            None
        };
        Ok(TableExpression::Named { name, alias })
    }

    // ---- expressions: OR -> AND -> NOT -> comparison -> additive ->
    //      multiplicative -> unary -> primary ----------------------------

    fn parse_or(&mut self) -> Result<Expression, SQLParseError> {
        let mut lhs = self.parse_and()?;
        while self.eat_keyword(Keyword::Or) {
            let rhs = self.parse_and()?;
            lhs = Expression::BinaryOp {
                lhs: Box::new(lhs),
                op: CompareOp::Or,
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expression, SQLParseError> {
        let mut lhs = self.parse_not()?;
        while self.eat_keyword(Keyword::And) {
            let rhs = self.parse_not()?;
            lhs = Expression::BinaryOp {
                lhs: Box::new(lhs),
                op: CompareOp::And,
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expression, SQLParseError> {
        if self.eat_keyword(Keyword::Not) {
            return Ok(Expression::Not(Box::new(self.parse_not()?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expression, SQLParseError> {
        let lhs = self.parse_additive()?;

        if self.eat_keyword(Keyword::Between) {
            let min = self.parse_additive()?;
            self.expect_keyword(Keyword::And)?;
            let max = self.parse_additive()?;
            return Ok(Expression::Between {
                lhs: Box::new(lhs),
                min: Box::new(min),
                max: Box::new(max),
            });
        }

        if self.eat_keyword(Keyword::In) {
            self.expect_punct(Punct::LParen)?;
            let mut args = Vec::new();
            if !self.is_punct(Punct::RParen) {
                loop {
                    args.push(self.parse_or()?);
                    if !self.eat_punct(Punct::Comma) {
                        break;
                    }
                }
            }
            self.expect_punct(Punct::RParen)?;
            return Ok(Expression::In { lhs: Box::new(lhs), args });
        }

        if self.eat_keyword(Keyword::Is) {
            let check = if self.eat_keyword(Keyword::Not) {
                IsCheck::NotNull
            } else {
                IsCheck::Null
            };
            self.expect_keyword(Keyword::Null)?;
            return Ok(Expression::Is { lhs: Box::new(lhs), check });
        }

        let op = if self.eat_keyword(Keyword::Like) {
            Some(CompareOp::Like)
        } else if self.eat_keyword(Keyword::Match) {
            Some(CompareOp::Match)
        } else if self.eat_punct(Punct::Eq) {
            Some(CompareOp::Eq)
        } else if self.eat_punct(Punct::Ne) {
            Some(CompareOp::Ne)
        } else if self.eat_punct(Punct::Le) {
            Some(CompareOp::Le)
        } else if self.eat_punct(Punct::Ge) {
            Some(CompareOp::Ge)
        } else if self.eat_punct(Punct::Lt) {
            Some(CompareOp::Lt)
        } else if self.eat_punct(Punct::Gt) {
            Some(CompareOp::Gt)
        } else {
            None
        };

        let Some(op) = op else { return Ok(lhs) };
        let rhs = self.parse_additive()?;
        Ok(Expression::BinaryOp {
            lhs: Box::new(lhs),
            op,
            rhs: Box::new(rhs),
        })
    }

    fn parse_additive(&mut self) -> Result<Expression, SQLParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = if self.eat_punct(Punct::Plus) {
                ArithOp::Add
            } else if self.eat_punct(Punct::Minus) {
                ArithOp::Sub
            } else {
                break;
            };
            let rhs = self.parse_multiplicative()?;
            lhs = Expression::ArithmeticOp {
                lhs: Box::new(lhs),
                op,
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, SQLParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = if self.eat_punct(Punct::Star) {
                ArithOp::Mul
            } else if self.eat_punct(Punct::Slash) {
                ArithOp::Div
            } else {
                break;
            };
            let rhs = self.parse_unary()?;
            lhs = Expression::ArithmeticOp {
                lhs: Box::new(lhs),
                op,
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expression, SQLParseError> {
        if self.eat_punct(Punct::Minus) {
            return Ok(Expression::UnaryMinus(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expression, SQLParseError> {
        match self.current().kind {
            TokenKind::Int => {
                let text = self.advance().text;
                let n: i32 = text.parse().map_err(|_| self.error("invalid integer literal"))?;
                Ok(Expression::Literal(Value::Int(n)))
            }
            TokenKind::Float => {
                let text = self.advance().text;
                let n: f32 = text.parse().map_err(|_| self.error("invalid float literal"))?;
                Ok(Expression::Literal(Value::Float(n)))
            }
            TokenKind::String => {
                let text = self.advance().text;
                Ok(Expression::Literal(Value::Varchar(text.to_string())))
            }
            TokenKind::Date => {
                let text = self.advance().text;
                Ok(Expression::Literal(Value::Time(parse_date(&text).map_err(|m| self.error(m))?)))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expression::Literal(Value::Bool(true)))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expression::Literal(Value::Bool(false)))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Expression::Literal(Value::Null))
            }
            TokenKind::Keyword(Keyword::Case) => self.parse_case(),
            TokenKind::Punct(Punct::LParen) => {
                self.advance();
                if self.is_keyword(Keyword::Select) {
                    let select = self.parse_select()?;
                    self.expect_punct(Punct::RParen)?;
                    return Ok(Expression::ScalarSelect(Box::new(select)));
                }
                let expr = self.parse_or()?;
                self.expect_punct(Punct::RParen)?;
                Ok(expr)
            }
            TokenKind::Identifier => self.parse_identifier_or_call(),
            _ => Err(self.error("expected an expression")),
        }
    }

    fn parse_identifier_or_call(&mut self) -> Result<Expression, SQLParseError> {
        let name = self.advance().text.to_string();

        if self.eat_punct(Punct::LParen) {
            if let Some(func) = aggregate_for(&name) {
                let expr = if self.eat_punct(Punct::Star) {
                    Expression::Literal(Value::Int(1))
                } else {
                    self.parse_or()?
                };
                self.expect_punct(Punct::RParen)?;
                return Ok(Expression::Aggregate { func, expr: Box::new(expr) });
            }

            let mut args = Vec::new();
            if !self.is_punct(Punct::RParen) {
                loop {
                    args.push(self.parse_or()?);
                    if !self.eat_punct(Punct::Comma) {
                        break;
                    }
                }
            }
            self.expect_punct(Punct::RParen)?;
            return Ok(Expression::Function { name, args });
        }

        if self.eat_punct(Punct::Dot) {
            let column = self.expect_identifier()?;
            return Ok(Expression::Identifier { name: column, table: Some(name) });
        }

        Ok(Expression::Identifier { name, table: None })
    }

    fn parse_case(&mut self) -> Result<Expression, SQLParseError> {
        self.expect_keyword(Keyword::Case)?;
        let mut arms = Vec::new();
        while self.eat_keyword(Keyword::When) {
            let when = self.parse_or()?;
            self.expect_keyword(Keyword::Then)?;
            let then = self.parse_or()?;
            arms.push(CaseArm { when, then });
        }
        if arms.is_empty() {
            return Err(self.error("CASE requires at least one WHEN arm"));
        }
        let else_branch = if self.eat_keyword(Keyword::Else) {
            Some(Box::new(self.parse_or()?))
        } else {
            None
        };
        self.expect_keyword(Keyword::End)?;
        Ok(Expression::Case { arms, else_branch })
    }

    // ---- insert / update / delete ---------------------------------------

    fn parse_insert(&mut self) -> Result<InsertStatement, SQLParseError> {
        self.expect_keyword(Keyword::Insert)?;
        self.expect_keyword(Keyword::Into)?;
        let table = self.expect_identifier()?;
        let mut columns = Vec::new();
        if self.eat_punct(Punct::LParen) {
            columns = self.parse_identifier_list()?;
            self.expect_punct(Punct::RParen)?;
        }

        if self.eat_keyword(Keyword::Values) {
            let mut rows = Vec::new();
            loop {
                self.expect_punct(Punct::LParen)?;
                let mut row = Vec::new();
                if !self.is_punct(Punct::RParen) {
                    loop {
                        row.push(self.parse_or()?);
                        if !self.eat_punct(Punct::Comma) {
                            break;
                        }
                    }
                }
                self.expect_punct(Punct::RParen)?;
                rows.push(row);
                if !self.eat_punct(Punct::Comma) {
                    break;
                }
            }
            return Ok(InsertStatement {
                table,
                columns,
                source: InsertSource::Values(rows),
            });
        }

        if self.is_keyword(Keyword::Select) {
            let select = self.parse_select()?;
            return Ok(InsertStatement {
                table,
                columns,
                source: InsertSource::Select(Box::new(select)),
            });
        }

        Err(self.error("expected VALUES or SELECT"))
    }

    fn parse_update(&mut self) -> Result<UpdateStatement, SQLParseError> {
        self.expect_keyword(Keyword::Update)?;
        let table = self.expect_identifier()?;
        self.expect_keyword(Keyword::Set)?;
        let mut assignments = Vec::new();
        loop {
            let column = self.expect_identifier()?;
            self.expect_punct(Punct::Eq)?;
            let value = self.parse_or()?;
            assignments.push(UpdateAssignment { column, value });
            if !self.eat_punct(Punct::Comma) {
                break;
            }
        }
        let where_clause = if self.eat_keyword(Keyword::Where) {
            Some(self.parse_or()?)
        } else {
            None
        };
        Ok(UpdateStatement {
            table,
            assignments,
            where_clause,
        })
    }

    fn parse_delete(&mut self) -> Result<DeleteStatement, SQLParseError> {
        self.expect_keyword(Keyword::Delete)?;
        self.expect_keyword(Keyword::From)?;
        let table = self.expect_identifier()?;
        let where_clause = if self.eat_keyword(Keyword::Where) {
            Some(self.parse_or()?)
        } else {
            None
        };
        Ok(DeleteStatement { table, where_clause })
    }

    // ---- DDL --------------------------------------------------------------

    fn parse_create_table(&mut self) -> Result<CreateTableStatement, SQLParseError> {
        self.expect_keyword(Keyword::Create)?;
        self.expect_keyword(Keyword::Table)?;
        let name = self.expect_identifier()?;
        self.expect_punct(Punct::LParen)?;

        let mut columns = Vec::new();
        let mut main_check = None;
        let mut named_checks = Vec::new();

        loop {
            if self.eat_keyword(Keyword::Check) {
                self.expect_punct(Punct::LParen)?;
                let expr = self.parse_or()?;
                self.expect_punct(Punct::RParen)?;
                main_check = Some(match main_check {
                    None => expr,
                    Some(existing) => Expression::BinaryOp {
                        lhs: Box::new(existing),
                        op: CompareOp::And,
                        rhs: Box::new(expr),
                    },
                });
            } else if self.eat_keyword(Keyword::Constraint) {
                let cname = self.expect_identifier()?;
                self.expect_keyword(Keyword::Check)?;
                self.expect_punct(Punct::LParen)?;
                let expr = self.parse_or()?;
                self.expect_punct(Punct::RParen)?;
                named_checks.push((cname, expr));
            } else {
                columns.push(self.parse_column_def()?);
            }

            if !self.eat_punct(Punct::Comma) {
                break;
            }
        }
        self.expect_punct(Punct::RParen)?;

        let engine = if self.eat_keyword(Keyword::Engine) {
            self.expect_punct(Punct::Eq)?;
            let ident = self.expect_identifier()?;
            match ident.to_ascii_uppercase().as_str() {
                "MEMORY" => EngineChoice::Memory,
                "EDB" => EngineChoice::Edb,
                _ => return Err(self.error(format!("unknown engine '{ident}'"))),
            }
        } else {
            EngineChoice::Memory
        };

        Ok(CreateTableStatement {
            name,
            columns,
            main_check,
            named_checks,
            engine,
        })
    }

    fn parse_column_def(&mut self) -> Result<ColumnDef, SQLParseError> {
        let name = self.expect_identifier()?;
        let r#type = self.parse_column_type()?;

        let mut not_null = false;
        let mut unique = false;
        let mut auto_increment = false;
        let mut default_value = None;
        let mut primary_key = false;
        let mut references = None;

        loop {
            if self.eat_keyword(Keyword::Not) {
                self.expect_keyword(Keyword::Null)?;
                not_null = true;
            } else if self.eat_keyword(Keyword::Unique) {
                unique = true;
            } else if self.eat_keyword(Keyword::AutoIncrement) {
                auto_increment = true;
            } else if self.eat_keyword(Keyword::Default) {
                default_value = Some(self.parse_or()?);
            } else if self.eat_keyword(Keyword::Primary) {
                self.expect_keyword(Keyword::Key)?;
                primary_key = true;
            } else if self.eat_keyword(Keyword::References) {
                let ref_table = self.expect_identifier()?;
                self.expect_punct(Punct::LParen)?;
                let ref_column = self.expect_identifier()?;
                self.expect_punct(Punct::RParen)?;
                references = Some((ref_table, ref_column));
            } else {
                break;
            }
        }

        Ok(ColumnDef {
            name,
            r#type,
            not_null,
            unique,
            auto_increment,
            default_value,
            primary_key,
            references,
        })
    }

    fn parse_column_type(&mut self) -> Result<ColumnType, SQLParseError> {
        let ident = self.expect_identifier()?;
        match ident.to_ascii_uppercase().as_str() {
            "INT" | "INTEGER" => Ok(ColumnType::Int),
            "FLOAT" | "DOUBLE" | "REAL" => Ok(ColumnType::Float),
            "VARCHAR" | "CHAR" | "TEXT" | "STRING" => {
                if self.eat_punct(Punct::LParen) {
                    self.expect_int()?;
                    self.expect_punct(Punct::RParen)?;
                }
                Ok(ColumnType::Varchar)
            }
            "BOOL" | "BOOLEAN" => Ok(ColumnType::Bool),
            "TIME" | "DATE" | "DATETIME" => Ok(ColumnType::Time),
            other => Err(self.error(format!("unknown column type '{other}'"))),
        }
    }

    fn parse_alter_table(&mut self) -> Result<AlterTableStatement, SQLParseError> {
        self.expect_keyword(Keyword::Alter)?;
        self.expect_keyword(Keyword::Table)?;
        let table = self.expect_identifier()?;

        let action = if self.eat_keyword(Keyword::Add) {
            self.eat_keyword(Keyword::Column);
            AlterAction::AddColumn(self.parse_column_def()?)
        } else if self.eat_keyword(Keyword::Drop) {
            self.expect_keyword(Keyword::Column)?;
            AlterAction::DropColumn(self.expect_identifier()?)
        } else if self.eat_keyword(Keyword::Alter) {
            self.eat_keyword(Keyword::Column);
            let name = self.expect_identifier()?;
            let r#type = self.parse_column_type()?;
            let not_null = self.eat_keyword(Keyword::Not) && self.expect_keyword(Keyword::Null).is_ok();
            AlterAction::AlterColumn { name, r#type, not_null }
        } else {
            return Err(self.error("expected ADD, DROP or ALTER"));
        };

        Ok(AlterTableStatement { table, action })
    }

    fn parse_import(&mut self) -> Result<ImportStatement, SQLParseError> {
        self.expect_keyword(Keyword::Import)?;
        self.expect_keyword(Keyword::Table)?;
        let table = self.expect_identifier()?;
        self.expect_keyword(Keyword::From)?;
        let file_path = self.expect_string()?;
        Ok(ImportStatement { table, file_path })
    }

    fn expect_string(&mut self) -> Result<String, SQLParseError> {
        if self.current().kind == TokenKind::String {
            Ok(self.advance().text.to_string())
        } else {
            Err(self.error("expected a string literal"))
        }
    }
}

fn aggregate_for(name: &str) -> Option<AggregateFn> {
    match name.to_ascii_uppercase().as_str() {
        "COUNT" => Some(AggregateFn::Count),
        "SUM" => Some(AggregateFn::Sum),
        "MIN" => Some(AggregateFn::Min),
        "MAX" => Some(AggregateFn::Max),
        "AVG" => Some(AggregateFn::Avg),
        _ => None,
    }
}

/// Parses a `#yyyy-mm-dd#` literal's inner text (spec §4.3).
fn parse_date(text: &str) -> Result<Date, String> {
    let parts: Vec<&str> = text.split('-').collect();
    let [y, m, d] = parts.as_slice() else {
        return Err(format!("invalid date literal '{text}'"));
    };
    let year = y.parse::<u16>().map_err(|_| format!("invalid date literal '{text}'"))?;
    let month = m.parse::<u8>().map_err(|_| format!("invalid date literal '{text}'"))?;
    let day = d.parse::<u8>().map_err(|_| format!("invalid date literal '{text}'"))?;
    Ok(Date::new(year, month, day))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(sql: &str) -> Statement {
        parse(sql).unwrap_or_else(|e| panic!("failed to parse {sql:?}: {} @ {}", e.message(), e.token_offset()))
    }

    #[test]
    fn simple_select() {
        let stmt = parse_ok("SELECT a, b FROM t WHERE a > 5");
        match stmt {
            Statement::Select(s) => {
                assert!(s.from.is_some());
                assert!(s.where_clause.is_some());
                match s.columns {
                    SelectColumns::Exprs(cols) => assert_eq!(cols.len(), 2),
                    _ => panic!("expected explicit column list"),
                }
            }
            _ => panic!("expected select"),
        }
    }

    #[test]
    fn select_star_with_top_percent() {
        let stmt = parse_ok("SELECT TOP 75 PERC * FROM t");
        match stmt {
            Statement::Select(s) => {
                assert!(matches!(s.columns, SelectColumns::Star));
                let top = s.top.unwrap();
                assert_eq!(top.count, 75);
                assert!(top.percent);
            }
            _ => panic!("expected select"),
        }
    }

    #[test]
    fn subtraction_is_not_confused_with_negative_literal() {
        let stmt = parse_ok("SELECT a - 3 FROM t");
        match stmt {
            Statement::Select(s) => match s.columns {
                SelectColumns::Exprs(cols) => {
                    assert_eq!(cols.len(), 1);
                    match &cols[0].expr {
                        Expression::ArithmeticOp { op: ArithOp::Sub, .. } => {}
                        other => panic!("expected subtraction, got {other:?}"),
                    }
                }
                _ => panic!("expected explicit column list"),
            },
            _ => panic!("expected select"),
        }
    }

    #[test]
    fn join_on_qualified_columns() {
        let stmt = parse_ok("SELECT * FROM a JOIN b ON a.id = b.a_id");
        match stmt {
            Statement::Select(s) => match s.from.unwrap() {
                TableExpression::Join { kind, on, .. } => {
                    assert_eq!(kind, JoinKind::Inner);
                    assert_eq!(on.left_column, "id");
                    assert_eq!(on.right_column, "a_id");
                }
                _ => panic!("expected join"),
            },
            _ => panic!("expected select"),
        }
    }

    #[test]
    fn group_by_and_having() {
        let stmt = parse_ok("SELECT g, COUNT(*) FROM t GROUP BY g HAVING COUNT(*) > 1");
        match stmt {
            Statement::Select(s) => {
                assert!(s.group_by.is_some());
                assert!(s.having.is_some());
            }
            _ => panic!("expected select"),
        }
    }

    #[test]
    fn partition_by_sets_is_partition_flag() {
        let stmt = parse_ok("SELECT g, COUNT(*) FROM t PARTITION BY g");
        match stmt {
            Statement::Select(s) => assert!(s.group_by.unwrap().is_partition),
            _ => panic!("expected select"),
        }
    }

    #[test]
    fn insert_values() {
        let stmt = parse_ok("INSERT INTO t (a, b) VALUES (1, 'x'), (2, 'y')");
        match stmt {
            Statement::Insert(i) => match i.source {
                InsertSource::Values(rows) => assert_eq!(rows.len(), 2),
                _ => panic!("expected values"),
            },
            _ => panic!("expected insert"),
        }
    }

    #[test]
    fn create_table_with_constraints() {
        let stmt = parse_ok(
            "CREATE TABLE t (id INT PRIMARY KEY AUTO_INCREMENT, name VARCHAR(20) NOT NULL, CHECK (id > 0)) ENGINE = EDB",
        );
        match stmt {
            Statement::CreateTable(c) => {
                assert_eq!(c.columns.len(), 2);
                assert!(c.main_check.is_some());
                assert_eq!(c.engine, EngineChoice::Edb);
            }
            _ => panic!("expected create table"),
        }
    }

    #[test]
    fn union_of_two_selects() {
        let stmt = parse_ok("SELECT a FROM t UNION ALL SELECT a FROM u");
        match stmt {
            Statement::Union(u) => assert!(matches!(u.mode, UnionMode::All)),
            _ => panic!("expected union"),
        }
    }

    #[test]
    fn between_and_case() {
        let stmt = parse_ok("SELECT CASE WHEN a BETWEEN 1 AND 5 THEN 'low' ELSE 'high' END FROM t");
        match stmt {
            Statement::Select(_) => {}
            _ => panic!("expected select"),
        }
    }
}
