/// SQL Parser - converts tokens into AST
///
/// Statements are parsed by recursive descent; expressions by precedence
/// climbing (see `expr.rs`). DDL lives in `ddl.rs`, session / privilege /
/// transaction statements in `admin.rs`.
mod admin;
mod ddl;
mod expr;

use super::ast::*;
use super::token::{Keyword, Token, TokenType};
use crate::error::{DbError, Result, SyntaxError};

/// Deepest nesting of expressions and subqueries accepted before parsing
/// stops with a syntax error instead of exhausting the stack
pub const MAX_NESTING_DEPTH: usize = 128;

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    /// Original text, used to slice routine bodies verbatim
    source: Option<String>,
    placeholders: usize,
    depth: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        // The cursor relies on a trailing Eof
        if !matches!(tokens.last().map(|t| &t.token_type), Some(TokenType::Eof)) {
            let (offset, line, column) = tokens
                .last()
                .map(|t| (t.end_offset(), t.line, t.column + t.text.chars().count()))
                .unwrap_or((0, 1, 1));
            tokens.push(Token::new(TokenType::Eof, "", offset, line, column));
        }
        Self {
            tokens,
            position: 0,
            source: None,
            placeholders: 0,
            depth: 0,
        }
    }

    pub fn with_source(tokens: Vec<Token>, source: &str) -> Self {
        let mut parser = Self::new(tokens);
        parser.source = Some(source.to_string());
        parser
    }

    /// Parse every `;`-separated statement; empty statements are skipped
    pub fn parse_program(&mut self) -> Result<Program> {
        let mut statements = Vec::new();

        loop {
            while self.match_token(&TokenType::Semicolon) {}
            if self.is_eof() {
                break;
            }
            statements.push(self.parse_statement()?);
            if !self.is_eof() && !self.match_token(&TokenType::Semicolon) {
                return Err(self.error("';'"));
            }
        }

        Ok(Program { statements })
    }

    /// Parse exactly one statement with an optional trailing semicolon
    pub fn parse_single(&mut self) -> Result<Statement> {
        let stmt = self.parse_statement()?;
        self.match_token(&TokenType::Semicolon);
        if !self.is_eof() {
            return Err(self.error("end of statement"));
        }
        Ok(stmt)
    }

    /// Parse a standalone expression, e.g. a column default or a console input
    pub fn parse_expression(&mut self) -> Result<Expr> {
        let expr = self.parse_expr()?;
        if !self.is_eof() {
            return Err(self.error("end of expression"));
        }
        Ok(expr)
    }

    /// Dispatch on the leading token
    pub fn parse_statement(&mut self) -> Result<Statement> {
        let TokenType::Keyword(keyword) = self.current().token_type else {
            if self.check(&TokenType::LParen) {
                return self.parse_query();
            }
            return Err(self.error("statement"));
        };

        match keyword {
            Keyword::Select => self.parse_query(),
            Keyword::Insert | Keyword::Replace => Ok(Statement::Insert(self.parse_insert()?)),
            Keyword::Update => Ok(Statement::Update(self.parse_update()?)),
            Keyword::Delete => Ok(Statement::Delete(self.parse_delete()?)),
            Keyword::Create => self.parse_create(),
            Keyword::Drop => self.parse_drop(),
            Keyword::Alter => self.parse_alter_table(),
            Keyword::Truncate => self.parse_truncate(),
            Keyword::Use => self.parse_use(),
            Keyword::Show => self.parse_show(),
            Keyword::Describe | Keyword::Desc => self.parse_describe(),
            Keyword::Explain => self.parse_explain(),
            Keyword::Begin
            | Keyword::Start
            | Keyword::Commit
            | Keyword::Rollback
            | Keyword::Savepoint
            | Keyword::Release => self.parse_transaction(),
            Keyword::Grant => self.parse_grant(),
            Keyword::Revoke => self.parse_revoke(),
            _ => Err(self.error("statement")),
        }
    }

    /// SELECT or a UNION / EXCEPT / INTERSECT chain
    fn parse_query(&mut self) -> Result<Statement> {
        self.nested(Self::parse_query_chain)
    }

    /// Run `parse` one nesting level deeper
    pub(super) fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            let token = self.current();
            return Err(SyntaxError::new(
                format!("Nesting deeper than {} levels", MAX_NESTING_DEPTH),
                token.offset,
                token.line,
                token.column,
            )
            .into());
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_query_chain(&mut self) -> Result<Statement> {
        let (mut first, first_parenthesized) = self.parse_select_branch()?;
        let mut rest: Vec<(SetOperator, SelectStmt)> = Vec::new();
        let mut last_parenthesized = first_parenthesized;

        loop {
            let op = if self.match_keyword(Keyword::Union) {
                if self.match_keyword(Keyword::All) {
                    SetOperator::UnionAll
                } else {
                    self.match_keyword(Keyword::Distinct);
                    SetOperator::Union
                }
            } else if self.match_keyword(Keyword::Except) {
                SetOperator::Except
            } else if self.match_keyword(Keyword::Intersect) {
                SetOperator::Intersect
            } else {
                break;
            };
            let (branch, parenthesized) = self.parse_select_branch()?;
            rest.push((op, branch));
            last_parenthesized = parenthesized;
        }

        if rest.is_empty() {
            if first_parenthesized {
                self.parse_trailing_clauses(&mut first.order_by, &mut first.limit, &mut first.offset)?;
            }
            return Ok(Statement::Select(Box::new(first)));
        }

        let mut union = UnionStmt {
            first,
            rest,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        };

        // Trailing clauses parsed by the last bare branch belong to the whole chain
        if !last_parenthesized {
            if let Some((_, last)) = union.rest.last_mut() {
                union.order_by = std::mem::take(&mut last.order_by);
                union.limit = last.limit.take();
                union.offset = last.offset.take();
            }
        } else {
            self.parse_trailing_clauses(&mut union.order_by, &mut union.limit, &mut union.offset)?;
        }

        Ok(Statement::Union(Box::new(union)))
    }

    fn parse_select_branch(&mut self) -> Result<(SelectStmt, bool)> {
        if self.match_token(&TokenType::LParen) {
            let (select, _) = self.parse_select_branch()?;
            self.expect(&TokenType::RParen, "')'")?;
            Ok((select, true))
        } else {
            Ok((self.parse_select()?, false))
        }
    }

    fn parse_trailing_clauses(
        &mut self,
        order_by: &mut Vec<OrderByExpr>,
        limit: &mut Option<u64>,
        offset: &mut Option<u64>,
    ) -> Result<()> {
        if self.match_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            *order_by = self.parse_order_by_list()?;
        }
        if self.match_keyword(Keyword::Limit) {
            let (l, o) = self.parse_limit()?;
            *limit = Some(l);
            *offset = o;
        }
        Ok(())
    }

    /// Parse SELECT statement
    fn parse_select(&mut self) -> Result<SelectStmt> {
        self.expect_keyword(Keyword::Select)?;

        let distinct = if self.match_keyword(Keyword::Distinct) {
            true
        } else {
            self.match_keyword(Keyword::All);
            false
        };

        let columns = self.parse_select_items()?;

        let from = if self.match_keyword(Keyword::From) {
            self.parse_table_refs()?
        } else {
            Vec::new()
        };

        let where_clause = if self.match_keyword(Keyword::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let mut group_by = Vec::new();
        let mut with_rollup = false;
        if self.match_keyword(Keyword::Group) {
            self.expect_keyword(Keyword::By)?;
            group_by = self.parse_expr_list()?;
            if self.check_keyword(Keyword::With) && self.peek(1).is_keyword(Keyword::Rollup) {
                self.advance();
                self.advance();
                with_rollup = true;
            }
        }

        let having = if self.match_keyword(Keyword::Having) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let order_by = if self.match_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            self.parse_order_by_list()?
        } else {
            Vec::new()
        };

        let (mut limit, mut offset) = (None, None);
        if self.match_keyword(Keyword::Limit) {
            let (l, o) = self.parse_limit()?;
            limit = Some(l);
            offset = o;
        }
        if offset.is_none() && self.match_keyword(Keyword::Offset) {
            offset = Some(self.parse_u64()?);
        }

        let for_update = if self.match_keyword(Keyword::For) {
            self.expect_keyword(Keyword::Update)?;
            true
        } else {
            false
        };

        Ok(SelectStmt {
            distinct,
            columns,
            from,
            where_clause,
            group_by,
            with_rollup,
            having,
            order_by,
            limit,
            offset,
            for_update,
        })
    }

    fn parse_select_items(&mut self) -> Result<Vec<SelectItem>> {
        let mut items = Vec::new();

        loop {
            let mut expr = if self.match_token(&TokenType::Star) {
                Expr::column("*")
            } else {
                self.parse_expr()?
            };

            let alias = if self.match_keyword(Keyword::As) {
                Some(self.parse_alias_name()?)
            } else {
                match &self.current().token_type {
                    TokenType::Identifier(name) | TokenType::String(name) if !expr.is_star() => {
                        let name = name.clone();
                        self.advance();
                        Some(name)
                    }
                    _ => None,
                }
            };

            if let Expr::ColumnRef { alias: column_alias, .. } = &mut expr {
                column_alias.clone_from(&alias);
            }
            items.push(SelectItem { expr, alias });

            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }

        Ok(items)
    }

    /// `LIMIT n [OFFSET m]` or `LIMIT m, n`, both giving `(n, Some(m))`
    fn parse_limit(&mut self) -> Result<(u64, Option<u64>)> {
        let first = self.parse_u64()?;
        if self.match_token(&TokenType::Comma) {
            let count = self.parse_u64()?;
            Ok((count, Some(first)))
        } else if self.match_keyword(Keyword::Offset) {
            Ok((first, Some(self.parse_u64()?)))
        } else {
            Ok((first, None))
        }
    }

    fn parse_order_by_list(&mut self) -> Result<Vec<OrderByExpr>> {
        let mut order_by = Vec::new();

        loop {
            let expr = self.parse_expr()?;
            let asc = if self.match_keyword(Keyword::Desc) {
                false
            } else {
                self.match_keyword(Keyword::Asc); // Optional
                true
            };

            order_by.push(OrderByExpr { expr, asc });

            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }

        Ok(order_by)
    }

    fn parse_table_refs(&mut self) -> Result<Vec<TableRef>> {
        let mut refs = vec![self.parse_table_ref()?];
        while self.match_token(&TokenType::Comma) {
            refs.push(self.parse_table_ref()?);
        }
        Ok(refs)
    }

    /// Table reference followed by any number of joins
    fn parse_table_ref(&mut self) -> Result<TableRef> {
        let mut left = self.parse_table_factor()?;

        loop {
            let mut natural = false;
            let join_type = match self.current().token_type {
                TokenType::Keyword(Keyword::Join) => {
                    self.advance();
                    JoinType::Inner
                }
                TokenType::Keyword(Keyword::Inner) => {
                    self.advance();
                    self.expect_keyword(Keyword::Join)?;
                    JoinType::Inner
                }
                TokenType::Keyword(Keyword::Cross) => {
                    self.advance();
                    self.expect_keyword(Keyword::Join)?;
                    JoinType::Cross
                }
                TokenType::Keyword(Keyword::Left) | TokenType::Keyword(Keyword::Right) | TokenType::Keyword(Keyword::Full) => {
                    let join_type = self.outer_join_type();
                    self.advance();
                    self.match_keyword(Keyword::Outer);
                    self.expect_keyword(Keyword::Join)?;
                    join_type
                }
                TokenType::Keyword(Keyword::Natural) => {
                    self.advance();
                    natural = true;
                    let join_type = match self.current().token_type {
                        TokenType::Keyword(Keyword::Left) | TokenType::Keyword(Keyword::Right) | TokenType::Keyword(Keyword::Full) => {
                            let join_type = self.outer_join_type();
                            self.advance();
                            self.match_keyword(Keyword::Outer);
                            join_type
                        }
                        _ => {
                            self.match_keyword(Keyword::Inner);
                            JoinType::Inner
                        }
                    };
                    self.expect_keyword(Keyword::Join)?;
                    join_type
                }
                _ => break,
            };

            let right = self.parse_table_factor()?;

            let constraint = if natural {
                JoinConstraint::Natural
            } else if self.match_keyword(Keyword::On) {
                JoinConstraint::On(self.parse_expr()?)
            } else if self.match_keyword(Keyword::Using) {
                JoinConstraint::Using(self.parse_paren_identifier_list()?)
            } else {
                JoinConstraint::None
            };

            left = TableRef::Join {
                left: Box::new(left),
                right: Box::new(right),
                join_type,
                constraint,
            };
        }

        Ok(left)
    }

    fn outer_join_type(&self) -> JoinType {
        match self.current().token_type {
            TokenType::Keyword(Keyword::Left) => JoinType::Left,
            TokenType::Keyword(Keyword::Right) => JoinType::Right,
            _ => JoinType::Full,
        }
    }

    fn parse_table_factor(&mut self) -> Result<TableRef> {
        if self.match_token(&TokenType::LParen) {
            if self.check_keyword(Keyword::Select) || self.check(&TokenType::LParen) {
                let query = self.parse_query()?;
                self.expect(&TokenType::RParen, "')'")?;
                let alias = self.parse_optional_alias()?;
                return Ok(TableRef::Subquery {
                    query: Box::new(query),
                    alias,
                });
            }
            // Parenthesized join
            let inner = self.parse_table_ref()?;
            self.expect(&TokenType::RParen, "')'")?;
            return Ok(inner);
        }

        let name = self.parse_object_name()?;
        let alias = self.parse_optional_alias()?;
        Ok(TableRef::Table { name, alias })
    }

    /// `[AS] alias`; without AS only a plain identifier counts
    fn parse_optional_alias(&mut self) -> Result<Option<String>> {
        if self.match_keyword(Keyword::As) {
            return Ok(Some(self.parse_alias_name()?));
        }
        if let TokenType::Identifier(name) = &self.current().token_type {
            let name = name.clone();
            self.advance();
            return Ok(Some(name));
        }
        Ok(None)
    }

    fn parse_alias_name(&mut self) -> Result<String> {
        if let TokenType::String(name) = &self.current().token_type {
            let name = name.clone();
            self.advance();
            return Ok(name);
        }
        self.parse_identifier()
    }

    /// INSERT / REPLACE
    fn parse_insert(&mut self) -> Result<InsertStmt> {
        let replace = self.check_keyword(Keyword::Replace);
        self.advance();
        let ignore = self.match_keyword(Keyword::Ignore);
        self.match_keyword(Keyword::Into);

        let table = self.parse_object_name()?;

        let columns = if self.check(&TokenType::LParen) && !self.peek(1).is_keyword(Keyword::Select) {
            self.parse_paren_identifier_list()?
        } else {
            Vec::new()
        };

        let source = if self.match_keyword(Keyword::Values) || self.match_word("VALUE") {
            let mut rows = Vec::new();
            loop {
                self.expect(&TokenType::LParen, "'('")?;
                let row = if self.check(&TokenType::RParen) {
                    Vec::new()
                } else {
                    self.parse_expr_list()?
                };
                self.expect(&TokenType::RParen, "')'")?;
                rows.push(row);
                if !self.match_token(&TokenType::Comma) {
                    break;
                }
            }
            InsertSource::Values(rows)
        } else if self.match_keyword(Keyword::Set) {
            InsertSource::Set(self.parse_assignments()?)
        } else if self.check_keyword(Keyword::Select) || self.check(&TokenType::LParen) {
            InsertSource::Select(Box::new(self.parse_query()?))
        } else {
            return Err(self.error("VALUES, SELECT or SET"));
        };

        let on_duplicate = if self.match_keyword(Keyword::On) {
            self.expect_keyword(Keyword::Duplicate)?;
            self.expect_keyword(Keyword::Key)?;
            self.expect_keyword(Keyword::Update)?;
            self.parse_assignments()?
        } else {
            Vec::new()
        };

        Ok(InsertStmt {
            table,
            columns,
            source,
            ignore,
            replace,
            on_duplicate,
        })
    }

    fn parse_assignments(&mut self) -> Result<Vec<Assignment>> {
        let mut assignments = Vec::new();
        loop {
            let mut column = self.parse_identifier()?;
            while self.match_token(&TokenType::Dot) {
                column = self.parse_identifier()?;
            }
            self.expect(&TokenType::Eq, "'='")?;
            let value = self.parse_expr()?;
            assignments.push(Assignment { column, value });
            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }
        Ok(assignments)
    }

    fn parse_update(&mut self) -> Result<UpdateStmt> {
        self.expect_keyword(Keyword::Update)?;
        self.match_keyword(Keyword::Ignore);
        let table = self.parse_object_name()?;
        let alias = self.parse_optional_alias()?;
        self.expect_keyword(Keyword::Set)?;
        let assignments = self.parse_assignments()?;

        let where_clause = if self.match_keyword(Keyword::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let order_by = if self.match_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            self.parse_order_by_list()?
        } else {
            Vec::new()
        };
        let limit = if self.match_keyword(Keyword::Limit) {
            Some(self.parse_u64()?)
        } else {
            None
        };

        Ok(UpdateStmt {
            table,
            alias,
            assignments,
            where_clause,
            order_by,
            limit,
        })
    }

    fn parse_delete(&mut self) -> Result<DeleteStmt> {
        self.expect_keyword(Keyword::Delete)?;
        self.match_keyword(Keyword::Ignore);
        self.expect_keyword(Keyword::From)?;
        let table = self.parse_object_name()?;

        let where_clause = if self.match_keyword(Keyword::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let order_by = if self.match_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            self.parse_order_by_list()?
        } else {
            Vec::new()
        };
        let limit = if self.match_keyword(Keyword::Limit) {
            Some(self.parse_u64()?)
        } else {
            None
        };

        Ok(DeleteStmt {
            table,
            where_clause,
            order_by,
            limit,
        })
    }

    // Helper methods

    /// Identifier, or a keyword allowed to stand in for one
    fn parse_identifier(&mut self) -> Result<String> {
        match &self.current().token_type {
            TokenType::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            TokenType::Keyword(kw) if kw.is_identifier_like() => {
                let name = self.current().text.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error("identifier")),
        }
    }

    /// After a `.` any word is a name, reserved or not
    fn parse_qualified_part(&mut self) -> Result<String> {
        match &self.current().token_type {
            TokenType::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            TokenType::Keyword(_) => {
                let name = self.current().text.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error("identifier")),
        }
    }

    fn parse_object_name(&mut self) -> Result<ObjectName> {
        let first = self.parse_identifier()?;
        if self.match_token(&TokenType::Dot) {
            let name = self.parse_qualified_part()?;
            Ok(ObjectName {
                database: Some(first),
                name,
            })
        } else {
            Ok(ObjectName::new(first))
        }
    }

    fn parse_identifier_list(&mut self) -> Result<Vec<String>> {
        let mut list = Vec::new();
        loop {
            list.push(self.parse_identifier()?);
            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }
        Ok(list)
    }

    fn parse_paren_identifier_list(&mut self) -> Result<Vec<String>> {
        self.expect(&TokenType::LParen, "'('")?;
        let list = self.parse_identifier_list()?;
        self.expect(&TokenType::RParen, "')'")?;
        Ok(list)
    }

    fn parse_expr_list(&mut self) -> Result<Vec<Expr>> {
        let mut list = Vec::new();
        loop {
            list.push(self.parse_expr()?);
            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }
        Ok(list)
    }

    fn parse_u64(&mut self) -> Result<u64> {
        if let TokenType::Number(raw) = &self.current().token_type {
            if let Ok(n) = raw.parse::<u64>() {
                self.advance();
                return Ok(n);
            }
        }
        Err(self.error("non-negative integer"))
    }

    fn parse_string(&mut self) -> Result<String> {
        if let TokenType::String(s) = &self.current().token_type {
            let s = s.clone();
            self.advance();
            Ok(s)
        } else {
            Err(self.error("string"))
        }
    }

    fn current(&self) -> &Token {
        self.peek(0)
    }

    /// Look ahead without moving; past the end this keeps returning Eof
    fn peek(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.position + n).min(last)]
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    fn is_eof(&self) -> bool {
        matches!(self.current().token_type, TokenType::Eof)
    }

    fn check(&self, token_type: &TokenType) -> bool {
        &self.current().token_type == token_type
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        self.current().is_keyword(keyword)
    }

    /// Identifier that is not a reserved keyword, e.g. `LEADING` or `VALUE`
    fn check_word(&self, word: &str) -> bool {
        matches!(&self.current().token_type, TokenType::Identifier(id) if id.eq_ignore_ascii_case(word))
    }

    fn match_token(&mut self, token_type: &TokenType) -> bool {
        if self.check(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_word(&mut self, word: &str) -> bool {
        if self.check_word(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token_type: &TokenType, what: &str) -> Result<()> {
        if self.match_token(token_type) {
            Ok(())
        } else {
            Err(self.error(what))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<()> {
        if self.match_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(keyword.as_str()))
        }
    }

    /// `Expected <what>, found '<text>'` at the current token
    fn error(&self, what: &str) -> DbError {
        let token = self.current();
        let found = if matches!(token.token_type, TokenType::Eof) {
            "EOF"
        } else {
            token.text.as_str()
        };
        SyntaxError::new(
            format!("Expected {}, found '{}'", what, found),
            token.offset,
            token.line,
            token.column,
        )
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{parse, parse_statement, tokenize};
    use crate::types::Value;

    fn parse_sql(sql: &str) -> Result<Statement> {
        let mut program = parse(sql)?;
        assert_eq!(program.statements.len(), 1, "expected one statement in {:?}", sql);
        Ok(program.statements.remove(0))
    }

    fn select(sql: &str) -> SelectStmt {
        match parse_sql(sql).unwrap() {
            Statement::Select(s) => *s,
            other => panic!("Expected SELECT statement, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_select() {
        let s = select("SELECT * FROM users");
        match &s.from[0] {
            TableRef::Table { name, .. } => assert_eq!(name.name, "users"),
            _ => panic!("Expected simple table reference"),
        }
        assert!(s.columns[0].expr.is_star());
    }

    #[test]
    fn test_parse_scenario_select() {
        let s = select("SELECT a, b FROM t WHERE a > 1 AND b IS NOT NULL ORDER BY a DESC LIMIT 2;");
        assert_eq!(s.columns.len(), 2);
        assert_eq!(s.from.len(), 1);
        match s.where_clause {
            Some(Expr::Binary {
                op: BinaryOperator::And,
                right,
                ..
            }) => assert!(matches!(*right, Expr::IsNull { negated: true, .. })),
            other => panic!("unexpected WHERE: {:?}", other),
        }
        assert_eq!(s.order_by.len(), 1);
        assert!(!s.order_by[0].asc);
        assert_eq!(s.limit, Some(2));
    }

    #[test]
    fn test_limit_forms_are_equivalent() {
        let a = select("SELECT * FROM t LIMIT 5 OFFSET 10");
        let b = select("SELECT * FROM t LIMIT 10,5");
        assert_eq!((a.limit, a.offset), (Some(5), Some(10)));
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_aliases() {
        let s = select("SELECT u.name AS n, COUNT(*) total, 'x' `label` FROM users AS u");
        assert_eq!(s.columns[0].alias.as_deref(), Some("n"));
        assert!(matches!(
            &s.columns[0].expr,
            Expr::ColumnRef { table: Some(t), column, alias: Some(a), .. } if t == "u" && column == "name" && a == "n"
        ));
        assert_eq!(s.columns[1].alias.as_deref(), Some("total"));
        assert_eq!(s.columns[2].alias.as_deref(), Some("label"));
        assert!(matches!(&s.from[0], TableRef::Table { alias: Some(a), .. } if a == "u"));
    }

    #[test]
    fn test_parse_joins() {
        let s = select(
            "SELECT * FROM a LEFT OUTER JOIN b ON a.id = b.a_id \
             NATURAL JOIN c CROSS JOIN d JOIN e USING (id)",
        );
        let TableRef::Join { join_type, constraint, left, .. } = &s.from[0] else {
            panic!("expected join");
        };
        assert_eq!(*join_type, JoinType::Inner);
        assert_eq!(*constraint, JoinConstraint::Using(vec!["id".into()]));
        let TableRef::Join { join_type, .. } = left.as_ref() else {
            panic!("expected nested join");
        };
        assert_eq!(*join_type, JoinType::Cross);
    }

    #[test]
    fn test_parse_derived_table() {
        let s = select("SELECT x.n FROM (SELECT COUNT(*) AS n FROM t) AS x, other");
        assert_eq!(s.from.len(), 2);
        assert!(matches!(&s.from[0], TableRef::Subquery { alias: Some(a), .. } if a == "x"));
    }

    #[test]
    fn test_parse_group_by_rollup_having() {
        let s = select("SELECT dept, SUM(x) FROM t GROUP BY dept WITH ROLLUP HAVING SUM(x) > 10 FOR UPDATE");
        assert_eq!(s.group_by.len(), 1);
        assert!(s.with_rollup);
        assert!(s.having.is_some());
        assert!(s.for_update);
    }

    #[test]
    fn test_union_takes_trailing_clauses() {
        match parse_sql("SELECT a FROM t1 UNION ALL SELECT a FROM t2 EXCEPT SELECT a FROM t3 ORDER BY a LIMIT 3").unwrap() {
            Statement::Union(u) => {
                assert_eq!(u.rest.len(), 2);
                assert_eq!(u.rest[0].0, SetOperator::UnionAll);
                assert_eq!(u.rest[1].0, SetOperator::Except);
                assert_eq!(u.order_by.len(), 1);
                assert_eq!(u.limit, Some(3));
                assert!(u.rest[1].1.order_by.is_empty());
                assert!(u.rest[1].1.limit.is_none());
            }
            other => panic!("Expected UNION, got {:?}", other),
        }
    }

    #[test]
    fn test_parenthesized_union_branches() {
        match parse_sql("(SELECT a FROM t1 LIMIT 1) UNION (SELECT a FROM t2) ORDER BY a").unwrap() {
            Statement::Union(u) => {
                assert_eq!(u.first.limit, Some(1));
                assert_eq!(u.order_by.len(), 1);
            }
            other => panic!("Expected UNION, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_insert() {
        match parse_sql("INSERT INTO users (id, name) VALUES (1, 'John'), (2, 'Jane')").unwrap() {
            Statement::Insert(i) => {
                assert_eq!(i.table.name, "users");
                assert_eq!(i.columns.len(), 2);
                assert!(matches!(&i.source, InsertSource::Values(rows) if rows.len() == 2));
                assert!(!i.replace);
            }
            _ => panic!("Expected INSERT statement"),
        }
    }

    #[test]
    fn test_parse_insert_variants() {
        match parse_sql("INSERT IGNORE INTO t SET a = 1, b = 'x' ON DUPLICATE KEY UPDATE b = VALUES(b)").unwrap() {
            Statement::Insert(i) => {
                assert!(i.ignore);
                assert!(matches!(&i.source, InsertSource::Set(a) if a.len() == 2));
                assert_eq!(i.on_duplicate.len(), 1);
                assert!(matches!(&i.on_duplicate[0].value, Expr::Function(f) if f.name == "VALUES"));
            }
            _ => panic!("Expected INSERT statement"),
        }
        match parse_sql("REPLACE INTO archive SELECT * FROM live").unwrap() {
            Statement::Insert(i) => {
                assert!(i.replace);
                assert!(matches!(&i.source, InsertSource::Select(_)));
            }
            _ => panic!("Expected REPLACE statement"),
        }
    }

    #[test]
    fn test_parse_update() {
        match parse_sql("UPDATE users u SET u.name = 'Jane', age = age + 1 WHERE id = 1 ORDER BY id LIMIT 1").unwrap() {
            Statement::Update(u) => {
                assert_eq!(u.table.name, "users");
                assert_eq!(u.alias.as_deref(), Some("u"));
                assert_eq!(u.assignments.len(), 2);
                assert_eq!(u.assignments[0].column, "name");
                assert!(u.where_clause.is_some());
                assert_eq!(u.limit, Some(1));
            }
            _ => panic!("Expected UPDATE statement"),
        }
    }

    #[test]
    fn test_parse_delete() {
        match parse_sql("DELETE FROM shop.users WHERE age < 18 LIMIT 10").unwrap() {
            Statement::Delete(d) => {
                assert_eq!(d.table.database.as_deref(), Some("shop"));
                assert_eq!(d.table.name, "users");
                assert!(d.where_clause.is_some());
                assert_eq!(d.limit, Some(10));
            }
            _ => panic!("Expected DELETE statement"),
        }
    }

    #[test]
    fn test_program_splits_statements() {
        let program = parse(";; SELECT 1; SELECT 2 ;;").unwrap();
        assert_eq!(program.statements.len(), 2);
        assert!(parse("").unwrap().statements.is_empty());
    }

    #[test]
    fn test_parse_statement_requires_single_statement() {
        let tokens = tokenize("SELECT 1;").unwrap();
        assert!(parse_statement(tokens).is_ok());

        let tokens = tokenize("SELECT 1; SELECT 2").unwrap();
        let err = parse_statement(tokens).unwrap_err();
        assert!(err.to_string().contains("Expected end of statement, found 'SELECT'"), "{}", err);
    }

    #[test]
    fn test_error_reports_found_token_position() {
        let err = parse("SELECT a\nFROM t WHERE").unwrap_err();
        assert_eq!(err.to_string(), "line 2, column 13: Expected expression, found 'EOF'");

        let err = parse("FROB x").unwrap_err();
        assert_eq!(err.to_string(), "line 1, column 1: Expected statement, found 'FROB'");

        let err = parse("SELECT * FROM t LIMIT x").unwrap_err();
        assert!(matches!(err, DbError::Syntax(ref e) if e.column == 23));
    }

    #[test]
    fn test_keyword_identifiers() {
        let s = select("SELECT date, `select`, status FROM log WHERE user = 'x'");
        assert!(matches!(&s.columns[0].expr, Expr::ColumnRef { column, .. } if column == "date"));
        assert!(matches!(&s.columns[1].expr, Expr::ColumnRef { column, .. } if column == "select"));
        assert!(s.where_clause.is_some());
    }

    #[test]
    fn test_select_without_from() {
        let s = select("SELECT 1 + 1");
        assert!(s.from.is_empty());
        assert!(matches!(
            &s.columns[0].expr,
            Expr::Binary { left, .. } if matches!(left.as_ref(), Expr::Literal(l) if l.value == Value::Integer(1))
        ));
    }

    #[test]
    fn test_parser_never_runs_past_eof() {
        for sql in ["SELECT", "SELECT (", "INSERT INTO", "CREATE TABLE t (", "SELECT CASE WHEN", "SELECT a FROM t JOIN"] {
            assert!(parse(sql).is_err(), "{} should fail", sql);
        }
    }
}
