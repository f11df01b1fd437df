/// Expression parsing by precedence climbing
use super::Parser;
use crate::error::Result;
use crate::sql::ast::*;
use crate::sql::token::{Keyword, TokenType};
use crate::types::Value;

/// Precedence of prefix NOT: binds looser than comparisons
const NOT_OPERAND_PRECEDENCE: u8 = 5;
const COMPARISON_PRECEDENCE: u8 = 5;
const UNARY_PRECEDENCE: u8 = 12;

/// Names that are calls even without parentheses
const NILADIC_FUNCTIONS: &[&str] = &[
    "CURRENT_TIMESTAMP",
    "CURRENT_DATE",
    "CURRENT_TIME",
    "CURRENT_USER",
    "LOCALTIME",
    "LOCALTIMESTAMP",
];

impl Parser {
    pub(super) fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_expr_prec(1)
    }

    /// Fold infix operators binding at least as tightly as `min_precedence`
    pub(super) fn parse_expr_prec(&mut self, min_precedence: u8) -> Result<Expr> {
        self.nested(|parser| parser.parse_infix_chain(min_precedence))
    }

    fn parse_infix_chain(&mut self, min_precedence: u8) -> Result<Expr> {
        let mut left = self.parse_unary()?;

        loop {
            let precedence = self.infix_precedence();
            if precedence == 0 || precedence < min_precedence {
                break;
            }
            left = self.parse_infix(left, precedence)?;
        }

        Ok(left)
    }

    /// Precedence of the operator at the cursor, 0 when it is not an infix operator
    fn infix_precedence(&self) -> u8 {
        match &self.current().token_type {
            TokenType::DoublePipe => 1,
            TokenType::DoubleAmpersand => 3,
            TokenType::Eq
            | TokenType::NullSafeEq
            | TokenType::Ne
            | TokenType::Lt
            | TokenType::Gt
            | TokenType::Le
            | TokenType::Ge => COMPARISON_PRECEDENCE,
            TokenType::Pipe => 6,
            TokenType::Ampersand => 7,
            TokenType::ShiftLeft | TokenType::ShiftRight => 8,
            TokenType::Plus | TokenType::Minus => 9,
            TokenType::Star | TokenType::Slash | TokenType::Percent => 10,
            TokenType::Caret => 11,
            TokenType::Keyword(kw) => match kw {
                Keyword::Or => 1,
                Keyword::Xor => 2,
                Keyword::And => 3,
                Keyword::Is
                | Keyword::Like
                | Keyword::Regexp
                | Keyword::Rlike
                | Keyword::In
                | Keyword::Between => COMPARISON_PRECEDENCE,
                Keyword::Not => match self.peek(1).token_type {
                    TokenType::Keyword(Keyword::In)
                    | TokenType::Keyword(Keyword::Like)
                    | TokenType::Keyword(Keyword::Between)
                    | TokenType::Keyword(Keyword::Regexp)
                    | TokenType::Keyword(Keyword::Rlike) => COMPARISON_PRECEDENCE,
                    _ => 0,
                },
                Keyword::Div | Keyword::Mod => 10,
                _ => 0,
            },
            _ => 0,
        }
    }

    fn binary_operator(&self) -> Option<BinaryOperator> {
        let op = match &self.current().token_type {
            TokenType::DoublePipe => BinaryOperator::Or,
            TokenType::DoubleAmpersand => BinaryOperator::And,
            TokenType::Eq => BinaryOperator::Eq,
            TokenType::NullSafeEq => BinaryOperator::NullSafeEq,
            TokenType::Ne => BinaryOperator::Ne,
            TokenType::Lt => BinaryOperator::Lt,
            TokenType::Gt => BinaryOperator::Gt,
            TokenType::Le => BinaryOperator::Le,
            TokenType::Ge => BinaryOperator::Ge,
            TokenType::Pipe => BinaryOperator::BitOr,
            TokenType::Ampersand => BinaryOperator::BitAnd,
            TokenType::ShiftLeft => BinaryOperator::ShiftLeft,
            TokenType::ShiftRight => BinaryOperator::ShiftRight,
            TokenType::Plus => BinaryOperator::Add,
            TokenType::Minus => BinaryOperator::Sub,
            TokenType::Star => BinaryOperator::Mul,
            TokenType::Slash => BinaryOperator::Div,
            TokenType::Percent => BinaryOperator::Mod,
            TokenType::Caret => BinaryOperator::BitXor,
            TokenType::Keyword(Keyword::Or) => BinaryOperator::Or,
            TokenType::Keyword(Keyword::Xor) => BinaryOperator::Xor,
            TokenType::Keyword(Keyword::And) => BinaryOperator::And,
            TokenType::Keyword(Keyword::Div) => BinaryOperator::IntDiv,
            TokenType::Keyword(Keyword::Mod) => BinaryOperator::Mod,
            _ => return None,
        };
        Some(op)
    }

    fn parse_infix(&mut self, left: Expr, precedence: u8) -> Result<Expr> {
        if let Some(op) = self.binary_operator() {
            self.advance(); // consume operator
            let right = self.parse_expr_prec(precedence + 1)?;
            return Ok(Expr::binary(left, op, right));
        }

        // Irregular right-hand grammars
        if self.match_keyword(Keyword::Is) {
            return self.parse_is(left);
        }
        let negated = self.match_keyword(Keyword::Not);
        match self.current().token_type {
            TokenType::Keyword(Keyword::Between) => {
                self.advance();
                let low = self.parse_expr_prec(COMPARISON_PRECEDENCE + 1)?;
                self.expect_keyword(Keyword::And)?;
                let high = self.parse_expr_prec(COMPARISON_PRECEDENCE + 1)?;
                Ok(Expr::Between {
                    expr: Box::new(left),
                    low: Box::new(low),
                    high: Box::new(high),
                    negated,
                })
            }
            TokenType::Keyword(Keyword::In) => {
                self.advance();
                let list = self.parse_in_list()?;
                Ok(Expr::In {
                    expr: Box::new(left),
                    list,
                    negated,
                })
            }
            TokenType::Keyword(Keyword::Like) => {
                self.advance();
                let pattern = self.parse_expr_prec(COMPARISON_PRECEDENCE + 1)?;
                let escape = if self.match_keyword(Keyword::Escape) {
                    let text = self.parse_string()?;
                    match text.chars().next() {
                        Some(c) => Some(c),
                        None => return Err(self.error("escape character")),
                    }
                } else {
                    None
                };
                Ok(Expr::Like {
                    expr: Box::new(left),
                    pattern: Box::new(pattern),
                    escape,
                    regexp: false,
                    negated,
                })
            }
            TokenType::Keyword(Keyword::Regexp) | TokenType::Keyword(Keyword::Rlike) => {
                self.advance();
                let pattern = self.parse_expr_prec(COMPARISON_PRECEDENCE + 1)?;
                Ok(Expr::Like {
                    expr: Box::new(left),
                    pattern: Box::new(pattern),
                    escape: None,
                    regexp: true,
                    negated,
                })
            }
            _ => Err(self.error("BETWEEN, IN, LIKE or REGEXP")),
        }
    }

    /// `IS [NOT] NULL | UNKNOWN | TRUE | FALSE`
    fn parse_is(&mut self, left: Expr) -> Result<Expr> {
        let negated = self.match_keyword(Keyword::Not);
        let token = self.current().clone();
        match token.token_type {
            TokenType::Keyword(Keyword::Null) | TokenType::Keyword(Keyword::Unknown) => {
                self.advance();
                Ok(Expr::IsNull {
                    expr: Box::new(left),
                    negated,
                })
            }
            TokenType::Keyword(Keyword::True) | TokenType::Keyword(Keyword::False) => {
                self.advance();
                let value = token.is_keyword(Keyword::True);
                let op = if negated { BinaryOperator::Ne } else { BinaryOperator::Eq };
                Ok(Expr::binary(left, op, Expr::literal(Value::Bool(value), token.text)))
            }
            _ => Err(self.error("NULL, TRUE, FALSE or UNKNOWN")),
        }
    }

    fn parse_in_list(&mut self) -> Result<InList> {
        self.expect(&TokenType::LParen, "'('")?;
        let list = if self.check_keyword(Keyword::Select) {
            InList::Subquery(Box::new(self.parse_query()?))
        } else {
            InList::Values(self.parse_expr_list()?)
        };
        self.expect(&TokenType::RParen, "')'")?;
        Ok(list)
    }

    pub(super) fn parse_unary(&mut self) -> Result<Expr> {
        let op = match &self.current().token_type {
            TokenType::Keyword(Keyword::Not) => {
                self.advance();
                let operand = self.parse_expr_prec(NOT_OPERAND_PRECEDENCE)?;
                return Ok(negate(operand));
            }
            TokenType::Bang => UnaryOperator::Not,
            TokenType::Minus => UnaryOperator::Minus,
            TokenType::Plus => UnaryOperator::Plus,
            TokenType::Tilde => UnaryOperator::BitNot,
            _ => return self.parse_primary(),
        };
        self.advance();
        let expr = self.parse_expr_prec(UNARY_PRECEDENCE)?;
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.current().clone();

        match token.token_type {
            // Parenthesized expression OR subquery
            TokenType::LParen => {
                self.advance();
                if self.check_keyword(Keyword::Select) {
                    let query = self.parse_query()?;
                    self.expect(&TokenType::RParen, "')'")?;
                    return Ok(Expr::Subquery(Box::new(query)));
                }
                let expr = self.parse_expr()?;
                self.expect(&TokenType::RParen, "')'")?;
                Ok(expr)
            }

            // Literals
            TokenType::Number(raw) => {
                self.advance();
                Ok(Expr::literal(number_value(&raw), token.text))
            }
            TokenType::String(s) => {
                self.advance();
                Ok(Expr::literal(Value::Text(s), token.text))
            }
            TokenType::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Expr::literal(Value::Null, token.text))
            }
            TokenType::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expr::literal(Value::Bool(true), token.text))
            }
            TokenType::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expr::literal(Value::Bool(false), token.text))
            }

            TokenType::Question => {
                self.advance();
                let index = self.placeholders;
                self.placeholders += 1;
                Ok(Expr::Placeholder(index))
            }
            TokenType::Star => {
                self.advance();
                Ok(Expr::column("*"))
            }
            TokenType::At => self.parse_variable(),

            TokenType::Keyword(Keyword::Exists) => {
                self.advance();
                self.expect(&TokenType::LParen, "'('")?;
                let query = self.parse_query()?;
                self.expect(&TokenType::RParen, "')'")?;
                Ok(Expr::Exists {
                    query: Box::new(query),
                    negated: false,
                })
            }
            TokenType::Keyword(Keyword::Case) => self.parse_case(),
            TokenType::Keyword(Keyword::Match) if self.peek(1).token_type == TokenType::LParen => {
                self.parse_match()
            }
            TokenType::Keyword(Keyword::Interval) => {
                self.advance();
                let value = self.parse_expr_prec(9)?;
                let unit = self.parse_interval_unit()?;
                Ok(Expr::function("INTERVAL", vec![value, Expr::Identifier(unit)]))
            }
            TokenType::Keyword(Keyword::Cast) if self.peek(1).token_type == TokenType::LParen => {
                self.advance();
                self.advance();
                let expr = self.parse_expr()?;
                self.expect_keyword(Keyword::As)?;
                let target = self.parse_data_type()?.to_string();
                self.expect(&TokenType::RParen, "')'")?;
                Ok(Expr::function("CAST", vec![expr, Expr::literal(Value::Text(target.clone()), target)]))
            }
            TokenType::Keyword(Keyword::Convert) if self.peek(1).token_type == TokenType::LParen => {
                self.advance();
                self.advance();
                let expr = self.parse_expr()?;
                let target = if self.match_keyword(Keyword::Using) {
                    Expr::Identifier(self.parse_identifier()?)
                } else {
                    self.expect(&TokenType::Comma, "','")?;
                    let target = self.parse_data_type()?.to_string();
                    Expr::literal(Value::Text(target.clone()), target)
                };
                self.expect(&TokenType::RParen, "')'")?;
                Ok(Expr::function("CONVERT", vec![expr, target]))
            }

            TokenType::Identifier(name) => {
                self.advance();
                self.parse_name_expr(name)
            }
            TokenType::Keyword(kw) if kw.is_function_lead() && self.peek(1).token_type == TokenType::LParen => {
                self.advance();
                self.parse_function_call(kw.as_str().to_string())
            }
            TokenType::Keyword(kw) if kw.is_identifier_like() => {
                self.advance();
                self.parse_name_expr(token.text)
            }

            _ => Err(self.error("expression")),
        }
    }

    /// Column reference, qualified column, or function call led by `name`
    fn parse_name_expr(&mut self, name: String) -> Result<Expr> {
        if self.check(&TokenType::LParen) {
            return self.parse_function_call(name.to_ascii_uppercase());
        }

        let upper = name.to_ascii_uppercase();
        if NILADIC_FUNCTIONS.contains(&upper.as_str()) {
            return Ok(Expr::function(upper, Vec::new()));
        }

        if !self.match_token(&TokenType::Dot) {
            return Ok(Expr::column(name));
        }

        let second = self.parse_star_or_part()?;
        if second != "*" && self.match_token(&TokenType::Dot) {
            let third = self.parse_star_or_part()?;
            return Ok(Expr::ColumnRef {
                database: Some(name),
                table: Some(second),
                column: third,
                alias: None,
            });
        }

        Ok(Expr::ColumnRef {
            database: None,
            table: Some(name),
            column: second,
            alias: None,
        })
    }

    fn parse_star_or_part(&mut self) -> Result<String> {
        if self.match_token(&TokenType::Star) {
            Ok("*".to_string())
        } else {
            self.parse_qualified_part()
        }
    }

    /// `@name` user variable or `@@[scope.]name` system variable
    fn parse_variable(&mut self) -> Result<Expr> {
        self.expect(&TokenType::At, "'@'")?;
        let mut name = String::from("@");
        if self.match_token(&TokenType::At) {
            name.push('@');
        }
        name.push_str(&self.parse_qualified_part()?);
        while self.match_token(&TokenType::Dot) {
            name.push('.');
            name.push_str(&self.parse_qualified_part()?);
        }
        Ok(Expr::Identifier(name))
    }

    fn parse_function_call(&mut self, name: String) -> Result<Expr> {
        self.expect(&TokenType::LParen, "'('")?;
        let mut call = FunctionCall::new(name, Vec::new());

        match call.name.as_str() {
            "TRIM" => self.parse_trim_args(&mut call)?,
            "SUBSTRING" | "SUBSTR" => {
                call.args.push(self.parse_expr()?);
                if self.match_keyword(Keyword::From) {
                    call.args.push(self.parse_expr()?);
                    if self.match_keyword(Keyword::For) {
                        call.args.push(self.parse_expr()?);
                    }
                } else {
                    while self.match_token(&TokenType::Comma) {
                        call.args.push(self.parse_expr()?);
                    }
                }
            }
            "POSITION" => {
                // Operand of IN stays above comparison precedence so IN is not taken as an operator
                call.args.push(self.parse_expr_prec(COMPARISON_PRECEDENCE + 1)?);
                if self.match_keyword(Keyword::In) {
                    call.args.push(self.parse_expr()?);
                } else {
                    self.expect(&TokenType::Comma, "IN")?;
                    call.args.push(self.parse_expr()?);
                }
            }
            "EXTRACT" => {
                let unit = self.parse_interval_unit()?;
                self.expect_keyword(Keyword::From)?;
                call.args.push(Expr::Identifier(unit));
                call.args.push(self.parse_expr()?);
            }
            _ => {
                if self.match_keyword(Keyword::Distinct) {
                    call.distinct = true;
                } else {
                    self.match_keyword(Keyword::All);
                }

                if self.match_token(&TokenType::Star) {
                    call.args.push(Expr::column("*"));
                } else if !self.check(&TokenType::RParen) {
                    call.args = self.parse_expr_list()?;
                }

                if self.match_keyword(Keyword::Order) {
                    self.expect_keyword(Keyword::By)?;
                    call.order_by = self.parse_order_by_list()?;
                }
                if self.match_keyword(Keyword::Separator) {
                    call.separator = Some(self.parse_string()?);
                }
            }
        }

        self.expect(&TokenType::RParen, "')'")?;

        if self.match_keyword(Keyword::Over) {
            call.over = Some(if self.check(&TokenType::LParen) {
                self.parse_window_spec()?
            } else {
                WindowSpec {
                    name: Some(self.parse_identifier()?),
                    ..WindowSpec::default()
                }
            });
        }

        Ok(Expr::Function(call))
    }

    /// `TRIM(s)`, `TRIM([LEADING|TRAILING|BOTH] [rem] FROM s)`;
    /// the long forms become `[s, rem, mode]`
    fn parse_trim_args(&mut self, call: &mut FunctionCall) -> Result<()> {
        let mode = ["LEADING", "TRAILING", "BOTH"]
            .into_iter()
            .find(|word| self.check_word(word));
        if let Some(mode) = mode {
            self.advance();
            let remove = if self.check_keyword(Keyword::From) {
                Expr::literal(Value::Text(" ".into()), "' '")
            } else {
                self.parse_expr()?
            };
            self.expect_keyword(Keyword::From)?;
            call.args = vec![self.parse_expr()?, remove, Expr::Identifier(mode.to_string())];
            return Ok(());
        }

        let first = self.parse_expr()?;
        if self.match_keyword(Keyword::From) {
            call.args = vec![self.parse_expr()?, first, Expr::Identifier("BOTH".to_string())];
        } else {
            call.args.push(first);
            while self.match_token(&TokenType::Comma) {
                call.args.push(self.parse_expr()?);
            }
        }
        Ok(())
    }

    fn parse_window_spec(&mut self) -> Result<WindowSpec> {
        self.expect(&TokenType::LParen, "'('")?;
        let mut spec = WindowSpec::default();

        if let TokenType::Identifier(name) = &self.current().token_type {
            spec.name = Some(name.clone());
            self.advance();
        }

        if self.match_keyword(Keyword::Partition) {
            self.expect_keyword(Keyword::By)?;
            spec.partition_by = self.parse_expr_list()?;
        }

        if self.match_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            spec.order_by = self.parse_order_by_list()?;
        }

        let units = match self.current().token_type {
            TokenType::Keyword(Keyword::Rows) => Some(FrameUnits::Rows),
            TokenType::Keyword(Keyword::Range) => Some(FrameUnits::Range),
            TokenType::Keyword(Keyword::Groups) => Some(FrameUnits::Groups),
            _ => None,
        };
        if let Some(units) = units {
            self.advance();
            let (start, end) = if self.match_keyword(Keyword::Between) {
                let start = self.parse_frame_bound()?;
                self.expect_keyword(Keyword::And)?;
                (start, self.parse_frame_bound()?)
            } else {
                (self.parse_frame_bound()?, FrameBound::CurrentRow)
            };
            spec.frame = Some(WindowFrame { units, start, end });
        }

        self.expect(&TokenType::RParen, "')'")?;
        Ok(spec)
    }

    fn parse_frame_bound(&mut self) -> Result<FrameBound> {
        if self.match_keyword(Keyword::Unbounded) {
            if self.match_keyword(Keyword::Preceding) {
                return Ok(FrameBound::UnboundedPreceding);
            }
            self.expect_keyword(Keyword::Following)?;
            return Ok(FrameBound::UnboundedFollowing);
        }
        if self.match_keyword(Keyword::Current) {
            self.expect_keyword(Keyword::Row)?;
            return Ok(FrameBound::CurrentRow);
        }

        let offset = Box::new(self.parse_expr_prec(COMPARISON_PRECEDENCE + 1)?);
        if self.match_keyword(Keyword::Preceding) {
            Ok(FrameBound::Preceding(offset))
        } else if self.match_keyword(Keyword::Following) {
            Ok(FrameBound::Following(offset))
        } else {
            Err(self.error("PRECEDING or FOLLOWING"))
        }
    }

    /// CASE [operand] WHEN ... THEN ... [ELSE ...] END
    fn parse_case(&mut self) -> Result<Expr> {
        self.expect_keyword(Keyword::Case)?;

        let operand = if self.check_keyword(Keyword::When) {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };

        let mut branches = Vec::new();
        while self.match_keyword(Keyword::When) {
            let condition = self.parse_expr()?;
            self.expect_keyword(Keyword::Then)?;
            let result = self.parse_expr()?;
            branches.push((condition, result));
        }
        if branches.is_empty() {
            return Err(self.error("WHEN"));
        }

        let else_result = if self.match_keyword(Keyword::Else) {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect_keyword(Keyword::End)?;

        Ok(Expr::Case {
            operand,
            branches,
            else_result,
        })
    }

    /// MATCH (cols) AGAINST (expr [modifier])
    fn parse_match(&mut self) -> Result<Expr> {
        self.expect_keyword(Keyword::Match)?;
        self.expect(&TokenType::LParen, "'('")?;
        let columns = self.parse_expr_list()?;
        self.expect(&TokenType::RParen, "')'")?;
        self.expect_keyword(Keyword::Against)?;
        self.expect(&TokenType::LParen, "'('")?;
        let query = self.parse_expr_prec(COMPARISON_PRECEDENCE + 1)?;

        let modifier = if self.match_keyword(Keyword::In) {
            if self.match_keyword(Keyword::Boolean) {
                self.expect_keyword(Keyword::Mode)?;
                MatchModifier::Boolean
            } else {
                self.expect_keyword(Keyword::Natural)?;
                self.expect_keyword(Keyword::Language)?;
                self.expect_keyword(Keyword::Mode)?;
                if self.match_keyword(Keyword::With) {
                    self.expect_keyword(Keyword::Query)?;
                    self.expect_keyword(Keyword::Expansion)?;
                    MatchModifier::NaturalLanguageWithExpansion
                } else {
                    MatchModifier::NaturalLanguage
                }
            }
        } else if self.match_keyword(Keyword::With) {
            self.expect_keyword(Keyword::Query)?;
            self.expect_keyword(Keyword::Expansion)?;
            MatchModifier::WithQueryExpansion
        } else {
            MatchModifier::NaturalLanguage
        };

        self.expect(&TokenType::RParen, "')'")?;
        Ok(Expr::Match {
            columns,
            query: Box::new(query),
            modifier,
        })
    }

    /// Unit word of INTERVAL / EXTRACT / TIMESTAMPDIFF, upper-cased
    pub(super) fn parse_interval_unit(&mut self) -> Result<String> {
        match &self.current().token_type {
            TokenType::Identifier(word) => {
                let unit = word.to_ascii_uppercase();
                self.advance();
                Ok(unit)
            }
            TokenType::Keyword(kw) => {
                let unit = kw.as_str().to_string();
                self.advance();
                Ok(unit)
            }
            _ => Err(self.error("interval unit")),
        }
    }
}

/// Prefix NOT folds into predicates that carry their own negation flag
fn negate(operand: Expr) -> Expr {
    match operand {
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => Expr::Between {
            expr,
            low,
            high,
            negated: !negated,
        },
        Expr::In { expr, list, negated } => Expr::In {
            expr,
            list,
            negated: !negated,
        },
        Expr::Like {
            expr,
            pattern,
            escape,
            regexp,
            negated,
        } => Expr::Like {
            expr,
            pattern,
            escape,
            regexp,
            negated: !negated,
        },
        Expr::IsNull { expr, negated } => Expr::IsNull {
            expr,
            negated: !negated,
        },
        Expr::Exists { query, negated } => Expr::Exists {
            query,
            negated: !negated,
        },
        other => Expr::Unary {
            op: UnaryOperator::Not,
            expr: Box::new(other),
        },
    }
}

/// A decimal point or exponent makes a float; integers too large for i64 do too
fn number_value(raw: &str) -> Value {
    if raw.contains(['.', 'e', 'E']) {
        return Value::Float(raw.parse::<f64>().unwrap_or(0.0));
    }
    match raw.parse::<i64>() {
        Ok(i) => Value::Integer(i),
        Err(_) => Value::Float(raw.parse::<f64>().unwrap_or(0.0)),
    }
}

#[cfg(test)]
mod tests {
    use crate::error::DbError;
    use crate::sql::ast::*;
    use crate::sql::parse;
    use crate::types::Value;

    fn expr(sql: &str) -> Expr {
        let program = parse(&format!("SELECT {}", sql)).unwrap();
        match program.statements.into_iter().next() {
            Some(Statement::Select(s)) => s.columns.into_iter().next().unwrap().expr,
            other => panic!("Expected SELECT statement, got {:?}", other),
        }
    }

    fn int(v: i64) -> Expr {
        Expr::literal(Value::Integer(v), v.to_string())
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let e = expr("a OR b AND c");
        assert_eq!(
            e,
            Expr::binary(
                Expr::column("a"),
                BinaryOperator::Or,
                Expr::binary(Expr::column("b"), BinaryOperator::And, Expr::column("c"))
            )
        );
    }

    #[test]
    fn test_multiplication_binds_tighter_than_addition() {
        assert_eq!(
            expr("1 + 2 * 3"),
            Expr::binary(int(1), BinaryOperator::Add, Expr::binary(int(2), BinaryOperator::Mul, int(3)))
        );
    }

    #[test]
    fn test_left_associativity() {
        assert_eq!(
            expr("10 - 4 - 3"),
            Expr::binary(Expr::binary(int(10), BinaryOperator::Sub, int(4)), BinaryOperator::Sub, int(3))
        );
    }

    #[test]
    fn test_prefix_not_folds_into_between() {
        match expr("NOT a BETWEEN 1 AND 2") {
            Expr::Between { negated, low, high, .. } => {
                assert!(negated);
                assert_eq!(*low, int(1));
                assert_eq!(*high, int(2));
            }
            other => panic!("expected negated BETWEEN, got {:?}", other),
        }
    }

    #[test]
    fn test_infix_not_forms() {
        assert!(matches!(expr("a NOT IN (1, 2)"), Expr::In { negated: true, list: InList::Values(v), .. } if v.len() == 2));
        assert!(matches!(expr("a NOT LIKE 'x%'"), Expr::Like { negated: true, regexp: false, .. }));
        assert!(matches!(expr("a NOT REGEXP '^x'"), Expr::Like { negated: true, regexp: true, .. }));
        assert!(matches!(expr("NOT EXISTS (SELECT 1)"), Expr::Exists { negated: true, .. }));
        assert!(matches!(expr("NOT a IS NULL"), Expr::IsNull { negated: true, .. }));
        assert!(matches!(
            expr("NOT a = b"),
            Expr::Unary { op: UnaryOperator::Not, expr } if matches!(*expr, Expr::Binary { op: BinaryOperator::Eq, .. })
        ));
    }

    #[test]
    fn test_is_true_desugars_to_comparison() {
        match expr("flag IS NOT TRUE") {
            Expr::Binary { op, right, .. } => {
                assert_eq!(op, BinaryOperator::Ne);
                assert!(matches!(*right, Expr::Literal(Literal { value: Value::Bool(true), .. })));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(expr("x IS UNKNOWN"), Expr::IsNull { negated: false, .. }));
    }

    #[test]
    fn test_like_escape_and_between_with_and() {
        assert!(matches!(expr("a LIKE 'x!%' ESCAPE '!'"), Expr::Like { escape: Some('!'), .. }));
        match expr("a BETWEEN 1 AND 2 AND b") {
            Expr::Binary { op: BinaryOperator::And, left, .. } => assert!(matches!(*left, Expr::Between { .. })),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_literals_keep_raw_text() {
        assert!(matches!(expr("1.50"), Expr::Literal(Literal { value: Value::Float(f), raw }) if f == 1.5 && raw == "1.50"));
        assert!(matches!(expr("1e3"), Expr::Literal(Literal { value: Value::Float(f), .. }) if f == 1000.0));
        assert!(matches!(expr("'it''s'"), Expr::Literal(Literal { value: Value::Text(s), raw }) if s == "it's" && raw == "'it''s'"));
        assert!(matches!(expr("99999999999999999999"), Expr::Literal(Literal { value: Value::Float(_), .. })));
        assert!(matches!(expr("NULL"), Expr::Literal(Literal { value: Value::Null, .. })));
    }

    #[test]
    fn test_bitwise_and_logical_operators() {
        assert!(matches!(expr("a || b"), Expr::Binary { op: BinaryOperator::Or, .. }));
        assert!(matches!(expr("a && b"), Expr::Binary { op: BinaryOperator::And, .. }));
        assert!(matches!(expr("a XOR b"), Expr::Binary { op: BinaryOperator::Xor, .. }));
        assert!(matches!(expr("7 DIV 2"), Expr::Binary { op: BinaryOperator::IntDiv, .. }));
        assert!(matches!(expr("7 MOD 2"), Expr::Binary { op: BinaryOperator::Mod, .. }));
        // | binds looser than &, which binds looser than <<
        match expr("1 | 2 & 3 << 1") {
            Expr::Binary { op: BinaryOperator::BitOr, right, .. } => {
                assert!(matches!(*right, Expr::Binary { op: BinaryOperator::BitAnd, .. }))
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(expr("-x"), Expr::Unary { op: UnaryOperator::Minus, .. }));
        assert!(matches!(expr("~x"), Expr::Unary { op: UnaryOperator::BitNot, .. }));
    }

    #[test]
    fn test_case_forms() {
        match expr("CASE x WHEN 1 THEN 'a' WHEN 2 THEN 'b' ELSE 'c' END") {
            Expr::Case { operand, branches, else_result } => {
                assert!(operand.is_some());
                assert_eq!(branches.len(), 2);
                assert!(else_result.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(expr("CASE WHEN a > 1 THEN 1 END"), Expr::Case { operand: None, else_result: None, .. }));
    }

    #[test]
    fn test_function_calls() {
        match expr("COUNT(DISTINCT a)") {
            Expr::Function(f) => {
                assert_eq!(f.name, "COUNT");
                assert!(f.distinct);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(expr("count(*)"), Expr::Function(f) if f.args.len() == 1 && f.args[0].is_star()));
        assert!(matches!(expr("NOW()"), Expr::Function(f) if f.name == "NOW" && f.args.is_empty()));
        assert!(matches!(expr("CURRENT_TIMESTAMP"), Expr::Function(f) if f.name == "CURRENT_TIMESTAMP"));
        assert!(matches!(expr("DATE(created)"), Expr::Function(f) if f.name == "DATE"));
        assert!(matches!(expr("IF(a, 1, 2)"), Expr::Function(f) if f.name == "IF" && f.args.len() == 3));
        match expr("GROUP_CONCAT(DISTINCT name ORDER BY name DESC SEPARATOR '; ')") {
            Expr::Function(f) => {
                assert_eq!(f.separator.as_deref(), Some("; "));
                assert_eq!(f.order_by.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_window_spec() {
        match expr("SUM(x) OVER (PARTITION BY g ORDER BY t ROWS BETWEEN 2 PRECEDING AND CURRENT ROW)") {
            Expr::Function(f) => {
                let over = f.over.unwrap();
                assert_eq!(over.partition_by.len(), 1);
                assert_eq!(over.order_by.len(), 1);
                let frame = over.frame.unwrap();
                assert_eq!(frame.units, FrameUnits::Rows);
                assert_eq!(frame.start, FrameBound::Preceding(Box::new(int(2))));
                assert_eq!(frame.end, FrameBound::CurrentRow);
            }
            other => panic!("unexpected {:?}", other),
        }
        match expr("ROW_NUMBER() OVER w") {
            Expr::Function(f) => assert_eq!(f.over.unwrap().name.as_deref(), Some("w")),
            other => panic!("unexpected {:?}", other),
        }
        match expr("AVG(x) OVER (ORDER BY t RANGE UNBOUNDED PRECEDING)") {
            Expr::Function(f) => {
                let frame = f.over.unwrap().frame.unwrap();
                assert_eq!(frame.units, FrameUnits::Range);
                assert_eq!(frame.start, FrameBound::UnboundedPreceding);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_special_function_forms() {
        match expr("CAST(x AS DECIMAL(10,2))") {
            Expr::Function(f) => {
                assert_eq!(f.name, "CAST");
                assert!(matches!(&f.args[1], Expr::Literal(Literal { value: Value::Text(t), .. }) if t == "DECIMAL(10,2)"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(expr("CONVERT(x, SIGNED)"), Expr::Function(f) if f.name == "CONVERT"));
        assert!(matches!(expr("CONVERT(x USING utf8mb4)"), Expr::Function(f) if f.args[1] == Expr::Identifier("utf8mb4".into())));
        match expr("d + INTERVAL 3 DAY") {
            Expr::Binary { right, .. } => match *right {
                Expr::Function(f) => {
                    assert_eq!(f.name, "INTERVAL");
                    assert_eq!(f.args[1], Expr::Identifier("DAY".into()));
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(expr("TRIM(LEADING 'x' FROM s)"), Expr::Function(f) if f.args.len() == 3));
        assert!(matches!(expr("SUBSTRING(s FROM 2 FOR 3)"), Expr::Function(f) if f.args.len() == 3));
        assert!(matches!(expr("POSITION('a' IN s)"), Expr::Function(f) if f.args.len() == 2));
        assert!(matches!(expr("EXTRACT(YEAR FROM d)"), Expr::Function(f) if f.args[0] == Expr::Identifier("YEAR".into())));
    }

    #[test]
    fn test_match_against() {
        match expr("MATCH(title, body) AGAINST('rust' IN BOOLEAN MODE)") {
            Expr::Match { columns, modifier, .. } => {
                assert_eq!(columns.len(), 2);
                assert_eq!(modifier, MatchModifier::Boolean);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            expr("MATCH(t) AGAINST('x' IN NATURAL LANGUAGE MODE WITH QUERY EXPANSION)"),
            Expr::Match { modifier: MatchModifier::NaturalLanguageWithExpansion, .. }
        ));
    }

    #[test]
    fn test_qualified_names_placeholders_and_variables() {
        assert!(matches!(
            expr("db.t.c"),
            Expr::ColumnRef { database: Some(d), table: Some(t), column, .. } if d == "db" && t == "t" && column == "c"
        ));
        assert!(matches!(expr("t.*"), Expr::ColumnRef { table: Some(t), column, .. } if t == "t" && column == "*"));
        assert_eq!(expr("@total"), Expr::Identifier("@total".into()));
        assert_eq!(expr("@@session.sql_mode"), Expr::Identifier("@@session.sql_mode".into()));

        let program = parse("SELECT ?, ? FROM t WHERE a = ?").unwrap();
        let Statement::Select(s) = &program.statements[0] else {
            panic!("expected select");
        };
        assert_eq!(s.columns[1].expr, Expr::Placeholder(1));
        assert!(matches!(&s.where_clause, Some(Expr::Binary { right, .. }) if **right == Expr::Placeholder(2)));
    }

    #[test]
    fn test_subqueries() {
        assert!(matches!(expr("(SELECT MAX(x) FROM t)"), Expr::Subquery(_)));
        assert!(matches!(expr("a IN (SELECT id FROM t)"), Expr::In { list: InList::Subquery(_), .. }));
    }

    #[test]
    fn test_deep_nesting_is_a_syntax_error() {
        // 8 MiB, the size of a main thread stack
        let handle = std::thread::Builder::new()
            .stack_size(8 << 20)
            .spawn(|| {
                let nested = |depth: usize, open: &str| format!("SELECT {}1{}", open.repeat(depth), ")".repeat(depth));

                assert!(parse(&nested(60, "(")).is_ok());
                assert!(parse(&format!("SELECT {}1", "- ".repeat(60))).is_ok());

                for source in [
                    nested(50_000, "("),
                    format!("SELECT {}1", "- ".repeat(50_000)),
                    format!("SELECT {}1", "NOT ".repeat(50_000)),
                    nested(50_000, "(SELECT "),
                ] {
                    match parse(&source) {
                        Err(DbError::Syntax(e)) => {
                            assert!(e.message.contains("Nesting"), "{}", e);
                            assert_eq!(e.line, 1);
                            assert!(e.column > 8);
                        }
                        other => panic!("expected a syntax error, got {:?}", other.map(|_| ())),
                    }
                }
            })
            .unwrap();
        handle.join().unwrap();
    }
}
