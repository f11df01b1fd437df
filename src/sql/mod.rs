/// chunkdb SQL front end
///
/// Architecture:
/// - Lexer: Tokenizes SQL strings
/// - Parser: Builds a typed AST from tokens
/// - Evaluator: Evaluates expressions against rows, groups and windows
/// - Row converter: Moves rows between the stored JSON shape and the evaluator shape
pub mod ast;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod row_converter;
pub mod token;

pub use ast::{BinaryOperator, Expr, Program, SelectStmt, Statement};
pub use evaluator::{EvalContext, EvalWarning, ExprEvaluator, WarningKind};
pub use lexer::{tokenize, Lexer};
pub use parser::Parser;
pub use row_converter::{row_to_sql_row, rows_to_sql_rows, sql_row_to_row};
pub use token::{Keyword, Token, TokenType};

use crate::error::Result;

/// Parse a script of `;`-separated statements
pub fn parse(source: &str) -> Result<Program> {
    let tokens = tokenize(source)?;
    Parser::with_source(tokens, source).parse_program()
}

/// Parse exactly one statement from already tokenized input
pub fn parse_statement(tokens: Vec<Token>) -> Result<Statement> {
    Parser::new(tokens).parse_single()
}

/// Parse a standalone expression such as `price * 1.2`
pub fn parse_expression(source: &str) -> Result<Expr> {
    Parser::new(tokenize(source)?).parse_expression()
}
