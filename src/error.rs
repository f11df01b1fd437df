//! Error types for the chunkdb engine

use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

/// Malformed SQL, always carrying the position of the offending token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    /// Byte offset into the source text
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, offset: usize, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            offset,
            line,
            column,
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}: {}", self.line, self.column, self.message)
    }
}

impl std::error::Error for SyntaxError {}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("{0}")]
    Syntax(SyntaxError),

    /// Statement-level validity checks layered on top of a valid AST.
    #[error("Semantic error: {0}")]
    Semantic(String),

    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    #[error("Database already exists: {0}")]
    DatabaseExists(String),

    #[error("Table not found: {db}.{table}")]
    TableNotFound { db: String, table: String },

    #[error("Table already exists: {db}.{table}")]
    TableExists { db: String, table: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Data corruption: {0}")]
    Corruption(String),

    #[error("Storage quota exceeded: {used} of {quota} bytes")]
    QuotaExceeded { used: u64, quota: u64 },

    #[error("Storage backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),
}

impl DbError {
    pub fn table_not_found(db: &str, table: &str) -> Self {
        DbError::TableNotFound {
            db: db.to_string(),
            table: table.to_string(),
        }
    }

    /// Position of the failing token, if this is a syntax error.
    pub fn position(&self) -> Option<(usize, usize)> {
        match self {
            DbError::Syntax(e) => Some((e.line, e.column)),
            _ => None,
        }
    }
}

impl From<SyntaxError> for DbError {
    fn from(err: SyntaxError) -> Self {
        DbError::Syntax(err)
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for DbError {
    fn from(err: bincode::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

impl From<snap::Error> for DbError {
    fn from(err: snap::Error) -> Self {
        DbError::Corruption(format!("snappy: {}", err))
    }
}

impl From<regex::Error> for DbError {
    fn from(err: regex::Error) -> Self {
        DbError::Evaluation(format!("invalid regular expression: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display() {
        let err = DbError::from(SyntaxError::new("Expected FROM, found 'x'", 12, 2, 5));
        assert_eq!(err.to_string(), "line 2, column 5: Expected FROM, found 'x'");
        assert_eq!(err.position(), Some((2, 5)));
    }

    #[test]
    fn test_table_not_found_message() {
        let err = DbError::table_not_found("shop", "orders");
        assert_eq!(err.to_string(), "Table not found: shop.orders");
        assert!(err.position().is_none());
    }
}
