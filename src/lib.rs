//! chunkdb
//!
//! Embedded relational database engine with a MySQL-flavoured SQL front end.
//!
//! ## Architecture
//! - SQL: tokenizer, recursive-descent parser producing a typed AST
//! - Evaluator: tree-walking interpreter for scalar, aggregate and window
//!   expressions, lenient about unsupported SQL (warnings, not errors)
//! - Storage: databases -> tables -> row chunks of 10,000 rows, behind a
//!   backend trait with a chunked directory store and a flat key/value
//!   fallback
//! - WAL: append-only, checksummed audit log per database
//!
//! ```ignore
//! use chunkdb::{Storage, StorageConfig};
//!
//! let storage = Storage::open(StorageConfig::new("./chunkdb_data"))?;
//! storage.create_database("shop")?;
//! let program = chunkdb::sql::parse("SELECT 1 + 2 AS three")?;
//! ```

pub mod config;
pub mod sql;
pub mod storage;
pub mod txn;
pub mod types;

mod error;

pub use config::{BackendPreference, DurabilityLevel, StorageConfig, WALConfig, CHUNK_SIZE};
pub use error::{DbError, Result, SyntaxError};
pub use sql::{parse, parse_expression, EvalContext, ExprEvaluator, Program, Statement};
pub use storage::{Storage, StorageBackend, StorageInfo, TableMeta};
pub use txn::wal::{WalEntry, WalOperation};
pub use types::{ColumnSchema, Row, SqlRow, TableSchema, Value};
