/// Persisted records and export bundles shared by every backend
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{DbError, Result};
use crate::txn::wal::now_timestamp;
use crate::types::{Row, TableSchema};

/// Version written into full exports
pub const EXPORT_VERSION: u32 = 1;

/// Version of the database record layout
pub const DATABASE_RECORD_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseRecord {
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
    pub version: u32,
}

impl DatabaseRecord {
    pub fn new(name: impl Into<String>) -> Self {
        let now = now_timestamp();
        Self {
            name: name.into(),
            created_at: now.clone(),
            updated_at: now,
            version: DATABASE_RECORD_VERSION,
        }
    }
}

/// Table record: schema plus the counters that locate its rows.
///
/// Rows live in chunks `0..chunk_count`, each holding at most the backend's
/// chunk size, concatenated in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    pub db_name: String,
    pub table_name: String,
    pub schema: TableSchema,
    pub row_count: u64,
    pub chunk_count: u64,
    /// Advisory; the storage layer never assigns ids itself
    pub auto_increment_id: u64,
    pub created_at: String,
    pub updated_at: String,
}

impl TableMeta {
    pub fn new(db_name: impl Into<String>, table_name: impl Into<String>, schema: TableSchema) -> Self {
        let now = now_timestamp();
        Self {
            db_name: db_name.into(),
            table_name: table_name.into(),
            schema,
            row_count: 0,
            chunk_count: 0,
            auto_increment_id: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = now_timestamp();
    }
}

/// Persisted backend settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Set once the flat store has been copied into this backend
    pub migrated: bool,
    pub migrated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableExport {
    pub schema: TableSchema,
    pub rows: Vec<Row>,
    pub auto_increment_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseExport {
    pub name: String,
    pub tables: BTreeMap<String, TableExport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullExport {
    pub version: u32,
    pub exported_at: String,
    pub databases: BTreeMap<String, DatabaseExport>,
}

impl FullExport {
    /// Exports from a newer layout are refused rather than half-read
    pub fn check_version(&self) -> Result<()> {
        if self.version > EXPORT_VERSION {
            return Err(DbError::InvalidArgument(format!(
                "export version {} is newer than supported version {}",
                self.version, EXPORT_VERSION
            )));
        }
        Ok(())
    }
}

/// A named full export kept by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    pub name: String,
    pub created_at: String,
    pub data: FullExport,
}

/// Space a backend reports for itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageUsage {
    pub size_bytes: u64,
    pub quota_bytes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageInfo {
    pub backend: String,
    pub database_count: usize,
    pub table_count: usize,
    pub size_estimate_bytes: u64,
    pub quota_bytes: Option<u64>,
    pub used_bytes: Option<u64>,
}
