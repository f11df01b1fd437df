//! Storage facade
//!
//! [`Storage`] is the handle callers hold. It picks a backend, serialises
//! row-mutating calls per `(database, table)` and applies the WAL settings.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::config::{BackendPreference, StorageConfig};
use crate::error::{DbError, Result};
use crate::txn::wal::{WalEntry, WalId};
use crate::types::{Row, TableSchema};

use super::backend::StorageBackend;
use super::chunked::ChunkedBackend;
use super::flat::FlatBackend;
use super::migration::{self, MigrationReport};
use super::records::{Backup, DatabaseExport, FullExport, StorageInfo, TableExport, TableMeta};

type TableKey = (String, String);

pub struct Storage {
    backend: Arc<dyn StorageBackend>,
    config: StorageConfig,
    table_locks: DashMap<TableKey, Arc<Mutex<()>>>,
}

impl Storage {
    /// Open the backend `config` asks for. `Auto` tries the chunked store
    /// and falls back to the flat store when it cannot initialise.
    pub fn open(config: StorageConfig) -> Result<Self> {
        config.validate()?;
        let backend: Arc<dyn StorageBackend> = match config.backend {
            BackendPreference::Chunked => Arc::new(ChunkedBackend::open(&config)?),
            BackendPreference::Flat => Arc::new(FlatBackend::open(&config)?),
            BackendPreference::Memory => {
                let mut memory = config.clone();
                memory.flat_file = None;
                Arc::new(FlatBackend::open(&memory)?)
            }
            BackendPreference::Auto => match ChunkedBackend::open(&config) {
                Ok(chunked) => Arc::new(chunked),
                Err(e) => {
                    tracing::warn!(error = %e, "chunked backend unavailable, falling back to flat store");
                    Arc::new(FlatBackend::open(&config)?)
                }
            },
        };

        tracing::info!(
            backend = backend.name(),
            data_dir = %config.data_dir.display(),
            wal = config.wal.enabled,
            "storage opened"
        );
        Ok(Self::with_backend(backend, config))
    }

    /// Flat store in memory, for tests and scratch sessions
    pub fn in_memory() -> Self {
        Self::with_backend(Arc::new(FlatBackend::in_memory()), StorageConfig::in_memory())
    }

    pub fn with_backend(backend: Arc<dyn StorageBackend>, config: StorageConfig) -> Self {
        Self {
            backend,
            config,
            table_locks: DashMap::new(),
        }
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn table_lock(&self, db: &str, table: &str) -> Arc<Mutex<()>> {
        self.table_locks
            .entry((db.to_string(), table.to_string()))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Locks for the given tables, in sorted order so concurrent callers
    /// cannot deadlock
    fn table_locks_for<'a>(&self, db: &str, tables: impl IntoIterator<Item = &'a str>) -> Vec<Arc<Mutex<()>>> {
        let mut names: Vec<&str> = tables.into_iter().collect();
        names.sort_unstable();
        names.dedup();
        names.into_iter().map(|t| self.table_lock(db, t)).collect()
    }

    fn forget_locks(&self, db: &str) {
        self.table_locks.retain(|(d, _), _| d != db);
    }

    // ---- databases

    pub fn list_databases(&self) -> Result<Vec<String>> {
        self.backend.list_databases()
    }

    pub fn create_database(&self, name: &str) -> Result<()> {
        self.backend.create_database(name)
    }

    pub fn delete_database(&self, name: &str) -> Result<()> {
        let tables = self.backend.list_tables(name)?;
        let locks = self.table_locks_for(name, tables.iter().map(String::as_str));
        let guards: Vec<_> = locks.iter().map(|l| l.lock()).collect();
        self.backend.delete_database(name)?;
        drop(guards);
        self.forget_locks(name);
        Ok(())
    }

    pub fn database_exists(&self, name: &str) -> Result<bool> {
        self.backend.database_exists(name)
    }

    // ---- tables

    pub fn list_tables(&self, db: &str) -> Result<Vec<String>> {
        self.backend.list_tables(db)
    }

    pub fn create_table(&self, db: &str, table: &str, schema: TableSchema) -> Result<()> {
        let lock = self.table_lock(db, table);
        let _guard = lock.lock();
        self.backend.create_table(db, table, schema)
    }

    pub fn delete_table(&self, db: &str, table: &str) -> Result<()> {
        let lock = self.table_lock(db, table);
        let _guard = lock.lock();
        self.backend.delete_table(db, table)
    }

    pub fn get_table_schema(&self, db: &str, table: &str) -> Result<TableSchema> {
        self.backend.get_table_schema(db, table)
    }

    pub fn update_table_schema(&self, db: &str, table: &str, schema: TableSchema) -> Result<()> {
        let lock = self.table_lock(db, table);
        let _guard = lock.lock();
        self.backend.update_table_schema(db, table, schema)
    }

    pub fn get_table_meta(&self, db: &str, table: &str) -> Result<TableMeta> {
        self.backend.get_table_meta(db, table)
    }

    // ---- rows

    pub fn get_rows(&self, db: &str, table: &str) -> Result<Vec<Row>> {
        self.backend.get_rows(db, table)
    }

    pub fn save_rows(&self, db: &str, table: &str, rows: &[Row]) -> Result<()> {
        let lock = self.table_lock(db, table);
        let _guard = lock.lock();
        self.backend.save_rows(db, table, rows)
    }

    pub fn insert_rows(&self, db: &str, table: &str, rows: Vec<Row>) -> Result<()> {
        let lock = self.table_lock(db, table);
        let _guard = lock.lock();
        self.backend.insert_rows(db, table, rows)
    }

    pub fn get_auto_increment_id(&self, db: &str, table: &str) -> Result<u64> {
        self.backend.get_auto_increment_id(db, table)
    }

    pub fn set_auto_increment_id(&self, db: &str, table: &str, value: u64) -> Result<()> {
        let lock = self.table_lock(db, table);
        let _guard = lock.lock();
        self.backend.set_auto_increment_id(db, table, value)
    }

    // ---- export / import

    pub fn export_table(&self, db: &str, table: &str) -> Result<TableExport> {
        self.backend.export_table(db, table)
    }

    pub fn import_table(&self, db: &str, table: &str, export: &TableExport) -> Result<()> {
        let lock = self.table_lock(db, table);
        let _guard = lock.lock();
        self.backend.import_table(db, table, export)
    }

    pub fn export_database(&self, db: &str) -> Result<DatabaseExport> {
        self.backend.export_database(db)
    }

    /// Deletes and recreates the database from the export
    pub fn import_database(&self, export: &DatabaseExport) -> Result<()> {
        let existing = if self.backend.database_exists(&export.name)? {
            self.backend.list_tables(&export.name)?
        } else {
            Vec::new()
        };
        let names = existing
            .iter()
            .map(String::as_str)
            .chain(export.tables.keys().map(String::as_str));
        let locks = self.table_locks_for(&export.name, names);
        let _guards: Vec<_> = locks.iter().map(|l| l.lock()).collect();
        self.backend.import_database(export)
    }

    pub fn export_all(&self) -> Result<FullExport> {
        self.backend.export_all()
    }

    pub fn import_all(&self, export: &FullExport) -> Result<()> {
        export.check_version()?;
        for data in export.databases.values() {
            self.import_database(data)?;
        }
        Ok(())
    }

    // ---- WAL

    /// Append to the log; returns the assigned id, or 0 when the WAL is
    /// disabled
    pub fn append_wal(&self, entry: WalEntry) -> Result<WalId> {
        if !self.config.wal.enabled {
            return Ok(0);
        }
        self.backend.wal_append(entry)
    }

    /// Entries stamped strictly after `since`, sorted by timestamp
    pub fn get_wal(&self, db: &str, since: Option<&str>) -> Result<Vec<WalEntry>> {
        self.backend.get_wal(db, since)
    }

    /// Remove entries strictly older than `before`
    pub fn truncate_wal(&self, db: &str, before: &str) -> Result<usize> {
        self.backend.truncate_wal(db, before)
    }

    // ---- info, backups, migration

    pub fn storage_info(&self) -> Result<StorageInfo> {
        self.backend.storage_info()
    }

    pub fn save_backup(&self, name: &str) -> Result<Backup> {
        self.backend.save_backup(name)
    }

    pub fn get_backup(&self, name: &str) -> Result<Option<Backup>> {
        self.backend.load_backup(name)
    }

    pub fn list_backups(&self) -> Result<Vec<String>> {
        self.backend.list_backups()
    }

    /// Returns whether a backup of that name existed
    pub fn delete_backup(&self, name: &str) -> Result<bool> {
        self.backend.remove_backup(name)
    }

    /// Copy the legacy flat store named by `config.flat_file` into this
    /// storage. Gated by the persisted `migrated` flag.
    pub fn migrate_from_flat(&self) -> Result<MigrationReport> {
        if self.backend.name() == "flat" {
            return Err(DbError::InvalidArgument(
                "storage already uses the flat backend".to_string(),
            ));
        }
        let Some(flat_file) = &self.config.flat_file else {
            return Err(DbError::InvalidArgument("no flat store configured".to_string()));
        };
        if !flat_file.exists() {
            tracing::debug!(path = %flat_file.display(), "no legacy flat store to migrate");
            return Ok(MigrationReport {
                skipped: true,
                ..Default::default()
            });
        }
        let source = FlatBackend::open(&self.config)?;
        self.migrate_from(&source)
    }

    /// Copy another backend's contents into this storage, once
    pub fn migrate_from(&self, source: &dyn StorageBackend) -> Result<MigrationReport> {
        migration::migrate(source, self.backend.as_ref())
    }

    pub fn flush(&self) -> Result<()> {
        self.backend.flush()
    }
}
