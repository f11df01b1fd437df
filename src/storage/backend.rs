//! The storage backend trait
//!
//! Implementations supply record, chunk, WAL and backup primitives. Row
//! chunking, table lifecycle, WAL filtering and export / import are provided
//! methods written once against those primitives, so both backends expose
//! the same behaviour and the same shapes.

use std::collections::BTreeMap;

use crate::error::{DbError, Result};
use crate::txn::wal::{self, now_timestamp, WalEntry, WalId};
use crate::types::{Row, TableSchema};

use super::records::{
    Backup, DatabaseExport, DatabaseRecord, FullExport, Settings, StorageInfo, StorageUsage, TableExport,
    TableMeta, EXPORT_VERSION,
};

pub trait StorageBackend: Send + Sync {
    /// Short name reported by storage info
    fn name(&self) -> &'static str;

    /// Maximum rows per chunk
    fn chunk_size(&self) -> usize;

    // ---- database records

    fn load_database(&self, name: &str) -> Result<Option<DatabaseRecord>>;
    fn store_database(&self, record: &DatabaseRecord) -> Result<()>;
    fn remove_database(&self, name: &str) -> Result<()>;
    fn database_names(&self) -> Result<Vec<String>>;

    // ---- table records

    fn load_table(&self, db: &str, table: &str) -> Result<Option<TableMeta>>;
    fn store_table(&self, meta: &TableMeta) -> Result<()>;
    fn remove_table(&self, db: &str, table: &str) -> Result<()>;
    fn table_names(&self, db: &str) -> Result<Vec<String>>;

    // ---- row chunks

    /// A chunk that was never written reads as empty
    fn read_chunk(&self, db: &str, table: &str, index: u64) -> Result<Vec<Row>>;
    fn write_chunk(&self, db: &str, table: &str, index: u64, rows: &[Row]) -> Result<()>;
    fn remove_chunk(&self, db: &str, table: &str, index: u64) -> Result<()>;

    // ---- write-ahead log

    /// Persist `entry` under a freshly assigned id and return the id
    fn wal_append(&self, entry: WalEntry) -> Result<WalId>;
    /// Every entry of `db`, in no particular order
    fn wal_entries(&self, db: &str) -> Result<Vec<WalEntry>>;
    /// Replace the log of `db`
    fn wal_replace(&self, db: &str, entries: &[WalEntry]) -> Result<()>;

    // ---- backups and settings

    fn store_backup(&self, backup: &Backup) -> Result<()>;
    fn load_backup(&self, name: &str) -> Result<Option<Backup>>;
    fn backup_names(&self) -> Result<Vec<String>>;
    fn remove_backup(&self, name: &str) -> Result<bool>;

    fn load_settings(&self) -> Result<Settings>;
    fn store_settings(&self, settings: &Settings) -> Result<()>;

    fn usage(&self) -> Result<StorageUsage>;

    /// Push buffered writes to stable storage
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    // ---- databases

    fn list_databases(&self) -> Result<Vec<String>> {
        let mut names = self.database_names()?;
        names.sort();
        Ok(names)
    }

    fn database_exists(&self, name: &str) -> Result<bool> {
        Ok(self.load_database(name)?.is_some())
    }

    fn create_database(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(DbError::InvalidArgument("database name cannot be empty".to_string()));
        }
        if self.database_exists(name)? {
            return Err(DbError::DatabaseExists(name.to_string()));
        }
        self.store_database(&DatabaseRecord::new(name))?;
        tracing::debug!(backend = self.name(), db = name, "created database");
        Ok(())
    }

    /// Drop every table, then the database record. The WAL of the database
    /// is kept.
    fn delete_database(&self, name: &str) -> Result<()> {
        self.require_database(name)?;
        for table in self.table_names(name)? {
            self.delete_table(name, &table)?;
        }
        self.remove_database(name)?;
        tracing::debug!(backend = self.name(), db = name, "deleted database");
        Ok(())
    }

    fn require_database(&self, name: &str) -> Result<DatabaseRecord> {
        self.load_database(name)?
            .ok_or_else(|| DbError::DatabaseNotFound(name.to_string()))
    }

    // ---- tables

    fn list_tables(&self, db: &str) -> Result<Vec<String>> {
        self.require_database(db)?;
        let mut names = self.table_names(db)?;
        names.sort();
        Ok(names)
    }

    fn create_table(&self, db: &str, table: &str, schema: TableSchema) -> Result<()> {
        if table.is_empty() {
            return Err(DbError::InvalidArgument("table name cannot be empty".to_string()));
        }
        self.require_database(db)?;
        if self.load_table(db, table)?.is_some() {
            return Err(DbError::TableExists {
                db: db.to_string(),
                table: table.to_string(),
            });
        }
        self.store_table(&TableMeta::new(db, table, schema))?;
        tracing::debug!(backend = self.name(), db, table, "created table");
        Ok(())
    }

    /// Frees chunks `0..chunk_count`, then the table record
    fn delete_table(&self, db: &str, table: &str) -> Result<()> {
        let meta = self.get_table_meta(db, table)?;
        for index in 0..meta.chunk_count {
            self.remove_chunk(db, table, index)?;
        }
        self.remove_table(db, table)?;
        tracing::debug!(backend = self.name(), db, table, chunks = meta.chunk_count, "deleted table");
        Ok(())
    }

    fn table_exists(&self, db: &str, table: &str) -> Result<bool> {
        Ok(self.load_table(db, table)?.is_some())
    }

    fn get_table_meta(&self, db: &str, table: &str) -> Result<TableMeta> {
        match self.load_table(db, table)? {
            Some(meta) => Ok(meta),
            None => {
                self.require_database(db)?;
                Err(DbError::table_not_found(db, table))
            }
        }
    }

    fn get_table_schema(&self, db: &str, table: &str) -> Result<TableSchema> {
        Ok(self.get_table_meta(db, table)?.schema)
    }

    fn update_table_schema(&self, db: &str, table: &str, schema: TableSchema) -> Result<()> {
        let mut meta = self.get_table_meta(db, table)?;
        meta.schema = schema;
        meta.touch();
        self.store_table(&meta)
    }

    // ---- rows

    /// All rows, chunk after chunk
    fn get_rows(&self, db: &str, table: &str) -> Result<Vec<Row>> {
        let meta = self.get_table_meta(db, table)?;
        let mut rows = Vec::with_capacity(meta.row_count as usize);
        for index in 0..meta.chunk_count {
            rows.extend(self.read_chunk(db, table, index)?);
        }
        Ok(rows)
    }

    /// Replace the table contents: rewrites `ceil(n / chunk_size)` chunks and
    /// frees the trailing chunks the old contents used
    fn save_rows(&self, db: &str, table: &str, rows: &[Row]) -> Result<()> {
        let mut meta = self.get_table_meta(db, table)?;
        let chunk_size = self.chunk_size().max(1);

        let mut written = 0u64;
        for chunk in rows.chunks(chunk_size) {
            self.write_chunk(db, table, written, chunk)?;
            written += 1;
        }
        for index in written..meta.chunk_count {
            self.remove_chunk(db, table, index)?;
        }

        tracing::debug!(
            backend = self.name(),
            db,
            table,
            rows = rows.len(),
            chunks = written,
            freed = meta.chunk_count.saturating_sub(written),
            "saved rows"
        );

        meta.row_count = rows.len() as u64;
        meta.chunk_count = written;
        meta.touch();
        self.store_table(&meta)
    }

    /// Append rows: the last chunk is filled before new ones are opened.
    /// Chunks are written strictly in index order.
    fn insert_rows(&self, db: &str, table: &str, rows: Vec<Row>) -> Result<()> {
        let mut meta = self.get_table_meta(db, table)?;
        let chunk_size = self.chunk_size().max(1);
        let inserted = rows.len() as u64;

        // a table without chunks opens chunk 0, even for an empty insert
        let opened = meta.chunk_count == 0;
        let mut index = meta.chunk_count.saturating_sub(1);
        let mut current = if opened {
            Vec::new()
        } else {
            self.read_chunk(db, table, index)?
        };
        let mut dirty = opened;
        let mut pending = rows.into_iter().peekable();

        loop {
            while current.len() < chunk_size {
                match pending.next() {
                    Some(row) => {
                        current.push(row);
                        dirty = true;
                    }
                    None => break,
                }
            }
            if dirty {
                self.write_chunk(db, table, index, &current)?;
            }
            if pending.peek().is_none() {
                break;
            }
            index += 1;
            current = Vec::with_capacity(chunk_size);
            dirty = false;
        }

        meta.chunk_count = index + 1;
        meta.row_count += inserted;
        meta.touch();
        self.store_table(&meta)
    }

    fn get_auto_increment_id(&self, db: &str, table: &str) -> Result<u64> {
        Ok(self.get_table_meta(db, table)?.auto_increment_id)
    }

    fn set_auto_increment_id(&self, db: &str, table: &str, value: u64) -> Result<()> {
        let mut meta = self.get_table_meta(db, table)?;
        meta.auto_increment_id = value;
        meta.touch();
        self.store_table(&meta)
    }

    // ---- WAL

    /// Entries of `db` stamped strictly after `since`, sorted by timestamp
    fn get_wal(&self, db: &str, since: Option<&str>) -> Result<Vec<WalEntry>> {
        let mut entries = self.wal_entries(db)?;
        if let Some(since) = since {
            entries.retain(|e| e.is_after(since));
        }
        wal::sort_entries(&mut entries);
        Ok(entries)
    }

    /// Remove entries stamped strictly before `before`; returns how many went
    fn truncate_wal(&self, db: &str, before: &str) -> Result<usize> {
        let mut entries = self.wal_entries(db)?;
        let total = entries.len();
        entries.retain(|e| !e.is_before(before));
        let removed = total - entries.len();
        if removed > 0 {
            wal::sort_entries(&mut entries);
            self.wal_replace(db, &entries)?;
        }
        tracing::debug!(backend = self.name(), db, removed, "truncated WAL");
        Ok(removed)
    }

    // ---- export / import

    fn export_table(&self, db: &str, table: &str) -> Result<TableExport> {
        let meta = self.get_table_meta(db, table)?;
        let rows = self.get_rows(db, table)?;
        Ok(TableExport {
            schema: meta.schema,
            rows,
            auto_increment_id: meta.auto_increment_id,
        })
    }

    /// Replace `db.table` with the exported contents
    fn import_table(&self, db: &str, table: &str, export: &TableExport) -> Result<()> {
        if self.table_exists(db, table)? {
            self.delete_table(db, table)?;
        }
        self.create_table(db, table, export.schema.clone())?;
        self.save_rows(db, table, &export.rows)?;
        self.set_auto_increment_id(db, table, export.auto_increment_id)
    }

    fn export_database(&self, db: &str) -> Result<DatabaseExport> {
        let mut tables = BTreeMap::new();
        for table in self.list_tables(db)? {
            let export = self.export_table(db, &table)?;
            tables.insert(table, export);
        }
        Ok(DatabaseExport {
            name: db.to_string(),
            tables,
        })
    }

    /// Deletes and recreates the database
    fn import_database(&self, export: &DatabaseExport) -> Result<()> {
        if self.database_exists(&export.name)? {
            self.delete_database(&export.name)?;
        }
        self.create_database(&export.name)?;
        for (table, data) in &export.tables {
            self.import_table(&export.name, table, data)?;
        }
        tracing::info!(backend = self.name(), db = %export.name, tables = export.tables.len(), "imported database");
        Ok(())
    }

    fn export_all(&self) -> Result<FullExport> {
        let mut databases = BTreeMap::new();
        for db in self.list_databases()? {
            let export = self.export_database(&db)?;
            databases.insert(db, export);
        }
        Ok(FullExport {
            version: EXPORT_VERSION,
            exported_at: now_timestamp(),
            databases,
        })
    }

    fn import_all(&self, export: &FullExport) -> Result<()> {
        export.check_version()?;
        for data in export.databases.values() {
            self.import_database(data)?;
        }
        Ok(())
    }

    // ---- info and backups

    fn storage_info(&self) -> Result<StorageInfo> {
        let databases = self.database_names()?;
        let mut table_count = 0;
        for db in &databases {
            table_count += self.table_names(db)?.len();
        }
        let usage = self.usage()?;
        Ok(StorageInfo {
            backend: self.name().to_string(),
            database_count: databases.len(),
            table_count,
            size_estimate_bytes: usage.size_bytes,
            quota_bytes: usage.quota_bytes,
            used_bytes: usage.quota_bytes.map(|_| usage.size_bytes),
        })
    }

    /// Snapshot every database under `name`, replacing an older backup
    fn save_backup(&self, name: &str) -> Result<Backup> {
        if name.is_empty() {
            return Err(DbError::InvalidArgument("backup name cannot be empty".to_string()));
        }
        let backup = Backup {
            name: name.to_string(),
            created_at: now_timestamp(),
            data: self.export_all()?,
        };
        self.store_backup(&backup)?;
        Ok(backup)
    }

    fn list_backups(&self) -> Result<Vec<String>> {
        let mut names = self.backup_names()?;
        names.sort();
        Ok(names)
    }
}
