//! Flat backend: every record is one JSON string in a key/value store.
//!
//! Key layout (names percent-encoded):
//! - `chunkdb:databases` - array of database records
//! - `chunkdb:table:<db>:<table>` - table record
//! - `chunkdb:chunk:<db>:<table>:<index>` - array of rows
//! - `chunkdb:wal:<db>` - array of WAL entries
//! - `chunkdb:wal_seq` - last assigned WAL id
//! - `chunkdb:backup:<name>` - backup bundle
//! - `chunkdb:settings` - backend settings

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::config::{StorageConfig, CHUNK_SIZE};
use crate::error::{DbError, Result};
use crate::txn::wal::{WalEntry, WalId};
use crate::types::Row;

use super::backend::StorageBackend;
use super::kv::{FileKv, KeyValueStore, MemoryKv};
use super::records::{Backup, DatabaseRecord, Settings, StorageUsage, TableMeta};
use super::{decode_name, encode_name};

const PREFIX: &str = "chunkdb:";
const DATABASES_KEY: &str = "chunkdb:databases";
const WAL_SEQ_KEY: &str = "chunkdb:wal_seq";
const SETTINGS_KEY: &str = "chunkdb:settings";

pub struct FlatBackend {
    kv: Arc<dyn KeyValueStore>,
    chunk_size: usize,
    /// Serialises read-modify-write of the shared keys
    write_lock: Mutex<()>,
}

impl FlatBackend {
    pub fn new(kv: Arc<dyn KeyValueStore>, chunk_size: usize) -> Self {
        Self {
            kv,
            chunk_size: chunk_size.max(1),
            write_lock: Mutex::new(()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKv::new()), CHUNK_SIZE)
    }

    /// File-backed when `flat_file` is set, otherwise in memory
    pub fn open(config: &StorageConfig) -> Result<Self> {
        let kv: Arc<dyn KeyValueStore> = match &config.flat_file {
            Some(path) => Arc::new(FileKv::open(
                path,
                config.flat_quota_bytes,
                config.wal.durability_level,
            )?),
            None => Arc::new(MemoryKv::with_quota(config.flat_quota_bytes)),
        };
        Ok(Self::new(kv, config.chunk_size))
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.kv
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.kv.get(key)? {
            Some(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| DbError::Corruption(format!("{}: {}", key, e))),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.kv.set(key, serde_json::to_string(value)?)
    }

    fn database_records(&self) -> Result<Vec<DatabaseRecord>> {
        Ok(self.get_json(DATABASES_KEY)?.unwrap_or_default())
    }
}

fn table_prefix(db: &str) -> String {
    format!("{}table:{}:", PREFIX, encode_name(db))
}

fn table_key(db: &str, table: &str) -> String {
    format!("{}{}", table_prefix(db), encode_name(table))
}

fn chunk_key(db: &str, table: &str, index: u64) -> String {
    format!("{}chunk:{}:{}:{}", PREFIX, encode_name(db), encode_name(table), index)
}

fn wal_key(db: &str) -> String {
    format!("{}wal:{}", PREFIX, encode_name(db))
}

fn backup_prefix() -> String {
    format!("{}backup:", PREFIX)
}

fn backup_key(name: &str) -> String {
    format!("{}{}", backup_prefix(), encode_name(name))
}

impl StorageBackend for FlatBackend {
    fn name(&self) -> &'static str {
        "flat"
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn load_database(&self, name: &str) -> Result<Option<DatabaseRecord>> {
        Ok(self.database_records()?.into_iter().find(|r| r.name == name))
    }

    fn store_database(&self, record: &DatabaseRecord) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut records = self.database_records()?;
        match records.iter_mut().find(|r| r.name == record.name) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        self.set_json(DATABASES_KEY, &records)
    }

    fn remove_database(&self, name: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut records = self.database_records()?;
        records.retain(|r| r.name != name);
        self.set_json(DATABASES_KEY, &records)
    }

    fn database_names(&self) -> Result<Vec<String>> {
        Ok(self.database_records()?.into_iter().map(|r| r.name).collect())
    }

    fn load_table(&self, db: &str, table: &str) -> Result<Option<TableMeta>> {
        self.get_json(&table_key(db, table))
    }

    fn store_table(&self, meta: &TableMeta) -> Result<()> {
        self.set_json(&table_key(&meta.db_name, &meta.table_name), meta)
    }

    fn remove_table(&self, db: &str, table: &str) -> Result<()> {
        self.kv.remove(&table_key(db, table))
    }

    fn table_names(&self, db: &str) -> Result<Vec<String>> {
        let prefix = table_prefix(db);
        Ok(self
            .kv
            .keys_with_prefix(&prefix)?
            .iter()
            .filter_map(|key| decode_name(&key[prefix.len()..]))
            .collect())
    }

    fn read_chunk(&self, db: &str, table: &str, index: u64) -> Result<Vec<Row>> {
        Ok(self.get_json(&chunk_key(db, table, index))?.unwrap_or_default())
    }

    fn write_chunk(&self, db: &str, table: &str, index: u64, rows: &[Row]) -> Result<()> {
        self.set_json(&chunk_key(db, table, index), rows)
    }

    fn remove_chunk(&self, db: &str, table: &str, index: u64) -> Result<()> {
        self.kv.remove(&chunk_key(db, table, index))
    }

    fn wal_append(&self, mut entry: WalEntry) -> Result<WalId> {
        let _guard = self.write_lock.lock();
        let id = self.get_json::<WalId>(WAL_SEQ_KEY)?.unwrap_or(0) + 1;
        entry.id = id;

        let key = wal_key(&entry.db_name);
        let mut entries: Vec<WalEntry> = self.get_json(&key)?.unwrap_or_default();
        entries.push(entry);
        self.set_json(&key, &entries)?;
        self.set_json(WAL_SEQ_KEY, &id)?;
        Ok(id)
    }

    fn wal_entries(&self, db: &str) -> Result<Vec<WalEntry>> {
        Ok(self.get_json(&wal_key(db))?.unwrap_or_default())
    }

    fn wal_replace(&self, db: &str, entries: &[WalEntry]) -> Result<()> {
        let _guard = self.write_lock.lock();
        if entries.is_empty() {
            self.kv.remove(&wal_key(db))
        } else {
            self.set_json(&wal_key(db), entries)
        }
    }

    fn store_backup(&self, backup: &Backup) -> Result<()> {
        self.set_json(&backup_key(&backup.name), backup)
    }

    fn load_backup(&self, name: &str) -> Result<Option<Backup>> {
        self.get_json(&backup_key(name))
    }

    fn backup_names(&self) -> Result<Vec<String>> {
        let prefix = backup_prefix();
        Ok(self
            .kv
            .keys_with_prefix(&prefix)?
            .iter()
            .filter_map(|key| decode_name(&key[prefix.len()..]))
            .collect())
    }

    fn remove_backup(&self, name: &str) -> Result<bool> {
        let key = backup_key(name);
        let existed = self.kv.get(&key)?.is_some();
        self.kv.remove(&key)?;
        Ok(existed)
    }

    fn load_settings(&self) -> Result<Settings> {
        Ok(self.get_json(SETTINGS_KEY)?.unwrap_or_default())
    }

    fn store_settings(&self, settings: &Settings) -> Result<()> {
        self.set_json(SETTINGS_KEY, settings)
    }

    fn usage(&self) -> Result<StorageUsage> {
        Ok(StorageUsage {
            size_bytes: self.kv.used_bytes(),
            quota_bytes: self.kv.quota_bytes(),
        })
    }

    fn flush(&self) -> Result<()> {
        self.kv.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txn::wal::WalOperation;
    use crate::types::{ColumnSchema, TableSchema};
    use serde_json::json;

    fn schema() -> TableSchema {
        TableSchema::new(vec![ColumnSchema::new("id", "INT"), ColumnSchema::new("name", "TEXT")])
    }

    fn row(id: i64) -> Row {
        json!({"id": id, "name": format!("n{}", id)}).as_object().cloned().unwrap()
    }

    #[test]
    fn test_key_layout() {
        let backend = FlatBackend::new(Arc::new(MemoryKv::new()), 2);
        backend.create_database("shop").unwrap();
        backend.create_table("shop", "order:items", schema()).unwrap();
        backend.insert_rows("shop", "order:items", (0..3).map(row).collect()).unwrap();

        let kv = backend.store();
        assert!(kv.get("chunkdb:databases").unwrap().is_some());
        assert!(kv.get("chunkdb:table:shop:order%3Aitems").unwrap().is_some());
        assert!(kv.get("chunkdb:chunk:shop:order%3Aitems:0").unwrap().is_some());
        assert!(kv.get("chunkdb:chunk:shop:order%3Aitems:1").unwrap().is_some());
        assert_eq!(backend.list_tables("shop").unwrap(), vec!["order:items"]);
    }

    #[test]
    fn test_tables_do_not_leak_across_databases() {
        let backend = FlatBackend::in_memory();
        backend.create_database("a").unwrap();
        backend.create_database("ab").unwrap();
        backend.create_table("a", "t1", schema()).unwrap();
        backend.create_table("ab", "t2", schema()).unwrap();

        assert_eq!(backend.list_tables("a").unwrap(), vec!["t1"]);
        assert_eq!(backend.list_tables("ab").unwrap(), vec!["t2"]);
    }

    #[test]
    fn test_wal_ids_are_global() {
        let backend = FlatBackend::in_memory();
        let a = backend
            .wal_append(WalEntry::new("a", WalOperation::Ddl, "CREATE TABLE t (id INT)"))
            .unwrap();
        let b = backend
            .wal_append(WalEntry::new("b", WalOperation::Ddl, "CREATE TABLE t (id INT)"))
            .unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(backend.wal_entries("a").unwrap()[0].id, 1);
    }

    #[test]
    fn test_quota_surfaces_from_backend() {
        let backend = FlatBackend::new(Arc::new(MemoryKv::with_quota(Some(2048))), 1000);
        backend.create_database("shop").unwrap();
        backend.create_table("shop", "t", schema()).unwrap();
        backend.insert_rows("shop", "t", (0..5).map(row).collect()).unwrap();

        let err = backend
            .insert_rows("shop", "t", (5..105).map(row).collect())
            .unwrap_err();
        assert!(matches!(err, DbError::QuotaExceeded { quota: 2048, .. }));

        // the rejected write left the earlier rows in place
        assert_eq!(backend.get_rows("shop", "t").unwrap(), (0..5).map(row).collect::<Vec<_>>());
        assert_eq!(backend.get_table_meta("shop", "t").unwrap().row_count, 5);

        let info = backend.storage_info().unwrap();
        assert_eq!(info.backend, "flat");
        assert_eq!(info.quota_bytes, Some(2048));
        assert!(info.used_bytes.unwrap() <= 2048);
    }

    #[test]
    fn test_corrupted_value_reported() {
        let kv = Arc::new(MemoryKv::new());
        kv.set("chunkdb:databases", "{oops".to_string()).unwrap();
        let backend = FlatBackend::new(kv, 10);
        assert!(matches!(backend.list_databases(), Err(DbError::Corruption(_))));
    }
}
