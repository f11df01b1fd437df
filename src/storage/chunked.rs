//! Chunked directory backend
//!
//! Layout under the data directory (names percent-encoded):
//!
//! ```text
//! databases/<db>.rec                 bincode record, length framed + CRC32
//! tables/<db>/<table>.rec            bincode record, length framed + CRC32
//! chunks/<db>/<table>/<index>.chunk  [crc32][codec][JSON rows, maybe snappy]
//! wal/<db>.log                       framed WAL records
//! backups/<name>.json                backup bundle
//! settings.json                      backend settings
//! ```
//!
//! Records and chunks are replaced atomically through a temporary file and a
//! rename, and verified on read.

use ahash::AHashMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::{DurabilityLevel, StorageConfig};
use crate::error::{DbError, Result};
use crate::txn::wal::{self, WalEntry, WalFile, WalId};
use crate::types::Row;

use super::backend::StorageBackend;
use super::checksum::{decode_named, unseal_named, Checksum};
use super::records::{Backup, DatabaseRecord, Settings, StorageUsage, TableMeta};
use super::{decode_name, encode_name, write_atomic};

const CODEC_JSON: u8 = 0;
const CODEC_SNAPPY: u8 = 1;

const SUBDIRS: [&str; 5] = ["databases", "tables", "chunks", "wal", "backups"];

pub struct ChunkedBackend {
    root: PathBuf,
    chunk_size: usize,
    compress: bool,
    durability: DurabilityLevel,
    /// Open append handles, one per database log
    wal_files: Mutex<AHashMap<String, WalFile>>,
    last_wal_id: AtomicU64,
}

impl ChunkedBackend {
    /// Open or initialise the store under `config.data_dir`.
    ///
    /// Fails with `BackendUnavailable` when the directory cannot be created
    /// or written.
    pub fn open(config: &StorageConfig) -> Result<Self> {
        config.validate()?;
        let root = config.data_dir.clone();
        let unavailable = |e: io::Error| DbError::BackendUnavailable(format!("{}: {}", root.display(), e));

        for sub in SUBDIRS {
            fs::create_dir_all(root.join(sub)).map_err(unavailable)?;
        }
        let probe = root.join(".probe");
        fs::write(&probe, b"ok").map_err(unavailable)?;
        fs::remove_file(&probe).map_err(unavailable)?;

        let backend = Self {
            root,
            chunk_size: config.chunk_size,
            compress: config.compress_chunks,
            durability: config.wal.durability_level,
            wal_files: Mutex::new(AHashMap::new()),
            last_wal_id: AtomicU64::new(0),
        };

        let last = backend.scan_last_wal_id()?;
        backend.last_wal_id.store(last, Ordering::SeqCst);

        tracing::debug!(
            root = %backend.root.display(),
            chunk_size = backend.chunk_size,
            compress = backend.compress,
            durability = backend.durability.description(),
            last_wal_id = last,
            "opened chunked store"
        );
        Ok(backend)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn database_path(&self, db: &str) -> PathBuf {
        self.root.join("databases").join(format!("{}.rec", encode_name(db)))
    }

    fn tables_dir(&self, db: &str) -> PathBuf {
        self.root.join("tables").join(encode_name(db))
    }

    fn table_path(&self, db: &str, table: &str) -> PathBuf {
        self.tables_dir(db).join(format!("{}.rec", encode_name(table)))
    }

    fn chunk_dir(&self, db: &str, table: &str) -> PathBuf {
        self.root.join("chunks").join(encode_name(db)).join(encode_name(table))
    }

    fn chunk_path(&self, db: &str, table: &str, index: u64) -> PathBuf {
        self.chunk_dir(db, table).join(format!("{}.chunk", index))
    }

    fn wal_path(&self, db: &str) -> PathBuf {
        self.root.join("wal").join(format!("{}.log", encode_name(db)))
    }

    fn backup_path(&self, name: &str) -> PathBuf {
        self.root.join("backups").join(format!("{}.json", encode_name(name)))
    }

    fn settings_path(&self) -> PathBuf {
        self.root.join("settings.json")
    }

    fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_atomic(path, bytes, self.durability)
    }

    fn write_record<T: Serialize>(&self, path: &Path, record: &T) -> Result<()> {
        let data = bincode::serialize(record)?;
        self.write_file(path, &Checksum::encode_with_checksum(&data))
    }

    fn read_record<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        let Some(bytes) = read_optional(path)? else {
            return Ok(None);
        };
        let data = decode_named(&bytes, &path.display().to_string())?;
        Ok(Some(bincode::deserialize(data)?))
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match read_optional(path)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| DbError::Corruption(format!("{}: {}", path.display(), e))),
            None => Ok(None),
        }
    }

    fn encode_chunk(&self, rows: &[Row]) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(rows)?;
        let mut payload = Vec::with_capacity(json.len() + 1);
        if self.compress {
            payload.push(CODEC_SNAPPY);
            payload.extend_from_slice(&snap::raw::Encoder::new().compress_vec(&json)?);
        } else {
            payload.push(CODEC_JSON);
            payload.extend_from_slice(&json);
        }
        Ok(Checksum::seal(&payload))
    }

    fn decode_chunk(bytes: &[u8], path: &Path) -> Result<Vec<Row>> {
        let what = path.display().to_string();
        let payload = unseal_named(bytes, &what)?;
        let Some((&codec, body)) = payload.split_first() else {
            return Err(DbError::Corruption(format!("{}: empty chunk payload", what)));
        };
        let rows = match codec {
            CODEC_JSON => serde_json::from_slice(body),
            CODEC_SNAPPY => serde_json::from_slice(&snap::raw::Decoder::new().decompress_vec(body)?),
            other => {
                return Err(DbError::Corruption(format!("{}: unknown chunk codec {}", what, other)));
            }
        };
        rows.map_err(|e| DbError::Corruption(format!("{}: {}", what, e)))
    }

    fn scan_last_wal_id(&self) -> Result<WalId> {
        let mut last = 0;
        for path in list_files(&self.root.join("wal"), "log")? {
            let scan = wal::read_log(&path)?;
            if let Some(max) = scan.entries.iter().map(|e| e.id).max() {
                last = last.max(max);
            }
        }
        Ok(last)
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Files in `dir` with the given extension; a missing directory has none
fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            files.push(path);
        }
    }
    Ok(files)
}

/// Decoded names of the files in `dir` with the given extension
fn list_names(dir: &Path, extension: &str) -> Result<Vec<String>> {
    Ok(list_files(dir, extension)?
        .iter()
        .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).and_then(decode_name))
        .collect())
}

fn dir_size(path: &Path) -> Result<u64> {
    let mut total = 0;
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if metadata.is_dir() {
            total += dir_size(&entry.path())?;
        } else {
            total += metadata.len();
        }
    }
    Ok(total)
}

impl StorageBackend for ChunkedBackend {
    fn name(&self) -> &'static str {
        "chunked"
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn load_database(&self, name: &str) -> Result<Option<DatabaseRecord>> {
        self.read_record(&self.database_path(name))
    }

    fn store_database(&self, record: &DatabaseRecord) -> Result<()> {
        self.write_record(&self.database_path(&record.name), record)
    }

    fn remove_database(&self, name: &str) -> Result<()> {
        remove_file_if_exists(&self.database_path(name))?;
        remove_dir_if_exists(&self.tables_dir(name))?;
        remove_dir_if_exists(&self.root.join("chunks").join(encode_name(name)))
    }

    fn database_names(&self) -> Result<Vec<String>> {
        list_names(&self.root.join("databases"), "rec")
    }

    fn load_table(&self, db: &str, table: &str) -> Result<Option<TableMeta>> {
        self.read_record(&self.table_path(db, table))
    }

    fn store_table(&self, meta: &TableMeta) -> Result<()> {
        self.write_record(&self.table_path(&meta.db_name, &meta.table_name), meta)
    }

    fn remove_table(&self, db: &str, table: &str) -> Result<()> {
        remove_file_if_exists(&self.table_path(db, table))?;
        // chunks past chunk_count left behind by an interrupted save
        remove_dir_if_exists(&self.chunk_dir(db, table))
    }

    fn table_names(&self, db: &str) -> Result<Vec<String>> {
        list_names(&self.tables_dir(db), "rec")
    }

    fn read_chunk(&self, db: &str, table: &str, index: u64) -> Result<Vec<Row>> {
        let path = self.chunk_path(db, table, index);
        match read_optional(&path)? {
            Some(bytes) => Self::decode_chunk(&bytes, &path),
            None => Ok(Vec::new()),
        }
    }

    fn write_chunk(&self, db: &str, table: &str, index: u64, rows: &[Row]) -> Result<()> {
        let bytes = self.encode_chunk(rows)?;
        self.write_file(&self.chunk_path(db, table, index), &bytes)
    }

    fn remove_chunk(&self, db: &str, table: &str, index: u64) -> Result<()> {
        remove_file_if_exists(&self.chunk_path(db, table, index))?;
        Ok(())
    }

    fn wal_append(&self, mut entry: WalEntry) -> Result<WalId> {
        let mut files = self.wal_files.lock();
        let id = self.last_wal_id.fetch_add(1, Ordering::SeqCst) + 1;
        entry.id = id;

        if !files.contains_key(&entry.db_name) {
            let file = WalFile::open(self.wal_path(&entry.db_name), self.durability)?;
            files.insert(entry.db_name.clone(), file);
        }
        if let Some(file) = files.get_mut(&entry.db_name) {
            file.append(&entry)?;
        }
        Ok(id)
    }

    fn wal_entries(&self, db: &str) -> Result<Vec<WalEntry>> {
        let _files = self.wal_files.lock();
        Ok(wal::read_log(&self.wal_path(db))?.entries)
    }

    fn wal_replace(&self, db: &str, entries: &[WalEntry]) -> Result<()> {
        let mut files = self.wal_files.lock();
        files.remove(db);
        let path = self.wal_path(db);
        if entries.is_empty() {
            remove_file_if_exists(&path)?;
            Ok(())
        } else {
            wal::rewrite_log(&path, entries, self.durability)
        }
    }

    fn store_backup(&self, backup: &Backup) -> Result<()> {
        let bytes = serde_json::to_vec(backup)?;
        self.write_file(&self.backup_path(&backup.name), &bytes)
    }

    fn load_backup(&self, name: &str) -> Result<Option<Backup>> {
        self.read_json(&self.backup_path(name))
    }

    fn backup_names(&self) -> Result<Vec<String>> {
        list_names(&self.root.join("backups"), "json")
    }

    fn remove_backup(&self, name: &str) -> Result<bool> {
        remove_file_if_exists(&self.backup_path(name))
    }

    fn load_settings(&self) -> Result<Settings> {
        Ok(self.read_json(&self.settings_path())?.unwrap_or_default())
    }

    fn store_settings(&self, settings: &Settings) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(settings)?;
        self.write_file(&self.settings_path(), &bytes)
    }

    fn usage(&self) -> Result<StorageUsage> {
        Ok(StorageUsage {
            size_bytes: dir_size(&self.root)?,
            quota_bytes: None,
        })
    }

    fn flush(&self) -> Result<()> {
        for file in self.wal_files.lock().values_mut() {
            file.sync()?;
        }
        Ok(())
    }
}

impl Drop for ChunkedBackend {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(root = %self.root.display(), error = %e, "failed to sync WAL on close");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txn::wal::WalOperation;
    use crate::types::{ColumnSchema, TableSchema};
    use serde_json::json;
    use tempfile::TempDir;

    fn open(dir: &TempDir, chunk_size: usize) -> ChunkedBackend {
        ChunkedBackend::open(&StorageConfig::for_testing(dir.path()).with_chunk_size(chunk_size)).unwrap()
    }

    fn rows(range: std::ops::Range<i64>) -> Vec<Row> {
        range
            .map(|i| json!({"id": i, "label": format!("row-{}", i)}).as_object().cloned().unwrap())
            .collect()
    }

    fn setup(backend: &ChunkedBackend) {
        backend.create_database("shop").unwrap();
        backend
            .create_table(
                "shop",
                "orders",
                TableSchema::new(vec![ColumnSchema::new("id", "INT"), ColumnSchema::new("label", "TEXT")]),
            )
            .unwrap();
    }

    #[test]
    fn test_layout_on_disk() {
        let dir = TempDir::new().unwrap();
        let backend = open(&dir, 4);
        setup(&backend);
        backend.insert_rows("shop", "orders", rows(0..6)).unwrap();

        assert!(dir.path().join("databases/shop.rec").is_file());
        assert!(dir.path().join("tables/shop/orders.rec").is_file());
        assert!(dir.path().join("chunks/shop/orders/0.chunk").is_file());
        assert!(dir.path().join("chunks/shop/orders/1.chunk").is_file());
        assert!(!dir.path().join("chunks/shop/orders/2.chunk").exists());
    }

    #[test]
    fn test_reopen_preserves_everything() {
        let dir = TempDir::new().unwrap();
        {
            let backend = open(&dir, 3);
            setup(&backend);
            backend.insert_rows("shop", "orders", rows(0..7)).unwrap();
            backend
                .wal_append(WalEntry::new("shop", WalOperation::Insert, "INSERT ...").with_table("orders"))
                .unwrap();
        }

        let backend = open(&dir, 3);
        assert_eq!(backend.list_databases().unwrap(), vec!["shop"]);
        assert_eq!(backend.get_rows("shop", "orders").unwrap(), rows(0..7));
        let meta = backend.get_table_meta("shop", "orders").unwrap();
        assert_eq!((meta.row_count, meta.chunk_count), (7, 3));

        // ids continue after the last logged one
        let id = backend
            .wal_append(WalEntry::new("shop", WalOperation::Delete, "DELETE ..."))
            .unwrap();
        assert_eq!(id, 2);
    }

    #[test]
    fn test_compressed_chunks() {
        let dir = TempDir::new().unwrap();
        let config = StorageConfig::for_testing(dir.path())
            .with_chunk_size(100)
            .with_compression(true);
        let backend = ChunkedBackend::open(&config).unwrap();
        setup(&backend);
        backend.insert_rows("shop", "orders", rows(0..100)).unwrap();

        let raw = fs::read(dir.path().join("chunks/shop/orders/0.chunk")).unwrap();
        assert_eq!(raw[4], CODEC_SNAPPY);
        assert_eq!(backend.get_rows("shop", "orders").unwrap(), rows(0..100));

        // a store opened without compression still reads compressed chunks
        drop(backend);
        let plain = open(&dir, 100);
        assert_eq!(plain.get_rows("shop", "orders").unwrap().len(), 100);
    }

    #[test]
    fn test_corrupted_chunk_is_reported() {
        let dir = TempDir::new().unwrap();
        let backend = open(&dir, 10);
        setup(&backend);
        backend.insert_rows("shop", "orders", rows(0..5)).unwrap();

        let path = dir.path().join("chunks/shop/orders/0.chunk");
        let mut raw = fs::read(&path).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x20;
        fs::write(&path, raw).unwrap();

        assert!(matches!(backend.get_rows("shop", "orders"), Err(DbError::Corruption(_))));
    }

    #[test]
    fn test_corrupted_record_is_reported() {
        let dir = TempDir::new().unwrap();
        let backend = open(&dir, 10);
        setup(&backend);

        let path = dir.path().join("tables/shop/orders.rec");
        let raw = fs::read(&path).unwrap();
        fs::write(&path, &raw[..raw.len() - 2]).unwrap();

        assert!(matches!(
            backend.get_table_meta("shop", "orders"),
            Err(DbError::Corruption(_))
        ));
    }

    #[test]
    fn test_delete_database_removes_directories() {
        let dir = TempDir::new().unwrap();
        let backend = open(&dir, 2);
        setup(&backend);
        backend.insert_rows("shop", "orders", rows(0..5)).unwrap();
        backend.delete_database("shop").unwrap();

        assert!(!dir.path().join("databases/shop.rec").exists());
        assert!(!dir.path().join("tables/shop").exists());
        assert!(!dir.path().join("chunks/shop").exists());
        assert!(backend.list_databases().unwrap().is_empty());
    }

    #[test]
    fn test_unavailable_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("occupied");
        fs::write(&file, b"x").unwrap();

        let result = ChunkedBackend::open(&StorageConfig::for_testing(&file));
        assert!(matches!(result, Err(DbError::BackendUnavailable(_))));
    }

    #[test]
    fn test_wal_truncate_rewrites_log() {
        let dir = TempDir::new().unwrap();
        let backend = open(&dir, 10);
        for (i, ts) in ["2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z", "2024-01-03T00:00:00Z"]
            .iter()
            .enumerate()
        {
            backend
                .wal_append(WalEntry::new("shop", WalOperation::Insert, format!("INSERT {}", i)).at(*ts))
                .unwrap();
        }

        assert_eq!(backend.truncate_wal("shop", "2024-01-02T00:00:00Z").unwrap(), 1);
        let left = backend.get_wal("shop", None).unwrap();
        assert_eq!(left.iter().map(|e| e.id).collect::<Vec<_>>(), vec![2, 3]);

        // appends after a rewrite land in the new file
        backend
            .wal_append(WalEntry::new("shop", WalOperation::Ddl, "DROP TABLE t").at("2024-01-04T00:00:00Z"))
            .unwrap();
        assert_eq!(backend.get_wal("shop", None).unwrap().len(), 3);
    }

    #[test]
    fn test_appends_after_a_torn_wal_tail_survive() {
        use std::io::Write;

        let dir = TempDir::new().unwrap();
        {
            let backend = open(&dir, 10);
            backend
                .wal_append(WalEntry::new("shop", WalOperation::Insert, "first").at("2024-01-01T00:00:00Z"))
                .unwrap();
        }

        // a crash left a header promising 200 bytes and only 5 of them
        let log = dir.path().join("wal").join("shop.log");
        let mut file = std::fs::OpenOptions::new().append(true).open(&log).unwrap();
        file.write_all(&200u32.to_le_bytes()).unwrap();
        file.write_all(&0u32.to_le_bytes()).unwrap();
        file.write_all(b"{\"id\"").unwrap();
        drop(file);

        let backend = open(&dir, 10);
        for sql in ["second", "third", "fourth"] {
            backend
                .wal_append(WalEntry::new("shop", WalOperation::Insert, sql).at("2024-01-02T00:00:00Z"))
                .unwrap();
        }
        let sqls: Vec<String> = backend.get_wal("shop", None).unwrap().into_iter().map(|e| e.sql).collect();
        assert_eq!(sqls, vec!["first", "second", "third", "fourth"]);

        drop(backend);
        let reopened = open(&dir, 10);
        assert_eq!(reopened.get_wal("shop", None).unwrap().len(), 4);
    }
}
