//! String key/value stores behind the flat backend
//!
//! The flat layout mirrors what a browser's local storage can hold: string
//! keys, string values and a byte quota.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::DurabilityLevel;
use crate::error::{DbError, Result};

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Fails with `QuotaExceeded` when the store would grow past its quota
    fn set(&self, key: &str, value: String) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    /// Keys starting with `prefix`, sorted
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Bytes held, counting keys and values
    fn used_bytes(&self) -> u64;

    fn quota_bytes(&self) -> Option<u64>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone, Default)]
struct Entries {
    map: BTreeMap<String, String>,
    used: u64,
}

impl Entries {
    fn entry_size(key: &str, value: &str) -> u64 {
        (key.len() + value.len()) as u64
    }

    /// Size after replacing `key` with `value`
    fn projected(&self, key: &str, value: &str) -> u64 {
        let old = self.map.get(key).map_or(0, |v| Self::entry_size(key, v));
        self.used - old + Self::entry_size(key, value)
    }

    fn insert(&mut self, key: &str, value: String) {
        self.used = self.projected(key, &value);
        self.map.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.map.remove(key) {
            Some(old) => {
                self.used -= Self::entry_size(key, &old);
                true
            }
            None => false,
        }
    }

    fn check_quota(&self, key: &str, value: &str, quota: Option<u64>) -> Result<()> {
        if let Some(quota) = quota {
            let used = self.projected(key, value);
            if used > quota {
                return Err(DbError::QuotaExceeded { used, quota });
            }
        }
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.map
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }
}

/// In-process store
pub struct MemoryKv {
    entries: RwLock<Entries>,
    quota: Option<u64>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::with_quota(None)
    }

    pub fn with_quota(quota: Option<u64>) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            quota,
        }
    }
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().map.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        let mut entries = self.entries.write();
        entries.check_quota(key, &value, self.quota)?;
        entries.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self.entries.read().keys_with_prefix(prefix))
    }

    fn used_bytes(&self) -> u64 {
        self.entries.read().used
    }

    fn quota_bytes(&self) -> Option<u64> {
        self.quota
    }
}

/// Store persisted as one JSON object file, rewritten atomically on every
/// change
pub struct FileKv {
    path: PathBuf,
    entries: RwLock<Entries>,
    quota: Option<u64>,
    durability: DurabilityLevel,
}

impl FileKv {
    pub fn open(path: impl Into<PathBuf>, quota: Option<u64>, durability: DurabilityLevel) -> Result<Self> {
        let path = path.into();
        let mut entries = Entries::default();

        match std::fs::read(&path) {
            Ok(bytes) if !bytes.is_empty() => {
                let map: BTreeMap<String, String> = serde_json::from_slice(&bytes).map_err(|e| {
                    DbError::Corruption(format!("{}: {}", path.display(), e))
                })?;
                for (key, value) in map {
                    entries.insert(&key, value);
                }
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Err(e) => return Err(e.into()),
        }

        tracing::debug!(path = %path.display(), keys = entries.map.len(), bytes = entries.used, "opened flat store");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
            quota,
            durability,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &Entries) -> Result<()> {
        let bytes = serde_json::to_vec(&entries.map)?;
        super::write_atomic(&self.path, &bytes, self.durability)
    }
}

impl KeyValueStore for FileKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().map.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        let mut entries = self.entries.write();
        entries.check_quota(key, &value, self.quota)?;
        // memory only changes once the file does
        let mut next = entries.clone();
        next.insert(key, value);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write();
        if !entries.map.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self.entries.read().keys_with_prefix(prefix))
    }

    fn used_bytes(&self) -> u64 {
        self.entries.read().used
    }

    fn quota_bytes(&self) -> Option<u64> {
        self.quota
    }

    fn flush(&self) -> Result<()> {
        let entries = self.entries.read();
        self.persist(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_kv_basic() {
        let kv = MemoryKv::new();
        kv.set("a:1", "x".to_string()).unwrap();
        kv.set("a:2", "yy".to_string()).unwrap();
        kv.set("b:1", "z".to_string()).unwrap();

        assert_eq!(kv.get("a:2").unwrap().as_deref(), Some("yy"));
        assert_eq!(kv.keys_with_prefix("a:").unwrap(), vec!["a:1", "a:2"]);
        assert_eq!(kv.used_bytes(), 4 + 5 + 4);

        kv.set("a:2", "y".to_string()).unwrap();
        assert_eq!(kv.used_bytes(), 4 + 4 + 4);

        kv.remove("a:1").unwrap();
        kv.remove("missing").unwrap();
        assert_eq!(kv.get("a:1").unwrap(), None);
        assert_eq!(kv.used_bytes(), 8);
    }

    #[test]
    fn test_quota_exceeded_leaves_store_unchanged() {
        let kv = MemoryKv::with_quota(Some(10));
        kv.set("k", "12345".to_string()).unwrap();

        let err = kv.set("k2", "123456".to_string()).unwrap_err();
        assert!(matches!(err, DbError::QuotaExceeded { used: 14, quota: 10 }));
        assert_eq!(kv.get("k2").unwrap(), None);
        assert_eq!(kv.used_bytes(), 6);

        // shrinking an existing value always fits
        kv.set("k", "1".to_string()).unwrap();
        assert_eq!(kv.used_bytes(), 2);
    }

    #[test]
    fn test_file_kv_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("flat.json");

        {
            let kv = FileKv::open(&path, None, DurabilityLevel::NoSync).unwrap();
            kv.set("chunkdb:databases", "[]".to_string()).unwrap();
            kv.set("chunkdb:wal_seq", "3".to_string()).unwrap();
            kv.remove("chunkdb:wal_seq").unwrap();
        }

        let kv = FileKv::open(&path, Some(1024), DurabilityLevel::NoSync).unwrap();
        assert_eq!(kv.get("chunkdb:databases").unwrap().as_deref(), Some("[]"));
        assert_eq!(kv.get("chunkdb:wal_seq").unwrap(), None);
        assert_eq!(kv.quota_bytes(), Some(1024));
        assert_eq!(kv.path(), path.as_path());
    }

    #[test]
    fn test_file_kv_failed_write_keeps_memory_in_step() {
        let dir = TempDir::new().unwrap();
        let parent = dir.path().join("nested");
        let kv = FileKv::open(parent.join("flat.json"), None, DurabilityLevel::NoSync).unwrap();
        kv.set("kept", "1".to_string()).unwrap();
        let used = kv.used_bytes();

        std::fs::remove_dir_all(&parent).unwrap();

        assert!(matches!(kv.set("lost", "2".to_string()), Err(DbError::Io(_))));
        assert_eq!(kv.get("lost").unwrap(), None);
        assert!(matches!(kv.remove("kept"), Err(DbError::Io(_))));
        assert_eq!(kv.get("kept").unwrap().as_deref(), Some("1"));
        assert_eq!(kv.used_bytes(), used);
    }

    #[test]
    fn test_file_kv_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flat.json");
        std::fs::write(&path, b"not json").unwrap();
        assert!(matches!(
            FileKv::open(&path, None, DurabilityLevel::NoSync),
            Err(DbError::Corruption(_))
        ));
    }
}
