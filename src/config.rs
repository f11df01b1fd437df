//! Storage configuration and durability levels
//!
//! Provides options for balancing write performance against crash safety,
//! and for choosing which storage backend the facade opens.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DbError, Result};

/// Rows per chunk file
pub const CHUNK_SIZE: usize = 10_000;

/// Default quota of the flat backend, roughly what a browser grants local storage
pub const DEFAULT_FLAT_QUOTA: u64 = 5 * 1024 * 1024;

/// Durability Level
///
/// Trade-off between data safety and write throughput:
/// - Synchronous: fsync after every write
/// - Buffered: writes reach the OS, fsync on flush / close
/// - NoSync: nothing is synced, for tests and benchmarks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DurabilityLevel {
    /// fsync every chunk, record and WAL append (safest, slowest)
    ///
    /// Equivalent to:
    /// - MySQL: innodb_flush_log_at_trx_commit = 1
    /// - PostgreSQL: synchronous_commit = on
    Synchronous,

    /// Writes are handed to the OS and synced on explicit flush
    ///
    /// A crash of the process loses nothing; a crash of the machine may lose
    /// the writes since the last flush.
    #[default]
    Buffered,

    /// Never sync. Only for tests and benchmarks.
    NoSync,
}

impl DurabilityLevel {
    /// Whether every write must be followed by fsync
    pub fn requires_immediate_sync(&self) -> bool {
        matches!(self, Self::Synchronous)
    }

    pub fn is_no_sync(&self) -> bool {
        matches!(self, Self::NoSync)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Synchronous => "synchronous (safest)",
            Self::Buffered => "buffered (default)",
            Self::NoSync => "no sync (testing only)",
        }
    }
}

/// WAL configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WALConfig {
    /// When disabled, appends are accepted and dropped (id 0)
    pub enabled: bool,

    pub durability_level: DurabilityLevel,
}

impl Default for WALConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            durability_level: DurabilityLevel::default(),
        }
    }
}

impl WALConfig {
    /// Safest: every append is synced
    pub fn synchronous() -> Self {
        Self {
            durability_level: DurabilityLevel::Synchronous,
            ..Default::default()
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Fastest
    pub fn for_testing() -> Self {
        Self {
            durability_level: DurabilityLevel::NoSync,
            ..Default::default()
        }
    }
}

/// Which backend the storage facade opens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BackendPreference {
    /// Chunked directory store, falling back to the flat store when the
    /// directory cannot be used
    #[default]
    Auto,
    Chunked,
    /// Single-file key/value store
    Flat,
    /// Flat store kept in memory only
    Memory,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory of the chunked backend
    pub data_dir: PathBuf,

    pub backend: BackendPreference,

    /// Rows per chunk; tests lower it to exercise chunk boundaries
    pub chunk_size: usize,

    /// Snappy-compress chunk payloads
    pub compress_chunks: bool,

    /// Backing file of the flat backend; `None` keeps it in memory
    pub flat_file: Option<PathBuf>,

    /// Byte quota of the flat backend; `None` is unlimited
    pub flat_quota_bytes: Option<u64>,

    pub wal: WALConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("chunkdb_data"),
            backend: BackendPreference::Auto,
            chunk_size: CHUNK_SIZE,
            compress_chunks: false,
            flat_file: None,
            flat_quota_bytes: Some(DEFAULT_FLAT_QUOTA),
            wal: WALConfig::default(),
        }
    }
}

impl StorageConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Chunked store under `data_dir` with no fsync
    pub fn for_testing(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            backend: BackendPreference::Chunked,
            wal: WALConfig::for_testing(),
            ..Default::default()
        }
    }

    /// Flat store that never touches the disk
    pub fn in_memory() -> Self {
        Self {
            backend: BackendPreference::Memory,
            flat_quota_bytes: None,
            wal: WALConfig::for_testing(),
            ..Default::default()
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress_chunks = enabled;
        self
    }

    pub fn with_backend(mut self, backend: BackendPreference) -> Self {
        self.backend = backend;
        self
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: StorageConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(DbError::InvalidArgument("chunk_size must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.chunk_size, 10_000);
        assert_eq!(config.backend, BackendPreference::Auto);
        assert!(config.wal.enabled);
        assert_eq!(config.wal.durability_level, DurabilityLevel::Buffered);
        assert!(!config.wal.durability_level.requires_immediate_sync());
    }

    #[test]
    fn test_presets() {
        let testing = StorageConfig::for_testing("/tmp/x");
        assert_eq!(testing.backend, BackendPreference::Chunked);
        assert!(testing.wal.durability_level.is_no_sync());

        let memory = StorageConfig::in_memory();
        assert_eq!(memory.backend, BackendPreference::Memory);
        assert_eq!(memory.flat_quota_bytes, None);

        assert!(!WALConfig::disabled().enabled);
        assert!(WALConfig::synchronous().durability_level.requires_immediate_sync());
    }

    #[test]
    fn test_from_json_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"data_dir": "/var/lib/chunkdb", "chunk_size": 500, "wal": {{"enabled": false}}}}"#).unwrap();

        let config = StorageConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/chunkdb"));
        assert_eq!(config.chunk_size, 500);
        assert!(!config.wal.enabled);
        assert_eq!(config.wal.durability_level, DurabilityLevel::Buffered);
        assert!(!config.compress_chunks);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"chunk_size": 0}}"#).unwrap();
        assert!(matches!(
            StorageConfig::from_json_file(file.path()),
            Err(DbError::InvalidArgument(_))
        ));
    }
}
