//! Storage layer implementation
//!
//! Databases hold tables, tables hold their rows in fixed-size chunks.
//! Two backends implement [`StorageBackend`]: a chunked directory store and
//! a flat key/value store used as a fallback and as the legacy format that
//! [`migration`] upgrades from. [`Storage`] is the facade callers hold.

mod backend;
pub mod checksum;
pub mod chunked;
mod facade;
pub mod flat;
pub mod kv;
pub mod migration;
mod records;

pub use backend::StorageBackend;
pub use checksum::{Checksum, ChecksumError};
pub use chunked::ChunkedBackend;
pub use facade::Storage;
pub use flat::FlatBackend;
pub use kv::{FileKv, KeyValueStore, MemoryKv};
pub use migration::MigrationReport;
pub use records::{
    Backup, DatabaseExport, DatabaseRecord, FullExport, Settings, StorageInfo, StorageUsage, TableExport,
    TableMeta, EXPORT_VERSION,
};

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::config::DurabilityLevel;
use crate::error::Result;

/// Write `bytes` to `path` through a sibling temporary file and a rename, so
/// readers see either the old or the new content
pub(crate) fn write_atomic(path: &Path, bytes: &[u8], durability: DurabilityLevel) -> Result<()> {
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        if !durability.is_no_sync() {
            file.sync_data()?;
        }
    }
    fs::rename(&tmp, path)?;

    // Persist the directory entry of the rename; directories cannot be
    // opened for syncing outside unix
    #[cfg(unix)]
    {
        if durability.requires_immediate_sync() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                File::open(parent)?.sync_all()?;
            }
        }
    }
    Ok(())
}

/// Percent-encode a database or table name so it is safe as a file name or
/// as one segment of a `:`-separated key
pub fn encode_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Inverse of [`encode_name`]; `None` for malformed escapes
pub fn decode_name(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_encoding() {
        assert_eq!(encode_name("orders_2024"), "orders_2024");
        assert_eq!(encode_name("a.b/c:d"), "a%2Eb%2Fc%3Ad");
        assert_eq!(encode_name("..").len(), 6);

        for name in ["plain", "with space", "ünïcode", "a%b", "x:y:z"] {
            assert_eq!(decode_name(&encode_name(name)).as_deref(), Some(name));
        }
        assert_eq!(decode_name("%G1"), None);
        assert_eq!(decode_name("%4"), None);
    }

    #[test]
    fn test_write_atomic_replaces() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        write_atomic(&path, b"{}", DurabilityLevel::Synchronous).unwrap();
        write_atomic(&path, b"{\"migrated\":true}", DurabilityLevel::NoSync).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"{\"migrated\":true}");
        assert!(!dir.path().join("settings.json.tmp").exists());
    }

    #[test]
    fn test_write_atomic_reports_io_failures() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("missing").join("settings.json");
        let err = write_atomic(&path, b"{}", DurabilityLevel::Synchronous).unwrap_err();
        assert!(matches!(err, crate::DbError::Io(_)));
    }
}
