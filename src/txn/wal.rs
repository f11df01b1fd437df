//! Write-Ahead Log
//!
//! An append-only record of mutating operations, kept per database for
//! audit and replay. It is not consulted on the read path.
//!
//! ## Checksum Protection
//! - Every record is framed as `[len: u32][crc: u32][json]`
//! - Records failing their checksum are skipped and counted
//! - A partial write at the end of the file is detected and skipped

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::DurabilityLevel;
use crate::error::Result;
use crate::storage::checksum::Checksum;

/// Log sequence number, assigned by the backend on append
pub type WalId = u64;

/// Kind of mutation a WAL entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WalOperation {
    Insert,
    Update,
    Delete,
    Ddl,
}

impl WalOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalOperation::Insert => "INSERT",
            WalOperation::Update => "UPDATE",
            WalOperation::Delete => "DELETE",
            WalOperation::Ddl => "DDL",
        }
    }
}

/// One logged operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Zero until the backend assigns one
    #[serde(default)]
    pub id: WalId,
    pub db_name: String,
    /// RFC 3339 timestamp; defines the order of the log
    pub timestamp: String,
    pub operation: WalOperation,
    #[serde(default)]
    pub table_name: Option<String>,
    pub sql: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl WalEntry {
    /// New entry stamped with the current time
    pub fn new(db_name: impl Into<String>, operation: WalOperation, sql: impl Into<String>) -> Self {
        Self {
            id: 0,
            db_name: db_name.into(),
            timestamp: now_timestamp(),
            operation,
            table_name: None,
            sql: sql.into(),
            data: None,
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table_name = Some(table.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Override the timestamp (replays and tests)
    pub fn at(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    pub fn is_after(&self, since: &str) -> bool {
        compare_timestamps(&self.timestamp, since) == Ordering::Greater
    }

    pub fn is_before(&self, cutoff: &str) -> bool {
        compare_timestamps(&self.timestamp, cutoff) == Ordering::Less
    }
}

/// Current time with fixed microsecond precision so that timestamps written
/// by this process also sort as plain strings
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Chronological comparison of two RFC 3339 timestamps. Anything that does
/// not parse is compared as text.
pub fn compare_timestamps(a: &str, b: &str) -> Ordering {
    match (parse_timestamp(a), parse_timestamp(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s).ok()
}

/// Sort by timestamp, then id for entries stamped in the same instant
pub fn sort_entries(entries: &mut [WalEntry]) {
    entries.sort_by(|a, b| compare_timestamps(&a.timestamp, &b.timestamp).then(a.id.cmp(&b.id)));
}

/// Outcome of scanning a log file
#[derive(Debug, Default)]
pub struct WalScan {
    pub entries: Vec<WalEntry>,
    pub corrupted: usize,
    pub partial_tail: bool,
    /// Byte length of the fully framed prefix; a torn tail starts here
    pub valid_len: usize,
}

/// Encode one entry as a framed record
pub fn encode_record(entry: &WalEntry) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(entry)?;
    let mut record = Vec::with_capacity(8 + body.len());
    record.extend_from_slice(&(body.len() as u32).to_le_bytes());
    record.extend_from_slice(&Checksum::compute(&body).to_le_bytes());
    record.extend_from_slice(&body);
    Ok(record)
}

/// Read every intact record of a log file. A missing file is an empty log.
pub fn read_log(path: &Path) -> Result<WalScan> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(WalScan::default()),
        Err(e) => return Err(e.into()),
    };
    let scan = decode_records(&bytes, &path.display().to_string());

    if scan.partial_tail {
        tracing::warn!(path = %path.display(), "detected partial write at end of WAL, skipping incomplete record");
    }
    if scan.corrupted > 0 {
        tracing::warn!(path = %path.display(), count = scan.corrupted, "skipped corrupted WAL records");
    }
    Ok(scan)
}

/// Decode a buffer of framed records. Stops at the first record that runs
/// past the end of the buffer.
pub fn decode_records(bytes: &[u8], source: &str) -> WalScan {
    let mut scan = WalScan::default();
    let mut pos = 0;

    while pos < bytes.len() {
        scan.valid_len = pos;
        if bytes.len() - pos < 8 {
            scan.partial_tail = true;
            break;
        }
        let header = &bytes[pos..pos + 8];
        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let checksum = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        pos += 8;

        if bytes.len() - pos < len {
            scan.partial_tail = true;
            break;
        }
        let body = &bytes[pos..pos + len];
        pos += len;

        if let Err(e) = Checksum::verify(body, checksum) {
            tracing::warn!(source, error = %e, "skipping corrupted WAL record");
            scan.corrupted += 1;
            continue;
        }

        match serde_json::from_slice::<WalEntry>(body) {
            Ok(entry) => scan.entries.push(entry),
            Err(e) => {
                tracing::warn!(source, error = %e, "skipping undecodable WAL record");
                scan.corrupted += 1;
            }
        }
    }
    if !scan.partial_tail {
        scan.valid_len = bytes.len();
    }

    scan
}

/// Append handle on one database's log file
pub struct WalFile {
    path: PathBuf,
    file: File,
    durability: DurabilityLevel,
}

impl WalFile {
    /// Open for appending. A torn record left by a crash is cut off first,
    /// otherwise new records would be read as part of it.
    pub fn open(path: impl Into<PathBuf>, durability: DurabilityLevel) -> Result<Self> {
        let path = path.into();
        let scan = read_log(&path)?;
        if scan.partial_tail {
            let file = OpenOptions::new().write(true).open(&path)?;
            file.set_len(scan.valid_len as u64)?;
            file.sync_all()?;
            tracing::warn!(path = %path.display(), valid_len = scan.valid_len, "truncated torn WAL tail");
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file,
            durability,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, entry: &WalEntry) -> Result<()> {
        let record = encode_record(entry)?;
        // single write so a crash leaves at most one torn record
        self.file.write_all(&record)?;
        if self.durability.requires_immediate_sync() {
            self.file.sync_data()?;
        }
        Ok(())
    }

    pub fn sync(&mut self) -> Result<()> {
        if !self.durability.is_no_sync() {
            self.file.sync_data()?;
        }
        Ok(())
    }
}

/// Replace the whole log with `entries`, via a temporary file and rename
pub fn rewrite_log(path: &Path, entries: &[WalEntry], durability: DurabilityLevel) -> Result<()> {
    let mut buffer = Vec::new();
    for entry in entries {
        buffer.extend_from_slice(&encode_record(entry)?);
    }
    crate::storage::write_atomic(path, &buffer, durability)
}
