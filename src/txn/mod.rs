//! Write-ahead logging
//!
//! Transaction statements are parsed but not enforced by storage; what
//! remains of the transaction layer is the audit log of mutations.

pub mod wal;

pub use wal::{WalEntry, WalFile, WalId, WalOperation, WalScan};
