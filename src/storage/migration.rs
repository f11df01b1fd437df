//! Upgrade from the flat (legacy) layout to another backend
//!
//! Migration copies databases, tables, rows and the WAL, then records a
//! `migrated` flag in the target's settings. Once the flag is set further
//! calls do nothing.

use ahash::AHashSet;

use crate::error::Result;
use crate::txn::wal::now_timestamp;

use super::backend::StorageBackend;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// The target was already migrated; nothing was copied
    pub skipped: bool,
    pub databases: usize,
    pub tables: usize,
    pub rows: usize,
    pub wal_entries: usize,
}

/// Copy everything from `source` into `target` unless `target` says it has
/// already been migrated.
///
/// Tables are imported whole, so a run interrupted before the flag is
/// written can simply be repeated. WAL entries already present in the
/// target (same timestamp and statement) are not copied twice.
pub fn migrate(source: &dyn StorageBackend, target: &dyn StorageBackend) -> Result<MigrationReport> {
    let mut settings = target.load_settings()?;
    if settings.migrated {
        tracing::debug!(target_backend = target.name(), "already migrated, skipping");
        return Ok(MigrationReport {
            skipped: true,
            ..Default::default()
        });
    }

    tracing::info!(
        source_backend = source.name(),
        target_backend = target.name(),
        "migrating flat store"
    );

    let mut report = MigrationReport::default();
    for db in source.list_databases()? {
        if !target.database_exists(&db)? {
            target.create_database(&db)?;
        }
        report.databases += 1;

        for table in source.list_tables(&db)? {
            let export = source.export_table(&db, &table)?;
            report.rows += export.rows.len();
            target.import_table(&db, &table, &export)?;
            report.tables += 1;
        }

        report.wal_entries += copy_wal(source, target, &db)?;
    }

    settings.migrated = true;
    settings.migrated_at = Some(now_timestamp());
    target.store_settings(&settings)?;
    target.flush()?;

    tracing::info!(
        databases = report.databases,
        tables = report.tables,
        rows = report.rows,
        wal_entries = report.wal_entries,
        "migration complete"
    );
    Ok(report)
}

fn copy_wal(source: &dyn StorageBackend, target: &dyn StorageBackend, db: &str) -> Result<usize> {
    let existing: AHashSet<(String, String)> = target
        .wal_entries(db)?
        .into_iter()
        .map(|e| (e.timestamp, e.sql))
        .collect();

    let mut copied = 0;
    for entry in source.get_wal(db, None)? {
        if existing.contains(&(entry.timestamp.clone(), entry.sql.clone())) {
            continue;
        }
        target.wal_append(entry)?;
        copied += 1;
    }
    Ok(copied)
}
