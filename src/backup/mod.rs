//! Backup & retention
//!
//! Snapshots the whole store into a timestamped file in one directory and
//! keeps only the newest `keep` snapshots. Two snapshot strategies:
//! - `Copy`: page-level copy through SQLite's online backup API (`.db`)
//! - `Dump`: self-contained SQL script (`.sql`)
//!
//! Both run while holding the store's statement lock, so a snapshot never
//! observes a half-applied write.

pub mod dump;
pub mod naming;

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use chrono::Utc;
use rusqlite::{Connection, DatabaseName};
use serde::{Deserialize, Serialize};
use crate::config::BackupConfig;
use crate::storage::SqliteStore;
use crate::{Error, Result};

pub const DEFAULT_PREFIX: &str = "crm_backup";
pub const DEFAULT_KEEP: usize = 5;

/// Every extension a backup file may carry
const BACKUP_EXTENSIONS: &[&str] = &["db", "sql"];

/// How a snapshot is produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupStrategy {
    #[default]
    Copy,
    Dump,
}

impl BackupStrategy {
    pub fn extension(&self) -> &'static str {
        match self {
            BackupStrategy::Copy => "db",
            BackupStrategy::Dump => "sql",
        }
    }

    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("sql") => BackupStrategy::Dump,
            _ => BackupStrategy::Copy,
        }
    }
}

impl std::str::FromStr for BackupStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "copy" | "physical" | "file" => Ok(BackupStrategy::Copy),
            "dump" | "logical" | "sql" => Ok(BackupStrategy::Dump),
            _ => Err(Error::InvalidRequest(format!("Unknown backup strategy: {}", s))),
        }
    }
}

/// Outcome of a retention pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PruneReport {
    pub kept: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    /// Stale files that could not be deleted (logged, not fatal)
    pub failed: Vec<PathBuf>,
}

/// Creates snapshots and enforces the retention window
#[derive(Debug, Clone)]
pub struct BackupManager {
    directory: PathBuf,
    prefix: String,
    keep: usize,
    strategy: BackupStrategy,
}

impl BackupManager {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            prefix: DEFAULT_PREFIX.to_string(),
            keep: DEFAULT_KEEP,
            strategy: BackupStrategy::default(),
        }
    }

    /// Build from configuration; a relative directory is resolved against `base`
    pub fn from_config(config: &BackupConfig, base: &Path) -> Self {
        let directory = if config.directory.is_absolute() {
            config.directory.clone()
        } else {
            base.join(&config.directory)
        };
        Self {
            directory,
            prefix: config.prefix.clone(),
            keep: config.keep_count,
            strategy: config.strategy,
        }
    }

    pub fn with_keep(mut self, keep: usize) -> Self {
        self.keep = keep;
        self
    }

    pub fn with_strategy(mut self, strategy: BackupStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn keep(&self) -> usize {
        self.keep
    }

    pub fn strategy(&self) -> BackupStrategy {
        self.strategy
    }

    /// Snapshot the store, then prune down to the retention count.
    ///
    /// Returns the snapshot path. On failure no snapshot or partial file is
    /// left behind. Retention problems are logged and never fail the backup.
    pub fn create_backup(&self, store: &SqliteStore) -> Result<PathBuf> {
        fs::create_dir_all(&self.directory)?;
        let path = self.next_backup_path();
        let strategy = self.strategy;

        write_atomically(&path, |partial| {
            store.with_conn(|conn| match strategy {
                BackupStrategy::Copy => {
                    conn.backup(DatabaseName::Main, partial, None)?;
                    Ok(())
                }
                BackupStrategy::Dump => {
                    let file = fs::File::create(partial)?;
                    let mut out = BufWriter::new(file);
                    dump::write_dump(conn, &mut out)?;
                    out.flush()?;
                    out.get_ref().sync_all()?;
                    Ok(())
                }
            })
        })?;
        tracing::info!("Backup created at {}", path.display());

        // The snapshot just written always survives its own retention pass
        if let Err(e) = self.prune_old_backups(self.keep.max(1)) {
            tracing::warn!("Backup retention pass failed: {}", e);
        }
        Ok(path)
    }

    /// Keep the newest `keep` backups and delete the rest.
    ///
    /// A file that cannot be deleted is logged and reported in
    /// `PruneReport::failed`; it does not stop the remaining deletions.
    pub fn prune_old_backups(&self, keep: usize) -> Result<PruneReport> {
        self.prune_with(keep, |path| fs::remove_file(path))
    }

    fn prune_with(
        &self,
        keep: usize,
        mut remove: impl FnMut(&Path) -> std::io::Result<()>,
    ) -> Result<PruneReport> {
        let backups = self.list_backups()?;
        let mut report = PruneReport::default();

        for (idx, path) in backups.into_iter().enumerate() {
            if idx < keep {
                report.kept.push(path);
                continue;
            }
            match remove(&path) {
                Ok(()) => {
                    tracing::debug!("Removed old backup {}", path.display());
                    report.removed.push(path);
                }
                Err(e) => {
                    tracing::warn!("Failed to remove old backup {}: {}", path.display(), e);
                    report.failed.push(path);
                }
            }
        }
        Ok(report)
    }

    /// Backup files in the directory, newest first
    pub fn list_backups(&self) -> Result<Vec<PathBuf>> {
        if !self.directory.exists() {
            return Ok(Vec::new());
        }
        let dir = self
            .directory
            .to_str()
            .ok_or_else(|| Error::InvalidRequest(format!("non UTF-8 backup directory: {}", self.directory.display())))?;
        let pattern = format!(
            "{}/{}_*",
            glob::Pattern::escape(dir),
            glob::Pattern::escape(&self.prefix)
        );
        let entries = glob::glob(&pattern).map_err(|e| Error::InvalidRequest(e.to_string()))?;

        let mut backups: Vec<(String, PathBuf)> = Vec::new();
        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!("Skipping unreadable backup entry: {}", e);
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            let timestamp = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| naming::parse_backup_name(&self.prefix, n, BACKUP_EXTENSIONS))
                .map(str::to_string);
            if let Some(timestamp) = timestamp {
                backups.push((timestamp, path));
            }
        }

        backups.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        Ok(backups.into_iter().map(|(_, path)| path).collect())
    }

    /// Pick a fresh file name, nudging the timestamp forward on collision so
    /// names stay unique and in creation order
    fn next_backup_path(&self) -> PathBuf {
        let mut at = Utc::now();
        loop {
            let timestamp = naming::sanitized_timestamp(at);
            let taken = BACKUP_EXTENSIONS.iter().any(|ext| {
                self.directory
                    .join(naming::backup_file_name(&self.prefix, &timestamp, ext))
                    .exists()
            });
            if !taken {
                let name = naming::backup_file_name(&self.prefix, &timestamp, self.strategy.extension());
                return self.directory.join(name);
            }
            at += chrono::Duration::microseconds(1);
        }
    }
}

/// Reconstruct a standalone database at `target` from a snapshot and open it.
///
/// The strategy is taken from the snapshot's extension. An existing `target`
/// is never overwritten.
pub fn restore_backup(snapshot: &Path, target: &Path) -> Result<SqliteStore> {
    if !snapshot.is_file() {
        return Err(Error::NotFound(format!("backup {}", snapshot.display())));
    }
    if target.exists() {
        return Err(Error::InvalidRequest(format!(
            "restore target already exists: {}",
            target.display()
        )));
    }
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let rebuilt = (|| -> Result<()> {
        let mut conn = Connection::open(target)?;
        match BackupStrategy::for_path(snapshot) {
            BackupStrategy::Copy => {
                conn.restore(DatabaseName::Main, snapshot, None::<fn(rusqlite::backup::Progress)>)?;
            }
            BackupStrategy::Dump => {
                let script = fs::read_to_string(snapshot)?;
                conn.execute_batch(&script)?;
            }
        }
        conn.close().map_err(|(_, e)| Error::from(e))
    })();

    if let Err(e) = rebuilt {
        remove_quietly(target);
        return Err(e);
    }
    tracing::info!("Restored {} into {}", snapshot.display(), target.display());
    SqliteStore::open(target)
}

/// Run `write` against `<path>.partial` and move the result into place only on
/// success. The partial file is removed on any failure.
fn write_atomically(path: &Path, write: impl FnOnce(&Path) -> Result<()>) -> Result<()> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    let result = write(&partial).and_then(|()| fs::rename(&partial, path).map_err(Error::from));
    if let Err(e) = result {
        remove_quietly(&partial);
        return Err(e);
    }
    Ok(())
}

fn remove_quietly(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewContact, NewProfile};

    fn seeded_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store
            .insert_profile(&NewProfile::new("Sean", "O'Brien", "Lead").with_company("O'Brien & Sons"))
            .unwrap();
        store
            .insert_contact(&NewContact::new(id, "2025-01-01", "Call", "Said 'hi'").with_value(12.5))
            .unwrap();
        store
    }

    #[test]
    fn test_failed_write_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("crm_backup_x.db");

        let result = write_atomically(&target, |partial| {
            fs::write(partial, b"half a snapshot")?;
            Err(Error::StorageIo("disk full".into()))
        });

        assert!(result.is_err());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_closed_store_backup_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store();
        store.close().unwrap();

        let manager = BackupManager::new(dir.path());
        assert!(matches!(manager.create_backup(&store), Err(Error::StoreClosed)));
        assert!(manager.list_backups().unwrap().is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_dump_backup_restores() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store();
        let manager = BackupManager::new(dir.path().join("backups")).with_strategy(BackupStrategy::Dump);

        let snapshot = manager.create_backup(&store).unwrap();
        assert_eq!(snapshot.extension().and_then(|e| e.to_str()), Some("sql"));

        let restored = restore_backup(&snapshot, &dir.path().join("restored.db")).unwrap();
        let profiles = restored.list_profiles().unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].last_name, "O'Brien");
        assert_eq!(profiles[0].company, "O'Brien & Sons");
        assert_eq!(restored.contacts_for_profile(profiles[0].id, Default::default()).unwrap()[0].details, "Said 'hi'");
    }

    #[test]
    fn test_restore_refuses_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store();
        let manager = BackupManager::new(dir.path());
        let snapshot = manager.create_backup(&store).unwrap();

        let target = dir.path().join("taken.db");
        fs::write(&target, b"keep me").unwrap();
        assert!(restore_backup(&snapshot, &target).is_err());
        assert_eq!(fs::read(&target).unwrap(), b"keep me");

        let missing = restore_backup(&dir.path().join("nope.db"), &dir.path().join("x.db"));
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_prune_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("crm.db"), b"live").unwrap();
        fs::write(dir.path().join("crm_backup_notes.txt"), b"x").unwrap();
        fs::write(dir.path().join("crm_backup_2020-01-01T00-00-00-000000Z.db"), b"old").unwrap();

        let report = BackupManager::new(dir.path()).prune_old_backups(0).unwrap();
        assert_eq!(report.removed.len(), 1);
        assert!(dir.path().join("crm.db").exists());
        assert!(dir.path().join("crm_backup_notes.txt").exists());
    }

    #[test]
    fn test_keep_zero_still_keeps_new_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store();
        let manager = BackupManager::new(dir.path()).with_keep(0);

        let first = manager.create_backup(&store).unwrap();
        assert!(first.is_file());
        let second = manager.create_backup(&store).unwrap();
        assert!(second.is_file());
        assert!(!first.exists());
        assert_eq!(manager.list_backups().unwrap(), vec![second]);
    }

    #[test]
    fn test_prune_continues_past_failed_removal() {
        let dir = tempfile::tempdir().unwrap();
        let names = [
            "crm_backup_2020-01-05T00-00-00-000000Z.db",
            "crm_backup_2020-01-04T00-00-00-000000Z.db",
            "crm_backup_2020-01-03T00-00-00-000000Z.db",
            "crm_backup_2020-01-02T00-00-00-000000Z.db",
            "crm_backup_2020-01-01T00-00-00-000000Z.db",
        ];
        for name in names {
            fs::write(dir.path().join(name), b"snapshot").unwrap();
        }
        let stuck = dir.path().join(names[2]);

        let manager = BackupManager::new(dir.path());
        let report = manager
            .prune_with(2, |path| {
                if path == stuck.as_path() {
                    Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked"))
                } else {
                    fs::remove_file(path)
                }
            })
            .unwrap();

        assert_eq!(report.kept, vec![dir.path().join(names[0]), dir.path().join(names[1])]);
        assert_eq!(report.failed, vec![stuck.clone()]);
        assert_eq!(report.removed, vec![dir.path().join(names[3]), dir.path().join(names[4])]);
        assert!(stuck.exists());
        assert!(!dir.path().join(names[4]).exists());
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("SQL".parse::<BackupStrategy>().unwrap(), BackupStrategy::Dump);
        assert_eq!("copy".parse::<BackupStrategy>().unwrap(), BackupStrategy::Copy);
        assert!("tape".parse::<BackupStrategy>().is_err());
    }
}
