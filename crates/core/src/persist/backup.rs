use crate::config::sibling_with_suffix;
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// `<document-name>.bak.<timestamp>`
pub const BACKUP_MARKER: &str = ".bak.";

/// Sortable UTC timestamp used in new backup names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.6fZ";

/// Local-time timestamp format written by older releases
const LEGACY_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    pub path: PathBuf,
    pub timestamp: DateTime<Utc>,
}

/// Timestamped copies of the document, bounded by a retention count
#[derive(Debug, Clone)]
pub struct BackupRotation {
    document: PathBuf,
    max_backups: usize,
}

impl BackupRotation {
    pub fn new(document: impl Into<PathBuf>, max_backups: usize) -> Self {
        Self {
            document: document.into(),
            max_backups,
        }
    }

    pub fn max_backups(&self) -> usize {
        self.max_backups
    }

    /// Existing backups, oldest first by embedded timestamp
    pub fn list(&self) -> Result<Vec<BackupFile>> {
        let Some(file_name) = self.document.file_name().and_then(|n| n.to_str()) else {
            return Ok(Vec::new());
        };
        let prefix = format!("{file_name}{BACKUP_MARKER}");
        let dir = parent_dir(&self.document);

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::persistence(dir, e)),
        };

        let mut backups = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::persistence(dir, e))?;
            let name = entry.file_name();
            let Some(stamp) = name.to_str().and_then(|n| n.strip_prefix(&prefix)) else {
                continue;
            };
            if let Some(timestamp) = parse_timestamp(stamp) {
                backups.push(BackupFile {
                    path: entry.path(),
                    timestamp,
                });
            }
        }

        backups.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.path.cmp(&b.path)));
        Ok(backups)
    }

    /// Copy the current document into a new backup, then evict the oldest
    /// backups until the retention count holds again.
    ///
    /// Nothing is evicted unless the copy succeeded. Returns the new backup
    /// path, or `None` when there is nothing to back up or backups are
    /// disabled.
    pub fn rotate(&self) -> Result<Option<PathBuf>> {
        if self.max_backups == 0 {
            debug!("Backups disabled");
            return Ok(None);
        }
        if !self.document.exists() {
            info!(
                "Config file '{}' does not exist. Skipping backup.",
                self.document.display()
            );
            return Ok(None);
        }

        let existing = self.list()?;

        let backup = self.next_backup_path(Utc::now());
        if let Err(e) = fs::copy(&self.document, &backup) {
            if backup.exists() {
                if let Err(cleanup) = fs::remove_file(&backup) {
                    warn!("Failed to remove partial backup {}: {}", backup.display(), cleanup);
                }
            }
            return Err(Error::persistence(&backup, e));
        }
        info!("Backup created: {}", backup.display());

        let excess = (existing.len() + 1).saturating_sub(self.max_backups);
        for oldest in existing.iter().take(excess) {
            fs::remove_file(&oldest.path).map_err(|e| Error::persistence(&oldest.path, e))?;
            info!("Removed oldest backup: {}", oldest.path.display());
        }

        Ok(Some(backup))
    }

    /// Backup path for `now`, nudged forward if that name is already taken
    fn next_backup_path(&self, now: DateTime<Utc>) -> PathBuf {
        let mut stamp = now;
        loop {
            let suffix = format!("{BACKUP_MARKER}{}", stamp.format(TIMESTAMP_FORMAT));
            let path = sibling_with_suffix(&self.document, &suffix);
            if !path.exists() {
                return path;
            }
            stamp += Duration::microseconds(1);
        }
    }
}

fn parse_timestamp(stamp: &str) -> Option<DateTime<Utc>> {
    if let Ok(utc) = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT) {
        return Some(utc.and_utc());
    }
    let local = NaiveDateTime::parse_from_str(stamp, LEGACY_TIMESTAMP_FORMAT).ok()?;
    // A wall-clock time skipped by a DST jump has no local instant
    Some(
        Local
            .from_local_datetime(&local)
            .earliest()
            .map_or_else(|| local.and_utc(), |t| t.with_timezone(&Utc)),
    )
}

pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
