//! Crash-safe persistence of the config document
//!
//! A commit stages the new document in a temp file, rotates backups, then
//! renames the temp file into place. The rename is always the last step.
//! Commits require a held [`RunLock`].

mod atomic;
mod backup;
mod lock;

pub use atomic::{AtomicWriter, StagedWrite};
pub use backup::{BACKUP_MARKER, BackupFile, BackupRotation, TIMESTAMP_FORMAT};
pub use lock::RunLock;

use crate::config::SyncSettings;
use crate::document::ConfigDocument;
use crate::error::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// What a commit left on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitReceipt {
    pub document: PathBuf,
    pub backup: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct PersistenceManager {
    rotation: BackupRotation,
    writer: AtomicWriter,
}

impl PersistenceManager {
    pub fn new(document: &Path, max_backups: usize) -> Self {
        Self {
            rotation: BackupRotation::new(document, max_backups),
            writer: AtomicWriter::new(document),
        }
    }

    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self::new(&settings.config_path, settings.max_backups)
    }

    pub fn rotation(&self) -> &BackupRotation {
        &self.rotation
    }

    /// Back up the current file and atomically replace it with `next`.
    ///
    /// The new content is staged before any backup is created or evicted, so
    /// a failed write leaves the backup set as it was.
    pub fn commit(&self, next: &ConfigDocument, _lock: &RunLock) -> Result<CommitReceipt> {
        let contents = next.to_yaml()?;
        let staged = self.writer.stage(contents.as_bytes())?;

        let backup = self.rotation.rotate()?;
        staged.commit()?;

        info!("Successfully updated '{}'.", self.writer.destination().display());
        Ok(CommitReceipt {
            document: self.writer.destination().to_path_buf(),
            backup,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::fs;
    use tempfile::TempDir;

    fn document(text: &str) -> ConfigDocument {
        ConfigDocument::parse(text, Path::new("config.yaml")).unwrap()
    }

    #[test]
    fn test_commit_backs_up_then_writes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "models: {}\n").unwrap();

        let lock = RunLock::acquire(&temp_dir.path().join("config.yaml.lock")).unwrap();
        let manager = PersistenceManager::new(&path, 3);
        let next = document("models:\n  m:\n    ttl: 0\n");
        let receipt = manager.commit(&next, &lock).unwrap();

        let backup = receipt.backup.unwrap();
        assert_eq!(fs::read_to_string(backup).unwrap(), "models: {}\n");
        let written = ConfigDocument::load(&path).unwrap();
        assert_eq!(written, next);
    }

    #[test]
    fn test_first_commit_has_no_backup() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");

        let lock = RunLock::acquire(&temp_dir.path().join("config.yaml.lock")).unwrap();
        let receipt = PersistenceManager::new(&path, 3)
            .commit(&document("models: {}\n"), &lock)
            .unwrap();
        assert_eq!(receipt.backup, None);
        assert!(path.exists());
    }

    #[test]
    fn test_failed_staging_leaves_document_and_backups() {
        let temp_dir = TempDir::new().unwrap();
        // The temp file name adds a dot prefix and a random suffix, which
        // pushes it past the file name limit
        let name = format!("{}.yaml", "c".repeat(245));
        let path = temp_dir.path().join(&name);
        fs::write(&path, "models: {}\n").unwrap();

        let lock = RunLock::acquire(&temp_dir.path().join("run.lock")).unwrap();
        let manager = PersistenceManager::new(&path, 3);
        let err = manager
            .commit(&document("models:\n  m:\n    ttl: 0\n"), &lock)
            .unwrap_err();

        assert!(matches!(err, Error::PersistenceError { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "models: {}\n");
        let names: Vec<String> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2, "{names:?}");
        assert!(manager.rotation().list().unwrap().is_empty());
    }
}
