use crate::error::{Error, Result};
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Advisory single-instance lock: a sibling file created with exclusive
/// create semantics and removed when the guard is released or dropped.
///
/// A lock left behind by a crashed run is never cleared automatically.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    released: bool,
}

impl RunLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(Error::LockHeldError {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => return Err(Error::persistence(path, e)),
        };

        let lock = Self {
            path: path.to_path_buf(),
            released: false,
        };

        // Content is informational only; existence is what counts.
        writeln!(
            file,
            "pid={} acquired={}",
            std::process::id(),
            Utc::now().to_rfc3339()
        )
        .map_err(|e| Error::persistence(path, e))?;

        debug!("Lock acquired: {}", path.display());
        Ok(lock)
    }

    /// Fail if a lock is present, without creating one.
    pub fn ensure_free(path: &Path) -> Result<()> {
        match fs::symlink_metadata(path) {
            Ok(_) => Err(Error::LockHeldError {
                path: path.to_path_buf(),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::persistence(path, e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(mut self) -> Result<()> {
        self.released = true;
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Lock file '{}' removed.", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::persistence(&self.path, e)),
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Lock file '{}' removed.", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove lock file {}: {}", self.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml.lock");

        let lock = RunLock::acquire(&path).unwrap();
        assert!(path.exists());

        let err = RunLock::acquire(&path).unwrap_err();
        assert!(matches!(err, Error::LockHeldError { .. }));
        assert!(err.to_string().contains("verify no other run is active"));

        lock.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_releases_lock() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml.lock");
        {
            let _lock = RunLock::acquire(&path).unwrap();
            assert!(RunLock::ensure_free(&path).is_err());
        }
        assert!(!path.exists());
        assert!(RunLock::ensure_free(&path).is_ok());
    }

    #[test]
    fn test_stale_lock_is_not_cleared() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml.lock");
        fs::write(&path, "pid=1").unwrap();

        assert!(matches!(
            RunLock::acquire(&path),
            Err(Error::LockHeldError { .. })
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "pid=1");
    }
}
