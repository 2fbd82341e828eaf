use super::backup::parent_dir;
use crate::error::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Writes a file through a temporary sibling and a rename, so readers see
/// either the old content or the new content and nothing in between.
#[derive(Debug, Clone)]
pub struct AtomicWriter {
    destination: PathBuf,
}

/// New content sitting in a temp file next to the destination.
///
/// Dropping it without [`StagedWrite::commit`] deletes the temp file and
/// leaves the destination as it was.
#[derive(Debug)]
pub struct StagedWrite {
    temp: NamedTempFile,
    destination: PathBuf,
}

impl AtomicWriter {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn write(&self, contents: &[u8]) -> Result<()> {
        self.stage(contents)?.commit()
    }

    /// Write `contents` to a temp file in the destination's directory.
    pub fn stage(&self, contents: &[u8]) -> Result<StagedWrite> {
        let dir = parent_dir(&self.destination);
        let prefix = format!(
            ".{}.",
            self.destination
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        );

        let mut temp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| Error::persistence(dir, e))?;

        temp.write_all(contents)
            .map_err(|e| Error::persistence(temp.path(), e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| Error::persistence(temp.path(), e))?;

        let permissions = match fs::metadata(&self.destination) {
            Ok(metadata) => Some(metadata.permissions()),
            Err(_) => default_permissions(),
        };
        if let Some(permissions) = permissions {
            fs::set_permissions(temp.path(), permissions)
                .map_err(|e| Error::persistence(temp.path(), e))?;
        }

        debug!("Staged {} bytes in {}", contents.len(), temp.path().display());
        Ok(StagedWrite {
            temp,
            destination: self.destination.clone(),
        })
    }
}

impl StagedWrite {
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Rename the temp file onto the destination.
    pub fn commit(self) -> Result<()> {
        let destination = self.destination;
        // On failure the temp file comes back inside the error and is removed
        // when it drops.
        self.temp
            .persist(&destination)
            .map_err(|e| Error::persistence(&destination, e.error))?;

        #[cfg(unix)]
        {
            if let Ok(dir) = fs::File::open(parent_dir(&destination)) {
                let _ = dir.sync_all();
            }
        }

        debug!("Renamed temp file onto {}", destination.display());
        Ok(())
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}
