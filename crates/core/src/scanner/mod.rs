//! Artifact discovery
//!
//! Walks the artifact root recursively and collects every regular file that
//! carries the artifact extension, as root-relative `/`-separated paths.
//! Symbolic links are not followed into directories; a link counts as an
//! artifact when it resolves to a regular file.

use crate::config::SyncSettings;
use crate::error::{Error, Result};
use crate::types::{Artifact, ArtifactSet, has_extension};
use std::path::{Component, Path};
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct ArtifactScanner {
    extension: String,
}

impl ArtifactScanner {
    pub fn new(extension: &str) -> Self {
        Self {
            extension: extension.trim_start_matches('.').to_ascii_lowercase(),
        }
    }

    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self::new(&settings.extension)
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Collect all artifacts below `root`.
    ///
    /// Any traversal error is fatal: a subtree that cannot be read would
    /// otherwise make its artifacts look deleted.
    pub fn scan(&self, root: &Path) -> Result<ArtifactSet> {
        let metadata = std::fs::metadata(root).map_err(|e| Error::ScanError {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !metadata.is_dir() {
            return Err(Error::ScanError {
                path: root.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        debug!("Scanning {:?} for .{} files", root, self.extension);

        let mut artifacts = ArtifactSet::new();
        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::ScanError {
                path: e.path().unwrap_or(root).to_path_buf(),
                reason: e.to_string(),
            })?;

            if entry.depth() == 0 {
                continue;
            }

            let file_type = entry.file_type();
            let is_file =
                file_type.is_file() || (file_type.is_symlink() && entry.path().is_file());
            if !is_file {
                continue;
            }

            let Some(file_name) = entry.file_name().to_str() else {
                warn!("Skipping non UTF-8 file name: {}", entry.path().display());
                continue;
            };
            if !has_extension(file_name, &self.extension) {
                continue;
            }

            let Some(relative) = relative_posix_path(root, entry.path()) else {
                warn!("Skipping non UTF-8 path: {}", entry.path().display());
                continue;
            };

            match Artifact::new(root, &relative) {
                Some(artifact) => {
                    debug!("Found artifact: {}", artifact.relative_path());
                    artifacts.insert(artifact);
                }
                None => warn!("Skipping unusable artifact path: {relative}"),
            }
        }

        debug!("Found {} artifacts", artifacts.len());
        Ok(artifacts)
    }
}

fn relative_posix_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_str()?),
            Component::CurDir => continue,
            _ => return None,
        }
    }
    Some(segments.join("/"))
}
