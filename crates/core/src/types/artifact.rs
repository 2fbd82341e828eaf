use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// A discovered model file. Identity is the root-relative POSIX path.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    relative_path: String,
    #[serde(skip)]
    absolute_path: PathBuf,
}

/// Artifacts of one run, ordered by relative path
pub type ArtifactSet = BTreeSet<Artifact>;

impl Artifact {
    /// Build an artifact from a path relative to `root`.
    ///
    /// Returns `None` when the relative path is empty, absolute, or escapes
    /// the root through a `..` segment.
    pub fn new(root: &Path, relative_path: &str) -> Option<Self> {
        let relative_path = normalize_relative_path(relative_path)?;
        let absolute_path = relative_path
            .split('/')
            .fold(root.to_path_buf(), |acc, segment| acc.join(segment));
        Some(Self {
            relative_path,
            absolute_path,
        })
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn absolute_path(&self) -> &Path {
        &self.absolute_path
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.relative_path.split('/')
    }

    /// Relative path with `.<extension>` removed from the last segment.
    /// The extension is matched case-insensitively.
    pub fn stem_path(&self, extension: &str) -> &str {
        strip_extension(&self.relative_path, extension)
    }
}

impl PartialEq for Artifact {
    fn eq(&self, other: &Self) -> bool {
        self.relative_path == other.relative_path
    }
}

impl Eq for Artifact {}

impl Hash for Artifact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.relative_path.hash(state);
    }
}

impl Ord for Artifact {
    fn cmp(&self, other: &Self) -> Ordering {
        self.relative_path.cmp(&other.relative_path)
    }
}

impl PartialOrd for Artifact {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Normalize a relative path to `/`-separated form without empty or `.` segments
pub fn normalize_relative_path(path: &str) -> Option<String> {
    if path.starts_with('/') || path.starts_with('\\') || has_drive_prefix(path) {
        return None;
    }

    let mut segments = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => return None,
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// True when `file_name` ends in `.<extension>` (case-insensitive) and has
/// something in front of the dot.
pub fn has_extension(file_name: &str, extension: &str) -> bool {
    strip_extension(file_name, extension).len() < file_name.len()
}

fn strip_extension<'a>(path: &'a str, extension: &str) -> &'a str {
    let suffix_len = extension.len() + 1;
    if path.len() <= suffix_len || !path.is_char_boundary(path.len() - suffix_len) {
        return path;
    }

    let (stem, suffix) = path.split_at(path.len() - suffix_len);
    if stem.ends_with('/') {
        return path;
    }
    match suffix.strip_prefix('.') {
        Some(ext) if ext.eq_ignore_ascii_case(extension) => stem,
        _ => path,
    }
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
