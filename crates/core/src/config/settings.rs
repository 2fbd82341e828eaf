use crate::error::{Error, Result};
use crate::keys::SUFFIX_WIDTH;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_MODELS_DIR: &str = "./models";
pub const DEFAULT_CONFIG_PATH: &str = "./config.yaml";
pub const DEFAULT_MAX_BACKUPS: usize = 3;
pub const DEFAULT_MAX_KEY_LENGTH: usize = 80;
pub const DEFAULT_EXTENSION: &str = "gguf";
pub const DEFAULT_SERVER_BINARY: &str = "/app/llama-server";
pub const DEFAULT_MODEL_MOUNT: &str = "/models";

/// Smallest key length that still leaves room for a readable prefix
/// in front of the hash suffix.
pub const MIN_KEY_LENGTH: usize = 16;

/// Everything a sync run needs to know, passed explicitly into the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct SyncSettings {
    pub models_dir: PathBuf,
    pub config_path: PathBuf,
    pub max_backups: usize,
    pub max_key_length: usize,
    pub prune: bool,
    pub dry_run: bool,
    /// Artifact extension without the leading dot, matched case-insensitively
    pub extension: String,
    pub server_binary: String,
    pub model_mount: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            max_backups: DEFAULT_MAX_BACKUPS,
            max_key_length: DEFAULT_MAX_KEY_LENGTH,
            prune: false,
            dry_run: false,
            extension: DEFAULT_EXTENSION.to_string(),
            server_binary: DEFAULT_SERVER_BINARY.to_string(),
            model_mount: DEFAULT_MODEL_MOUNT.to_string(),
        }
    }
}

impl SyncSettings {
    pub fn new(models_dir: impl Into<PathBuf>, config_path: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
            config_path: config_path.into(),
            ..Self::default()
        }
    }

    pub fn with_prune(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_max_backups(mut self, max_backups: usize) -> Self {
        self.max_backups = max_backups;
        self
    }

    pub fn with_max_key_length(mut self, max_key_length: usize) -> Self {
        self.max_key_length = max_key_length;
        self
    }

    /// Reject settings the engine cannot honor before any file is touched.
    pub fn validate(&self) -> Result<()> {
        if self.max_key_length < MIN_KEY_LENGTH {
            return Err(Error::ConfigError(format!(
                "max key length must be at least {MIN_KEY_LENGTH} (got {}); \
                 shortened keys carry a {SUFFIX_WIDTH}-character hash suffix",
                self.max_key_length
            )));
        }

        let extension = self.extension.trim_start_matches('.');
        if extension.is_empty() || extension.contains(['/', '\\']) {
            return Err(Error::ConfigError(format!(
                "invalid artifact extension '{}'",
                self.extension
            )));
        }

        if self.config_path.as_os_str().is_empty() {
            return Err(Error::ConfigError("config path is empty".to_string()));
        }
        if self.config_path.file_name().is_none() {
            return Err(Error::ConfigError(format!(
                "config path {} does not name a file",
                self.config_path.display()
            )));
        }

        Ok(())
    }

    /// Extension normalized to lowercase without a leading dot
    pub fn normalized_extension(&self) -> String {
        self.extension.trim_start_matches('.').to_ascii_lowercase()
    }

    /// Lock token living next to the document
    pub fn lock_path(&self) -> PathBuf {
        sibling_with_suffix(&self.config_path, ".lock")
    }
}

/// `<dir>/<file-name><suffix>` for a file path
pub(crate) fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}
