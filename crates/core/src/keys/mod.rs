//! Config key derivation
//!
//! A key is the artifact's relative path without its extension, segments
//! joined with `--`. Keys longer than the configured maximum are cut down to
//! a prefix plus a hash of the full key. Keys must be unique within a run;
//! [`KeyRegistry`] turns any duplicate into a hard error.

use crate::config::SyncSettings;
use crate::error::{Error, Result};
use crate::types::{Artifact, ArtifactSet, ConfigKey};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::debug;

pub const KEY_SEPARATOR: &str = "--";

/// Hex digits of the digest kept in a shortened key
pub const HASH_HEX_LEN: usize = 10;

/// `-` plus the hex digest
pub const SUFFIX_WIDTH: usize = HASH_HEX_LEN + 1;

/// A key derived for one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedKey {
    pub key: ConfigKey,
    /// Same key shortened with the MD5 suffix older releases wrote.
    /// Only present when the key was shortened.
    pub legacy_key: Option<ConfigKey>,
}

impl DerivedKey {
    pub fn is_shortened(&self) -> bool {
        self.legacy_key.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct KeyDeriver {
    max_key_length: usize,
    extension: String,
}

impl KeyDeriver {
    pub fn new(max_key_length: usize, extension: &str) -> Self {
        Self {
            max_key_length,
            extension: extension.trim_start_matches('.').to_ascii_lowercase(),
        }
    }

    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self::new(settings.max_key_length, &settings.extension)
    }

    pub fn max_key_length(&self) -> usize {
        self.max_key_length
    }

    /// Unshortened key: `a/b/model.gguf` -> `a--b--model`
    pub fn full_key(&self, artifact: &Artifact) -> String {
        artifact
            .stem_path(&self.extension)
            .split('/')
            .collect::<Vec<_>>()
            .join(KEY_SEPARATOR)
    }

    pub fn derive(&self, artifact: &Artifact) -> DerivedKey {
        let full = self.full_key(artifact);
        if full.chars().count() <= self.max_key_length {
            return DerivedKey {
                key: ConfigKey::new(full),
                legacy_key: None,
            };
        }

        let key = shorten_key(&full, self.max_key_length, &sha256_hex(&full));
        let legacy_key = shorten_key(&full, self.max_key_length, &md5_hex(&full));
        debug!("Shortened key for {}: {}", artifact.relative_path(), key);
        DerivedKey {
            key: ConfigKey::new(key),
            legacy_key: Some(ConfigKey::new(legacy_key)),
        }
    }

    /// Derive keys for every artifact, failing on the first collision.
    pub fn derive_all<'a>(
        &self,
        artifacts: &'a ArtifactSet,
    ) -> Result<Vec<(&'a Artifact, DerivedKey)>> {
        let mut registry = KeyRegistry::new();
        let mut derived = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            let key = self.derive(artifact);
            registry.claim(&key.key, artifact.relative_path())?;
            derived.push((artifact, key));
        }
        Ok(derived)
    }
}

/// `prefix-<digest>` sized to exactly `max_len` characters
pub fn shorten_key(full: &str, max_len: usize, digest_hex: &str) -> String {
    let prefix_len = max_len.saturating_sub(SUFFIX_WIDTH);
    let prefix: String = full.chars().take(prefix_len).collect();
    let digest: String = digest_hex.chars().take(HASH_HEX_LEN).collect();
    format!("{prefix}-{digest}")
}

fn sha256_hex(full: &str) -> String {
    hex::encode(Sha256::digest(full.as_bytes()))
}

fn md5_hex(full: &str) -> String {
    format!("{:x}", md5::compute(full.as_bytes()))
}

/// Run-scoped map from key to the artifact that claimed it
#[derive(Debug, Default)]
pub struct KeyRegistry {
    owners: BTreeMap<ConfigKey, String>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `relative_path` owns `key`.
    ///
    /// Claiming a key twice for the same path is a no-op; claiming it for a
    /// different path is a [`Error::KeyCollisionError`].
    pub fn claim(&mut self, key: &ConfigKey, relative_path: &str) -> Result<()> {
        match self.owners.get(key) {
            Some(owner) if owner == relative_path => Ok(()),
            Some(owner) => Err(Error::KeyCollisionError {
                key: key.to_string(),
                first: owner.clone(),
                second: relative_path.to_string(),
            }),
            None => {
                self.owners.insert(key.clone(), relative_path.to_string());
                Ok(())
            }
        }
    }

    pub fn owner(&self, key: &str) -> Option<&str> {
        self.owners.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.owners.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
