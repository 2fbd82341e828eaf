//! The on-disk service configuration
//!
//! The file is a YAML mapping whose `models` key holds one entry per config
//! key. Every other top-level key is carried through untouched and keeps its
//! position. Only plain mappings, sequences and scalars are accepted.

use crate::error::{Error, Result};
use serde_yaml::{Mapping, Value};
use std::io;
use std::path::Path;
use tracing::{debug, warn};

pub const MODELS_KEY: &str = "models";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDocument {
    root: Mapping,
}

impl ConfigDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the document at `path`; a missing file is an empty document.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                debug!("Loaded config document from {:?}", path);
                Self::parse(&text, path)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(
                    "Config file not found at {}. A new one will be created.",
                    path.display()
                );
                Ok(Self::new())
            }
            Err(e) => Err(Error::ReadError {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Parse document text. `origin` is only used in error messages.
    pub fn parse(text: &str, origin: &Path) -> Result<Self> {
        let mut value: Value =
            serde_yaml::from_str(text).map_err(|e| Error::parse(origin, e.to_string()))?;
        // Expand `<<` merge keys so inherited fields count as present
        value
            .apply_merge()
            .map_err(|e| Error::parse(origin, e.to_string()))?;

        let root = match value {
            Value::Null => Mapping::new(),
            Value::Mapping(mapping) => mapping,
            other => {
                return Err(Error::parse(
                    origin,
                    format!("top level must be a mapping, found {}", kind_of(&other)),
                ));
            }
        };

        if let Some(location) = find_tag(&Value::Mapping(root.clone()), "") {
            return Err(Error::parse(
                origin,
                format!("YAML tags are not allowed (found at '{location}')"),
            ));
        }

        match root.get(MODELS_KEY) {
            None | Some(Value::Null) => {}
            Some(Value::Mapping(models)) => {
                if let Some(key) = models.keys().find(|k| !k.is_string()) {
                    return Err(Error::parse(
                        origin,
                        format!("model keys must be strings, found {}", kind_of(key)),
                    ));
                }
            }
            Some(other) => {
                return Err(Error::parse(
                    origin,
                    format!("'{MODELS_KEY}' must be a mapping, found {}", kind_of(other)),
                ));
            }
        }

        Ok(Self { root })
    }

    /// The full top-level mapping
    pub fn root(&self) -> &Mapping {
        &self.root
    }

    /// The `models` mapping, if the document has one
    pub fn entries(&self) -> Option<&Mapping> {
        self.root.get(MODELS_KEY).and_then(Value::as_mapping)
    }

    pub fn entry(&self, key: &str) -> Option<&Value> {
        self.entries().and_then(|models| models.get(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entry(key).is_some()
    }

    /// Entry keys in document order
    pub fn keys(&self) -> Vec<&str> {
        self.entries()
            .map(|models| models.keys().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries().map_or(0, Mapping::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of this document with the `models` mapping replaced.
    ///
    /// An existing `models` key keeps its position; otherwise it is appended,
    /// unless there is nothing to put in it.
    pub fn with_entries(&self, entries: Mapping) -> Self {
        let mut root = self.root.clone();
        if root.contains_key(MODELS_KEY) || !entries.is_empty() {
            root.insert(MODELS_KEY.into(), Value::Mapping(entries));
        }
        Self { root }
    }

    /// Serialize to YAML text. Multi-line strings come out as block literals.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.root)?)
    }
}

/// Path of the first tagged value below `value`, if any
fn find_tag(value: &Value, location: &str) -> Option<String> {
    match value {
        Value::Tagged(_) => Some(if location.is_empty() {
            "<root>".to_string()
        } else {
            location.to_string()
        }),
        Value::Sequence(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, item)| find_tag(item, &format!("{location}[{i}]"))),
        Value::Mapping(mapping) => mapping.iter().find_map(|(k, v)| {
            let name = match k {
                Value::String(s) => s.clone(),
                other => kind_of(other).to_string(),
            };
            let child = if location.is_empty() {
                name
            } else {
                format!("{location}.{name}")
            };
            find_tag(k, &child).or_else(|| find_tag(v, &child))
        }),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
