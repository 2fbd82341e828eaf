//! Merge and audit of the config document against the artifact set
//!
//! The merge is a pure function of the current document, the artifact set
//! and the settings. Existing values are never overwritten: entries only
//! gain the template fields they lack. New entries are appended after the
//! existing ones so the file diff stays small.

mod report;

pub use report::{AuditedEntry, MergeReport, MigratedEntry};

use crate::config::SyncSettings;
use crate::document::ConfigDocument;
use crate::error::Result;
use crate::keys::{DerivedKey, KeyDeriver};
use crate::template::EntryTemplate;
use crate::types::{Artifact, ArtifactSet, ConfigKey};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Result of a merge: the next document and what changed
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub document: ConfigDocument,
    pub report: MergeReport,
}

#[derive(Debug, Clone)]
pub struct MergeEngine {
    deriver: KeyDeriver,
    template: EntryTemplate,
}

impl MergeEngine {
    pub fn new(deriver: KeyDeriver, template: EntryTemplate) -> Self {
        Self { deriver, template }
    }

    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self::new(
            KeyDeriver::from_settings(settings),
            EntryTemplate::from_settings(settings),
        )
    }

    pub fn deriver(&self) -> &KeyDeriver {
        &self.deriver
    }

    /// Compute the next document.
    ///
    /// Fails only on a key collision, before anything is built.
    pub fn merge(
        &self,
        current: &ConfigDocument,
        artifacts: &ArtifactSet,
        prune: bool,
    ) -> Result<MergeOutcome> {
        let derived = self.deriver.derive_all(artifacts)?;

        let by_key: BTreeMap<&str, &Artifact> = derived
            .iter()
            .map(|(artifact, key)| (key.key.as_str(), *artifact))
            .collect();
        let migrations = plan_migrations(current, &derived, &by_key);

        let mut report = MergeReport::default();
        let mut next = Mapping::new();

        if let Some(entries) = current.entries() {
            for (raw_key, value) in entries {
                let Some(key) = raw_key.as_str() else {
                    warn!("Entry with non-string key {:?} left untouched.", raw_key);
                    next.insert(raw_key.clone(), value.clone());
                    continue;
                };

                if let Some(target) = migrations.get(key) {
                    info!("MIGRATING: Entry '{}' renamed to '{}'", key, target);
                    report.migrated.push(MigratedEntry {
                        from: key.to_string(),
                        to: target.to_string(),
                    });
                    let artifact = by_key[target.as_str()];
                    let value = self.audit(target.as_str(), value, artifact, &mut report, true);
                    next.insert(target.as_str().into(), value);
                    continue;
                }

                if let Some(artifact) = by_key.get(key) {
                    let value = self.audit(key, value, artifact, &mut report, false);
                    next.insert(raw_key.clone(), value);
                    continue;
                }

                if prune {
                    info!("REMOVING: Stale entry '{}' as requested.", key);
                    report.pruned.push(key.to_string());
                } else {
                    warn!(
                        "Stale entry '{}' found (no matching file). Use --prune to remove.",
                        key
                    );
                    report.stale.push(key.to_string());
                    next.insert(raw_key.clone(), value.clone());
                }
            }
        }

        for (artifact, derived_key) in &derived {
            let key = derived_key.key.as_str();
            if next.contains_key(key) {
                continue;
            }
            info!("ADDING: New model file found: '{}'", artifact.relative_path());
            next.insert(key.into(), Value::Mapping(self.template.build(artifact)));
            report.added.push(key.to_string());
        }

        if !report.has_changes() {
            info!("All existing entries are structurally complete.");
        }

        Ok(MergeOutcome {
            document: current.with_entries(next),
            report,
        })
    }

    /// Add missing template fields to an existing entry, never touching
    /// fields that are already present.
    fn audit(
        &self,
        key: &str,
        value: &Value,
        artifact: &Artifact,
        report: &mut MergeReport,
        migrated: bool,
    ) -> Value {
        let Value::Mapping(existing) = value else {
            warn!(
                "Found malformed entry for '{}' (not a mapping). Leaving it untouched.",
                key
            );
            report.malformed.push(key.to_string());
            return value.clone();
        };

        let mut entry = existing.clone();
        let mut added_fields = Vec::new();
        for (field, default) in self.template.build(artifact) {
            if !entry.contains_key(&field) {
                if let Some(name) = field.as_str() {
                    added_fields.push(name.to_string());
                }
                entry.insert(field, default);
            }
        }

        if !added_fields.is_empty() {
            info!(
                "UPDATING: Entry '{}' is missing {:?}. Defaults have been added.",
                key, added_fields
            );
            report.audited.push(AuditedEntry {
                key: key.to_string(),
                added_fields,
            });
        } else if !migrated {
            debug!("Entry '{}' is complete", key);
            report.unchanged.push(key.to_string());
        }

        Value::Mapping(entry)
    }
}

/// Legacy key -> current key for entries that can be renamed in place.
///
/// A legacy key is only migrated when the current key is absent from the
/// document and no artifact claims the legacy key as its own.
fn plan_migrations(
    current: &ConfigDocument,
    derived: &[(&Artifact, DerivedKey)],
    by_key: &BTreeMap<&str, &Artifact>,
) -> BTreeMap<String, ConfigKey> {
    let mut migrations = BTreeMap::new();
    let mut used = BTreeSet::new();

    for (_, derived_key) in derived {
        let Some(legacy) = &derived_key.legacy_key else {
            continue;
        };
        if current.contains_key(derived_key.key.as_str())
            || !current.contains_key(legacy.as_str())
            || by_key.contains_key(legacy.as_str())
            || !used.insert(legacy.as_str())
        {
            continue;
        }
        migrations.insert(legacy.to_string(), derived_key.key.clone());
    }

    migrations
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn engine() -> MergeEngine {
        MergeEngine::from_settings(&SyncSettings::default())
    }

    fn artifacts(paths: &[&str]) -> ArtifactSet {
        paths
            .iter()
            .map(|p| Artifact::new(Path::new("/models"), p).unwrap())
            .collect()
    }

    fn doc(text: &str) -> ConfigDocument {
        ConfigDocument::parse(text, Path::new("config.yaml")).unwrap()
    }

    #[test]
    fn test_adds_entry_for_new_artifact() {
        let outcome = engine()
            .merge(&ConfigDocument::new(), &artifacts(&["a/model.gguf"]), false)
            .unwrap();

        assert_eq!(outcome.report.added, vec!["a--model"]);
        assert!(outcome.report.has_changes());
        let entry = outcome.document.entry("a--model").unwrap();
        assert_eq!(entry["name"], Value::from("a model"));
        assert_eq!(entry["ttl"], Value::from(0));
    }

    #[test]
    fn test_audit_keeps_custom_values_and_adds_missing() {
        let current = doc(
            "models:\n  a--model:\n    description: hand written\n    cmd: custom command\n",
        );
        let outcome = engine()
            .merge(&current, &artifacts(&["a/model.gguf"]), false)
            .unwrap();

        let entry = outcome.document.entry("a--model").unwrap();
        assert_eq!(entry["description"], Value::from("hand written"));
        assert_eq!(entry["cmd"], Value::from("custom command"));
        assert_eq!(entry["ttl"], Value::from(0));

        assert_eq!(outcome.report.audited_keys(), vec!["a--model"]);
        let audited = &outcome.report.audited[0];
        assert!(audited.added_fields.contains(&"ttl".to_string()));
        assert!(!audited.added_fields.contains(&"description".to_string()));
    }

    #[test]
    fn test_present_null_fields_are_left_alone() {
        let engine = engine();
        let first = engine
            .merge(&ConfigDocument::new(), &artifacts(&["m.gguf"]), false)
            .unwrap()
            .document;
        let mut entries = first.entries().unwrap().clone();
        if let Some(Value::Mapping(entry)) = entries.get_mut("m") {
            entry.insert("ttl".into(), Value::Null);
        }
        let current = first.with_entries(entries);

        let outcome = engine.merge(&current, &artifacts(&["m.gguf"]), false).unwrap();
        assert_eq!(outcome.report.unchanged, vec!["m"]);
        assert_eq!(outcome.document.entry("m").unwrap()["ttl"], Value::Null);
    }

    #[test]
    fn test_second_merge_is_unchanged() {
        let engine = engine();
        let set = artifacts(&["a/model.gguf", "b.gguf"]);
        let first = engine.merge(&ConfigDocument::new(), &set, false).unwrap();
        let second = engine.merge(&first.document, &set, false).unwrap();

        assert!(!second.report.has_changes());
        assert_eq!(second.report.unchanged, vec!["a--model", "b"]);
        assert_eq!(second.document, first.document);
    }

    #[test]
    fn test_stale_entries_kept_without_prune() {
        let current = doc("models:\n  b--old:\n    ttl: 3\n");
        let outcome = engine().merge(&current, &ArtifactSet::new(), false).unwrap();

        assert_eq!(outcome.report.stale, vec!["b--old"]);
        assert!(outcome.report.pruned.is_empty());
        assert!(!outcome.report.has_changes());
        assert_eq!(outcome.document, current);
    }

    #[test]
    fn test_prune_removes_stale_entries() {
        let current = doc("models:\n  b--old:\n    ttl: 3\n  a--model:\n    ttl: 1\n");
        let outcome = engine()
            .merge(&current, &artifacts(&["a/model.gguf"]), true)
            .unwrap();

        assert_eq!(outcome.report.pruned, vec!["b--old"]);
        assert_eq!(outcome.document.keys(), vec!["a--model"]);
        assert_eq!(
            outcome.document.entry("a--model").unwrap()["ttl"],
            Value::from(1)
        );
    }

    #[test]
    fn test_existing_order_preserved_and_new_keys_appended() {
        let current = doc("models:\n  zeta: {}\n  alpha: {}\n");
        let outcome = engine()
            .merge(
                &current,
                &artifacts(&["alpha.gguf", "beta.gguf", "zeta.gguf"]),
                false,
            )
            .unwrap();

        assert_eq!(outcome.document.keys(), vec!["zeta", "alpha", "beta"]);
        assert_eq!(outcome.report.added, vec!["beta"]);
        assert_eq!(outcome.report.audited_keys(), vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_collision_aborts_merge() {
        let current = doc("models:\n  keep: {}\n");
        let err = engine()
            .merge(&current, &artifacts(&["a--b/c.gguf", "a/b--c.gguf"]), true)
            .unwrap_err();
        assert!(matches!(err, crate::Error::KeyCollisionError { .. }));
    }

    #[test]
    fn test_malformed_entry_left_untouched() {
        let current = doc("models:\n  m: just a string\n");
        let outcome = engine().merge(&current, &artifacts(&["m.gguf"]), false).unwrap();

        assert_eq!(outcome.report.malformed, vec!["m"]);
        assert!(!outcome.report.has_changes());
        assert_eq!(
            outcome.document.entry("m").unwrap(),
            &Value::from("just a string")
        );
    }

    #[test]
    fn test_other_top_level_keys_survive() {
        let current = doc("healthCheckTimeout: 90\nmodels: {}\ngroups:\n  g: {}\n");
        let outcome = engine().merge(&current, &artifacts(&["m.gguf"]), false).unwrap();

        let root_keys: Vec<&str> = outcome
            .document
            .root()
            .keys()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(root_keys, vec!["healthCheckTimeout", "models", "groups"]);
    }

    #[test]
    fn test_legacy_md5_key_is_migrated_in_place() {
        let settings = SyncSettings::default().with_max_key_length(24);
        let engine = MergeEngine::from_settings(&settings);
        let set = artifacts(&["organisation/some-very-long-model-name.gguf"]);
        let derived = engine.deriver().derive(set.iter().next().unwrap());
        let legacy = derived.legacy_key.clone().unwrap();

        let current = doc(&format!(
            "models:\n  first: {{}}\n  {legacy}:\n    description: mine\n  last: {{}}\n"
        ));
        let outcome = engine.merge(&current, &set, false).unwrap();

        assert_eq!(
            outcome.document.keys(),
            vec!["first", derived.key.as_str(), "last"]
        );
        let entry = outcome.document.entry(derived.key.as_str()).unwrap();
        assert_eq!(entry["description"], Value::from("mine"));
        assert_eq!(outcome.report.migrated.len(), 1);
        assert_eq!(outcome.report.migrated[0].from, legacy.as_str());
        assert!(outcome.report.added.is_empty());
        assert!(outcome.report.has_changes());
    }

    #[test]
    fn test_legacy_key_not_migrated_when_current_key_exists() {
        let settings = SyncSettings::default().with_max_key_length(24);
        let engine = MergeEngine::from_settings(&settings);
        let set = artifacts(&["organisation/some-very-long-model-name.gguf"]);
        let derived = engine.deriver().derive(set.iter().next().unwrap());
        let legacy = derived.legacy_key.clone().unwrap();

        let current = doc(&format!(
            "models:\n  {}: {{}}\n  {legacy}: {{}}\n",
            derived.key
        ));
        let outcome = engine.merge(&current, &set, true).unwrap();

        assert!(outcome.report.migrated.is_empty());
        assert_eq!(outcome.report.pruned, vec![legacy.to_string()]);
    }

    #[test]
    fn test_non_string_keys_are_carried_through() {
        let mut entries = Mapping::new();
        entries.insert(Value::from(42), Value::from("kept"));
        let current = ConfigDocument::new().with_entries(entries);

        let outcome = engine()
            .merge(&current, &artifacts(&["m.gguf"]), true)
            .unwrap();

        let models = outcome.document.entries().unwrap();
        assert_eq!(models.get(Value::from(42)), Some(&Value::from("kept")));
        assert!(outcome.report.pruned.is_empty());
        assert_eq!(outcome.report.added, vec!["m"]);
    }
}
