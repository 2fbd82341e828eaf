use serde::Serialize;

/// An existing entry that gained missing fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditedEntry {
    pub key: String,
    pub added_fields: Vec<String>,
}

/// An entry renamed from its legacy key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigratedEntry {
    pub from: String,
    pub to: String,
}

/// What a merge did, key by key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub added: Vec<String>,
    pub audited: Vec<AuditedEntry>,
    pub migrated: Vec<MigratedEntry>,
    pub pruned: Vec<String>,
    pub unchanged: Vec<String>,
    /// Entries without an artifact that were kept because pruning is off
    pub stale: Vec<String>,
    /// Entries that are not mappings and were left as they are
    pub malformed: Vec<String>,
}

impl MergeReport {
    /// Whether the document needs to be written
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty()
            || !self.audited.is_empty()
            || !self.migrated.is_empty()
            || !self.pruned.is_empty()
    }

    pub fn audited_keys(&self) -> Vec<&str> {
        self.audited.iter().map(|a| a.key.as_str()).collect()
    }

    /// One-line count summary for logs
    pub fn summary(&self) -> String {
        format!(
            "{} added, {} updated, {} migrated, {} removed, {} unchanged",
            self.added.len(),
            self.audited.len(),
            self.migrated.len(),
            self.pruned.len(),
            self.unchanged.len()
        )
    }
}
