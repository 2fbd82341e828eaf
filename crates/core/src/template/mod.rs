//! Default entry scaffolding
//!
//! The template is the single source of truth for which fields an entry must
//! carry. Auditing compares existing entries against it field by field.

use crate::config::SyncSettings;
use crate::types::Artifact;
use serde_yaml::{Mapping, Value};

/// Runtime parameters appended to every generated command, one per line
pub const DEFAULT_RUNTIME_ARGS: &[&str] = &[
    "-ngl 99",
    "-c 4096",
    "-b 2048",
    "-ub 512",
    "--temp 0.7",
    "--top-p 0.95",
    "--top-k 40",
    "--repeat-penalty 1.1",
    "--port ${PORT}",
    "--host 0.0.0.0",
];

/// Required fields in the order they are written for new entries
pub const REQUIRED_FIELDS: &[&str] = &[
    "name",
    "description",
    "cmd",
    "aliases",
    "env",
    "ttl",
    "unlisted",
    "filters",
    "metadata",
    "macros",
    "concurrencyLimit",
    "cmdStop",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    pub server_binary: String,
    pub model_mount: String,
}

impl Default for CommandTemplate {
    fn default() -> Self {
        let settings = SyncSettings::default();
        Self::from_settings(&settings)
    }
}

impl CommandTemplate {
    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self {
            server_binary: settings.server_binary.clone(),
            model_mount: settings.model_mount.trim_end_matches('/').to_string(),
        }
    }

    /// Multi-line launch command for one model file
    pub fn render(&self, relative_path: &str) -> String {
        let mut lines = Vec::with_capacity(DEFAULT_RUNTIME_ARGS.len() + 2);
        lines.push(self.server_binary.clone());
        lines.push(format!("  -m {}/{}", self.model_mount, relative_path));
        lines.extend(DEFAULT_RUNTIME_ARGS.iter().map(|arg| format!("  {arg}")));
        lines.join("\n")
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntryTemplate {
    command: CommandTemplate,
    extension: String,
}

impl EntryTemplate {
    pub fn new(command: CommandTemplate, extension: &str) -> Self {
        Self {
            command,
            extension: extension.trim_start_matches('.').to_ascii_lowercase(),
        }
    }

    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self::new(CommandTemplate::from_settings(settings), &settings.extension)
    }

    /// Complete default entry for an artifact
    pub fn build(&self, artifact: &Artifact) -> Mapping {
        let relative_path = artifact.relative_path();
        let mut entry = Mapping::new();
        entry.insert(
            "name".into(),
            pretty_name(artifact.stem_path(&self.extension)).into(),
        );
        entry.insert(
            "description".into(),
            format!("Auto-generated entry for {relative_path}").into(),
        );
        entry.insert("cmd".into(), self.command.render(relative_path).into());
        entry.insert("aliases".into(), Value::Sequence(Vec::new()));
        entry.insert("env".into(), Value::Sequence(Vec::new()));
        entry.insert("ttl".into(), 0.into());
        entry.insert("unlisted".into(), false.into());
        entry.insert("filters".into(), Value::Mapping(Mapping::new()));
        entry.insert("metadata".into(), Value::Mapping(Mapping::new()));
        entry.insert("macros".into(), Value::Mapping(Mapping::new()));
        entry.insert("concurrencyLimit".into(), 0.into());
        entry.insert("cmdStop".into(), "".into());
        entry
    }
}

/// `org/my_model-q4` -> `org my model-q4`
pub fn pretty_name(stem_path: &str) -> String {
    stem_path.replace(['/', '_'], " ")
}
