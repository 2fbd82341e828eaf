pub mod artifact;
pub mod config_key;

// Re-export commonly used types
pub use artifact::{Artifact, ArtifactSet, has_extension, normalize_relative_path};
pub use config_key::ConfigKey;
