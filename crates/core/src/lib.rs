//! swapsync-core - keeps a llama-swap config file in step with a model directory
//!
//! This crate provides:
//! - Discovery of model artifacts below a root directory
//! - Deterministic, collision-checked config keys for each artifact
//! - A non-destructive merge that only ever adds missing entries and fields
//! - Crash-safe persistence with backup rotation, atomic writes and a run lock
pub mod config;
pub mod document;
pub mod error;
pub mod keys;
pub mod merge;
pub mod persist;
pub mod scanner;
pub mod sync;
pub mod template;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;

// Re-export main API components
pub use config::SyncSettings;
pub use document::ConfigDocument;
pub use keys::{DerivedKey, KeyDeriver, KeyRegistry};
pub use merge::{MergeEngine, MergeOutcome, MergeReport};
pub use persist::{CommitReceipt, PersistenceManager, RunLock};
pub use scanner::ArtifactScanner;
pub use sync::{SyncEngine, SyncOutcome, run};
pub use template::{CommandTemplate, EntryTemplate};
