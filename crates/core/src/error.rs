use std::io;
use std::path::PathBuf;

/// Errors that can occur during a swapsync run
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Scan error: cannot read artifact root {}: {reason}", path.display())]
    ScanError { path: PathBuf, reason: String },

    #[error("Key collision: '{key}' is derived from both '{first}' and '{second}'")]
    KeyCollisionError {
        key: String,
        first: String,
        second: String,
    },

    #[error("Cannot read {}: {source}", path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Parse error in {}: {reason}", path.display())]
    ParseError { path: PathBuf, reason: String },

    #[error(
        "Lock file {} exists. Another sync may be running; verify no other run is active before removing it",
        path.display()
    )]
    LockHeldError { path: PathBuf },

    #[error("Persistence error at {}: {source}", path.display())]
    PersistenceError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_yaml::Error),
}

impl Error {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::PersistenceError {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::ParseError {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for swapsync operations
pub type Result<T> = std::result::Result<T, Error>;
