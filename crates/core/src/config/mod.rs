//! Run settings for swapsync

mod settings;

pub use settings::{
    DEFAULT_CONFIG_PATH, DEFAULT_EXTENSION, DEFAULT_MAX_BACKUPS, DEFAULT_MAX_KEY_LENGTH,
    DEFAULT_MODEL_MOUNT, DEFAULT_MODELS_DIR, DEFAULT_SERVER_BINARY, MIN_KEY_LENGTH, SyncSettings,
};
pub(crate) use settings::sibling_with_suffix;
