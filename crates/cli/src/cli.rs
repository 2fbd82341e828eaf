use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use swapsync_core::SyncSettings;
use swapsync_core::config::{
    DEFAULT_CONFIG_PATH, DEFAULT_MAX_BACKUPS, DEFAULT_MAX_KEY_LENGTH, DEFAULT_MODELS_DIR,
};

use crate::commands::{scan_command, sync_command};

pub const DEFAULT_CONTAINER: &str = "llama-swap";

#[derive(Parser, Debug)]
#[command(name = "swapsync")]
#[command(version, about = "Sync GGUF models in a directory with a llama-swap config file", long_about = None)]
#[command(subcommand_required = true, arg_required_else_help = true)]
#[command(after_help = "ENVIRONMENT:\n    RUST_LOG=debug    Override the log filter")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose, debug-level logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add, audit and optionally prune config entries to match the model files
    #[command(visible_alias = "s")]
    Sync(SyncArgs),
    /// List discovered model files and the config keys they map to
    Scan(ScanArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// Path to the config file
    #[arg(long, env = "LLAMA_SWAP_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Path to the models directory
    #[arg(long = "models-dir", env = "LLAMA_SWAP_MODELS_DIR", default_value = DEFAULT_MODELS_DIR)]
    pub models_dir: PathBuf,

    /// Docker container to restart after changes (empty to skip)
    #[arg(long, env = "LLAMA_SWAP_CONTAINER", default_value = DEFAULT_CONTAINER)]
    pub container: String,

    /// Remove entries whose model file is missing
    #[arg(long)]
    pub prune: bool,

    /// Do not restart the container after changes
    #[arg(long = "no-restart")]
    pub no_restart: bool,

    /// Show what would change without modifying files or services
    #[arg(short, long = "dry-run")]
    pub dry_run: bool,

    /// Number of timestamped backups to keep (0 disables backups)
    #[arg(long = "max-backups", env = "LLAMA_SWAP_MAX_BACKUPS", default_value_t = DEFAULT_MAX_BACKUPS)]
    pub max_backups: usize,

    /// Longest config key before it is shortened with a hash suffix
    #[arg(long = "max-key-length", env = "LLAMA_SWAP_MAX_KEY_LENGTH", default_value_t = DEFAULT_MAX_KEY_LENGTH)]
    pub max_key_length: usize,

    /// Docker executable used for restarts
    #[arg(long = "docker-bin", env = "LLAMA_SWAP_DOCKER", default_value = "docker")]
    pub docker_bin: String,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn to_settings(&self) -> SyncSettings {
        SyncSettings::new(&self.models_dir, &self.config)
            .with_prune(self.prune)
            .with_dry_run(self.dry_run)
            .with_max_backups(self.max_backups)
            .with_max_key_length(self.max_key_length)
    }
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Path to the models directory
    #[arg(long = "models-dir", env = "LLAMA_SWAP_MODELS_DIR", default_value = DEFAULT_MODELS_DIR)]
    pub models_dir: PathBuf,

    /// Longest config key before it is shortened with a hash suffix
    #[arg(long = "max-key-length", env = "LLAMA_SWAP_MAX_KEY_LENGTH", default_value_t = DEFAULT_MAX_KEY_LENGTH)]
    pub max_key_length: usize,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

impl ScanArgs {
    pub fn to_settings(&self) -> SyncSettings {
        SyncSettings {
            models_dir: self.models_dir.clone(),
            max_key_length: self.max_key_length,
            ..SyncSettings::default()
        }
    }
}

impl Commands {
    /// Execute the command
    pub fn execute(self) -> Result<()> {
        match self {
            Commands::Sync(args) => sync_command(&args),
            Commands::Scan(args) => scan_command(&args),
        }
    }
}
