//! Container restart after a committed change
//!
//! The sync itself is finished by the time a restart is attempted, so a
//! failed restart is logged and never turns into a failed run.

use anyhow::{Context, Result, bail};
use std::process::Command;
use tracing::{info, warn};

pub trait ServiceRestarter {
    fn restart(&self, container: &str) -> Result<()>;

    /// Restart and log the result. Returns whether the restart succeeded.
    fn restart_logged(&self, container: &str) -> bool {
        if container.is_empty() {
            warn!("No container name specified. Skipping restart.");
            return false;
        }
        info!("--- Restarting Docker Container ---");
        match self.restart(container) {
            Ok(()) => {
                info!(
                    "Successfully sent restart command to container '{}'.",
                    container
                );
                true
            }
            Err(e) => {
                warn!("Could not restart container '{}': {:#}", container, e);
                false
            }
        }
    }
}

/// Restarts containers through the `docker` command line client
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl DockerCli {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }
}

impl ServiceRestarter for DockerCli {
    fn restart(&self, container: &str) -> Result<()> {
        let output = Command::new(&self.program)
            .args(["restart", container])
            .output()
            .with_context(|| format!("Failed to execute: {} restart {}", self.program, container))?;

        if !output.status.success() {
            bail!(
                "{} restart exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}
