//! One sync run: scan, merge, commit
//!
//! A real run holds the [`RunLock`] from before the document is read until
//! after it is written, so two runs can never merge against the same
//! snapshot. A dry run only checks that no lock is held.

use crate::config::SyncSettings;
use crate::document::ConfigDocument;
use crate::error::Result;
use crate::merge::{MergeEngine, MergeOutcome, MergeReport};
use crate::persist::{CommitReceipt, PersistenceManager, RunLock};
use crate::scanner::ArtifactScanner;
use crate::types::ArtifactSet;
use tracing::{info, warn};

/// How a run ended, for the caller to map onto output and exit codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The document already matches the artifacts; nothing was written
    NoOp { report: MergeReport },
    /// The document needs changes. `receipt` is `None` for a dry run.
    Changed {
        report: MergeReport,
        receipt: Option<CommitReceipt>,
    },
}

impl SyncOutcome {
    pub fn report(&self) -> &MergeReport {
        match self {
            SyncOutcome::NoOp { report } | SyncOutcome::Changed { report, .. } => report,
        }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, SyncOutcome::Changed { .. })
    }

    pub fn committed(&self) -> bool {
        matches!(
            self,
            SyncOutcome::Changed {
                receipt: Some(_),
                ..
            }
        )
    }

    /// Only a committed change warrants restarting the service
    pub fn restart_needed(&self) -> bool {
        self.committed()
    }
}

#[derive(Debug, Clone)]
pub struct SyncEngine {
    settings: SyncSettings,
    scanner: ArtifactScanner,
    merger: MergeEngine,
}

impl SyncEngine {
    pub fn new(settings: SyncSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            scanner: ArtifactScanner::from_settings(&settings),
            merger: MergeEngine::from_settings(&settings),
            settings,
        })
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn merger(&self) -> &MergeEngine {
        &self.merger
    }

    pub fn scan(&self) -> Result<ArtifactSet> {
        self.scanner.scan(&self.settings.models_dir)
    }

    /// Scan, load and merge without touching any file.
    pub fn plan(&self) -> Result<MergeOutcome> {
        info!("--- Syncing with Models Directory ---");
        let artifacts = self.scan()?;
        let current = ConfigDocument::load(&self.settings.config_path)?;
        self.merger.merge(&current, &artifacts, self.settings.prune)
    }

    pub fn run(&self) -> Result<SyncOutcome> {
        let lock_path = self.settings.lock_path();
        let lock = if self.settings.dry_run {
            RunLock::ensure_free(&lock_path)?;
            warn!("DRY RUN MODE IS ACTIVE. No files will be changed.");
            None
        } else {
            Some(RunLock::acquire(&lock_path)?)
        };

        if self.settings.prune {
            info!("Prune mode is active. Stale entries will be removed.");
        }

        let MergeOutcome { document, report } = self.plan()?;

        if !report.has_changes() {
            info!("--- No changes needed. Configuration is already up to date. ---");
            return Ok(SyncOutcome::NoOp { report });
        }

        info!("Summary: {}", report.summary());

        let receipt = match &lock {
            Some(lock) => {
                info!("--- Saving Changes ---");
                let manager = PersistenceManager::from_settings(&self.settings);
                Some(manager.commit(&document, lock)?)
            }
            None => {
                info!(
                    "DRY RUN: Would save changes to '{}'.",
                    self.settings.config_path.display()
                );
                None
            }
        };

        if let Some(lock) = lock {
            if let Err(e) = lock.release() {
                warn!("{e}");
            }
        }

        Ok(SyncOutcome::Changed { report, receipt })
    }
}

/// Run one sync with `settings`
pub fn run(settings: SyncSettings) -> Result<SyncOutcome> {
    SyncEngine::new(settings)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        settings: SyncSettings,
    }

    fn fixture(models: &[&str]) -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let models_dir = temp_dir.path().join("models");
        fs::create_dir_all(&models_dir).unwrap();
        for model in models {
            add_model(&models_dir, model);
        }
        let settings = SyncSettings::new(models_dir, temp_dir.path().join("config.yaml"));
        Fixture {
            _temp_dir: temp_dir,
            settings,
        }
    }

    fn add_model(models_dir: &Path, relative: &str) {
        let path = models_dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"GGUF").unwrap();
    }

    #[test]
    fn test_first_run_populates_document() {
        let fx = fixture(&["a/model.gguf"]);
        let outcome = run(fx.settings.clone()).unwrap();

        assert!(outcome.committed());
        assert!(outcome.restart_needed());
        assert_eq!(outcome.report().added, vec!["a--model"]);

        let doc = ConfigDocument::load(&fx.settings.config_path).unwrap();
        assert_eq!(doc.keys(), vec!["a--model"]);
        assert!(!fx.settings.lock_path().exists());
    }

    #[test]
    fn test_second_run_is_noop_and_byte_identical() {
        let fx = fixture(&["a/model.gguf", "b/other.gguf"]);
        run(fx.settings.clone()).unwrap();
        let before = fs::read(&fx.settings.config_path).unwrap();

        let outcome = run(fx.settings.clone()).unwrap();
        assert!(matches!(outcome, SyncOutcome::NoOp { .. }));
        assert!(!outcome.restart_needed());
        assert_eq!(fs::read(&fx.settings.config_path).unwrap(), before);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let fx = fixture(&["m.gguf"]);
        let outcome = run(fx.settings.clone().with_dry_run(true)).unwrap();

        assert!(outcome.is_changed());
        assert!(!outcome.committed());
        assert!(!outcome.restart_needed());
        assert!(!fx.settings.config_path.exists());
        assert!(!fx.settings.lock_path().exists());
    }

    #[test]
    fn test_held_lock_fails_without_touching_files() {
        let fx = fixture(&["m.gguf"]);
        fs::write(&fx.settings.config_path, "models: {}\n").unwrap();
        fs::write(fx.settings.lock_path(), "pid=1").unwrap();

        let err = run(fx.settings.clone()).unwrap_err();
        assert!(matches!(err, Error::LockHeldError { .. }));
        assert_eq!(
            fs::read_to_string(&fx.settings.config_path).unwrap(),
            "models: {}\n"
        );
        assert!(fx.settings.lock_path().exists());

        let err = run(fx.settings.clone().with_dry_run(true)).unwrap_err();
        assert!(matches!(err, Error::LockHeldError { .. }));
    }

    #[test]
    fn test_errors_release_lock_and_leave_document() {
        let fx = fixture(&["a--b/c.gguf", "a/b--c.gguf"]);
        fs::write(&fx.settings.config_path, "models: {}\n").unwrap();

        let err = run(fx.settings.clone()).unwrap_err();
        assert!(matches!(err, Error::KeyCollisionError { .. }));
        assert!(!fx.settings.lock_path().exists());
        assert_eq!(
            fs::read_to_string(&fx.settings.config_path).unwrap(),
            "models: {}\n"
        );
    }

    #[test]
    fn test_corrupt_document_is_parse_error() {
        let fx = fixture(&["m.gguf"]);
        fs::write(&fx.settings.config_path, "models: [broken").unwrap();

        let err = run(fx.settings.clone()).unwrap_err();
        assert!(matches!(err, Error::ParseError { .. }));
        assert_eq!(
            fs::read_to_string(&fx.settings.config_path).unwrap(),
            "models: [broken"
        );
        assert!(!fx.settings.lock_path().exists());
    }

    #[test]
    fn test_missing_models_dir_is_scan_error() {
        let fx = fixture(&[]);
        let mut settings = fx.settings.clone();
        settings.models_dir = settings.models_dir.join("nope");

        assert!(matches!(run(settings), Err(Error::ScanError { .. })));
    }

    #[test]
    fn test_invalid_settings_rejected_before_lock() {
        let fx = fixture(&["m.gguf"]);
        let err = run(fx.settings.clone().with_max_key_length(4)).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
        assert!(!fx.settings.lock_path().exists());
    }

    #[test]
    fn test_prune_run_removes_stale_entry() {
        let fx = fixture(&["a/model.gguf"]);
        run(fx.settings.clone()).unwrap();
        fs::remove_file(fx.settings.models_dir.join("a/model.gguf")).unwrap();

        let kept = run(fx.settings.clone()).unwrap();
        assert!(matches!(kept, SyncOutcome::NoOp { .. }));
        assert_eq!(kept.report().stale, vec!["a--model"]);

        let pruned = run(fx.settings.clone().with_prune(true)).unwrap();
        assert_eq!(pruned.report().pruned, vec!["a--model"]);
        assert!(ConfigDocument::load(&fx.settings.config_path).unwrap().is_empty());
    }
}
