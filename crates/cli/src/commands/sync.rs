use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use swapsync_core::{MergeReport, SyncEngine, SyncOutcome};
use tracing::info;

use crate::cli::SyncArgs;
use crate::display::print_report;
use crate::restart::{DockerCli, ServiceRestarter};

#[derive(Debug, Serialize)]
struct SyncSummary<'a> {
    status: &'static str,
    config: &'a PathBuf,
    backup: Option<&'a PathBuf>,
    restarted: bool,
    report: &'a MergeReport,
}

pub fn sync_command(args: &SyncArgs) -> Result<()> {
    let settings = args.to_settings();
    let engine = SyncEngine::new(settings).context("Invalid sync settings")?;
    let outcome = engine.run()?;

    let restarted = if outcome.restart_needed() {
        restart_after_commit(args)
    } else {
        if outcome.is_changed() && !args.no_restart && !args.container.is_empty() {
            info!("DRY RUN: Would restart Docker container '{}'.", args.container);
        }
        false
    };

    if args.json {
        let summary = SyncSummary {
            status: status_label(&outcome),
            config: &args.config,
            backup: match &outcome {
                SyncOutcome::Changed {
                    receipt: Some(receipt),
                    ..
                } => receipt.backup.as_ref(),
                _ => None,
            },
            restarted,
            report: outcome.report(),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_report(&args.config, &outcome, restarted);
    }

    Ok(())
}

fn restart_after_commit(args: &SyncArgs) -> bool {
    if args.no_restart {
        info!("--no-restart flag detected. Skipping Docker restart.");
        return false;
    }
    let restarter = DockerCli::new(&args.docker_bin);
    restarter.restart_logged(&args.container)
}

fn status_label(outcome: &SyncOutcome) -> &'static str {
    match outcome {
        SyncOutcome::NoOp { .. } => "unchanged",
        SyncOutcome::Changed { receipt: None, .. } => "dry-run",
        SyncOutcome::Changed { .. } => "changed",
    }
}
