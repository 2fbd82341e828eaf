use anyhow::{Context, Result};
use serde::Serialize;
use swapsync_core::{ArtifactScanner, KeyDeriver};
use tracing::debug;

use crate::cli::ScanArgs;

#[derive(Debug, Serialize)]
struct ScannedModel<'a> {
    key: &'a str,
    path: &'a str,
    shortened: bool,
}

pub fn scan_command(args: &ScanArgs) -> Result<()> {
    let settings = args.to_settings();
    settings.validate().context("Invalid scan settings")?;

    let artifacts = ArtifactScanner::from_settings(&settings).scan(&settings.models_dir)?;
    let derived = KeyDeriver::from_settings(&settings).derive_all(&artifacts)?;
    debug!("Derived {} keys", derived.len());

    let models: Vec<ScannedModel<'_>> = derived
        .iter()
        .map(|(artifact, key)| ScannedModel {
            key: key.key.as_str(),
            path: artifact.relative_path(),
            shortened: key.is_shortened(),
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&models)?);
        return Ok(());
    }

    println!("🔍 Scanning: {}", settings.models_dir.display());
    println!("{}", "=".repeat(80));
    if models.is_empty() {
        println!("\n❌ No .{} files found.", settings.normalized_extension());
    } else {
        println!("\n✅ Found {} model file(s):\n", models.len());
        for model in &models {
            println!("   • {}", model.key);
            println!("     📄 {}", model.path);
            if model.shortened {
                println!("     ✂️  key shortened with hash suffix");
            }
        }
    }
    println!("\n{}", "=".repeat(80));
    Ok(())
}
