use std::path::Path;
use swapsync_core::{MergeReport, SyncOutcome};

pub fn print_report(config: &Path, outcome: &SyncOutcome, restarted: bool) {
    println!("📝 Config: {}", config.display());
    println!("{}", "=".repeat(80));

    let report = outcome.report();
    print_sections(report);

    match outcome {
        SyncOutcome::NoOp { .. } => {
            println!("\n✅ No changes needed. Configuration is already up to date.");
        }
        SyncOutcome::Changed { receipt: None, .. } => {
            println!("\n🧪 Dry run: {}. Nothing was written.", report.summary());
        }
        SyncOutcome::Changed {
            receipt: Some(receipt),
            ..
        } => {
            println!("\n✅ Saved: {}", report.summary());
            if let Some(backup) = &receipt.backup {
                println!("   💾 Backup: {}", backup.display());
            }
            if restarted {
                println!("   🔄 Container restarted");
            }
        }
    }

    println!("\n{}", "=".repeat(80));
}

fn print_sections(report: &MergeReport) {
    print_keys("➕ Added", &report.added);

    if !report.audited.is_empty() {
        println!("\n🔧 Updated ({}):", report.audited.len());
        for entry in &report.audited {
            println!("   • {} (+{})", entry.key, entry.added_fields.join(", "));
        }
    }

    if !report.migrated.is_empty() {
        println!("\n🔀 Migrated ({}):", report.migrated.len());
        for entry in &report.migrated {
            println!("   • {} -> {}", entry.from, entry.to);
        }
    }

    print_keys("➖ Removed", &report.pruned);
    print_keys("⚠️  Stale (use --prune to remove)", &report.stale);
    print_keys("⚠️  Malformed (left untouched)", &report.malformed);
}

fn print_keys(title: &str, keys: &[String]) {
    if keys.is_empty() {
        return;
    }
    println!("\n{} ({}):", title, keys.len());
    for key in keys {
        println!("   • {}", key);
    }
}
