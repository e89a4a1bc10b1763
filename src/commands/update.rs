//! Update command
//!
//! Replaces the KB of an installed project. The source is resolved before
//! anything is touched. Destinations are then snapshotted; when applying or
//! link rewriting fails the snapshot is restored and the error reports the
//! registries as reverted.

use crate::backup::{BackupGuard, BackupManager};
use crate::cli::UpdateArgs;
use crate::error::{Result, rolled_back};
use crate::state;

use super::helpers::{Context, source_descriptor, success};
use super::install::{apply_and_link, registry_targets, report};

pub fn run(ctx: &Context, args: UpdateArgs) -> Result<()> {
    let config = ctx.registry_config()?;
    let present = state::ensure_installed(&ctx.project, &config)?;
    tracing::debug!(present = ?present, "installed destinations");

    let descriptor = source_descriptor(args.source.as_deref())?;
    println!("Resolving {descriptor}...");
    let bundle = ctx.resolver(args.offline)?.resolve(&descriptor)?;
    if bundle.cache_hit {
        println!("Using cached bundle");
    }

    let manager = BackupManager::new(&ctx.project);
    let guard = BackupGuard::new(manager.clone(), manager.snapshot(&registry_targets(&config))?);
    if let Some(dir) = guard.dir() {
        println!("Backed up current KB to {}", dir.display());
    }

    println!(
        "Updating to {} {}",
        bundle.manifest.name, bundle.manifest.version
    );
    let outcome = match apply_and_link(ctx, &config, &bundle) {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Err(restore) = guard.rollback() {
                tracing::error!("update failed: {e}");
                return Err(restore);
            }
            return Err(rolled_back(
                "Update",
                e,
                "The previous knowledge base was restored; fix the reported problems and run `pair-kb update` again",
            ));
        }
    };
    report(&outcome);

    match guard.commit(args.persist_backup)? {
        Some(kept) => println!("Backup kept at {}", kept.display()),
        None => println!("Backup removed"),
    }
    success(format!(
        "Updated to {} {} ({} registries, {} files)",
        bundle.manifest.name,
        bundle.manifest.version,
        outcome.applied.len(),
        outcome.total_files()
    ));
    Ok(())
}
