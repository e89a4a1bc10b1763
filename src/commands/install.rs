//! Install command
//!
//! Installs a KB bundle into a project that has none yet:
//! gate on NotInstalled, resolve the source, apply every registry and rewrite
//! links. If applying fails, destinations created so far are removed again so
//! the project stays NotInstalled and the install can be retried.

use std::path::PathBuf;

use crate::backup::{BackupGuard, BackupManager};
use crate::cli::InstallArgs;
use crate::config::RegistryConfig;
use crate::error::{Result, rolled_back};
use crate::installer::links::LinkUpdater;
use crate::installer::{Applier, AppliedTargets, list_targets};
use crate::source::ResolvedBundle;
use crate::state;

use super::helpers::{Context, source_descriptor, success, warning};

pub fn run(ctx: &Context, args: InstallArgs) -> Result<()> {
    let config = ctx.registry_config()?;

    if args.list_targets {
        println!("Registries ({}):", config.origin());
        for target in list_targets(&config) {
            println!("  {target}");
        }
        return Ok(());
    }

    state::ensure_not_installed(&ctx.project, &config)?;

    let descriptor = source_descriptor(args.source.as_deref())?;
    println!("Resolving {descriptor}...");
    let bundle = ctx.resolver(args.offline)?.resolve(&descriptor)?;
    println!(
        "Installing {} {} into {}",
        bundle.manifest.name,
        bundle.manifest.version,
        ctx.project.display()
    );

    let outcome = apply_bundle(ctx, &config, &bundle)?;
    report(&outcome);
    success(format!(
        "Installed {} {} ({} registries, {} files)",
        bundle.manifest.name,
        bundle.manifest.version,
        outcome.applied.len(),
        outcome.total_files()
    ));
    Ok(())
}

/// Apply registries and rewrite links, undoing everything on failure
fn apply_bundle(
    ctx: &Context,
    config: &RegistryConfig,
    bundle: &ResolvedBundle,
) -> Result<AppliedTargets> {
    let manager = BackupManager::new(&ctx.project);
    let guard = BackupGuard::new(manager.clone(), manager.snapshot(&registry_targets(config))?);

    match apply_and_link(ctx, config, bundle) {
        Ok(outcome) => {
            guard.commit(false)?;
            Ok(outcome)
        }
        Err(e) => {
            if let Err(restore) = guard.rollback() {
                tracing::error!("install failed: {e}");
                return Err(restore);
            }
            Err(rolled_back(
                "Install",
                e,
                "Nothing was installed; fix the reported problems and run `pair-kb install` again",
            ))
        }
    }
}

/// Copy every registry, then rewrite links in the installed content
pub(crate) fn apply_and_link(
    ctx: &Context,
    config: &RegistryConfig,
    bundle: &ResolvedBundle,
) -> Result<AppliedTargets> {
    let outcome = Applier::new(&ctx.project, config)
        .with_progress(ctx.show_progress)
        .apply(&bundle.root, &bundle.manifest)?;
    let links = LinkUpdater::from_config(&ctx.project, config, Some(&bundle.manifest)).run(false)?;
    if !links.changes.is_empty() {
        println!(
            "Rewrote {} link(s) in {} file(s)",
            links.changes.len(),
            links.files_changed
        );
    }
    Ok(outcome)
}

/// Registry names with their project destinations
pub(crate) fn registry_targets(config: &RegistryConfig) -> Vec<(String, PathBuf)> {
    config
        .registries()
        .iter()
        .filter_map(|entry| Some((entry.name.clone(), entry.target_path()?)))
        .collect()
}

pub(crate) fn report(outcome: &AppliedTargets) {
    for applied in &outcome.applied {
        println!(
            "  {:<12} -> {} ({} files, {})",
            applied.name,
            applied.target.display(),
            applied.files,
            applied.behavior
        );
    }
    for skipped in &outcome.skipped {
        warning(format!("registry '{skipped}' has no content in the bundle, skipped"));
    }
}
