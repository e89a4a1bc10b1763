//! update-link command

use crate::cli::UpdateLinkArgs;
use crate::error::Result;
use crate::installer::links::LinkUpdater;

use super::helpers::{Context, success};

pub fn run(ctx: &Context, args: UpdateLinkArgs) -> Result<()> {
    let config = ctx.registry_config()?;
    let report = LinkUpdater::from_config(&ctx.project, &config, None).run(args.dry_run)?;

    for change in &report.changes {
        println!(
            "  {}: {} -> {}",
            change.file.display(),
            change.from,
            change.to
        );
    }

    if args.dry_run {
        println!(
            "Would rewrite {} link(s) in {} of {} file(s)",
            report.changes.len(),
            report.files_changed,
            report.files_scanned
        );
    } else {
        success(format!(
            "Rewrote {} link(s) in {} of {} file(s)",
            report.changes.len(),
            report.files_changed,
            report.files_scanned
        ));
    }
    Ok(())
}
