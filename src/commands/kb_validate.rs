//! kb-validate command

use std::path::Path;

use crate::cli::KbValidateArgs;
use crate::config::RegistryConfig;
use crate::error::{PairError, Result};
use crate::installer::registry_source;
use crate::manifest::{self, Manifest};

use super::helpers::{Context, bundle_dir, success, warning};

pub fn run(ctx: &Context, args: KbValidateArgs) -> Result<()> {
    let root = bundle_dir(args.path)?;
    let manifest = manifest::validate(&root, None)?;
    let config = ctx.registry_config()?;

    let missing = missing_registries(&root, &manifest, &config)?;
    for name in &missing {
        warning(format!("registry '{name}' has no content in the bundle"));
    }
    success(format!(
        "{} {} is valid ({} of {} registries present)",
        manifest.name,
        manifest.version,
        config.len() - missing.len(),
        config.len()
    ));
    Ok(())
}

/// Configured registries whose source is absent from the bundle.
///
/// A bundle providing none of them cannot install anything and is invalid.
pub fn missing_registries(
    root: &Path,
    manifest: &Manifest,
    config: &RegistryConfig,
) -> Result<Vec<String>> {
    let missing: Vec<String> = config
        .registries()
        .iter()
        .filter(|entry| {
            registry_source(entry, Some(manifest)).is_none_or(|source| !root.join(source).exists())
        })
        .map(|entry| entry.name.clone())
        .collect();

    if missing.len() == config.len() {
        return Err(PairError::ManifestInvalid {
            path: manifest::manifest_path(root).display().to_string(),
            reason: format!(
                "bundle provides none of the configured registries ({})",
                missing.join(", ")
            ),
        });
    }
    Ok(missing)
}
