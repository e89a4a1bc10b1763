//! Registry application
//!
//! This module handles:
//! - Resolving each registry's bundle sub-path (a manifest override wins)
//! - Copying file-or-directory sources to their project destinations
//! - Honouring the registry behavior (`mirror` replaces, `add` copies over)
//! - Collecting per-registry failures into one error

pub mod links;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::common::fs::{CopyOptions, copy_path, remove_path};
use crate::config::{Behavior, RegistryConfig, RegistryEntry};
use crate::error::{PairError, Result};
use crate::manifest::{MANIFEST_FILE, Manifest};
use crate::progress::ApplyProgress;

/// One registry written to the project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedRegistry {
    pub name: String,
    /// Sub-path inside the bundle (empty for the bundle root)
    pub source: PathBuf,
    /// Destination relative to the project root
    pub target: PathBuf,
    pub behavior: Behavior,
    pub files: u64,
}

/// Outcome of a successful [`Applier::apply`]
#[derive(Debug, Clone, Default)]
pub struct AppliedTargets {
    pub applied: Vec<AppliedRegistry>,
    /// Registries whose source is absent from the bundle
    pub skipped: Vec<String>,
}

impl AppliedTargets {
    pub fn total_files(&self) -> u64 {
        self.applied.iter().map(|r| r.files).sum()
    }
}

/// A configured registry as reported by `install --list-targets`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetInfo {
    pub name: String,
    pub source: String,
    pub target: String,
    pub behavior: Behavior,
    pub description: Option<String>,
}

impl fmt::Display for TargetInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<12} {} -> {} ({})",
            self.name, self.source, self.target, self.behavior
        )?;
        if let Some(description) = &self.description {
            write!(f, "  {description}")?;
        }
        Ok(())
    }
}

/// Report the configured registries without touching the filesystem
pub fn list_targets(config: &RegistryConfig) -> Vec<TargetInfo> {
    config
        .registries()
        .iter()
        .map(|entry| TargetInfo {
            name: entry.name.clone(),
            source: entry.source.clone(),
            target: entry.target.clone(),
            behavior: entry.behavior,
            description: entry.description.clone(),
        })
        .collect()
}

/// Bundle sub-path of a registry, preferring the manifest's declaration
pub fn registry_source(entry: &RegistryEntry, manifest: Option<&Manifest>) -> Option<PathBuf> {
    match manifest.and_then(|m| m.registry_path(&entry.name)) {
        Some(declared) => crate::common::fs::normalize_relative(Path::new(declared)),
        None => entry.source_path(),
    }
}

/// Applies a bundle's registries to a project
pub struct Applier<'a> {
    project: &'a Path,
    config: &'a RegistryConfig,
    show_progress: bool,
}

impl<'a> Applier<'a> {
    pub fn new(project: &'a Path, config: &'a RegistryConfig) -> Self {
        Self {
            project,
            config,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Apply every registry of the bundle rooted at `root`.
    ///
    /// All registries are attempted; when any fails the error names the
    /// registries that were written and those that were not.
    pub fn apply(&self, root: &Path, manifest: &Manifest) -> Result<AppliedTargets> {
        let progress = ApplyProgress::new(self.show_progress, self.config.len() as u64);
        let mut outcome = AppliedTargets::default();
        let mut failed: Vec<String> = Vec::new();

        for entry in self.config.registries() {
            progress.start_registry(&entry.name);
            match self.apply_one(root, manifest, entry) {
                Ok(Some(applied)) => {
                    tracing::info!(
                        registry = %applied.name,
                        target = %applied.target.display(),
                        files = applied.files,
                        "registry applied"
                    );
                    outcome.applied.push(applied);
                }
                Ok(None) => outcome.skipped.push(entry.name.clone()),
                Err(e) => {
                    tracing::warn!(registry = %entry.name, "registry failed: {e}");
                    failed.push(format!("{}: {e}", entry.name));
                }
            }
            progress.inc();
        }

        if failed.is_empty() {
            progress.finish();
            return Ok(outcome);
        }
        progress.abandon();
        Err(PairError::ApplyFailed {
            succeeded: outcome
                .applied
                .iter()
                .map(|r| r.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            failed: failed.join("; "),
        })
    }

    fn apply_one(
        &self,
        root: &Path,
        manifest: &Manifest,
        entry: &RegistryEntry,
    ) -> Result<Option<AppliedRegistry>> {
        let write_failed = |path: &Path, reason: String| PairError::RegistryWriteFailed {
            registry: entry.name.clone(),
            path: path.display().to_string(),
            reason,
        };

        let source_rel = registry_source(entry, Some(manifest)).ok_or_else(|| {
            write_failed(Path::new(&entry.source), "source escapes the bundle".into())
        })?;
        let target_rel = entry
            .target_path()
            .ok_or_else(|| write_failed(Path::new(&entry.target), "invalid target".into()))?;

        let source = root.join(&source_rel);
        if !source.exists() {
            tracing::warn!(
                registry = %entry.name,
                source = %source_rel.display(),
                "registry source not in bundle, skipping"
            );
            return Ok(None);
        }

        let mut options = CopyOptions::exclude_vcs();
        if source_rel.as_os_str().is_empty() {
            options = options.also_at_root(MANIFEST_FILE);
        }

        let dest = self.project.join(&target_rel);
        let replace = match entry.behavior {
            Behavior::Mirror => true,
            // Kinds differ: a file cannot be merged into a directory
            Behavior::Add => dest.exists() && dest.is_dir() != source.is_dir(),
        };
        if replace {
            remove_path(&dest).map_err(|e| write_failed(&dest, e.to_string()))?;
        }

        let files =
            copy_path(&source, &dest, &options).map_err(|e| write_failed(&dest, e.to_string()))?;

        Ok(Some(AppliedRegistry {
            name: entry.name.clone(),
            source: source_rel,
            target: target_rel,
            behavior: entry.behavior,
            files,
        }))
    }
}
