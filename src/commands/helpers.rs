//! Command helper utilities

use std::path::{Path, PathBuf};
use std::sync::Arc;

use console::style;
use tempfile::TempDir;

use crate::archive::{self, ExtractionReport};
use crate::cache::CacheStore;
use crate::config::RegistryConfig;
use crate::error::{PairError, Result};
use crate::manifest::find_bundle_root;
use crate::source::{HttpDownloader, SourceDescriptor, SourceResolver};
use crate::temp::scratch_dir;

/// Resolve project path from optional argument
///
/// If a project path is provided, use it. Otherwise, resolve to the current
/// directory. The directory must exist.
pub fn resolve_project_path(project: Option<PathBuf>) -> Result<PathBuf> {
    let path = match project {
        Some(path) => path,
        None => std::env::current_dir().map_err(|e| PairError::IoError {
            message: format!("Failed to get current directory: {e}"),
        })?,
    };
    if !path.is_dir() {
        return Err(PairError::IoError {
            message: format!("Project directory does not exist: {}", path.display()),
        });
    }
    dunce::canonicalize(&path).map_err(|e| crate::error::read_failed(&path, e))
}

/// State shared by the commands that work on a project
#[derive(Debug, Clone)]
pub struct Context {
    pub project: PathBuf,
    pub config_path: Option<PathBuf>,
    pub show_progress: bool,
}

impl Context {
    pub fn new(project: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<Self> {
        Ok(Self {
            project: resolve_project_path(project)?,
            config_path,
            show_progress: console::Term::stderr().is_term(),
        })
    }

    pub fn registry_config(&self) -> Result<RegistryConfig> {
        RegistryConfig::for_project(&self.project, self.config_path.as_deref())
    }

    /// Resolver over the default cache and the HTTP downloader
    pub fn resolver(&self, offline: bool) -> Result<SourceResolver> {
        let downloader = HttpDownloader::new()?.with_progress(self.show_progress);
        Ok(SourceResolver::new(CacheStore::open_default()?, Arc::new(downloader)).offline(offline))
    }
}

/// Parse `--source`, defaulting to the release matching this CLI
pub fn source_descriptor(source: Option<&str>) -> Result<SourceDescriptor> {
    match source {
        Some(raw) => SourceDescriptor::parse(raw),
        None => Ok(SourceDescriptor::default_release()),
    }
}

/// Bundle directory argument, defaulting to the current directory
pub fn bundle_dir(path: Option<PathBuf>) -> Result<PathBuf> {
    let path = match path {
        Some(path) => path,
        None => std::env::current_dir().map_err(|e| PairError::IoError {
            message: format!("Failed to get current directory: {e}"),
        })?,
    };
    if !path.exists() {
        return Err(PairError::SourceNotFound {
            path: path.display().to_string(),
        });
    }
    dunce::canonicalize(&path).map_err(|e| crate::error::read_failed(&path, e))
}

/// Whether a bundle path names an archive rather than a directory
pub fn is_archive(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

/// A bundle directory, extracted into scratch space when given as an archive
#[derive(Debug)]
pub struct OpenedBundle {
    pub root: PathBuf,
    /// Extraction summary for archives
    pub extraction: Option<ExtractionReport>,
    _scratch: Option<TempDir>,
}

/// Open a bundle archive or directory for inspection
pub fn open_bundle(path: &Path) -> Result<OpenedBundle> {
    if !is_archive(path) {
        return Ok(OpenedBundle {
            root: path.to_path_buf(),
            extraction: None,
            _scratch: None,
        });
    }

    let scratch = scratch_dir("inspect")?;
    let dest = scratch.path().join("bundle");
    let report = archive::extract(path, &dest)?;
    Ok(OpenedBundle {
        root: find_bundle_root(&dest)?,
        extraction: Some(report),
        _scratch: Some(scratch),
    })
}

pub fn success(message: impl std::fmt::Display) {
    println!("{} {message}", style("✓").green().bold());
}

pub fn warning(message: impl std::fmt::Display) {
    eprintln!("{} {message}", style("warning:").yellow().bold());
}
