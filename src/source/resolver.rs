//! Source resolution
//!
//! Turns a [`SourceDescriptor`] into a local, verified bundle directory:
//!
//! - local directories are used in place
//! - local archives are checksum-verified (when a sibling `.sha256` exists) and
//!   extracted into a scratch directory
//! - releases, archive URLs and git refs go through the [`CacheStore`]: a hit
//!   is reused without any network access, a miss is fetched, verified,
//!   validated and populated transactionally

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use crate::archive;
use crate::cache::{CacheEntry, CacheStore, EntryOrigin};
use crate::checksum;
use crate::common::fs::{CopyOptions, copy_dir_recursive, remove_path, strip_vcs_metadata};
use crate::error::{PairError, Result};
use crate::git;
use crate::manifest::{self, Manifest};
use crate::temp::scratch_dir;

use super::descriptor::SourceDescriptor;
use super::download::{Downloader, is_remote_url};

/// Environment variable overriding the release URL template
pub const RELEASE_URL_ENV: &str = "PAIR_KB_RELEASE_URL";

/// Release artifact URL; `{version}` is replaced by the normalized version
pub const DEFAULT_RELEASE_URL: &str =
    "https://github.com/foomakers/pair/releases/download/v{version}/knowledge-base-{version}.zip";

/// Download URL of a release artifact
pub fn release_url(version: &str) -> String {
    let template = std::env::var(RELEASE_URL_ENV)
        .ok()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_RELEASE_URL.to_string());
    template.replace("{version}", version)
}

/// A bundle ready to be applied
#[derive(Debug)]
pub struct ResolvedBundle {
    /// Directory holding `manifest.json` and the registry sources
    pub root: PathBuf,
    pub manifest: Manifest,
    pub descriptor: SourceDescriptor,
    /// Whether the bundle came from an existing cache entry
    pub cache_hit: bool,
    pub cache_entry: Option<CacheEntry>,
    /// Keeps extracted local archives alive as long as the bundle
    _scratch: Option<TempDir>,
}

/// Resolves source descriptors against a cache and a downloader
pub struct SourceResolver {
    cache: CacheStore,
    downloader: Arc<dyn Downloader>,
    offline: bool,
}

impl SourceResolver {
    pub fn new(cache: CacheStore, downloader: Arc<dyn Downloader>) -> Self {
        Self {
            cache,
            downloader,
            offline: false,
        }
    }

    /// Refuse every resolution that would need the network
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Resolve a descriptor to a validated bundle
    pub fn resolve(&self, descriptor: &SourceDescriptor) -> Result<ResolvedBundle> {
        tracing::info!(source = %descriptor, "resolving source");
        match descriptor {
            SourceDescriptor::LocalDirectory { path } => self.resolve_directory(descriptor, path),
            SourceDescriptor::LocalArchive { path } => self.resolve_local_archive(descriptor, path),
            SourceDescriptor::RemoteRelease { version } => {
                let url = release_url(version);
                self.resolve_cached(descriptor, Some(version.as_str()), is_remote_url(&url), |content| {
                    self.populate_from_archive(&url, content, Some(version.as_str()))
                })
            }
            SourceDescriptor::RemoteArchive { url } => {
                self.resolve_cached(descriptor, None, is_remote_url(url), |content| {
                    self.populate_from_archive(url, content, None)
                })
            }
            SourceDescriptor::RemoteGit { url, git_ref } => self.resolve_cached(
                descriptor,
                None,
                !git::url::is_local_url(url),
                |content| populate_from_git(url, git_ref, content),
            ),
        }
    }

    fn resolve_directory(&self, descriptor: &SourceDescriptor, path: &Path) -> Result<ResolvedBundle> {
        if !path.is_dir() {
            return Err(PairError::SourceNotFound {
                path: path.display().to_string(),
            });
        }
        let root = dunce::canonicalize(path).map_err(|e| crate::error::read_failed(path, e))?;
        let manifest = manifest::validate(&root, None)?;
        Ok(ResolvedBundle {
            root,
            manifest,
            descriptor: descriptor.clone(),
            cache_hit: false,
            cache_entry: None,
            _scratch: None,
        })
    }

    fn resolve_local_archive(
        &self,
        descriptor: &SourceDescriptor,
        path: &Path,
    ) -> Result<ResolvedBundle> {
        if !path.is_file() {
            return Err(PairError::SourceNotFound {
                path: path.display().to_string(),
            });
        }
        if !checksum::verify_sibling_if_present(path)? {
            tracing::warn!(
                archive = %path.display(),
                "no checksum file next to the archive, integrity not verified"
            );
        }

        let scratch = scratch_dir("archive")?;
        let extracted = scratch.path().join("bundle");
        archive::extract(path, &extracted)?;
        let root = manifest::find_bundle_root(&extracted)?;
        let manifest = manifest::validate(&root, None)?;

        Ok(ResolvedBundle {
            root,
            manifest,
            descriptor: descriptor.clone(),
            cache_hit: false,
            cache_entry: None,
            _scratch: Some(scratch),
        })
    }

    fn resolve_cached<F>(
        &self,
        descriptor: &SourceDescriptor,
        expected_version: Option<&str>,
        needs_network: bool,
        populate: F,
    ) -> Result<ResolvedBundle>
    where
        F: FnOnce(&Path) -> Result<EntryOrigin>,
    {
        let Some(key) = descriptor.cache_key()? else {
            return Err(PairError::UnsupportedSource {
                input: descriptor.to_string(),
                reason: "source is not cacheable".to_string(),
            });
        };

        if let Some(entry) = self.cache.get(&key)? {
            return self.from_entry(descriptor, entry, expected_version, true);
        }

        if self.offline && needs_network {
            return Err(PairError::OfflineUnavailable {
                source_name: descriptor.to_string(),
            });
        }

        let populated = Cell::new(false);
        let entry = self.cache.put(&key, |content| {
            populated.set(true);
            populate(content)
        })?;
        self.from_entry(descriptor, entry, expected_version, !populated.get())
    }

    fn from_entry(
        &self,
        descriptor: &SourceDescriptor,
        entry: CacheEntry,
        expected_version: Option<&str>,
        cache_hit: bool,
    ) -> Result<ResolvedBundle> {
        if cache_hit {
            tracing::info!(key = %entry.key, "using cached bundle");
        }
        let manifest = manifest::validate(&entry.path, expected_version)?;
        Ok(ResolvedBundle {
            root: entry.path.clone(),
            manifest,
            descriptor: descriptor.clone(),
            cache_hit,
            cache_entry: Some(entry),
            _scratch: None,
        })
    }

    /// Download an archive and its checksum, verify, extract and validate into `content`
    fn populate_from_archive(
        &self,
        url: &str,
        content: &Path,
        expected_version: Option<&str>,
    ) -> Result<EntryOrigin> {
        let scratch = scratch_dir("download")?;
        let archive_path = scratch.path().join("bundle.zip");
        let checksum_path = checksum::sibling_checksum_path(&archive_path);

        self.downloader.download(url, &archive_path)?;
        let checksum_url = format!("{url}.{}", checksum::CHECKSUM_EXTENSION);
        self.downloader.download(&checksum_url, &checksum_path)?;
        checksum::verify_with_file(&archive_path, &checksum_path)?;

        let staging = content.parent().unwrap_or(content).join("extracted");
        archive::extract(&archive_path, &staging)?;
        let root = manifest::find_bundle_root(&staging)?;
        manifest::validate(&root, expected_version)?;
        strip_vcs_metadata(&root)?;

        fs::rename(&root, content).map_err(|e| crate::error::write_failed(content, e))?;
        remove_path(&staging).map_err(|e| crate::error::write_failed(&staging, e))?;

        Ok(EntryOrigin {
            source: Some(url.to_string()),
            ..EntryOrigin::default()
        })
    }
}

/// Clone a git ref and copy its tree, without VCS metadata, into `content`
fn populate_from_git(url: &str, git_ref: &str, content: &Path) -> Result<EntryOrigin> {
    let scratch = scratch_dir("git")?;
    let checkout_dir = scratch.path().join("repo");
    let checkout = git::fetch(url, git_ref, &checkout_dir)?;

    let root = manifest::find_bundle_root(&checkout_dir)?;
    manifest::validate(&root, None)?;
    copy_dir_recursive(&root, content, &CopyOptions::exclude_vcs())
        .map_err(|e| crate::error::write_failed(content, e))?;

    Ok(EntryOrigin {
        source: Some(format!("{url}#{git_ref}")),
        resolved_ref: checkout.resolved_ref,
        commit: Some(checkout.commit),
    })
}
