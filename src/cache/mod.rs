//! Bundle caching system for pair-kb
//!
//! Resolved remote bundles are kept on disk so a second install or update of
//! the same release (or git ref) needs no network access.
//!
//! ## Cache Structure
//!
//! ```text
//! ~/.cache/pair-kb/
//! ├── .locks/<key>.lock     # advisory lock per key
//! ├── .tmp-XXXXXX/          # population in progress (never a hit)
//! ├── 1.2.0/                # release key
//! │   ├── entry.json
//! │   └── bundle/
//! └── git-<sha256>/         # git key (url#ref)
//!     ├── entry.json
//!     └── bundle/
//! ```
//!
//! A key directory only appears through an atomic rename of a fully populated
//! staging directory, so a failed or interrupted population never leaves a key
//! that looks populated.

mod key;
mod lock;
mod stats;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::fs::remove_path;
use crate::error::{PairError, Result, cache_failed};

pub use key::CacheKey;
pub use lock::KeyLock;
pub use stats::{CacheStats, format_size};

/// Default cache directory name under user's cache directory
const CACHE_DIR: &str = "pair-kb";

/// Environment variable overriding the cache root
pub const CACHE_DIR_ENV: &str = "PAIR_KB_CACHE_DIR";

/// Subdirectory holding bundle content inside an entry
pub const CONTENT_DIR: &str = "bundle";

/// Entry metadata file inside an entry
pub const ENTRY_FILE: &str = "entry.json";

const LOCKS_DIR: &str = ".locks";
const STAGING_PREFIX: &str = ".tmp-";

/// Where a cache entry came from, recorded by the populating resolver
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryOrigin {
    /// Human-readable source description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Branch or tag a git ref resolved to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_ref: Option<String>,
    /// Commit a git ref resolved to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

/// A populated cache entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    /// Absolute path of the cached bundle content
    #[serde(skip)]
    pub path: PathBuf,
    pub populated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub origin: EntryOrigin,
}

/// On-disk keyed store of resolved bundles
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Create a store rooted at `root` (created lazily on first write)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open the store at the default location.
    ///
    /// Uses the platform's standard cache location (e.g. XDG on Linux,
    /// Library/Caches on macOS) with a `pair-kb` subdirectory. Can be overridden
    /// with the `PAIR_KB_CACHE_DIR` environment variable.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(default_cache_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_dir(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    fn locks_dir(&self) -> PathBuf {
        self.root.join(LOCKS_DIR)
    }

    /// Look up a populated entry
    pub fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let dir = self.entry_dir(key);
        let content = dir.join(CONTENT_DIR);
        let meta = dir.join(ENTRY_FILE);
        if !content.is_dir() || !meta.is_file() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&meta).map_err(|e| crate::error::read_failed(&meta, e))?;
        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(mut entry) => {
                entry.path = content;
                tracing::debug!(key = %key, "cache hit");
                Ok(Some(entry))
            }
            Err(e) => {
                tracing::warn!(key = %key, "ignoring unreadable cache entry: {e}");
                Ok(None)
            }
        }
    }

    /// Populate `key` transactionally.
    ///
    /// `populate` receives the (not yet existing) content directory inside a
    /// private staging area and must create it. Only when it succeeds is the
    /// staging area renamed onto the key; otherwise it is discarded and the key
    /// stays absent. If a concurrent writer populated the key while this call
    /// waited for the lock, that entry is returned and `populate` is not run.
    pub fn put<F>(&self, key: &CacheKey, populate: F) -> Result<CacheEntry>
    where
        F: FnOnce(&Path) -> Result<EntryOrigin>,
    {
        fs::create_dir_all(&self.root).map_err(|e| {
            cache_failed(format!(
                "Failed to create cache directory {}: {e}",
                self.root.display()
            ))
        })?;

        let _lock = KeyLock::acquire(&self.locks_dir(), key)?;

        if let Some(entry) = self.get(key)? {
            tracing::debug!(key = %key, "cache populated by a concurrent writer");
            return Ok(entry);
        }

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.root)
            .map_err(|e| cache_failed(format!("Failed to create staging directory: {e}")))?;
        let staged_content = staging.path().join(CONTENT_DIR);

        tracing::debug!(key = %key, staging = %staging.path().display(), "populating cache entry");
        let origin = populate(&staged_content)?;

        if !staged_content.is_dir() {
            return Err(cache_failed(format!(
                "Population of '{key}' produced no bundle content"
            )));
        }

        let mut entry = CacheEntry {
            key: key.to_string(),
            path: PathBuf::new(),
            populated_at: Utc::now(),
            origin,
        };
        let meta = staging.path().join(ENTRY_FILE);
        let json = serde_json::to_string_pretty(&entry)?;
        fs::write(&meta, json).map_err(|e| crate::error::write_failed(&meta, e))?;

        let final_dir = self.entry_dir(key);
        // A directory without valid metadata is debris from an older layout
        remove_path(&final_dir)
            .map_err(|e| cache_failed(format!("Failed to clear {}: {e}", final_dir.display())))?;
        fs::rename(staging.path(), &final_dir).map_err(|e| {
            cache_failed(format!(
                "Failed to move staged entry into {}: {e}",
                final_dir.display()
            ))
        })?;

        entry.path = final_dir.join(CONTENT_DIR);
        tracing::info!(key = %key, "cached bundle");
        Ok(entry)
    }

    /// List populated entries sorted by key
    pub fn list(&self) -> Result<Vec<CacheEntry>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&self.root)
            .map_err(|e| cache_failed(format!("Failed to read cache directory: {e}")))?
        {
            let dir_entry =
                dir_entry.map_err(|e| cache_failed(format!("Failed to read entry: {e}")))?;
            let name = dir_entry.file_name().to_string_lossy().to_string();
            let Ok(key) = CacheKey::parse(&name) else {
                continue;
            };
            if let Some(entry) = self.get(&key)? {
                entries.push(entry);
            }
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    /// Remove one entry
    pub fn remove(&self, key: &CacheKey) -> Result<()> {
        let dir = self.entry_dir(key);
        if !dir.exists() {
            return Err(PairError::CacheEntryNotFound {
                key: key.to_string(),
            });
        }
        let _lock = KeyLock::acquire(&self.locks_dir(), key)?;
        remove_path(&dir).map_err(|e| cache_failed(format!("Failed to remove '{key}': {e}")))
    }

    /// Remove every entry, staging leftover and lock file
    pub fn clear(&self) -> Result<()> {
        remove_path(&self.root).map_err(|e| cache_failed(format!("Failed to clear cache: {e}")))
    }
}

/// Get the default cache directory path
pub fn default_cache_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }

    let base = dirs::cache_dir()
        .ok_or_else(|| cache_failed("Could not determine cache directory"))?;

    Ok(base.join(CACHE_DIR))
}
