//! Per-key advisory locks for cache population

use std::fs;
use std::path::{Path, PathBuf};

use fslock::LockFile;

use crate::error::{PairError, Result};

use super::CacheKey;

/// RAII guard for one cache key
///
/// Acquires an advisory file lock on creation and releases it on drop, so two
/// installer processes never populate the same key at the same time.
#[derive(Debug)]
pub struct KeyLock {
    lock: LockFile,
    path: PathBuf,
}

impl KeyLock {
    /// Block until the lock for `key` is held
    pub fn acquire(locks_dir: &Path, key: &CacheKey) -> Result<Self> {
        let mut guard = Self::open(locks_dir, key)?;
        guard
            .lock
            .lock()
            .map_err(|e| lock_error(key, format!("Failed to lock {}: {e}", guard.path.display())))?;
        tracing::trace!(key = %key, "cache key locked");
        Ok(guard)
    }

    /// Try to take the lock without blocking
    pub fn try_acquire(locks_dir: &Path, key: &CacheKey) -> Result<Option<Self>> {
        let mut guard = Self::open(locks_dir, key)?;
        let acquired = guard
            .lock
            .try_lock()
            .map_err(|e| lock_error(key, e.to_string()))?;
        Ok(acquired.then_some(guard))
    }

    fn open(locks_dir: &Path, key: &CacheKey) -> Result<Self> {
        fs::create_dir_all(locks_dir).map_err(|e| lock_error(key, e.to_string()))?;
        let path = locks_dir.join(format!("{key}.lock"));
        let lock = LockFile::open(&path)
            .map_err(|e| lock_error(key, format!("Failed to open lock file: {e}")))?;
        Ok(Self { lock, path })
    }
}

fn lock_error(key: &CacheKey, reason: String) -> PairError {
    PairError::CacheLockFailed {
        key: key.to_string(),
        reason,
    }
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        // The lock file itself stays: removing it would race with waiters
        let _ = self.lock.unlock();
    }
}
