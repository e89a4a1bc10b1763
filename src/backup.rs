//! Backups of registry destinations taken before an update
//!
//! ## Usage
//!
//! ```ignore
//! let manager = BackupManager::new(project);
//! let guard = BackupGuard::new(manager.clone(), manager.snapshot(&targets)?);
//!
//! // Overwrite destinations...
//!
//! // On success, discard (or keep with `true`):
//! guard.commit(false)?;
//!
//! // On error the guard restores the snapshot when dropped.
//! ```
//!
//! A snapshot lives in `<project>/.pair-kb-backups/<timestamp>/` with one
//! entry per registry and a `backup.json` describing which destinations
//! existed. Every copy is verified against the BLAKE3 digest of its original
//! before the snapshot is handed out.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::fs::{CopyOptions, copy_path, remove_path};
use crate::error::{PairError, Result};
use crate::hash::{hash_tree, verify_hash};

/// Directory holding all snapshots of a project
pub const BACKUP_DIR: &str = ".pair-kb-backups";

const BACKUP_MANIFEST: &str = "backup.json";

/// One destination captured by a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub registry: String,
    /// Destination relative to the project root
    pub target: PathBuf,
    pub existed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// A verified snapshot on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupHandle {
    #[serde(skip)]
    pub dir: PathBuf,
    pub created_at: DateTime<Utc>,
    pub records: Vec<BackupRecord>,
}

/// Takes, restores and removes snapshots for one project
#[derive(Debug, Clone)]
pub struct BackupManager {
    project: PathBuf,
}

fn backup_failed(reason: impl Into<String>) -> PairError {
    PairError::BackupFailed {
        reason: reason.into(),
    }
}

impl BackupManager {
    pub fn new(project: impl Into<PathBuf>) -> Self {
        Self {
            project: project.into(),
        }
    }

    fn root(&self) -> PathBuf {
        self.project.join(BACKUP_DIR)
    }

    fn unique_dir(&self, now: DateTime<Utc>) -> PathBuf {
        let stamp = now.format("%Y%m%dT%H%M%S%.3fZ").to_string();
        let mut dir = self.root().join(&stamp);
        let mut n = 1;
        while dir.exists() {
            dir = self.root().join(format!("{stamp}-{n}"));
            n += 1;
        }
        dir
    }

    /// Snapshot `targets` (registry name, destination relative to the project).
    ///
    /// Absent destinations are recorded so a restore can remove whatever an
    /// update created there.
    pub fn snapshot(&self, targets: &[(String, PathBuf)]) -> Result<BackupHandle> {
        let created_at = Utc::now();
        let dir = self.unique_dir(created_at);
        fs::create_dir_all(&dir)
            .map_err(|e| backup_failed(format!("cannot create {}: {e}", dir.display())))?;

        let mut handle = BackupHandle {
            dir,
            created_at,
            records: Vec::with_capacity(targets.len()),
        };
        match self.capture(&mut handle, targets) {
            Ok(()) => {
                tracing::info!(backup = %handle.dir.display(), "snapshot taken");
                Ok(handle)
            }
            Err(e) => {
                let _ = self.discard(handle);
                Err(e)
            }
        }
    }

    fn capture(&self, handle: &mut BackupHandle, targets: &[(String, PathBuf)]) -> Result<()> {
        for (registry, target) in targets {
            let source = self.project.join(target);
            if source.symlink_metadata().is_err() {
                handle.records.push(BackupRecord {
                    registry: registry.clone(),
                    target: target.clone(),
                    existed: false,
                    digest: None,
                });
                continue;
            }

            let copy = handle.dir.join(registry);
            copy_path(&source, &copy, &CopyOptions::default())
                .map_err(|e| backup_failed(format!("copying {}: {e}", source.display())))?;

            let digest = hash_tree(&source)?;
            let copied = hash_tree(&copy)?;
            if !verify_hash(&digest, &copied) {
                return Err(backup_failed(format!(
                    "copy of {} does not match the original",
                    source.display()
                )));
            }
            tracing::debug!(registry, digest = %digest, "backed up");

            handle.records.push(BackupRecord {
                registry: registry.clone(),
                target: target.clone(),
                existed: true,
                digest: Some(digest),
            });
        }

        let manifest = handle.dir.join(BACKUP_MANIFEST);
        let json = serde_json::to_string_pretty(handle)?;
        fs::write(&manifest, json).map_err(|e| crate::error::write_failed(&manifest, e))
    }

    /// Put every captured destination back as it was
    pub fn restore(&self, handle: &BackupHandle) -> Result<()> {
        let failed = |reason: String| PairError::RestoreFailed {
            path: handle.dir.display().to_string(),
            reason,
        };

        for record in &handle.records {
            let dest = self.project.join(&record.target);
            remove_path(&dest).map_err(|e| failed(format!("{}: {e}", dest.display())))?;
            if !record.existed {
                continue;
            }

            let copy = handle.dir.join(&record.registry);
            copy_path(&copy, &dest, &CopyOptions::default())
                .map_err(|e| failed(format!("{}: {e}", dest.display())))?;
            if let Some(expected) = &record.digest {
                let actual = hash_tree(&dest)?;
                if !verify_hash(expected, &actual) {
                    return Err(failed(format!(
                        "{} does not match its backup",
                        dest.display()
                    )));
                }
            }
        }
        tracing::info!(backup = %handle.dir.display(), "restored from backup");
        Ok(())
    }

    /// Delete a snapshot, and the backup root once it is empty
    pub fn discard(&self, handle: BackupHandle) -> Result<()> {
        remove_path(&handle.dir).map_err(|e| {
            backup_failed(format!("cannot remove {}: {e}", handle.dir.display()))
        })?;
        let root = self.root();
        let is_empty = fs::read_dir(&root)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if is_empty {
            let _ = fs::remove_dir(&root);
        }
        Ok(())
    }

    /// Keep a snapshot, returning where it lives
    pub fn persist(&self, handle: BackupHandle) -> PathBuf {
        tracing::info!(backup = %handle.dir.display(), "backup kept");
        handle.dir
    }

    /// Load a snapshot written earlier
    pub fn open(&self, dir: &Path) -> Result<BackupHandle> {
        let manifest = dir.join(BACKUP_MANIFEST);
        let raw =
            fs::read_to_string(&manifest).map_err(|e| crate::error::read_failed(&manifest, e))?;
        let mut handle: BackupHandle = serde_json::from_str(&raw)
            .map_err(|e| backup_failed(format!("{}: {e}", manifest.display())))?;
        handle.dir = dir.to_path_buf();
        Ok(handle)
    }
}

/// Restores its snapshot when dropped without [`BackupGuard::commit`]
#[derive(Debug)]
pub struct BackupGuard {
    manager: BackupManager,
    handle: Option<BackupHandle>,
}

impl BackupGuard {
    pub fn new(manager: BackupManager, handle: BackupHandle) -> Self {
        Self {
            manager,
            handle: Some(handle),
        }
    }

    /// Directory of the guarded snapshot
    pub fn dir(&self) -> Option<&Path> {
        self.handle.as_ref().map(|h| h.dir.as_path())
    }

    /// Finish successfully: keep the snapshot when `persist`, delete it otherwise
    pub fn commit(mut self, persist: bool) -> Result<Option<PathBuf>> {
        let Some(handle) = self.handle.take() else {
            return Ok(None);
        };
        if persist {
            Ok(Some(self.manager.persist(handle)))
        } else {
            self.manager.discard(handle)?;
            Ok(None)
        }
    }
}

impl BackupGuard {
    /// Undo the guarded changes now, reporting a failed restore to the caller.
    ///
    /// The snapshot is kept when restoring fails.
    pub fn rollback(mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        self.manager.restore(&handle)?;
        if let Err(e) = self.manager.discard(handle) {
            tracing::warn!("restored, but the backup could not be removed: {e}");
        }
        Ok(())
    }
}

impl Drop for BackupGuard {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        match self.manager.restore(&handle) {
            Ok(()) => {
                if let Err(e) = self.manager.discard(handle) {
                    tracing::warn!("restored, but the backup could not be removed: {e}");
                }
            }
            Err(e) => {
                tracing::error!(backup = %handle.dir.display(), "restore failed, backup kept: {e}");
            }
        }
    }
}
