//! Scratch directories
//!
//! Temp dirs are never created under the current working directory, even when
//! TMPDIR is relative (e.g. `TMPDIR=tmp`).

use std::env;
use std::path::PathBuf;

use tempfile::TempDir;

use crate::error::{PairError, Result};

/// Returns an absolute directory suitable for creating temporary directories.
pub fn temp_dir_base() -> PathBuf {
    let t = env::temp_dir();
    if t.is_absolute() {
        return t;
    }
    #[cfg(windows)]
    {
        env::var("TEMP")
            .or_else(|_| env::var("TMP"))
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Windows\\Temp"))
    }
    #[cfg(not(windows))]
    {
        PathBuf::from("/tmp")
    }
}

/// Create a scratch directory removed when the returned guard drops
pub fn scratch_dir(purpose: &str) -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix(&format!("pair-kb-{purpose}-"))
        .tempdir_in(temp_dir_base())
        .map_err(|e| PairError::IoError {
            message: format!("Failed to create temporary directory: {e}"),
        })
}
