//! Cache statistics

use crate::common::fs::tree_stats;
use crate::error::Result;

use super::CacheStore;

/// Cache statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Number of populated entries
    pub entries: usize,
    /// Number of files across all entries
    pub files: u64,
    /// Total size in bytes
    pub total_size: u64,
}

impl CacheStats {
    /// Format total size as human-readable string
    pub fn formatted_size(&self) -> String {
        format_size(self.total_size)
    }
}

/// Format a byte count as a human-readable string
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    let size = bytes as f64;
    if size < 1024.0 {
        format!("{bytes} B")
    } else if size < 1024.0 * 1024.0 {
        format!("{:.1} KB", size / 1024.0)
    } else if size < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.1} MB", size / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", size / (1024.0 * 1024.0 * 1024.0))
    }
}

impl CacheStore {
    /// Compute statistics over all populated entries
    pub fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::default();
        for entry in self.list()? {
            let (files, bytes) = tree_stats(&entry.path)?;
            stats.entries += 1;
            stats.files += files;
            stats.total_size += bytes;
        }
        Ok(stats)
    }
}
