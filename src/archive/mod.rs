//! Bounded, all-or-nothing ZIP extraction
//!
//! Every entry is inspected before anything is written: entry count, declared
//! sizes and entry names are checked against [`ExtractLimits`]. While writing,
//! actual bytes are capped as well, so an entry whose header understates its
//! size still cannot exceed the limits.
//!
//! Content is written into a hidden sibling of the destination and renamed onto
//! it only after every entry succeeded.

pub mod pack;

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::error::{PairError, Result};

const STAGING_PREFIX: &str = ".extract-";
const S_IFMT: u32 = 0o170_000;
const S_IFLNK: u32 = 0o120_000;

/// Upper bounds applied to an archive before and during extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractLimits {
    pub max_entries: usize,
    pub max_total_bytes: u64,
    pub max_entry_bytes: u64,
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self {
            max_entries: 20_000,
            max_total_bytes: 1024 * 1024 * 1024,
            max_entry_bytes: 256 * 1024 * 1024,
        }
    }
}

/// Summary of a finished extraction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    pub entries: usize,
    pub files: usize,
    pub bytes: u64,
}

/// One entry that passed inspection
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub index: usize,
    pub path: PathBuf,
    pub is_dir: bool,
    pub declared_size: u64,
}

fn unsafe_archive(archive: &Path, reason: impl Into<String>) -> PairError {
    PairError::UnsafeArchive {
        path: archive.display().to_string(),
        reason: reason.into(),
    }
}

fn extraction_failed(archive: &Path, reason: impl Into<String>) -> PairError {
    PairError::ExtractionFailed {
        path: archive.display().to_string(),
        reason: reason.into(),
    }
}

fn open(archive: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(archive).map_err(|e| extraction_failed(archive, e.to_string()))?;
    ZipArchive::new(file).map_err(|e| extraction_failed(archive, format!("not a valid ZIP archive: {e}")))
}

/// Check structure and declared sizes without writing anything
pub fn inspect(archive: &Path, limits: &ExtractLimits) -> Result<Vec<ArchiveEntry>> {
    let mut zip = open(archive)?;
    inspect_open(&mut zip, archive, limits)
}

fn inspect_open(
    zip: &mut ZipArchive<File>,
    archive: &Path,
    limits: &ExtractLimits,
) -> Result<Vec<ArchiveEntry>> {
    if zip.len() > limits.max_entries {
        return Err(unsafe_archive(
            archive,
            format!(
                "{} entries exceed the limit of {}",
                zip.len(),
                limits.max_entries
            ),
        ));
    }

    let mut entries = Vec::with_capacity(zip.len());
    let mut declared_total: u64 = 0;
    for index in 0..zip.len() {
        let entry = zip
            .by_index_raw(index)
            .map_err(|e| extraction_failed(archive, format!("entry {index}: {e}")))?;
        let name = entry.name().to_string();

        let Some(path) = entry.enclosed_name() else {
            return Err(unsafe_archive(archive, format!("entry '{name}' has an unsafe path")));
        };
        if entry
            .unix_mode()
            .is_some_and(|mode| mode & S_IFMT == S_IFLNK)
        {
            return Err(unsafe_archive(archive, format!("entry '{name}' is a symbolic link")));
        }

        let declared_size = entry.size();
        if declared_size > limits.max_entry_bytes {
            return Err(unsafe_archive(
                archive,
                format!(
                    "entry '{name}' declares {declared_size} bytes, above the per-entry limit of {}",
                    limits.max_entry_bytes
                ),
            ));
        }
        declared_total = declared_total.saturating_add(declared_size);
        if declared_total > limits.max_total_bytes {
            return Err(unsafe_archive(
                archive,
                format!(
                    "declared uncompressed size exceeds the limit of {} bytes",
                    limits.max_total_bytes
                ),
            ));
        }

        entries.push(ArchiveEntry {
            index,
            path,
            is_dir: entry.is_dir(),
            declared_size,
        });
    }
    Ok(entries)
}

/// Extract with the default limits
pub fn extract(archive: &Path, dest: &Path) -> Result<ExtractionReport> {
    extract_with_limits(archive, dest, &ExtractLimits::default())
}

/// Extract `archive` into `dest`, which must not exist yet.
///
/// On any error `dest` is left absent and the staging directory is removed.
pub fn extract_with_limits(
    archive: &Path,
    dest: &Path,
    limits: &ExtractLimits,
) -> Result<ExtractionReport> {
    if dest.exists() {
        return Err(extraction_failed(
            archive,
            format!("destination {} already exists", dest.display()),
        ));
    }

    let mut zip = open(archive)?;
    let entries = inspect_open(&mut zip, archive, limits)?;

    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| crate::error::write_failed(&parent, e))?;
    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(&parent)
        .map_err(|e| crate::error::write_failed(&parent, e))?;

    let mut report = ExtractionReport {
        entries: entries.len(),
        ..ExtractionReport::default()
    };

    for item in &entries {
        let out_path = staging.path().join(&item.path);
        if item.is_dir {
            fs::create_dir_all(&out_path).map_err(|e| crate::error::write_failed(&out_path, e))?;
            continue;
        }
        if let Some(dir) = out_path.parent() {
            fs::create_dir_all(dir).map_err(|e| crate::error::write_failed(dir, e))?;
        }

        let entry = zip
            .by_index(item.index)
            .map_err(|e| extraction_failed(archive, format!("entry '{}': {e}", item.path.display())))?;
        let mut out =
            File::create(&out_path).map_err(|e| crate::error::write_failed(&out_path, e))?;
        let written = io::copy(&mut entry.take(limits.max_entry_bytes + 1), &mut out)
            .map_err(|e| extraction_failed(archive, format!("entry '{}': {e}", item.path.display())))?;

        if written > limits.max_entry_bytes {
            return Err(unsafe_archive(
                archive,
                format!(
                    "entry '{}' expands beyond the per-entry limit of {} bytes",
                    item.path.display(),
                    limits.max_entry_bytes
                ),
            ));
        }
        report.bytes += written;
        if report.bytes > limits.max_total_bytes {
            return Err(unsafe_archive(
                archive,
                format!(
                    "archive expands beyond the limit of {} bytes",
                    limits.max_total_bytes
                ),
            ));
        }
        report.files += 1;
    }

    fs::rename(staging.path(), dest).map_err(|e| {
        extraction_failed(
            archive,
            format!("failed to move extracted content to {}: {e}", dest.display()),
        )
    })?;

    tracing::debug!(
        archive = %archive.display(),
        files = report.files,
        bytes = report.bytes,
        "extracted archive"
    );
    Ok(report)
}

/// Read one entry fully into memory, bounded by the per-entry limit
pub fn read_entry(archive: &Path, name: &str, limits: &ExtractLimits) -> Result<Option<Vec<u8>>> {
    let mut zip = open(archive)?;
    let Ok(entry) = zip.by_name(name) else {
        return Ok(None);
    };
    let mut buf = Vec::new();
    entry
        .take(limits.max_entry_bytes + 1)
        .read_to_end(&mut buf)
        .map_err(|e| extraction_failed(archive, format!("entry '{name}': {e}")))?;
    if buf.len() as u64 > limits.max_entry_bytes {
        return Err(unsafe_archive(archive, format!("entry '{name}' is too large")));
    }
    Ok(Some(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default();
        for (name, body) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(body).unwrap();
        }
        zip.finish().unwrap();
    }

    fn leftovers(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(STAGING_PREFIX))
            .count()
    }

    #[test]
    fn test_extract_basic() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("kb.zip");
        write_zip(
            &archive,
            &[
                ("manifest.json", br#"{"name":"kb","version":"1.0.0"}"#),
                ("knowledge/a.md", b"# A"),
            ],
        );

        let dest = temp.path().join("out");
        let report = extract(&archive, &dest).unwrap();
        assert_eq!(report.files, 2);
        assert_eq!(fs::read_to_string(dest.join("knowledge/a.md")).unwrap(), "# A");
        assert_eq!(leftovers(temp.path()), 0);
    }

    #[test]
    fn test_existing_destination_is_refused() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("kb.zip");
        write_zip(&archive, &[("a.md", b"a")]);
        let dest = temp.path().join("out");
        fs::create_dir_all(&dest).unwrap();
        assert!(extract(&archive, &dest).is_err());
    }

    #[test]
    fn test_not_a_zip() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("kb.zip");
        fs::write(&archive, b"definitely not a zip").unwrap();
        let err = extract(&archive, &temp.path().join("out")).unwrap_err();
        assert!(matches!(err, PairError::ExtractionFailed { .. }));
        assert!(!temp.path().join("out").exists());
    }

    #[test]
    fn test_entry_count_limit() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("kb.zip");
        write_zip(&archive, &[("a", b"1"), ("b", b"2"), ("c", b"3")]);
        let limits = ExtractLimits {
            max_entries: 2,
            ..ExtractLimits::default()
        };
        let err = extract_with_limits(&archive, &temp.path().join("out"), &limits).unwrap_err();
        assert!(matches!(err, PairError::UnsafeArchive { .. }));
        assert!(!temp.path().join("out").exists());
    }

    #[test]
    fn test_size_limits_leave_nothing_behind() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("kb.zip");
        let big = vec![b'x'; 4096];
        write_zip(&archive, &[("small.md", b"ok"), ("big.bin", &big)]);

        let per_entry = ExtractLimits {
            max_entry_bytes: 1024,
            ..ExtractLimits::default()
        };
        assert!(matches!(
            extract_with_limits(&archive, &temp.path().join("out"), &per_entry).unwrap_err(),
            PairError::UnsafeArchive { .. }
        ));

        let total = ExtractLimits {
            max_total_bytes: 2048,
            ..ExtractLimits::default()
        };
        assert!(extract_with_limits(&archive, &temp.path().join("out"), &total).is_err());
        assert!(!temp.path().join("out").exists());
        assert_eq!(leftovers(temp.path()), 0);
    }

    #[test]
    fn test_traversal_entry_rejected() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("evil.zip");
        write_zip(&archive, &[("ok.md", b"ok"), ("../evil.md", b"evil")]);
        let err = extract(&archive, &temp.path().join("out")).unwrap_err();
        assert!(matches!(err, PairError::UnsafeArchive { .. }));
        assert!(!temp.path().join("evil.md").exists());
    }

    #[test]
    fn test_read_entry() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("kb.zip");
        write_zip(&archive, &[("manifest.json", b"{}")]);
        let limits = ExtractLimits::default();
        assert_eq!(
            read_entry(&archive, "manifest.json", &limits).unwrap(),
            Some(b"{}".to_vec())
        );
        assert_eq!(read_entry(&archive, "missing", &limits).unwrap(), None);
    }
}
