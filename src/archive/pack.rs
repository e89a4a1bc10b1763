//! Deterministic bundle packaging
//!
//! Files are added sorted by relative path with a fixed timestamp and fixed
//! permissions, so packing the same tree twice yields byte-identical archives
//! and therefore identical checksums.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::checksum::{sibling_checksum_path, write_sibling};
use crate::common::fs::{VCS_DIRS, to_forward_slashes};
use crate::error::{PairError, Result};

/// Result of packaging a bundle
#[derive(Debug, Clone)]
pub struct PackReport {
    pub archive: PathBuf,
    pub checksum_file: PathBuf,
    pub digest: String,
    pub files: usize,
}

fn pack_failed(path: &Path, reason: impl Into<String>) -> PairError {
    PairError::PackageFailed {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

/// File name of a packaged bundle
pub fn archive_name(name: &str, version: &str) -> String {
    format!("{name}-{version}.zip")
}

/// Pack `root` into `output` and write `<output>.sha256` next to it
pub fn pack(root: &Path, output: &Path) -> Result<PackReport> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            !(e.file_type().is_dir() && VCS_DIRS.iter().any(|vcs| *vcs == name))
        })
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| p != output)
        .collect();
    files.sort();

    let out_dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&out_dir).map_err(|e| pack_failed(output, e.to_string()))?;

    let staged = tempfile::NamedTempFile::new_in(&out_dir)
        .map_err(|e| pack_failed(output, e.to_string()))?;
    let mut zip = ZipWriter::new(staged.reopen().map_err(|e| pack_failed(output, e.to_string()))?);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);

    for path in &files {
        let relative = path.strip_prefix(root).unwrap_or(path);
        let name = to_forward_slashes(relative);
        zip.start_file(name.as_str(), options)
            .map_err(|e| pack_failed(output, format!("{name}: {e}")))?;
        let mut source = File::open(path).map_err(|e| crate::error::read_failed(path, e))?;
        io::copy(&mut source, &mut zip).map_err(|e| pack_failed(output, format!("{name}: {e}")))?;
    }
    zip.finish().map_err(|e| pack_failed(output, e.to_string()))?;

    staged
        .persist(output)
        .map_err(|e| pack_failed(output, e.error.to_string()))?;
    let digest = write_sibling(output)?;

    tracing::info!(archive = %output.display(), files = files.len(), "packaged bundle");
    Ok(PackReport {
        archive: output.to_path_buf(),
        checksum_file: sibling_checksum_path(output),
        digest,
        files: files.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::extract;
    use crate::checksum::verify_sibling_if_present;
    use tempfile::TempDir;

    fn sample_bundle(root: &Path) {
        fs::create_dir_all(root.join("knowledge/guides")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join(".git/HEAD"), "ref: refs/heads/main").unwrap();
        fs::write(root.join("manifest.json"), r#"{"name":"kb","version":"1.0.0"}"#).unwrap();
        fs::write(root.join("knowledge/guides/a.md"), "# A").unwrap();
    }

    #[test]
    fn test_pack_is_deterministic_and_verifiable() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("bundle");
        sample_bundle(&root);

        let first = pack(&root, &temp.path().join("out/one.zip")).unwrap();
        let second = pack(&root, &temp.path().join("out/two.zip")).unwrap();
        assert_eq!(first.digest, second.digest);
        assert_eq!(first.files, 2);
        assert!(verify_sibling_if_present(&first.archive).unwrap());
    }

    #[test]
    fn test_pack_round_trips_without_vcs() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("bundle");
        sample_bundle(&root);
        let report = pack(&root, &temp.path().join("kb-1.0.0.zip")).unwrap();

        let out = temp.path().join("extracted");
        extract(&report.archive, &out).unwrap();
        assert!(out.join("manifest.json").is_file());
        assert!(out.join("knowledge/guides/a.md").is_file());
        assert!(!out.join(".git").exists());
    }

    #[test]
    fn test_archive_name() {
        assert_eq!(archive_name("kb", "1.2.0"), "kb-1.2.0.zip");
    }
}
