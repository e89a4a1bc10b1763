//! SHA-256 checksums for bundle artifacts
//!
//! Every distributable archive travels with a sibling `<archive>.sha256` file.
//! Its first whitespace-separated token is the lowercase hex digest, so
//! `sha256sum` output (`<digest>  <filename>`) is accepted as-is.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{PairError, Result, read_failed};

/// Extension of the sibling checksum file
pub const CHECKSUM_EXTENSION: &str = "sha256";

/// Buffer size for reading files during checksum calculation (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Calculate the SHA-256 checksum of a file as lowercase hex.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| read_failed(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(|e| read_failed(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Path of the sibling checksum file for an artifact (`kb.zip` -> `kb.zip.sha256`)
pub fn sibling_checksum_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.as_os_str().to_owned();
    name.push(".");
    name.push(CHECKSUM_EXTENSION);
    PathBuf::from(name)
}

/// Extract the digest token from checksum file contents.
///
/// Returns the raw first token even when it is not a valid digest; validity is
/// judged by [`verify`], which treats a malformed digest as a mismatch.
pub fn parse_checksum_file(contents: &str) -> String {
    contents
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn is_sha256_hex(digest: &str) -> bool {
    digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit())
}

/// Verify that a file matches an expected digest.
pub fn verify(path: &Path, expected: &str) -> Result<()> {
    let expected = expected.trim().to_ascii_lowercase();
    let actual = sha256_file(path)?;
    if !is_sha256_hex(&expected) || actual != expected {
        return Err(PairError::ChecksumMismatch {
            file: path.display().to_string(),
            expected,
            actual,
        });
    }
    tracing::debug!(file = %path.display(), "checksum verified");
    Ok(())
}

/// Verify a file against the digest stored in a checksum file.
pub fn verify_with_file(path: &Path, checksum_file: &Path) -> Result<()> {
    // A corrupted, non-UTF-8 checksum file decodes to a malformed digest
    let bytes = fs::read(checksum_file).map_err(|e| read_failed(checksum_file, e))?;
    verify(path, &parse_checksum_file(&String::from_utf8_lossy(&bytes)))
}

/// Verify a file against its sibling checksum file when one exists.
///
/// Returns whether a checksum file was found and verified.
pub fn verify_sibling_if_present(path: &Path) -> Result<bool> {
    let sibling = sibling_checksum_path(path);
    if !sibling.is_file() {
        return Ok(false);
    }
    verify_with_file(path, &sibling)?;
    Ok(true)
}

/// Write `<digest>  <filename>` next to an artifact, returning the digest
pub fn write_sibling(path: &Path) -> Result<String> {
    let digest = sha256_file(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let sibling = sibling_checksum_path(path);
    fs::write(&sibling, format!("{digest}  {file_name}\n"))
        .map_err(|e| crate::error::write_failed(&sibling, e))?;
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HELLO_WORLD: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_sha256_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("test.txt");
        fs::write(&path, "hello world").unwrap();
        assert_eq!(sha256_file(&path).unwrap(), HELLO_WORLD);
    }

    #[test]
    fn test_sibling_checksum_path() {
        assert_eq!(
            sibling_checksum_path(Path::new("/tmp/kb-1.0.0.zip")),
            PathBuf::from("/tmp/kb-1.0.0.zip.sha256")
        );
    }

    #[test]
    fn test_parse_sha256sum_format() {
        let line = format!("{}  kb.zip\n", HELLO_WORLD.to_uppercase());
        assert_eq!(parse_checksum_file(&line), HELLO_WORLD);
        assert_eq!(parse_checksum_file("   "), "");
    }

    #[test]
    fn test_verify_mismatch() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.txt");
        fs::write(&path, "hello world!").unwrap();
        let err = verify(&path, HELLO_WORLD).unwrap_err();
        assert!(matches!(err, PairError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_verify_malformed_digest_is_mismatch() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.txt");
        fs::write(&path, "hello world").unwrap();
        let err = verify(&path, "not-a-digest").unwrap_err();
        assert!(matches!(err, PairError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_write_then_verify_sibling() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("kb.zip");
        fs::write(&path, "archive bytes").unwrap();
        assert!(!verify_sibling_if_present(&path).unwrap());

        write_sibling(&path).unwrap();
        assert!(verify_sibling_if_present(&path).unwrap());

        fs::write(&path, "archive bytez").unwrap();
        assert!(verify_sibling_if_present(&path).is_err());
    }

    #[test]
    fn test_corrupted_checksum_file_is_mismatch() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("kb.zip");
        fs::write(&path, "archive bytes").unwrap();
        write_sibling(&path).unwrap();

        let sibling = sibling_checksum_path(&path);
        let mut bytes = fs::read(&sibling).unwrap();
        bytes[0] = 0xff;
        fs::write(&sibling, bytes).unwrap();

        let err = verify_sibling_if_present(&path).unwrap_err();
        assert!(matches!(err, PairError::ChecksumMismatch { .. }));
    }
}
