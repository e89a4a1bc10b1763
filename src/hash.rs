//! BLAKE3 hashing utilities for bundle and backup integrity

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use blake3::Hasher;
use walkdir::WalkDir;

use crate::common::fs::to_forward_slashes;
use crate::error::{Result, read_failed};

/// Hash prefix for BLAKE3 hashes
pub const HASH_PREFIX: &str = "blake3:";

fn hash_reader_into(hasher: &mut Hasher, path: &Path) -> Result<()> {
    let file = File::open(path).map_err(|e| read_failed(path, e))?;
    let mut reader = BufReader::new(file);
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer).map_err(|e| read_failed(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(())
}

/// Calculate BLAKE3 hash of a file
pub fn hash_file(path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    hash_reader_into(&mut hasher, path)?;
    Ok(format!("{HASH_PREFIX}{}", hasher.finalize().to_hex()))
}

/// Calculate BLAKE3 hash of a file or directory tree.
///
/// Directory files are hashed sorted by relative path, each salted with that
/// path, so renames and moves change the digest. A regular file hashes the same
/// as [`hash_file`].
pub fn hash_tree(path: &Path) -> Result<String> {
    if path.is_file() {
        return hash_file(path);
    }
    if !path.is_dir() {
        return Err(read_failed(path, "no such file or directory"));
    }

    let mut hasher = Hasher::new();
    let mut files: Vec<_> = WalkDir::new(path)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .collect();

    files.sort_by_key(|e| e.path().to_path_buf());

    for entry in files {
        let file_path = entry.path();
        let relative_path = file_path.strip_prefix(path).unwrap_or(file_path);
        hasher.update(to_forward_slashes(relative_path).as_bytes());
        hasher.update(b"\0");
        hash_reader_into(&mut hasher, file_path)?;
        hasher.update(b"\0");
    }

    Ok(format!("{HASH_PREFIX}{}", hasher.finalize().to_hex()))
}

/// Verify a hash matches the expected value
pub fn verify_hash(expected: &str, actual: &str) -> bool {
    let normalize = |h: &str| {
        if h.starts_with(HASH_PREFIX) {
            h.to_string()
        } else {
            format!("{HASH_PREFIX}{h}")
        }
    };

    normalize(expected) == normalize(actual)
}
