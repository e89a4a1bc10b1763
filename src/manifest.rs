//! Bundle manifest (manifest.json) parsing and validation
//!
//! Every KB bundle carries a `manifest.json` at its root:
//!
//! ```json
//! {
//!   "name": "kb",
//!   "version": "1.2.0",
//!   "description": "Team knowledge base",
//!   "registries": { "knowledge": "content/knowledge" }
//! }
//! ```
//!
//! `registries` is optional and overrides the configured source sub-path of the
//! named registries.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::fs::{VCS_DIRS, find_symlinks, normalize_relative, to_forward_slashes};
use crate::error::{PairError, Result};

/// Manifest file name at the bundle root
pub const MANIFEST_FILE: &str = "manifest.json";

/// Parsed bundle manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Registry name to bundle sub-path
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub registries: BTreeMap<String, String>,
}

impl Manifest {
    /// Version without a leading `v`
    pub fn normalized_version(&self) -> Result<String> {
        normalize_version(&self.version)
    }

    /// Sub-path override declared for a registry
    pub fn registry_path(&self, registry: &str) -> Option<&str> {
        self.registries.get(registry).map(String::as_str)
    }
}

/// Strip an optional leading `v` and check the rest is a semantic version
pub fn normalize_version(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let bare = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    semver::Version::parse(bare)
        .map(|v| v.to_string())
        .map_err(|e| PairError::UnsupportedSource {
            input: raw.to_string(),
            reason: format!("not a semantic version: {e}"),
        })
}

/// Path of the manifest inside a bundle root
pub fn manifest_path(root: &Path) -> PathBuf {
    root.join(MANIFEST_FILE)
}

/// Locate the bundle root inside an extracted or checked-out tree.
///
/// The root is `dir` itself when it holds a manifest, or its only child
/// directory when the archive wrapped everything in one top-level folder.
/// VCS metadata next to that folder does not count as a child.
pub fn find_bundle_root(dir: &Path) -> Result<PathBuf> {
    if manifest_path(dir).is_file() {
        return Ok(dir.to_path_buf());
    }

    let children: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| crate::error::read_failed(dir, e))?
        .filter_map(std::result::Result::ok)
        .filter(|e| !VCS_DIRS.iter().any(|vcs| e.file_name() == *vcs))
        .map(|e| e.path())
        .collect();

    if let [only] = children.as_slice() {
        if only.is_dir() && manifest_path(only).is_file() {
            return Ok(only.clone());
        }
    }

    Err(PairError::ManifestMissing {
        path: manifest_path(dir).display().to_string(),
    })
}

/// Parse a manifest without structural checks on the bundle
pub fn load(root: &Path) -> Result<Manifest> {
    let path = manifest_path(root);
    if !path.is_file() {
        return Err(PairError::ManifestMissing {
            path: path.display().to_string(),
        });
    }

    let raw = fs::read_to_string(&path).map_err(|e| crate::error::read_failed(&path, e))?;
    serde_json::from_str(&raw).map_err(|e| invalid(&path, e.to_string()))
}

/// Validate the bundle at `root`.
///
/// Checks that the manifest parses, `name` is non-empty, `version` is a
/// semantic version, declared registry sub-paths stay inside the bundle and
/// exist, and, when `expected_version` is given, that the versions agree.
/// A bundle containing symbolic links is rejected.
pub fn validate(root: &Path, expected_version: Option<&str>) -> Result<Manifest> {
    let path = manifest_path(root);
    let manifest = load(root)?;
    reject_symlinks(root)?;

    if manifest.name.trim().is_empty() {
        return Err(invalid(&path, "'name' must be a non-empty string"));
    }

    let version = normalize_version(&manifest.version)
        .map_err(|_| invalid(&path, format!("'{}' is not a valid version", manifest.version)))?;

    for (registry, sub_path) in &manifest.registries {
        let Some(relative) = normalize_relative(Path::new(sub_path)) else {
            return Err(invalid(
                &path,
                format!("registry '{registry}' path '{sub_path}' escapes the bundle"),
            ));
        };
        if !root.join(&relative).exists() {
            return Err(invalid(
                &path,
                format!("registry '{registry}' path '{sub_path}' does not exist"),
            ));
        }
    }

    if let Some(expected) = expected_version {
        let expected = normalize_version(expected)?;
        if expected != version {
            return Err(PairError::ManifestVersionMismatch {
                expected,
                actual: manifest.version.clone(),
            });
        }
    }

    tracing::debug!(name = %manifest.name, version = %version, "manifest valid");
    Ok(manifest)
}

fn reject_symlinks(root: &Path) -> Result<()> {
    let links = find_symlinks(root).map_err(|e| crate::error::read_failed(root, e))?;
    if let Some(first) = links.first() {
        return Err(PairError::UnsafeBundle {
            path: root.display().to_string(),
            reason: format!(
                "contains {} symbolic link(s), first '{}'",
                links.len(),
                to_forward_slashes(first)
            ),
        });
    }
    Ok(())
}

fn invalid(path: &Path, reason: impl Into<String>) -> PairError {
    PairError::ManifestInvalid {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn bundle(manifest: &str) -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(MANIFEST_FILE), manifest).unwrap();
        temp
    }

    #[test]
    fn test_valid_manifest() {
        let temp = bundle(r#"{"name":"kb","version":"1.2.0"}"#);
        let manifest = validate(temp.path(), None).unwrap();
        assert_eq!(manifest.name, "kb");
        assert_eq!(manifest.version, "1.2.0");
        assert!(manifest.registries.is_empty());
    }

    #[test]
    fn test_missing_manifest() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            validate(temp.path(), None).unwrap_err(),
            PairError::ManifestMissing { .. }
        ));
    }

    #[test]
    fn test_malformed_json() {
        let temp = bundle("{not json");
        assert!(matches!(
            validate(temp.path(), None).unwrap_err(),
            PairError::ManifestInvalid { .. }
        ));
    }

    #[test]
    fn test_empty_name_and_bad_version() {
        let temp = bundle(r#"{"name":"  ","version":"1.2.0"}"#);
        assert!(validate(temp.path(), None).is_err());

        let temp = bundle(r#"{"name":"kb","version":"latest"}"#);
        let err = validate(temp.path(), None).unwrap_err();
        assert!(err.to_string().contains("latest"));
    }

    #[test]
    fn test_expected_version() {
        let temp = bundle(r#"{"name":"kb","version":"v1.2.0"}"#);
        assert!(validate(temp.path(), Some("1.2.0")).is_ok());
        assert!(validate(temp.path(), Some("v1.2.0")).is_ok());
        assert!(matches!(
            validate(temp.path(), Some("1.3.0")).unwrap_err(),
            PairError::ManifestVersionMismatch { .. }
        ));
    }

    #[test]
    fn test_declared_registry_paths() {
        let temp = bundle(
            r#"{"name":"kb","version":"1.0.0","registries":{"knowledge":"content/knowledge"}}"#,
        );
        assert!(validate(temp.path(), None).is_err());

        fs::create_dir_all(temp.path().join("content/knowledge")).unwrap();
        let manifest = validate(temp.path(), None).unwrap();
        assert_eq!(manifest.registry_path("knowledge"), Some("content/knowledge"));

        let escaping = bundle(r#"{"name":"kb","version":"1.0.0","registries":{"x":"../x"}}"#);
        assert!(
            validate(escaping.path(), None)
                .unwrap_err()
                .to_string()
                .contains("escapes")
        );
    }

    #[test]
    fn test_normalize_version() {
        assert_eq!(normalize_version("v1.2.0").unwrap(), "1.2.0");
        assert_eq!(normalize_version("1.2.0-rc.1").unwrap(), "1.2.0-rc.1");
        assert!(normalize_version("1.2").is_err());
        assert!(normalize_version("../1.2.0").is_err());
    }

    #[test]
    fn test_find_bundle_root_single_folder() {
        let temp = TempDir::new().unwrap();
        let inner = temp.path().join("knowledge-base-1.2.0");
        fs::create_dir_all(&inner).unwrap();
        fs::write(inner.join(MANIFEST_FILE), "{}").unwrap();
        assert_eq!(find_bundle_root(temp.path()).unwrap(), inner);

        fs::write(temp.path().join("stray.txt"), "x").unwrap();
        assert!(find_bundle_root(temp.path()).is_err());
    }

    #[test]
    fn test_find_bundle_root_ignores_vcs_metadata() {
        let temp = TempDir::new().unwrap();
        let inner = temp.path().join("kb");
        fs::create_dir_all(&inner).unwrap();
        fs::create_dir_all(temp.path().join(".git/objects")).unwrap();
        fs::write(inner.join(MANIFEST_FILE), "{}").unwrap();
        assert_eq!(find_bundle_root(temp.path()).unwrap(), inner);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_rejected() {
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), "secret").unwrap();

        let temp = bundle(r#"{"name":"kb","version":"1.0.0"}"#);
        fs::create_dir_all(temp.path().join("knowledge")).unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("secret.txt"),
            temp.path().join("knowledge/leak.md"),
        )
        .unwrap();

        let err = validate(temp.path(), None).unwrap_err();
        assert!(matches!(err, PairError::UnsafeBundle { .. }));
        assert!(err.to_string().contains("knowledge/leak.md"));
    }
}
