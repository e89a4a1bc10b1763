//! Error types and handling for pair-kb
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//!
//! Variants are grouped by the stage that raises them:
//! source resolution, checksum, archive, manifest, install state,
//! registry application, configuration, cache, backup and file system.

use miette::Diagnostic;
use thiserror::Error;


/// Main error type for pair-kb operations
#[derive(Error, Diagnostic, Debug)]
pub enum PairError {
    // Source resolution errors
    #[error("Source not found: {path}")]
    #[diagnostic(
        code(pair_kb::source::not_found),
        help("Check that the path exists and points to a KB bundle directory or .zip archive")
    )]
    SourceNotFound { path: String },

    #[error("Unsupported source '{input}': {reason}")]
    #[diagnostic(
        code(pair_kb::source::unsupported),
        help(
            "Valid formats: ./dir, ./bundle.zip, 1.2.0, release:1.2.0, https://host/kb.zip, git+https://host/repo.git#ref"
        )
    )]
    UnsupportedSource { input: String, reason: String },

    #[error("Download failed: {url}: {reason}")]
    #[diagnostic(
        code(pair_kb::source::download_failed),
        help("Check your network connection, or install from a local bundle with --source")
    )]
    DownloadFailed { url: String, reason: String },

    #[error("Source '{source_name}' requires network access, which is disabled by --offline")]
    #[diagnostic(
        code(pair_kb::source::offline),
        help("Drop --offline, or use a local directory or archive with --source")
    )]
    OfflineUnavailable { source_name: String },

    #[error("Refusing to use bundle {path}: {reason}")]
    #[diagnostic(
        code(pair_kb::source::unsafe_bundle),
        help("Bundles may not contain symbolic links; replace them with regular files")
    )]
    UnsafeBundle { path: String, reason: String },

    #[error("Failed to clone repository: {url}: {reason}")]
    #[diagnostic(
        code(pair_kb::git::clone_failed),
        help("Check that the URL is correct and you have access to the repository")
    )]
    GitCloneFailed { url: String, reason: String },

    #[error("Failed to resolve git ref '{git_ref}': {reason}")]
    #[diagnostic(code(pair_kb::git::ref_resolve_failed))]
    GitRefResolveFailed { git_ref: String, reason: String },

    #[error("Failed to checkout commit '{sha}': {reason}")]
    #[diagnostic(code(pair_kb::git::checkout_failed))]
    GitCheckoutFailed { sha: String, reason: String },

    #[error("Git operation failed: {message}")]
    #[diagnostic(code(pair_kb::git::operation_failed))]
    GitOperationFailed { message: String },

    // Integrity errors
    #[error("Checksum mismatch for {file}: expected {expected}, got {actual}")]
    #[diagnostic(
        code(pair_kb::checksum::mismatch),
        help("The artifact or its .sha256 file is corrupt. Download it again from a trusted source")
    )]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    // Archive errors
    #[error("Failed to extract archive {path}: {reason}")]
    #[diagnostic(code(pair_kb::archive::extraction_failed))]
    ExtractionFailed { path: String, reason: String },

    #[error("Refusing to extract archive {path}: {reason}")]
    #[diagnostic(
        code(pair_kb::archive::unsafe_archive),
        help("The archive is malformed or exceeds extraction limits")
    )]
    UnsafeArchive { path: String, reason: String },

    #[error("Failed to package bundle into {path}: {reason}")]
    #[diagnostic(code(pair_kb::archive::package_failed))]
    PackageFailed { path: String, reason: String },

    // Manifest errors
    #[error("Manifest not found: {path}")]
    #[diagnostic(
        code(pair_kb::manifest::missing),
        help("A KB bundle must contain a manifest.json with at least 'name' and 'version'")
    )]
    ManifestMissing { path: String },

    #[error("Invalid manifest {path}: {reason}")]
    #[diagnostic(code(pair_kb::manifest::invalid))]
    ManifestInvalid { path: String, reason: String },

    #[error("Manifest version mismatch: expected {expected}, bundle declares {actual}")]
    #[diagnostic(
        code(pair_kb::manifest::version_mismatch),
        help("The release artifact does not match the requested version")
    )]
    ManifestVersionMismatch { expected: String, actual: String },

    // Install state errors
    #[error("Knowledge base already installed in {project} (found {existing})")]
    #[diagnostic(
        code(pair_kb::state::already_installed),
        help("Did you mean `pair-kb update`?")
    )]
    AlreadyInstalled { project: String, existing: String },

    #[error("No knowledge base installed in {project}")]
    #[diagnostic(
        code(pair_kb::state::not_installed),
        help("Run `pair-kb install` first")
    )]
    NotInstalled { project: String },

    // Registry application errors
    #[error("Failed to write registry '{registry}' to {path}: {reason}")]
    #[diagnostic(code(pair_kb::apply::registry_failed))]
    RegistryWriteFailed {
        registry: String,
        path: String,
        reason: String,
    },

    #[error("Applied registries: [{succeeded}]; failed registries: [{failed}]")]
    #[diagnostic(
        code(pair_kb::apply::failed),
        help("Fix the reported problems and run `pair-kb update` to reconcile")
    )]
    ApplyFailed { succeeded: String, failed: String },

    #[error("{operation} rolled back, the project was left as it was: {reason}")]
    #[diagnostic(code(pair_kb::apply::rolled_back), help("{hint}"))]
    RolledBack {
        operation: String,
        reason: String,
        hint: String,
    },

    // Configuration errors
    #[error("Configuration file not found: {path}")]
    #[diagnostic(code(pair_kb::config::not_found))]
    ConfigNotFound { path: String },

    #[error("Failed to parse configuration file {path}: {reason}")]
    #[diagnostic(code(pair_kb::config::parse_failed))]
    ConfigParseFailed { path: String, reason: String },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(
        code(pair_kb::config::invalid),
        help("Run `pair-kb validate-config` to check the registry configuration")
    )]
    ConfigInvalid { message: String },

    // Cache errors
    #[error("Cache operation failed: {message}")]
    #[diagnostic(code(pair_kb::cache::operation_failed))]
    CacheOperationFailed { message: String },

    #[error("Failed to lock cache entry '{key}': {reason}")]
    #[diagnostic(code(pair_kb::cache::lock_failed))]
    CacheLockFailed { key: String, reason: String },

    #[error("Cache entry '{key}' not found in cache")]
    #[diagnostic(
        code(pair_kb::cache::not_found),
        help("Run `pair-kb cache list` to see cached entries")
    )]
    CacheEntryNotFound { key: String },

    // Backup errors
    #[error("Backup failed: {reason}")]
    #[diagnostic(code(pair_kb::backup::failed))]
    BackupFailed { reason: String },

    #[error("Restore from backup {path} failed: {reason}")]
    #[diagnostic(
        code(pair_kb::backup::restore_failed),
        help("The backup directory was kept; copy its contents back manually")
    )]
    RestoreFailed { path: String, reason: String },

    // File system errors
    #[error("Failed to read file: {path}: {reason}")]
    #[diagnostic(code(pair_kb::fs::read_failed))]
    FileReadFailed { path: String, reason: String },

    #[error("Failed to write file: {path}: {reason}")]
    #[diagnostic(code(pair_kb::fs::write_failed))]
    FileWriteFailed { path: String, reason: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(pair_kb::fs::io_error))]
    IoError { message: String },
}

impl PairError {
    /// Whether this error belongs to the source resolution stage
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            PairError::SourceNotFound { .. }
                | PairError::UnsupportedSource { .. }
                | PairError::UnsafeBundle { .. }
                | PairError::DownloadFailed { .. }
                | PairError::OfflineUnavailable { .. }
                | PairError::GitCloneFailed { .. }
                | PairError::GitRefResolveFailed { .. }
                | PairError::GitCheckoutFailed { .. }
                | PairError::GitOperationFailed { .. }
        )
    }
}

/// Wrap an error raised after a successful rollback.
///
/// A [`PairError::ApplyFailed`] is restated so the registries it applied are
/// reported as reverted rather than applied.
pub fn rolled_back(operation: &str, err: PairError, hint: &str) -> PairError {
    let reason = match err {
        PairError::ApplyFailed { succeeded, failed } => {
            format!("failed registries: [{failed}]; reverted registries: [{succeeded}]")
        }
        other => other.to_string(),
    };
    PairError::RolledBack {
        operation: operation.to_string(),
        reason,
        hint: hint.to_string(),
    }
}

/// Creates a read error for a path
pub fn read_failed(path: &std::path::Path, err: impl std::fmt::Display) -> PairError {
    PairError::FileReadFailed {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

/// Creates a write error for a path
pub fn write_failed(path: &std::path::Path, err: impl std::fmt::Display) -> PairError {
    PairError::FileWriteFailed {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

/// Creates a cache operation failed error
pub fn cache_failed(message: impl Into<String>) -> PairError {
    PairError::CacheOperationFailed {
        message: message.into(),
    }
}

impl From<std::io::Error> for PairError {
    fn from(err: std::io::Error) -> Self {
        PairError::IoError {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for PairError {
    fn from(err: serde_json::Error) -> Self {
        PairError::ConfigParseFailed {
            path: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<git2::Error> for PairError {
    fn from(err: git2::Error) -> Self {
        PairError::GitOperationFailed {
            message: err.message().to_string(),
        }
    }
}

impl From<zip::result::ZipError> for PairError {
    fn from(err: zip::result::ZipError) -> Self {
        PairError::ExtractionFailed {
            path: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for PairError {
    fn from(err: reqwest::Error) -> Self {
        PairError::DownloadFailed {
            url: err
                .url()
                .map_or_else(|| "unknown".to_string(), ToString::to_string),
            reason: err.to_string(),
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, PairError>;
