//! Source descriptors
//!
//! Parses the `--source` argument into one of the supported source kinds:
//! - Local directory: `./kb`, `/abs/kb`, `file:///abs/kb`
//! - Local archive: `./kb-1.2.0.zip`
//! - Published release: `1.2.0`, `v1.2.0`, `release:1.2.0`
//! - Archive URL: `https://example.com/kb.zip`
//! - Git repository: `git+https://host/repo#ref`, `https://host/repo.git#ref`,
//!   `git@host:org/repo.git`

use std::fmt;
use std::path::PathBuf;

use crate::cache::CacheKey;
use crate::error::{PairError, Result};
use crate::manifest::normalize_version;

/// Ref used when a git source names none: the remote default branch
pub const DEFAULT_GIT_REF: &str = "HEAD";

const RELEASE_PREFIX: &str = "release:";
const GIT_PREFIX: &str = "git+";
const FILE_SCHEME: &str = "file://";

/// Where a KB bundle comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    LocalDirectory { path: PathBuf },
    LocalArchive { path: PathBuf },
    RemoteRelease { version: String },
    RemoteArchive { url: String },
    RemoteGit { url: String, git_ref: String },
}

impl SourceDescriptor {
    /// Release matching this build of the CLI
    pub fn default_release() -> Self {
        SourceDescriptor::RemoteRelease {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Parse a source string
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(unsupported(input, "source must not be empty"));
        }

        if let Some(rest) = input.strip_prefix(GIT_PREFIX) {
            return git_source(input, rest);
        }
        let (location, _) = split_ref(input);
        let location = location.trim_end_matches('/');
        if input.starts_with("git@") || location.ends_with(".git") {
            return git_source(input, input);
        }

        if let Some(version) = input.strip_prefix(RELEASE_PREFIX) {
            return Ok(SourceDescriptor::RemoteRelease {
                version: normalize_version(version)?,
            });
        }
        if let Ok(version) = normalize_version(input) {
            return Ok(SourceDescriptor::RemoteRelease { version });
        }

        if input.starts_with("https://") || input.starts_with("http://") {
            return Ok(SourceDescriptor::RemoteArchive {
                url: input.to_string(),
            });
        }
        if input.contains("://") && !input.starts_with(FILE_SCHEME) {
            return Err(unsupported(input, "unknown URL scheme"));
        }

        let path = PathBuf::from(input.strip_prefix(FILE_SCHEME).unwrap_or(input));
        let is_zip = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        if is_zip {
            Ok(SourceDescriptor::LocalArchive { path })
        } else {
            Ok(SourceDescriptor::LocalDirectory { path })
        }
    }

    /// Cache key for cacheable sources; local sources are never cached
    pub fn cache_key(&self) -> Result<Option<CacheKey>> {
        match self {
            SourceDescriptor::LocalDirectory { .. } | SourceDescriptor::LocalArchive { .. } => {
                Ok(None)
            }
            SourceDescriptor::RemoteRelease { version } => CacheKey::release(version).map(Some),
            SourceDescriptor::RemoteArchive { url } => Ok(Some(CacheKey::url(url))),
            SourceDescriptor::RemoteGit { url, git_ref } => Ok(Some(CacheKey::git(url, git_ref))),
        }
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceDescriptor::LocalDirectory { path } | SourceDescriptor::LocalArchive { path } => {
                write!(f, "{}", path.display())
            }
            SourceDescriptor::RemoteRelease { version } => write!(f, "release {version}"),
            SourceDescriptor::RemoteArchive { url } => f.write_str(url),
            SourceDescriptor::RemoteGit { url, git_ref } => write!(f, "{url}#{git_ref}"),
        }
    }
}

fn split_ref(input: &str) -> (&str, Option<&str>) {
    match input.rsplit_once('#') {
        Some((location, git_ref)) => (location, Some(git_ref)),
        None => (input, None),
    }
}

fn git_source(original: &str, rest: &str) -> Result<SourceDescriptor> {
    let (url, git_ref) = split_ref(rest);
    if url.is_empty() {
        return Err(unsupported(original, "git source has no repository URL"));
    }
    let git_ref = match git_ref.map(str::trim) {
        Some(r) if !r.is_empty() => r.to_string(),
        _ => DEFAULT_GIT_REF.to_string(),
    };
    Ok(SourceDescriptor::RemoteGit {
        url: url.to_string(),
        git_ref,
    })
}

fn unsupported(input: &str, reason: &str) -> PairError {
    PairError::UnsupportedSource {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}
