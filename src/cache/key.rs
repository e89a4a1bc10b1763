//! Cache keys
//!
//! A key names one directory under the cache root:
//! - release sources use the normalized version (`1.2.0`)
//! - git sources use `git-<sha256(url#ref)>`
//! - archive URLs use `url-<sha256(url)>`

use std::fmt;

use sha2::{Digest, Sha256};

use crate::error::{PairError, Result};
use crate::manifest::normalize_version;

/// Deterministic identifier of a cacheable source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

fn digest_hex(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

impl CacheKey {
    /// Key for a published release
    pub fn release(version: &str) -> Result<Self> {
        Self::parse(&normalize_version(version)?)
    }

    /// Key for a git source at a ref
    pub fn git(url: &str, git_ref: &str) -> Self {
        Self(format!("git-{}", digest_hex(&format!("{url}#{git_ref}"))))
    }

    /// Key for an archive downloaded from an explicit URL
    pub fn url(url: &str) -> Self {
        Self(format!("url-{}", digest_hex(url)))
    }

    /// Validate a raw key (e.g. from `cache clear --only`)
    pub fn parse(raw: &str) -> Result<Self> {
        let valid = !raw.is_empty()
            && !raw.starts_with('.')
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-'));
        if !valid {
            return Err(PairError::CacheOperationFailed {
                message: format!("'{raw}' is not a valid cache key"),
            });
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
