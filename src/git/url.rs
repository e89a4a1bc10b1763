//! URL handling for git sources

use std::borrow::Cow;
use std::path::Path;

/// Whether a git URL points at the local filesystem
pub fn is_local_url(url: &str) -> bool {
    url.starts_with("file://") || url.starts_with('/') || Path::new(url).is_absolute()
}

/// Rewrite SCP-style `git@host:path` as `ssh://git@host/path` for libgit2
pub fn normalize_ssh_url(url: &str) -> Cow<'_, str> {
    if !url.starts_with("git@") {
        return Cow::Borrowed(url);
    }
    match url.split_once(':') {
        Some((host, path)) => {
            let path = path.strip_prefix('/').unwrap_or(path);
            Cow::Owned(format!("ssh://{host}/{path}"))
        }
        None => Cow::Borrowed(url),
    }
}

/// Make relative or backslashed `file://` URLs absolute for libgit2 on Unix
pub fn normalize_file_url(url: &str) -> Cow<'_, str> {
    let Some(after) = url.strip_prefix("file://") else {
        return Cow::Borrowed(url);
    };
    #[cfg(not(windows))]
    {
        if after.contains('\\') {
            return Cow::Owned(format!("file:///{}", after.replace('\\', "/").trim_start_matches('/')));
        }
        if !after.is_empty() && !after.starts_with('/') {
            return Cow::Owned(format!("file:///{after}"));
        }
    }
    #[cfg(windows)]
    let _ = after;
    Cow::Borrowed(url)
}

/// URL as handed to libgit2
pub fn clone_url(url: &str) -> String {
    normalize_file_url(&normalize_ssh_url(url)).into_owned()
}
