//! Common file system operations shared by the cache, applier and backups

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

/// Version-control metadata directories that never leave a checkout
pub const VCS_DIRS: &[&str] = &[".git", ".hg", ".svn"];

#[derive(Default, Clone, Debug)]
pub struct CopyOptions {
    /// Entry names skipped at any depth
    pub exclude: Vec<String>,
    /// Entry names skipped only directly under the source root
    pub exclude_at_root: Vec<String>,
}

impl CopyOptions {
    pub fn exclude_vcs() -> Self {
        Self {
            exclude: VCS_DIRS.iter().map(ToString::to_string).collect(),
            exclude_at_root: Vec::new(),
        }
    }

    pub fn also_at_root(mut self, name: impl Into<String>) -> Self {
        self.exclude_at_root.push(name.into());
        self
    }

    fn skips(&self, name: &str, at_root: bool) -> bool {
        self.exclude.iter().any(|e| e == name)
            || (at_root && self.exclude_at_root.iter().any(|e| e == name))
    }
}

/// Copy a directory recursively with options, returning the number of files copied
pub fn copy_dir_recursive<P1, P2>(src: P1, dst: P2, options: &CopyOptions) -> io::Result<u64>
where
    P1: AsRef<Path>,
    P2: AsRef<Path>,
{
    copy_dir_inner(src.as_ref(), dst.as_ref(), options, true)
}

fn copy_dir_inner(src: &Path, dst: &Path, options: &CopyOptions, at_root: bool) -> io::Result<u64> {
    fs::create_dir_all(dst)?;

    let mut copied = 0;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let file_name = entry.file_name();
        if options.skips(&file_name.to_string_lossy(), at_root) {
            continue;
        }

        let entry_path = entry.path();
        let dst_path = dst.join(&file_name);

        let file_type = entry.file_type()?;
        if file_type.is_symlink() {
            copied += copy_symlink(&entry_path, &dst_path)?;
        } else if file_type.is_dir() {
            copied += copy_dir_inner(&entry_path, &dst_path, options, false)?;
        } else {
            fs::copy(&entry_path, &dst_path)?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Recreate a symbolic link without following it
#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> io::Result<u64> {
    std::os::unix::fs::symlink(fs::read_link(src)?, dst)?;
    Ok(1)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, _dst: &Path) -> io::Result<u64> {
    tracing::warn!(path = %src.display(), "skipping symbolic link");
    Ok(0)
}

/// Relative paths of symbolic links below `root`, outside VCS metadata
pub fn find_symlinks(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut links = Vec::new();
    let walker = WalkDir::new(root).min_depth(1).into_iter().filter_entry(|e| {
        !(e.file_type().is_dir() && VCS_DIRS.iter().any(|vcs| e.file_name() == *vcs))
    });
    for entry in walker {
        let entry = entry.map_err(io::Error::other)?;
        if entry.path_is_symlink() {
            let path = entry.path();
            links.push(path.strip_prefix(root).unwrap_or(path).to_path_buf());
        }
    }
    Ok(links)
}

/// Copy either a single file or a directory tree to `dst`
pub fn copy_path(src: &Path, dst: &Path, options: &CopyOptions) -> io::Result<u64> {
    let file_type = fs::symlink_metadata(src)?.file_type();
    if file_type.is_dir() {
        return copy_dir_recursive(src, dst, options);
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    if file_type.is_symlink() {
        return copy_symlink(src, dst);
    }
    fs::copy(src, dst)?;
    Ok(1)
}

/// Remove a file or directory tree; missing paths are not an error
pub fn remove_path(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        // A file in place of a parent directory means the path cannot exist
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Strip VCS metadata directories anywhere below `root`
pub fn strip_vcs_metadata(root: &Path) -> io::Result<usize> {
    let doomed: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| {
            let name = e.file_name().to_string_lossy();
            e.file_type().is_dir() && VCS_DIRS.iter().any(|vcs| *vcs == name)
        })
        .map(walkdir::DirEntry::into_path)
        .collect();

    let mut removed = 0;
    for dir in doomed {
        // An outer VCS dir may already have taken this one with it
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Count files and total bytes below a path (a file counts as itself)
pub fn tree_stats(path: &Path) -> io::Result<(u64, u64)> {
    if path.is_file() {
        return Ok((1, fs::metadata(path)?.len()));
    }
    let mut files = 0;
    let mut bytes = 0;
    for entry in WalkDir::new(path) {
        let entry = entry.map_err(io::Error::other)?;
        if entry.file_type().is_file() {
            files += 1;
            bytes += entry.metadata().map_err(io::Error::other)?.len();
        }
    }
    Ok((files, bytes))
}

/// Lexically normalize a relative path.
///
/// Returns `None` when the path is absolute or climbs above its starting point.
/// `"."` and `""` normalize to an empty path.
pub fn normalize_relative(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => out.push(part),
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

/// Render a path with forward slashes for display and archive entry names
pub fn to_forward_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
