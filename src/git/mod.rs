//! Git operations for KB sources
//!
//! This module handles:
//! - Cloning repositories (HTTPS, SSH and local `file://` URLs)
//! - Resolving a ref (branch, tag, SHA or `HEAD`) to a commit
//! - Checking that commit out as a detached HEAD
//!
//! Authentication is delegated to git's native credential system.

mod auth;
pub mod url;

use std::path::Path;

use git2::{ErrorClass, FetchOptions, Oid, RemoteCallbacks, Repository, build::RepoBuilder};

use crate::error::{PairError, Result};

use auth::setup_auth_callbacks;
use url::{clone_url, is_local_url};

/// A checked-out working tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkout {
    /// Full SHA of the checked-out commit
    pub commit: String,
    /// Branch or tag name the requested ref stands for
    pub resolved_ref: Option<String>,
}

/// Interpret a git2 error as a short, user-facing reason
pub fn interpret_git_error(err: &git2::Error) -> String {
    let message = err.message().to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| message.contains(n));

    if has(&["not found", "404", "too many redirects", "authentication replays"]) {
        "Repository not found".to_string()
    } else if has(&["authentication", "credentials"]) {
        "Authentication failed".to_string()
    } else if has(&["permission denied", "access denied"]) {
        "Permission denied".to_string()
    } else if has(&["connection", "network", "timeout", "timed out", "resolve"]) {
        "Network error".to_string()
    } else if err.class() == ErrorClass::Http && has(&["certificate", "ssl"]) {
        format!("TLS error: {}", err.message())
    } else {
        err.message().to_string()
    }
}

/// Clone `url` into `target`.
///
/// A shallow clone is used for remote repositories when only the default
/// branch is wanted.
pub fn clone(url: &str, target: &Path, shallow: bool) -> Result<Repository> {
    let mut callbacks = RemoteCallbacks::new();
    setup_auth_callbacks(&mut callbacks);

    let mut fetch_options = FetchOptions::new();
    fetch_options.remote_callbacks(callbacks);
    if shallow && !is_local_url(url) {
        fetch_options.depth(1);
    }

    let mut builder = RepoBuilder::new();
    builder.fetch_options(fetch_options);
    builder
        .clone(&clone_url(url), target)
        .map_err(|e| PairError::GitCloneFailed {
            url: url.to_string(),
            reason: interpret_git_error(&e),
        })
}

fn ref_error(git_ref: &str, reason: impl Into<String>) -> PairError {
    PairError::GitRefResolveFailed {
        git_ref: git_ref.to_string(),
        reason: reason.into(),
    }
}

/// Resolve a ref name (branch, tag, SHA prefix or `HEAD`) to a commit SHA
pub fn resolve_ref(repo: &Repository, git_ref: &str) -> Result<String> {
    let candidates = [
        git_ref.to_string(),
        format!("refs/heads/{git_ref}"),
        format!("refs/tags/{git_ref}"),
        format!("refs/remotes/origin/{git_ref}"),
    ];

    let by_name = candidates.iter().find_map(|name| {
        repo.find_reference(name)
            .ok()
            .and_then(|r| r.peel_to_commit().ok())
    });
    let commit = by_name
        .or_else(|| {
            repo.revparse_single(git_ref)
                .ok()
                .and_then(|obj| obj.peel_to_commit().ok())
        })
        .ok_or_else(|| ref_error(git_ref, "no branch, tag or commit with this name"))?;

    Ok(commit.id().to_string())
}

/// Branch HEAD points at, if it is not detached
pub fn head_branch(repo: &Repository) -> Result<Option<String>> {
    let head = repo.head().map_err(|e| ref_error("HEAD", e.message()))?;
    Ok(head
        .is_branch()
        .then(|| head.shorthand().map(ToString::to_string))
        .flatten())
}

/// Check out `sha` as a detached HEAD, forcing the working tree to match
pub fn checkout_commit(repo: &Repository, sha: &str) -> Result<()> {
    let failed = |e: git2::Error| PairError::GitCheckoutFailed {
        sha: sha.to_string(),
        reason: e.message().to_string(),
    };

    let oid = Oid::from_str(sha).map_err(failed)?;
    let commit = repo.find_commit(oid).map_err(failed)?;
    repo.set_head_detached(commit.id()).map_err(failed)?;

    let mut checkout = git2::build::CheckoutBuilder::new();
    checkout.force();
    repo.checkout_head(Some(&mut checkout)).map_err(failed)
}

/// Clone `url` into `target` and check out `git_ref`
pub fn fetch(url: &str, git_ref: &str, target: &Path) -> Result<Checkout> {
    let wants_head = git_ref == "HEAD";
    tracing::debug!(url, git_ref, "cloning repository");
    let repo = clone(url, target, wants_head)?;

    let resolved_ref = if wants_head {
        head_branch(&repo)?
    } else {
        Some(git_ref.to_string())
    };
    let commit = resolve_ref(&repo, git_ref)?;
    checkout_commit(&repo, &commit)?;

    tracing::info!(url, git_ref, commit = %commit, "checked out");
    Ok(Checkout {
        commit,
        resolved_ref,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    use git2::{Repository, Signature};

    /// Commit every file under the repo's working tree on the current branch
    pub fn commit_all(repo: &Repository, message: &str) -> git2::Oid {
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("Test", "test@example.com").unwrap();
        let parents: Vec<git2::Commit> = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
    }

    /// Create a repository with a bundle on `main` and a `v2` tag on a later commit
    pub fn bundle_repo(dir: &Path) -> Repository {
        let repo = Repository::init_opts(
            dir,
            git2::RepositoryInitOptions::new().initial_head("main"),
        )
        .unwrap();
        std::fs::write(
            dir.join("manifest.json"),
            r#"{"name":"kb","version":"1.0.0"}"#,
        )
        .unwrap();
        std::fs::create_dir_all(dir.join("knowledge")).unwrap();
        std::fs::write(dir.join("knowledge/index.md"), "# v1").unwrap();
        commit_all(&repo, "v1");

        std::fs::write(dir.join("knowledge/index.md"), "# v2").unwrap();
        let second = commit_all(&repo, "v2");
        let object = repo.find_object(second, None).unwrap();
        repo.tag_lightweight("v2", &object, false).unwrap();
        drop(object);
        repo
    }
}
