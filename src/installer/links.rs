//! Markdown link rewriting for installed content
//!
//! Content is authored against the bundle layout. Once registries land in
//! different places inside the project, a relative link such as
//! `[guide](../knowledge/guide.md)` may no longer resolve. For each such link
//! the target is looked up from the file's original bundle location, mapped to
//! the registry that installed it, and rewritten to the installed location.

use std::fs;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::common::fs::{normalize_relative, to_forward_slashes};
use crate::config::RegistryConfig;
use crate::error::Result;
use crate::manifest::Manifest;

use super::registry_source;

/// Bundle sub-path to project destination of one registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryMapping {
    pub name: String,
    pub source: PathBuf,
    pub target: PathBuf,
}

/// One rewritten link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkChange {
    /// File containing the link, relative to the project
    pub file: PathBuf,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default)]
pub struct LinkReport {
    pub files_scanned: usize,
    pub files_changed: usize,
    pub changes: Vec<LinkChange>,
}

/// Rewrites links under the destinations of every registry
pub struct LinkUpdater<'a> {
    project: &'a Path,
    mappings: Vec<RegistryMapping>,
}

impl<'a> LinkUpdater<'a> {
    pub fn new(project: &'a Path, mappings: Vec<RegistryMapping>) -> Self {
        Self { project, mappings }
    }

    /// Mappings from the configuration, with manifest overrides when known
    pub fn from_config(
        project: &'a Path,
        config: &RegistryConfig,
        manifest: Option<&Manifest>,
    ) -> Self {
        let mappings = config
            .registries()
            .iter()
            .filter_map(|entry| {
                Some(RegistryMapping {
                    name: entry.name.clone(),
                    source: registry_source(entry, manifest)?,
                    target: entry.target_path()?,
                })
            })
            .collect();
        Self::new(project, mappings)
    }

    /// Rewrite broken links; with `dry_run` only report what would change
    pub fn run(&self, dry_run: bool) -> Result<LinkReport> {
        let mut report = LinkReport::default();

        for mapping in &self.mappings {
            let dest = self.project.join(&mapping.target);
            if !dest.exists() {
                continue;
            }
            for entry in WalkDir::new(&dest).into_iter().filter_map(std::result::Result::ok) {
                let path = entry.path();
                let is_markdown = path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("md"));
                if !entry.file_type().is_file() || !is_markdown {
                    continue;
                }

                let Ok(installed) = path.strip_prefix(self.project) else {
                    continue;
                };
                let Ok(within) = path.strip_prefix(&dest) else {
                    continue;
                };
                let original = mapping.source.join(within);
                report.files_scanned += 1;

                let content =
                    fs::read_to_string(path).map_err(|e| crate::error::read_failed(path, e))?;
                let (rewritten, changes) = self.rewrite(installed, &original, &content);
                if changes.is_empty() {
                    continue;
                }

                report.files_changed += 1;
                for change in &changes {
                    tracing::debug!(
                        file = %installed.display(),
                        from = %change.from,
                        to = %change.to,
                        "link rewritten"
                    );
                }
                report.changes.extend(changes);
                if !dry_run {
                    fs::write(path, rewritten).map_err(|e| crate::error::write_failed(path, e))?;
                }
            }
        }

        tracing::info!(
            files = report.files_scanned,
            changed = report.files_changed,
            links = report.changes.len(),
            dry_run,
            "link update finished"
        );
        Ok(report)
    }

    /// Rewrite the links of one file
    fn rewrite(&self, installed: &Path, original: &Path, content: &str) -> (String, Vec<LinkChange>) {
        let mut out = String::with_capacity(content.len());
        let mut changes = Vec::new();
        let mut rest = content;

        while let Some(start) = rest.find("](") {
            let target_start = start + 2;
            out.push_str(&rest[..target_start]);
            rest = &rest[target_start..];

            let Some(end) = rest.find(|c: char| c == ')' || c == '\n') else {
                continue;
            };
            let raw = &rest[..end];
            match self.replacement(installed, original, raw) {
                Some(new_target) => {
                    changes.push(LinkChange {
                        file: installed.to_path_buf(),
                        from: raw.to_string(),
                        to: new_target.clone(),
                    });
                    out.push_str(&new_target);
                }
                None => out.push_str(raw),
            }
            rest = &rest[end..];
        }
        out.push_str(rest);
        (out, changes)
    }

    /// New link target for `raw`, when it needs one
    fn replacement(&self, installed: &Path, original: &Path, raw: &str) -> Option<String> {
        let link = raw.trim();
        // `path "title"` keeps the title
        let (link, title) = match link.find(char::is_whitespace) {
            Some(i) => (&link[..i], &link[i..]),
            None => (link, ""),
        };
        if link.is_empty() || link.starts_with('#') || link.starts_with('/') || has_scheme(link) {
            return None;
        }

        let (path_part, anchor) = match link.find('#') {
            Some(i) => (&link[..i], &link[i..]),
            None => (link, ""),
        };
        if path_part.is_empty() {
            return None;
        }

        let installed_dir = installed.parent().unwrap_or(Path::new(""));
        if self.project.join(installed_dir).join(path_part).exists() {
            return None;
        }

        let original_dir = original.parent().unwrap_or(Path::new(""));
        let in_bundle = normalize_relative(&original_dir.join(path_part))?;
        let mapping = self
            .mappings
            .iter()
            .filter(|m| in_bundle.starts_with(&m.source))
            .max_by_key(|m| m.source.components().count())?;
        let rest = in_bundle.strip_prefix(&mapping.source).ok()?;
        let installed_target = mapping.target.join(rest);
        if !self.project.join(&installed_target).exists() {
            return None;
        }

        let relative = relative_path(installed_dir, &installed_target);
        Some(format!("{}{anchor}{title}", to_forward_slashes(&relative)))
    }
}

fn has_scheme(link: &str) -> bool {
    let Some(colon) = link.find(':') else {
        return false;
    };
    let scheme = &link[..colon];
    scheme
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
}

/// Relative path from directory `from` to `to`, both relative to the same root
fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component> = from.components().collect();
    let to: Vec<Component> = to.components().collect();
    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..from.len() {
        out.push("..");
    }
    for component in &to[common..] {
        out.push(component.as_os_str());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mapping(name: &str, source: &str, target: &str) -> RegistryMapping {
        RegistryMapping {
            name: name.to_string(),
            source: PathBuf::from(source),
            target: PathBuf::from(target),
        }
    }

    /// knowledge -> .pair/knowledge, adoption -> .pair/adoption, AGENTS.md at the root
    fn project() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join(".pair/knowledge/guides")).unwrap();
        fs::create_dir_all(root.join(".pair/adoption")).unwrap();
        fs::write(root.join(".pair/knowledge/guides/testing.md"), "# Testing").unwrap();
        fs::write(
            root.join(".pair/adoption/plan.md"),
            "See [testing](../knowledge/guides/testing.md#unit) and [web](https://example.com).\n\
             Local [self](plan.md) and [gone](../knowledge/missing.md).\n",
        )
        .unwrap();
        fs::write(
            root.join("AGENTS.md"),
            "Read [the plan](adoption/plan.md \"Plan\") first.\n",
        )
        .unwrap();
        temp
    }

    fn updater(root: &Path) -> LinkUpdater<'_> {
        LinkUpdater::new(
            root,
            vec![
                mapping("knowledge", "knowledge", ".pair/knowledge"),
                mapping("adoption", "adoption", ".pair/adoption"),
                mapping("agents", "AGENTS.md", "AGENTS.md"),
            ],
        )
    }

    #[test]
    fn test_links_that_resolve_are_kept() {
        let temp = project();
        let report = updater(temp.path()).run(false).unwrap();
        let plan = fs::read_to_string(temp.path().join(".pair/adoption/plan.md")).unwrap();
        assert!(plan.contains("(../knowledge/guides/testing.md#unit)"));
        assert!(plan.contains("(https://example.com)"));
        assert!(plan.contains("(../knowledge/missing.md)"));
        assert_eq!(report.files_scanned, 3);
    }

    #[test]
    fn test_rewrites_bundle_relative_links() {
        let temp = project();
        let report = updater(temp.path()).run(false).unwrap();

        let agents = fs::read_to_string(temp.path().join("AGENTS.md")).unwrap();
        assert_eq!(
            agents,
            "Read [the plan](.pair/adoption/plan.md \"Plan\") first.\n"
        );
        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].from, "adoption/plan.md \"Plan\"");
    }

    #[test]
    fn test_dry_run_and_idempotence() {
        let temp = project();
        let before = fs::read_to_string(temp.path().join("AGENTS.md")).unwrap();

        let planned = updater(temp.path()).run(true).unwrap();
        assert_eq!(planned.changes.len(), 1);
        assert_eq!(
            fs::read_to_string(temp.path().join("AGENTS.md")).unwrap(),
            before
        );

        updater(temp.path()).run(false).unwrap();
        let again = updater(temp.path()).run(false).unwrap();
        assert!(again.changes.is_empty());
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new(".pair/adoption"), Path::new(".pair/knowledge/a.md")),
            PathBuf::from("../knowledge/a.md")
        );
        assert_eq!(
            relative_path(Path::new(""), Path::new("docs/a.md")),
            PathBuf::from("docs/a.md")
        );
    }

    #[test]
    fn test_has_scheme() {
        assert!(has_scheme("https://x"));
        assert!(has_scheme("mailto:me@example.com"));
        assert!(!has_scheme("guides/a.md"));
        assert!(!has_scheme("C-notes.md"));
    }
}
