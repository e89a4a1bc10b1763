//! Common test utilities for pair-kb integration tests

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// A scratch area holding a project, bundles and an isolated cache
#[allow(dead_code)]
pub struct TestProject {
    /// Temporary directory
    pub temp: TempDir,
    /// Path to the project root
    pub path: PathBuf,
    /// Cache root used by every command run through [`TestProject::cmd`]
    pub cache: PathBuf,
}

#[allow(dead_code)]
impl TestProject {
    /// Create a new empty project
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let path = temp.path().join("project");
        let cache = temp.path().join("cache");
        std::fs::create_dir_all(&path).expect("Failed to create project directory");
        Self { temp, path, cache }
    }

    /// Directory next to the project, outside of it
    pub fn outside(&self, name: &str) -> PathBuf {
        self.temp.path().join(name)
    }

    /// Write a file in the project
    pub fn write_file(&self, path: &str, content: &str) {
        write(&self.path.join(path), content);
    }

    /// Read a file from the project
    pub fn read_file(&self, path: &str) -> String {
        std::fs::read_to_string(self.path.join(path)).expect("Failed to read file")
    }

    /// Check if a file exists in the project
    pub fn file_exists(&self, path: &str) -> bool {
        self.path.join(path).exists()
    }

    /// Registry config mapping only `knowledge` to `knowledge/`
    pub fn write_knowledge_config(&self) {
        self.write_file(
            "config.json",
            r#"{"registries": {"knowledge": {"source": "knowledge", "target": "knowledge/"}}}"#,
        );
    }

    /// pair-kb running inside the project with the isolated cache
    pub fn cmd(&self) -> Command {
        let mut cmd = pair_kb_cmd();
        cmd.current_dir(&self.path)
            .env("PAIR_KB_CACHE_DIR", &self.cache)
            .env_remove("RUST_LOG")
            .env_remove("PAIR_KB_RELEASE_URL");
        cmd
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

// Temporary fix for deprecated cargo_bin - will be updated when build-dir issues are resolved
#[allow(deprecated)]
pub fn pair_kb_cmd() -> Command {
    Command::cargo_bin("pair-kb").unwrap()
}

pub fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    std::fs::write(path, content).expect("Failed to write file");
}

/// Create a bundle with knowledge, adoption and AGENTS.md content
#[allow(dead_code)]
pub fn create_bundle(dir: &Path, name: &str, version: &str) {
    write(
        &dir.join("manifest.json"),
        &format!(r#"{{"name":"{name}","version":"{version}"}}"#),
    );
    write(
        &dir.join("knowledge/guides/testing.md"),
        &format!("# Testing ({version})\n"),
    );
    write(&dir.join("knowledge/index.md"), "See [testing](guides/testing.md).\n");
    write(
        &dir.join("adoption/plan.md"),
        "Follow [the testing guide](../knowledge/guides/testing.md).\n",
    );
    write(&dir.join("AGENTS.md"), &format!("Agents {version}\n"));
}

/// Pack a bundle directory into `output` with a sibling `.sha256`
#[allow(dead_code)]
pub fn zip_bundle(dir: &Path, output: &Path) -> PathBuf {
    pair_kb::archive::pack::pack(dir, output).expect("Failed to pack bundle");
    output.to_path_buf()
}

/// `file://` URL of a local path
#[allow(dead_code)]
pub fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}
