//! Update command integration tests

mod common;

use predicates::prelude::*;

fn installed_project() -> (common::TestProject, std::path::PathBuf) {
    let project = common::TestProject::new();
    project.write_knowledge_config();
    let v1 = project.outside("kb-v1");
    common::create_bundle(&v1, "kb", "1.0.0");
    project
        .cmd()
        .args(["install", "--source", v1.to_str().unwrap()])
        .assert()
        .success();

    let v2 = project.outside("kb-v2");
    common::create_bundle(&v2, "kb", "2.0.0");
    (project, v2)
}

fn backups(project: &common::TestProject) -> Vec<std::path::PathBuf> {
    match std::fs::read_dir(project.path.join(".pair-kb-backups")) {
        Ok(entries) => entries.filter_map(Result::ok).map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}

#[test]
fn test_update_before_install_fails_and_mentions_install() {
    let project = common::TestProject::new();
    project.write_knowledge_config();
    let bundle = project.outside("kb");
    common::create_bundle(&bundle, "kb", "1.0.0");

    project
        .cmd()
        .args(["update", "--source", bundle.to_str().unwrap()])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("install"));
    assert!(!project.file_exists("knowledge"));
}

#[test]
fn test_update_replaces_content_and_discards_backup() {
    let (project, v2) = installed_project();
    project.write_file("knowledge/stale.md", "left over\n");

    project
        .cmd()
        .args(["update", "--source", v2.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated to kb 2.0.0"))
        .stdout(predicate::str::contains("Backup removed"));

    assert_eq!(
        project.read_file("knowledge/guides/testing.md"),
        "# Testing (2.0.0)\n"
    );
    assert!(!project.file_exists("knowledge/stale.md"));
    assert!(backups(&project).is_empty());
}

#[test]
fn test_update_persist_backup_keeps_previous_content() {
    let (project, v2) = installed_project();

    project
        .cmd()
        .args(["update", "--persist-backup", "--source", v2.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup kept at"));

    let kept = backups(&project);
    assert_eq!(kept.len(), 1);
    assert!(kept[0].join("backup.json").is_file());
    assert_eq!(
        std::fs::read_to_string(kept[0].join("knowledge/guides/testing.md")).unwrap(),
        "# Testing (1.0.0)\n"
    );
}

#[test]
fn test_update_with_unresolvable_source_leaves_project_untouched() {
    let (project, _) = installed_project();

    project
        .cmd()
        .args(["update", "--source", "./missing-bundle"])
        .assert()
        .failure();

    assert_eq!(
        project.read_file("knowledge/guides/testing.md"),
        "# Testing (1.0.0)\n"
    );
    assert!(backups(&project).is_empty());
}

#[test]
fn test_update_failure_restores_backup() {
    let (project, v2) = installed_project();
    project.write_file(
        "config.json",
        r#"{"registries": {
            "knowledge": {"source": "knowledge", "target": "knowledge/"},
            "agents": {"source": "AGENTS.md", "target": "blocked/AGENTS.md"}
        }}"#,
    );
    // A file where the agents destination needs a directory
    project.write_file("blocked", "not a directory\n");

    project
        .cmd()
        .args(["update", "--source", v2.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Update rolled back"))
        .stderr(predicate::str::contains("reverted registries: [knowledge]"))
        .stderr(predicate::str::contains("run `pair-kb update` again"));

    assert_eq!(
        project.read_file("knowledge/guides/testing.md"),
        "# Testing (1.0.0)\n"
    );
    assert_eq!(project.read_file("blocked"), "not a directory\n");
    assert!(backups(&project).is_empty());
}

#[test]
fn test_update_offline_with_local_source() {
    let (project, v2) = installed_project();
    project
        .cmd()
        .args(["update", "--offline", "--source", v2.to_str().unwrap()])
        .assert()
        .success();
}
