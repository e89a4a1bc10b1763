//! package, kb-validate, kb-verify, kb-info, update-link and validate-config

mod common;

use predicates::prelude::*;

#[test]
fn test_package_writes_archive_and_checksum() {
    let project = common::TestProject::new();
    let bundle = project.outside("kb");
    common::create_bundle(&bundle, "kb", "v1.2.0");
    let dist = project.outside("dist");

    project
        .cmd()
        .args([
            "package",
            bundle.to_str().unwrap(),
            "--output",
            dist.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Packaged kb 1.2.0"));

    assert!(dist.join("kb-1.2.0.zip").is_file());
    let checksum = std::fs::read_to_string(dist.join("kb-1.2.0.zip.sha256")).unwrap();
    assert!(checksum.ends_with("  kb-1.2.0.zip\n"));

    project
        .cmd()
        .args(["kb-verify", dist.join("kb-1.2.0.zip").to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("verified"));
}

#[test]
fn test_package_defaults_next_to_bundle() {
    let project = common::TestProject::new();
    let bundle = project.outside("kb");
    common::create_bundle(&bundle, "kb", "1.0.0");

    project
        .cmd()
        .current_dir(&bundle)
        .arg("package")
        .assert()
        .success();
    assert!(project.outside("kb-1.0.0.zip").is_file());
}

#[test]
fn test_package_rejects_invalid_bundle() {
    let project = common::TestProject::new();
    let bundle = project.outside("kb");
    std::fs::create_dir_all(&bundle).unwrap();

    project
        .cmd()
        .args(["package", bundle.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("manifest.json"));
}

#[test]
fn test_kb_verify_checksum_mismatch() {
    let project = common::TestProject::new();
    let bundle = project.outside("kb");
    common::create_bundle(&bundle, "kb", "1.0.0");
    let archive = common::zip_bundle(&bundle, &project.outside("bad.zip"));
    common::write(
        &project.outside("bad.zip.sha256"),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855  bad.zip\n",
    );

    project
        .cmd()
        .args(["kb-verify", archive.to_str().unwrap()])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Checksum mismatch"));
}

#[test]
fn test_kb_verify_json_for_directory() {
    let project = common::TestProject::new();
    let bundle = project.outside("kb");
    common::create_bundle(&bundle, "kb", "1.0.0");

    let output = project
        .cmd()
        .args(["kb-verify", bundle.to_str().unwrap(), "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["kind"], "directory");
    assert_eq!(json["checksum"], "not-applicable");
    assert_eq!(json["name"], "kb");
    assert_eq!(json["valid"], true);
}

#[test]
fn test_kb_verify_rejects_non_zip() {
    let project = common::TestProject::new();
    let fake = project.outside("fake.zip");
    common::write(&fake, "not a zip");

    project
        .cmd()
        .args(["kb-verify", fake.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ZIP"));
}

#[test]
fn test_kb_info_json_digest_matches_for_archive_and_directory() {
    let project = common::TestProject::new();
    let bundle = project.outside("kb");
    common::create_bundle(&bundle, "kb", "1.0.0");
    let archive = common::zip_bundle(&bundle, &project.outside("kb-1.0.0.zip"));

    let info = |path: &std::path::Path| -> serde_json::Value {
        let output = project
            .cmd()
            .args(["kb-info", path.to_str().unwrap(), "--json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).unwrap()
    };

    let from_dir = info(&bundle);
    let from_zip = info(&archive);
    assert_eq!(from_dir["name"], "kb");
    assert_eq!(from_dir["files"], 5);
    assert!(from_dir["digest"].as_str().unwrap().starts_with("blake3:"));
    assert_eq!(from_dir["digest"], from_zip["digest"]);
    assert!(from_dir.get("sha256").is_none());
    assert_eq!(from_zip["sha256"].as_str().unwrap().len(), 64);
}

#[test]
fn test_kb_validate() {
    let project = common::TestProject::new();
    project.write_knowledge_config();
    let bundle = project.outside("kb");
    common::create_bundle(&bundle, "kb", "1.0.0");

    project
        .cmd()
        .args(["kb-validate", bundle.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 of 1 registries present"));

    // None of the built-in registries are in this bundle
    let empty = project.outside("empty");
    common::write(&empty.join("manifest.json"), r#"{"name":"kb","version":"1.0.0"}"#);
    common::pair_kb_cmd()
        .current_dir(project.outside(""))
        .args(["kb-validate", empty.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("none of the configured registries"));
}

#[test]
fn test_validate_config() {
    let project = common::TestProject::new();
    project
        .cmd()
        .arg("validate-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("built-in defaults"));

    project.write_file(
        "config.json",
        r#"{"a": {"source": "a", "target": "x"}, "b": {"source": "b", "target": "x/y"}}"#,
    );
    project
        .cmd()
        .arg("validate-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("nested"));

    project
        .cmd()
        .args(["validate-config", "-c", "missing.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_update_link_dry_run_then_apply() {
    let project = common::TestProject::new();
    project.write_file(
        "config.json",
        r#"{
            "knowledge": {"source": "knowledge", "target": ".pair/knowledge"},
            "adoption": {"source": "adoption", "target": ".pair/adoption"}
        }"#,
    );
    project.write_file(".pair/knowledge/guides/testing.md", "# Testing\n");
    project.write_file(
        ".pair/adoption/plan.md",
        "Follow [the guide](knowledge/guides/testing.md).\n",
    );
    project.write_file(
        ".pair/adoption/next.md",
        "Then [test](../knowledge/guides/testing.md#unit).\n",
    );
    project.write_file(
        ".pair/knowledge/index.md",
        "Adoption: [plan](../adoption/plan.md)\n",
    );

    project
        .cmd()
        .args(["update-link", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Would rewrite 0 link(s)"));

    // Moving adoption makes its incoming link stale
    project.write_file(
        "config.json",
        r#"{
            "knowledge": {"source": "knowledge", "target": ".pair/knowledge"},
            "adoption": {"source": "adoption", "target": "docs/adoption"}
        }"#,
    );
    std::fs::rename(
        project.path.join(".pair/adoption"),
        project.path.join("docs-adoption-tmp"),
    )
    .unwrap();
    std::fs::create_dir_all(project.path.join("docs")).unwrap();
    std::fs::rename(
        project.path.join("docs-adoption-tmp"),
        project.path.join("docs/adoption"),
    )
    .unwrap();

    project
        .cmd()
        .args(["update-link", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Would rewrite 2 link(s)"));
    assert_eq!(
        project.read_file(".pair/knowledge/index.md"),
        "Adoption: [plan](../adoption/plan.md)\n"
    );

    project.cmd().arg("update-link").assert().success();
    assert_eq!(
        project.read_file(".pair/knowledge/index.md"),
        "Adoption: [plan](../../docs/adoption/plan.md)\n"
    );
    assert_eq!(
        project.read_file("docs/adoption/next.md"),
        "Then [test](../../.pair/knowledge/guides/testing.md#unit).\n"
    );

    project
        .cmd()
        .arg("update-link")
        .assert()
        .success()
        .stdout(predicate::str::contains("Rewrote 0 link(s)"));
}
