use assert_cmd::Command;
use predicates::prelude::*;

fn prism() -> Command {
    Command::cargo_bin("prism").unwrap()
}

#[test]
fn help_lists_top_level_subcommands() {
    prism()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("skill"))
        .stdout(predicate::str::contains("inject"))
        .stdout(predicate::str::contains("serve"));
}

#[test]
fn init_then_empty_skill_list() {
    let dir = tempfile::tempdir().unwrap();

    prism()
        .args(["--project", dir.path().to_str().unwrap(), "init", "demo"])
        .assert()
        .success();

    assert!(dir.path().join(".prism/project.yaml").exists());
    assert!(dir.path().join("memory").is_dir());

    prism()
        .args(["--project", dir.path().to_str().unwrap(), "skill", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no skills matched"));
}

#[test]
fn init_twice_is_a_conflict_with_exit_code_one() {
    let dir = tempfile::tempdir().unwrap();

    prism()
        .args(["--project", dir.path().to_str().unwrap(), "init", "demo"])
        .assert()
        .success();

    prism()
        .args(["--project", dir.path().to_str().unwrap(), "init", "demo"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn skill_get_on_unknown_project_fails_with_exit_code_one() {
    let dir = tempfile::tempdir().unwrap();

    prism()
        .args(["--project", dir.path().to_str().unwrap(), "skill", "get", "does-not-exist"])
        .assert()
        .failure()
        .code(1);
}
