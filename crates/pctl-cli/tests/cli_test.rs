use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn pctl() -> Command {
    Command::cargo_bin("pctl").unwrap()
}

#[test]
fn help_lists_subcommands() {
    pctl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("redeploy"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn version_flag_works() {
    pctl()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pctl"));
}

#[test]
fn init_writes_config_file() {
    let tmp = TempDir::new().unwrap();

    pctl()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote pctl.yml"));

    let written = std::fs::read_to_string(tmp.path().join("pctl.yml")).unwrap();
    assert!(written.contains("portainer_url:"));
    assert!(written.contains("compose_file: docker-compose.yml"));
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("pctl.yml"), "stack_name: keep\n").unwrap();

    pctl()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    // Untouched.
    let kept = std::fs::read_to_string(tmp.path().join("pctl.yml")).unwrap();
    assert_eq!(kept, "stack_name: keep\n");

    pctl()
        .current_dir(tmp.path())
        .args(["init", "--force"])
        .assert()
        .success();
    let overwritten = std::fs::read_to_string(tmp.path().join("pctl.yml")).unwrap();
    assert!(overwritten.contains("portainer_url:"));
}

#[test]
fn deploy_without_config_points_at_init() {
    let tmp = TempDir::new().unwrap();

    pctl()
        .current_dir(tmp.path())
        .arg("deploy")
        .assert()
        .failure()
        .stderr(predicate::str::contains("pctl init"));
}

#[test]
fn deploy_with_incomplete_config_names_the_missing_field() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("pctl.yml"),
        "portainer_url: https://portainer.local\nenvironment_id: 1\nstack_name: demo\n",
    )
    .unwrap();

    pctl()
        .current_dir(tmp.path())
        .arg("deploy")
        .assert()
        .failure()
        .stderr(predicate::str::contains("api_token"));
}

#[test]
fn redeploy_rejects_invalid_build_mode_before_contacting_the_server() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("pctl.yml"),
        concat!(
            "portainer_url: https://portainer.invalid\n",
            "api_token: tok\n",
            "environment_id: 1\n",
            "stack_name: demo\n",
            "compose_file: docker-compose.yml\n",
            "build:\n",
            "  mode: sideload\n",
        ),
    )
    .unwrap();
    std::fs::write(
        tmp.path().join("docker-compose.yml"),
        "services:\n  web:\n    build: .\n",
    )
    .unwrap();

    pctl()
        .current_dir(tmp.path())
        .arg("redeploy")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid build mode"));
}
