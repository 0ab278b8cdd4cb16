//! Smoke tests for the nestor binary that need no job server.
//!
//! Every test points the binary at a temporary config and clears
//! `NESTOR_HOME`, so the developer's own configuration never leaks in.

use assert_cmd::assert::OutputAssertExt;
use predicates::prelude::*;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const CONFIG: &str = r#"
[client]
active_provider = "docker"

[[providers]]
name = "docker"

[[providers.compute_resources]]
name = "docker"
host = "localhost"
port_job_server = 8265

[[providers]]
name = "cluster"
selection = "round_robin"

[[providers.compute_resources]]
name = "head"
host = "10.0.0.5"
port_job_server = 8265
"#;

const NO_ACTIVE_PROVIDER: &str = r#"
[[providers]]
name = "docker"

[[providers.compute_resources]]
name = "docker"
host = "127.0.0.1"
port_job_server = 1
"#;

fn write_config(dir: &Path, contents: &str) -> std::path::PathBuf {
    let nestor_dir = dir.join(".nestor");
    std::fs::create_dir_all(&nestor_dir).unwrap();
    let path = nestor_dir.join("config.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

fn nestor(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("nestor"));
    cmd.current_dir(dir).env_remove("NESTOR_HOME").env_remove("RUST_LOG");
    cmd
}

#[test]
fn version_output() {
    let temp = TempDir::new().unwrap();
    nestor(temp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("nestor"));
}

#[test]
fn providers_from_discovered_config() {
    let temp = TempDir::new().unwrap();
    write_config(temp.path(), CONFIG);

    nestor(temp.path())
        .arg("providers")
        .assert()
        .success()
        .stdout(predicate::str::contains("* docker (first)"))
        .stdout(predicate::str::contains("  cluster (round_robin)"))
        .stdout(predicate::str::contains("http://10.0.0.5:8265"));
}

#[test]
fn providers_json_is_canonical() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), CONFIG);

    let output = nestor(temp.path())
        .args(["providers", "--json", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    assert!(output.status.success());

    let providers: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(providers[0]["name"], "cluster");
    assert_eq!(providers[1]["name"], "docker");
    assert_eq!(providers[1]["active"], true);
}

#[test]
fn unknown_provider_flag_is_config_error() {
    let temp = TempDir::new().unwrap();
    write_config(temp.path(), CONFIG);

    nestor(temp.path())
        .args(["--provider", "k8s", "providers"])
        .assert()
        .code(2);
}

#[test]
fn missing_explicit_config_is_config_error() {
    let temp = TempDir::new().unwrap();

    nestor(temp.path())
        .args(["--config", "does-not-exist.toml", "providers"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("does-not-exist.toml"));
}

#[test]
fn run_without_active_provider_exits_2() {
    let temp = TempDir::new().unwrap();
    write_config(temp.path(), NO_ACTIVE_PROVIDER);

    nestor(temp.path())
        .args(["run", "--title", "simple_job", "--entrypoint", "job.py"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no active provider"));
}

#[test]
fn run_with_non_object_arguments_exits_3() {
    let temp = TempDir::new().unwrap();
    write_config(temp.path(), CONFIG);

    nestor(temp.path())
        .args([
            "run",
            "--title",
            "simple_job",
            "--entrypoint",
            "job.py",
            "--arguments",
            "[1, 2, 3]",
        ])
        .assert()
        .code(3);
}

#[test]
fn run_with_unreachable_job_server_exits_4() {
    let temp = TempDir::new().unwrap();
    write_config(temp.path(), NO_ACTIVE_PROVIDER);

    nestor(temp.path())
        .args([
            "--provider",
            "docker",
            "--timeout",
            "5",
            "run",
            "--title",
            "simple_job",
            "--entrypoint",
            "job.py",
        ])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("simple_job"));
}

#[test]
fn catalog_without_base_url_exits_2() {
    let temp = TempDir::new().unwrap();
    write_config(temp.path(), CONFIG);

    nestor(temp.path())
        .args(["catalog", "show", "simple_job"])
        .assert()
        .code(2);
}

#[test]
fn from_catalog_conflicts_with_title() {
    let temp = TempDir::new().unwrap();
    write_config(temp.path(), CONFIG);

    nestor(temp.path())
        .args(["run", "--from-catalog", "simple_job", "--title", "other"])
        .assert()
        .code(2);
}
