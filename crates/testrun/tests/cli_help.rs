use std::fs;
use std::os::unix::fs::PermissionsExt as _;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn help_includes_top_level_commands() {
    let mut cmd = cargo_bin_cmd!("trs");
    cmd.arg("--help");

    let has_cmd = |name: &str| predicate::str::is_match(format!(r"(?m)^\s{{2}}{name}\b")).unwrap();

    cmd.assert()
        .success()
        .stdout(has_cmd("status"))
        .stdout(has_cmd("watch"))
        .stdout(has_cmd("start"))
        .stdout(has_cmd("stop"))
        .stdout(has_cmd("devices"))
        .stdout(has_cmd("device"))
        .stdout(has_cmd("profiles"))
        .stdout(has_cmd("interfaces"))
        .stdout(has_cmd("config"))
        .stdout(has_cmd("version"))
        .stdout(has_cmd("completion"));
}

#[test]
fn version_prints_package_version() {
    let dir = TempDir::new().unwrap();
    let mut cmd = cargo_bin_cmd!("trs");
    cmd.env("TRS_DIR", dir.path());
    cmd.arg("version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn logging_does_not_fail_when_trs_dir_not_writable() {
    let dir = TempDir::new().unwrap();
    let trs_dir = dir.path().join("trs-ro");
    fs::create_dir_all(&trs_dir).unwrap();
    let mut perms = fs::metadata(&trs_dir).unwrap().permissions();
    perms.set_mode(0o555);
    fs::set_permissions(&trs_dir, perms).unwrap();

    let mut cmd = cargo_bin_cmd!("trs");
    cmd.env("TRS_DIR", &trs_dir);
    cmd.args(["version"]);
    cmd.assert().success();
}

#[test]
fn invalid_config_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    fs::write(&config, "api-url = \"localhost:8000\"\n").unwrap();

    let mut cmd = cargo_bin_cmd!("trs");
    cmd.env("TRS_DIR", dir.path());
    cmd.env("TRS_CONFIG", &config);
    cmd.arg("version");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid api url"));
}

#[test]
fn start_requires_mac() {
    let dir = TempDir::new().unwrap();
    let mut cmd = cargo_bin_cmd!("trs");
    cmd.env("TRS_DIR", dir.path());
    cmd.arg("start");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--mac"));
}

#[test]
fn device_help_lists_roster_commands() {
    let mut cmd = cargo_bin_cmd!("trs");
    cmd.args(["device", "--help"]);

    let has_cmd = |name: &str| predicate::str::is_match(format!(r"(?m)^\s{{2}}{name}\b")).unwrap();

    cmd.assert()
        .success()
        .stdout(has_cmd("add"))
        .stdout(has_cmd("edit"))
        .stdout(has_cmd("delete"));
}

#[test]
fn log_file_is_written_under_trs_dir() {
    let dir = TempDir::new().unwrap();
    let mut cmd = cargo_bin_cmd!("trs");
    cmd.env("TRS_DIR", dir.path());
    cmd.env_remove("RUST_LOG");
    cmd.args(["--log-level", "info", "version"]);
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("trs starting").not());

    let logs: Vec<_> = fs::read_dir(dir.path().join("logs"))
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(logs.len(), 1);
    let name = logs[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("trs.") && name.ends_with(".log"), "{name}");
    assert!(fs::read_to_string(&logs[0]).unwrap().contains("trs starting"));
}
