//! Tests for the `launchkit` binary outside of the update handoff.

use predicates::prelude::*;
use std::fs;

use crate::common::{InstallDir, TestServer};

#[test]
fn test_version_creates_default_record() {
    let install = InstallDir::new().unwrap();

    install
        .launchkit_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("launchkit {}", env!("CARGO_PKG_VERSION"))));

    assert_eq!(install.recorded_version().as_deref(), Some(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_version_reads_record_verbatim() {
    let install = InstallDir::new().unwrap();
    install.write_version("2024.10-hotfix").unwrap();

    install
        .launchkit_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("launchkit 2024.10-hotfix"));
}

#[test]
fn test_corrupt_record_is_replaced_with_default() {
    let install = InstallDir::new().unwrap();
    fs::write(install.path().join("version_local.json"), "{ not json").unwrap();

    install.launchkit_cmd().arg("version").assert().success();

    assert_eq!(install.recorded_version().as_deref(), Some(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_check_reports_published_version() {
    let server = TestServer::start().unwrap();
    server.publish("9.9.9", b"binary");
    let install = InstallDir::new().unwrap();
    install.write_config(&server.url("/version.json"), false).unwrap();
    install.write_version("1.0.0").unwrap();

    install
        .launchkit_cmd()
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("9.9.9"))
        .stdout(predicate::str::contains("Faster startup"));
}

#[test]
fn test_check_up_to_date() {
    let server = TestServer::start().unwrap();
    server.publish("1.0.0", b"binary");
    let install = InstallDir::new().unwrap();
    install.write_config(&server.url("/version.json"), false).unwrap();
    install.write_version("1.0.0").unwrap();

    install
        .launchkit_cmd()
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("launchkit upgrade").not());
}

#[test]
fn test_check_fails_on_bad_descriptor() {
    let server = TestServer::start().unwrap();
    server.route("/version.json", "this is not json");
    let install = InstallDir::new().unwrap();
    install.write_config(&server.url("/version.json"), false).unwrap();

    install.launchkit_cmd().arg("check").assert().failure();
}

#[test]
fn test_check_fails_when_unreachable() {
    let server = TestServer::start().unwrap();
    let install = InstallDir::new().unwrap();
    install.write_config(&server.url("/missing.json"), false).unwrap();

    install.launchkit_cmd().arg("check").assert().failure();
}

#[test]
fn test_invalid_config_is_reported() {
    let install = InstallDir::new().unwrap();
    fs::write(install.path().join("launchkit.toml"), "[upgrade\nbroken").unwrap();

    install
        .launchkit_cmd()
        .arg("version")
        .assert()
        .failure()
        .stderr(predicate::str::contains("launchkit.toml"));
}

#[test]
fn test_run_once_takes_and_releases_lock() {
    let install = InstallDir::new().unwrap();
    install.write_config("http://127.0.0.1:9/version.json", false).unwrap();

    install.launchkit_cmd().args(["run", "--once"]).assert().success();

    assert!(!install.path().join("launcher.lock").exists());
}

#[test]
fn test_run_replaces_stale_lock() {
    let install = InstallDir::new().unwrap();
    install.write_config("http://127.0.0.1:9/version.json", false).unwrap();
    fs::write(install.path().join("launcher.lock"), "not-a-pid").unwrap();

    install
        .launchkit_cmd()
        .args(["run", "--once"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already running").not());

    assert!(!install.path().join("launcher.lock").exists());
}

#[test]
fn test_run_defers_to_live_instance() {
    let install = InstallDir::new().unwrap();
    install.write_config("http://127.0.0.1:9/version.json", false).unwrap();
    let owner = std::process::id().to_string();
    fs::write(install.path().join("launcher.lock"), &owner).unwrap();

    install
        .launchkit_cmd()
        .args(["run", "--once"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already running"));

    assert_eq!(fs::read_to_string(install.path().join("launcher.lock")).unwrap(), owner);
}

#[test]
fn test_run_postpones_update_without_answer() {
    let server = TestServer::start().unwrap();
    server.publish("9.9.9", b"binary");
    let install = InstallDir::new().unwrap();
    install.write_config(&server.url("/version.json"), true).unwrap();
    install.write_version("1.0.0").unwrap();

    // stdin is closed, which counts as "later"
    install
        .launchkit_cmd()
        .args(["run", "--once"])
        .assert()
        .success()
        .stdout(predicate::str::contains("9.9.9"))
        .stdout(predicate::str::contains("launchkit upgrade"));

    assert!(!install.path().join("downloads").exists());
    assert_eq!(install.recorded_version().as_deref(), Some("1.0.0"));
}

#[test]
fn test_run_survives_unreachable_update_server() {
    let install = InstallDir::new().unwrap();
    install.write_config("http://127.0.0.1:9/version.json", true).unwrap();

    install.launchkit_cmd().args(["run", "--once"]).assert().success();
}

#[test]
fn test_rollback_without_backup_fails() {
    let install = InstallDir::new().unwrap();

    install
        .launchkit_cmd()
        .arg("rollback")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No backup found"));
}

#[cfg(unix)]
#[test]
fn test_rollback_restores_backup() {
    let install = InstallDir::new().unwrap();
    let backup = install.path().join("launchkit_backup");
    fs::write(&backup, "#!/bin/sh\necho previous\n").unwrap();

    install.launchkit_cmd().arg("rollback").assert().success();

    assert_eq!(
        fs::read_to_string(install.launcher()).unwrap(),
        "#!/bin/sh\necho previous\n"
    );
}
