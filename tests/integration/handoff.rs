//! The complete update cycle: download, handoff, swap and relaunch.

use predicates::prelude::*;
use std::fs;
use std::time::Duration;

use crate::common::{InstallDir, TestServer, wait_for};

#[cfg(unix)]
#[test]
fn test_upgrade_hands_off_and_relaunches() {
    let server = TestServer::start().unwrap();
    // The "new version" only leaves a marker in its working directory
    server.publish("9.9.9", b"#!/bin/sh\necho started > relaunched.txt\n");

    let install = InstallDir::new().unwrap();
    install.write_config(&server.url("/version.json"), false).unwrap();
    install.write_version("1.0.0").unwrap();

    // Returns once both the launcher and the updater (which shares its
    // output pipes) have exited
    install
        .launchkit_cmd()
        .args(["upgrade", "--yes"])
        .timeout(Duration::from_secs(90))
        .assert()
        .success()
        .stdout(predicate::str::contains("Update installed"));

    let marker = install.path().join("relaunched.txt");
    assert!(wait_for(Duration::from_secs(10), || marker.exists()));

    assert_eq!(install.recorded_version().as_deref(), Some("9.9.9"));
    assert!(
        fs::read_to_string(install.launcher()).unwrap().starts_with("#!/bin/sh"),
        "launcher executable was not replaced"
    );
    assert!(install.path().join("launchkit_backup").exists());
    assert!(!install.path().join("launcher.lock").exists());
    assert!(!install.path().join("downloads").join("launchkit").exists());
}

#[test]
fn test_missing_updater_keeps_download_and_reports_path() {
    let server = TestServer::start().unwrap();
    server.publish("9.9.9", b"new-binary");

    let install = InstallDir::new().unwrap();
    install.write_config(&server.url("/version.json"), false).unwrap();
    install.write_version("1.0.0").unwrap();
    fs::remove_file(install.updater()).unwrap();

    let staged = install
        .path()
        .join("downloads")
        .join(format!("launchkit{}", std::env::consts::EXE_SUFFIX));

    install
        .launchkit_cmd()
        .args(["upgrade", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Updater not found"))
        .stderr(predicate::str::contains(staged.display().to_string()));

    assert_eq!(fs::read(&staged).unwrap(), b"new-binary");
    assert_eq!(install.recorded_version().as_deref(), Some("1.0.0"));
    assert!(!install.path().join("launcher.lock").exists());
}

#[test]
fn test_failed_download_leaves_no_staged_file() {
    let server = TestServer::start().unwrap();
    let descriptor = serde_json::json!({
        "version": "9.9.9",
        "download_url": server.url("/releases/download/9.9.9/gone"),
        "changelog": "",
    });
    server.route("/version.json", descriptor.to_string());

    let install = InstallDir::new().unwrap();
    install.write_config(&server.url("/version.json"), false).unwrap();

    install
        .launchkit_cmd()
        .args(["upgrade", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("9.9.9/gone"));

    let downloads = install.path().join("downloads");
    let leftovers = fs::read_dir(&downloads).map(|entries| entries.count()).unwrap_or(0);
    assert_eq!(leftovers, 0);
}
