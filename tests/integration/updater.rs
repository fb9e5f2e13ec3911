//! Tests for the `launchkit-updater` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

use crate::common::{InstallDir, LAUNCHER, UPDATER, kill_process, wait_for};
use launchkit::upgrade::process::ProcessHandle;

fn updater() -> Command {
    let mut cmd = Command::new(UPDATER);
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_missing_arguments_exit_1() {
    updater().assert().code(1).stderr(predicate::str::contains("Usage"));
    updater().arg("only-staged").assert().code(1);
}

#[test]
fn test_help_exits_0() {
    updater().arg("--help").assert().success().stdout(predicate::str::contains("STAGED"));
}

#[test]
fn test_missing_staged_file_aborts_without_touching_target() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("app");
    fs::write(&target, "OLD").unwrap();

    updater()
        .arg(temp.path().join("nope"))
        .arg(&target)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does not exist"));

    assert_eq!(fs::read_to_string(&target).unwrap(), "OLD");
    assert!(!temp.path().join("app_backup").exists());
}

#[test]
fn test_swap_records_version_and_clears_lock() {
    let temp = TempDir::new().unwrap();
    let staged_dir = temp.path().join("downloads");
    fs::create_dir(&staged_dir).unwrap();
    let staged = staged_dir.join("app");
    let target = temp.path().join("app");
    fs::write(&staged, "NEW").unwrap();
    fs::write(&target, "OLD").unwrap();
    fs::write(temp.path().join("launcher.lock"), "99999").unwrap();

    // The pid is not a number, so the wait is skipped. The relaunch of a text
    // file fails, which must not change the exit code.
    updater().arg(&staged).arg(&target).arg("none").arg(" 2.0.0-rc1 ").assert().code(0);

    assert_eq!(fs::read_to_string(&target).unwrap(), "NEW");
    assert_eq!(fs::read_to_string(temp.path().join("app_backup")).unwrap(), "OLD");
    assert!(!staged.exists());
    assert!(!temp.path().join("launcher.lock").exists());

    let record: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(temp.path().join("version_local.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(record["version"], "2.0.0-rc1");
    assert!(record["updated_at"].as_str().is_some_and(|ts| ts.len() == 19));
}

#[test]
fn test_swap_without_version_leaves_record_alone() {
    let temp = TempDir::new().unwrap();
    let staged = temp.path().join("staged");
    let target = temp.path().join("app");
    fs::write(&staged, "NEW").unwrap();
    fs::write(&target, "OLD").unwrap();

    updater().arg(&staged).arg(&target).assert().code(0);

    assert_eq!(fs::read_to_string(&target).unwrap(), "NEW");
    assert!(!temp.path().join("version_local.json").exists());
}

#[test]
fn test_waits_for_exited_pid() {
    let temp = TempDir::new().unwrap();
    let staged = temp.path().join("staged");
    let target = temp.path().join("app");
    fs::write(&staged, "NEW").unwrap();
    fs::write(&target, "OLD").unwrap();

    let mut child = std::process::Command::new(UPDATER).arg("--version").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();

    updater().arg(&staged).arg(&target).arg(pid.to_string()).arg("1.0.1").assert().code(0);
    assert_eq!(fs::read_to_string(&target).unwrap(), "NEW");
}

#[cfg(unix)]
#[test]
fn test_relaunches_new_executable_in_install_dir() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let staged = temp.path().join("staged");
    let target = temp.path().join("app");
    fs::write(&staged, "#!/bin/sh\necho \"$1\" > relaunched.txt\nsleep 2\n").unwrap();
    fs::write(&target, "#!/bin/sh\nexit 0\n").unwrap();
    fs::set_permissions(&target, fs::Permissions::from_mode(0o755)).unwrap();

    updater()
        .arg(&staged)
        .arg(&target)
        .arg("none")
        .arg("3.0.0")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Relaunched"));

    let marker = temp.path().join("relaunched.txt");
    assert!(wait_for(Duration::from_secs(10), || {
        fs::read_to_string(&marker).is_ok_and(|content| content.trim() == "run")
    }));
    let mode = fs::metadata(&target).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o755);
}

#[test]
fn test_relaunched_launcher_takes_instance_lock() {
    let install = InstallDir::new().unwrap();
    install.write_config("http://127.0.0.1:9/version.json", false).unwrap();
    install.write_version("1.0.0").unwrap();

    let downloads = install.path().join("downloads");
    fs::create_dir(&downloads).unwrap();
    let staged = downloads.join(install.launcher().file_name().unwrap());
    fs::copy(LAUNCHER, &staged).unwrap();

    updater()
        .env_remove("LAUNCHKIT_CONFIG_PATH")
        .arg(&staged)
        .arg(install.launcher())
        .arg("none")
        .arg("2.0.0")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Relaunched (pid"));

    let lock = install.path().join("launcher.lock");
    let mut owner = None;
    assert!(
        wait_for(Duration::from_secs(10), || {
            owner = fs::read_to_string(&lock).ok().and_then(|pid| pid.trim().parse::<u32>().ok());
            owner.is_some()
        }),
        "relaunched launcher never took the instance lock"
    );
    let owner = owner.unwrap();

    let alive = ProcessHandle::new(owner).is_alive();
    let killed = kill_process(owner);
    assert!(alive, "relaunched launcher {owner} is not running");
    assert!(killed);
    assert_eq!(install.recorded_version().as_deref(), Some("2.0.0"));
}
