//! CLI integration tests

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Binary isolated from the user's config, data and runtime dirs
fn isocap_bin(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("isocap").expect("binary built");
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env("ISOCAP_RUNTIME_DIR", home.path().join("run"))
        .env_remove("ISOCAP_LOG")
        .env_remove("ISOCAP_FFMPEG");
    cmd
}

#[test]
fn help_output() {
    let home = TempDir::new().unwrap();
    isocap_bin(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--daemon"))
        .stdout(predicate::str::contains("sessions"))
        .stdout(predicate::str::contains("record"))
        .stdout(predicate::str::contains("monitor"))
        .stdout(predicate::str::contains("history"));
}

#[test]
fn version_output() {
    let home = TempDir::new().unwrap();
    isocap_bin(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("isocap"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn no_command_prints_help_and_fails() {
    let home = TempDir::new().unwrap();
    isocap_bin(&home)
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn record_help_lists_options() {
    let home = TempDir::new().unwrap();
    isocap_bin(&home)
        .args(["record", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--pid"))
        .stdout(predicate::str::contains("--duration"))
        .stdout(predicate::str::contains("--output"));
}

#[test]
#[cfg(target_os = "linux")]
fn config_path_command() {
    let home = TempDir::new().unwrap();
    let expected = home.path().join("config").join("isocap").join("config.toml");
    isocap_bin(&home)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(expected.to_string_lossy().to_string()));
}

#[test]
fn config_help() {
    let home = TempDir::new().unwrap();
    isocap_bin(&home)
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("set"))
        .stdout(predicate::str::contains("get"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("path"));
}

#[test]
#[cfg(target_os = "linux")]
fn config_set_then_get() {
    let home = TempDir::new().unwrap();
    isocap_bin(&home)
        .args(["config", "set", "format", "FLAC"])
        .assert()
        .success();

    isocap_bin(&home)
        .args(["config", "get", "format"])
        .assert()
        .success()
        .stdout(predicate::str::diff("flac\n"));

    isocap_bin(&home)
        .args(["config", "get", "temp_dir"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(not set)"));
}

#[test]
#[cfg(target_os = "linux")]
fn config_list_shows_every_key() {
    let home = TempDir::new().unwrap();
    isocap_bin(&home)
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("format"))
        .stdout(predicate::str::contains("ffmpeg_path"))
        .stdout(predicate::str::contains("temp_dir"))
        .stdout(predicate::str::contains("history_file"))
        .stdout(predicate::str::contains("log_level"));
}

#[test]
#[cfg(not(windows))]
fn sessions_need_windows_audio() {
    let home = TempDir::new().unwrap();
    isocap_bin(&home)
        .arg("sessions")
        .assert()
        .code(10)
        .stderr(predicate::str::contains("only available on Windows"));
}
