//! Error scenario integration tests: each failure exits with its own status

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const EXIT_USAGE: i32 = 2;
const EXIT_DEVICE_UNAVAILABLE: i32 = 10;
const EXIT_DAEMON_UNAVAILABLE: i32 = 22;

fn isocap_bin(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("isocap").expect("binary built");
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env("ISOCAP_RUNTIME_DIR", home.path().join("run"))
        .env_remove("ISOCAP_LOG");
    cmd
}

#[test]
fn config_get_unknown_key() {
    let home = TempDir::new().unwrap();
    isocap_bin(&home)
        .args(["config", "get", "unknown_key"])
        .assert()
        .code(EXIT_USAGE)
        .stderr(predicate::str::contains("Unknown key"));
}

#[test]
fn config_set_unknown_key() {
    let home = TempDir::new().unwrap();
    isocap_bin(&home)
        .args(["config", "set", "unknown_key", "value"])
        .assert()
        .code(EXIT_USAGE)
        .stderr(predicate::str::contains("Valid keys"));
}

#[test]
fn config_set_invalid_format() {
    let home = TempDir::new().unwrap();
    isocap_bin(&home)
        .args(["config", "set", "format", "ogg"])
        .assert()
        .code(EXIT_USAGE)
        .stderr(predicate::str::contains("ogg"));
}

#[test]
fn record_invalid_duration() {
    let home = TempDir::new().unwrap();
    isocap_bin(&home)
        .args(["record", "--pid", "1", "--duration", "forever"])
        .assert()
        .code(EXIT_USAGE)
        .stderr(predicate::str::contains("Invalid duration"));
}

#[test]
fn record_requires_pid() {
    let home = TempDir::new().unwrap();
    isocap_bin(&home).arg("record").assert().code(EXIT_USAGE);
}

#[test]
fn invalid_format_argument() {
    let home = TempDir::new().unwrap();
    isocap_bin(&home)
        .args(["start", "--pid", "1", "--format", "ogg"])
        .assert()
        .code(EXIT_USAGE);
}

#[test]
fn save_entry_zero_is_usage_error() {
    let home = TempDir::new().unwrap();
    isocap_bin(&home)
        .args(["save", "0", "out.mp3"])
        .assert()
        .code(EXIT_USAGE)
        .stderr(predicate::str::contains("start at 1"));
}

#[test]
#[cfg(not(windows))]
fn record_without_audio_sessions() {
    let home = TempDir::new().unwrap();
    isocap_bin(&home)
        .args(["record", "--pid", "1", "--duration", "1s"])
        .assert()
        .code(EXIT_DEVICE_UNAVAILABLE);
}

#[cfg(unix)]
mod without_daemon {
    use super::*;

    fn assert_unavailable(args: &[&str]) {
        let home = TempDir::new().unwrap();
        isocap_bin(&home)
            .args(args)
            .assert()
            .code(EXIT_DAEMON_UNAVAILABLE)
            .stderr(predicate::str::contains("No daemon running"));
    }

    #[test]
    fn stop() {
        assert_unavailable(&["stop"]);
    }

    #[test]
    fn status() {
        assert_unavailable(&["status"]);
    }

    #[test]
    fn start() {
        assert_unavailable(&["start", "--pid", "4242"]);
    }

    #[test]
    fn monitor_arm() {
        assert_unavailable(&["monitor", "arm", "--pid", "4242", "--format", "flac"]);
    }

    #[test]
    fn pending() {
        assert_unavailable(&["pending"]);
    }

    #[test]
    fn save() {
        assert_unavailable(&["save", "1", "out.mp3", "--title", "Intro"]);
    }
}
