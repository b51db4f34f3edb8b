//! Tests for the `observer` binary surface.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;

fn main_source() -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/main.rs");
    match fs::read_to_string(&path) {
        Ok(source) => source,
        Err(err) => panic!("main source should load from {}: {err}", path.display()),
    }
}

#[test]
fn main_defines_primary_subcommands() {
    let source = main_source();
    assert!(source.contains("Start"));
    assert!(source.contains("Check"));
    assert!(source.contains("Rcon"));
}

#[test]
fn help_lists_subcommands() {
    let output = Command::cargo_bin("observer")
        .expect("binary should build")
        .arg("--help")
        .output()
        .expect("help should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["start", "check", "rcon"] {
        assert!(stdout.contains(name), "missing {name} in help");
    }
}

#[test]
fn rcon_without_command_is_a_usage_error() {
    Command::cargo_bin("observer")
        .expect("binary should build")
        .arg("rcon")
        .assert()
        .failure();
}

#[test]
fn rcon_without_password_fails_cleanly() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    Command::cargo_bin("observer")
        .expect("binary should build")
        .current_dir(tmp.path())
        .env_remove("OBSERVER_RCON_PASSWORD")
        .env_remove("OBSERVER_CONFIG")
        .env_remove("OBSERVER_ENV_FILE")
        .args(["rcon", "list"])
        .assert()
        .failure();
}
