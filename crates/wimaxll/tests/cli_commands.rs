#![cfg(all(unix, feature = "cli"))]

use std::process::{Command, Output};

fn wimaxll(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_wimaxll"))
        .args(args)
        .output()
        .expect("wimaxll binary should run")
}

#[test]
fn version_prints_package_version() {
    let out = wimaxll(&["version"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert_eq!(
        stdout.trim(),
        format!("wimaxll {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn version_extended_names_protocol() {
    let out = wimaxll(&["version", "--extended"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("protocol: WiMAX v1"));
}

#[test]
fn info_on_missing_device_exits_no_device() {
    let out = wimaxll(&["info", "nosuchwmx0", "--log-level", "error"]);
    assert_eq!(out.status.code(), Some(69));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("nosuchwmx0"));
}

#[test]
fn rfkill_on_missing_device_exits_no_device() {
    let out = wimaxll(&["rfkill", "nosuchwmx0", "off", "--log-level", "off"]);
    assert_eq!(out.status.code(), Some(69));
}

#[test]
fn send_with_bad_hex_is_usage_error() {
    let out = wimaxll(&["send", "nosuchwmx0", "--hex", "zz", "--log-level", "off"]);
    assert_eq!(out.status.code(), Some(64));
}

#[test]
fn invalid_timeout_is_usage_error() {
    let out = wimaxll(&["reset", "wmx0", "--timeout", "soon", "--log-level", "off"]);
    assert_eq!(out.status.code(), Some(64));
}
