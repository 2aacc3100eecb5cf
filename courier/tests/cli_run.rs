//! CLI tests for `courier run` and `courier check`.
//!
//! Spawns the courier binary and checks exit codes. None of these reach the
//! network.

use std::fs;
use std::process::Command;

use courier::exit_codes;
use courier::test_support::ACTOR_WIF;

fn valid_config() -> String {
    format!(
        r#"
account = "alice.wam"
private_key = "{ACTOR_WIF}"

[[recipients]]
account = "bob.wam"
quota = {{ barley = 1 }}
"#
    )
}

#[test]
fn run_with_invalid_config_exits_with_invalid_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("courier.toml");
    fs::write(&path, "account = \"alice.wam\"\nprivate_key = \"nope\"\n").expect("write");

    let status = Command::new(env!("CARGO_BIN_EXE_courier"))
        .arg("run")
        .arg("--config")
        .arg(&path)
        .status()
        .expect("courier run");

    assert_eq!(status.code(), Some(exit_codes::INVALID));
}

#[test]
fn run_with_missing_config_exits_with_invalid_code() {
    let temp = tempfile::tempdir().expect("tempdir");

    let status = Command::new(env!("CARGO_BIN_EXE_courier"))
        .args(["run", "--config"])
        .arg(temp.path().join("absent.toml"))
        .status()
        .expect("courier run");

    assert_eq!(status.code(), Some(exit_codes::INVALID));
}

#[test]
fn check_valid_config_prints_public_key() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("courier.toml");
    fs::write(&path, valid_config()).expect("write");

    let output = Command::new(env!("CARGO_BIN_EXE_courier"))
        .args(["check", "--config"])
        .arg(&path)
        .output()
        .expect("courier check");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("EOS6MRyAjQq8ud7hVNYcfnVPJqcVpscN5So8BhtHuGYqET5GDW5CV"));
    assert!(stdout.contains("recipient bob.wam"));
}
