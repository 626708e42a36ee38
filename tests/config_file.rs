use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::time::{Duration, Instant};

fn config_tempfile(content: &str) -> tempfile::NamedTempFile {
    let mut tf = tempfile::NamedTempFile::new().expect("tempfile");
    write!(tf, "{}", content).unwrap();
    tf
}

fn cargo_bin() -> Command {
    let mut cmd = Command::cargo_bin("bfvm").unwrap();
    cmd.env_remove("BFVM_DELAY_MS").env_remove("BFVM_IO_POLICY");
    cmd
}

#[test]
fn config_file_can_disable_output() {
    let cfg = config_tempfile("[run]\noutput = false\n");
    cargo_bin()
        .env("BFVM_CONFIG", cfg.path())
        .args(["run", "+++."])
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn config_file_can_disable_input() {
    let cfg = config_tempfile("[run]\ninput = off\n");
    cargo_bin()
        .env("BFVM_CONFIG", cfg.path())
        .args(["run", "+,."])
        .write_stdin("A")
        .assert()
        .success()
        .stdout("\u{1}");
}

#[test]
fn flag_overrides_environment_delay() {
    let started = Instant::now();
    cargo_bin()
        .timeout(Duration::from_secs(5))
        .env("BFVM_DELAY_MS", "10000")
        .args(["run", "--delay", "1", "++."])
        .write_stdin("")
        .assert()
        .success()
        .stdout("\u{2}");
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn missing_config_file_means_defaults() {
    cargo_bin()
        .env("BFVM_CONFIG", "/definitely/not/here.toml")
        .args(["run", "+."])
        .write_stdin("")
        .assert()
        .success()
        .stdout("\u{1}");
}
