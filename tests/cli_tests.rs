//! Tests for the `cluster-shutdown` binary's output streams and log file

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn run_with_config(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cluster-shutdown"))
        .arg("--config-dir")
        .arg(config_dir)
        .args(["--environment", "test"])
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn write_config(dir: &Path, role: &str) -> std::path::PathBuf {
    let role_file = dir.join("pool.conf");
    let log_file = dir.join("logs").join("cluster-shutdown.json");
    fs::write(&role_file, role).unwrap();
    fs::write(
        dir.join("cluster-shutdown.yaml"),
        format!(
            "management:\n  role_file: {}\nlogging:\n  log_file: {}\n",
            role_file.display(),
            log_file.display()
        ),
    )
    .unwrap();
    log_file
}

#[test]
fn test_role_prints_only_the_role_on_stdout() {
    let dir = tempfile::TempDir::new().unwrap();
    write_config(dir.path(), "master\n");

    let output = run_with_config(dir.path(), &["role"]);

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "coordinator\n");
    assert!(String::from_utf8_lossy(&output.stderr).contains("STRUCTURED LOGGING"));
}

#[test]
fn test_log_file_is_flushed_before_exit() {
    let dir = tempfile::TempDir::new().unwrap();
    let log_file = write_config(dir.path(), "slave:10.0.0.10\n");

    let output = run_with_config(dir.path(), &["role"]);

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "member\n");
    let contents = fs::read_to_string(&log_file).unwrap();
    let first = contents.lines().next().unwrap();
    let record: serde_json::Value = serde_json::from_str(first).unwrap();
    assert!(record["fields"]["message"]
        .as_str()
        .is_some_and(|m| m.contains("STRUCTURED LOGGING")));
}

#[test]
fn test_fatal_error_is_reported_on_stderr_and_exits_one() {
    let dir = tempfile::TempDir::new().unwrap();
    write_config(dir.path(), "");
    fs::remove_file(dir.path().join("pool.conf")).unwrap();

    let output = run_with_config(dir.path(), &["role"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("resolving local role"));
}
