//! CLI smoke tests: drive the built binary end to end.

use std::path::Path;
use std::process::{Command, Output};

fn cli_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_evc"));
    cmd.env_remove("EVC_DB_PATH")
        .env_remove("EVC_PERSONALITY")
        .env_remove("EVC_LOCK_TIMEOUT_MS")
        .env_remove("RUST_LOG");
    cmd
}

/// Run against an isolated database and a config path that does not exist.
fn run_in(dir: &Path, args: &[&str]) -> Output {
    cli_bin()
        .arg("--db")
        .arg(dir.join("state.db"))
        .arg("--config")
        .arg(dir.join("missing.toml"))
        .args(args)
        .output()
        .expect("failed to run")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

#[test]
fn test_help_flag() {
    let output = cli_bin().arg("--help").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"), "Expected usage info in --help output");
    assert!(stdout.contains("eval"));
}

#[test]
fn test_version_flag() {
    let output = cli_bin().arg("--version").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("evc"), "Expected binary name in --version output");
}

#[test]
fn test_invalid_config_does_not_panic() {
    let output = cli_bin()
        .arg("--config")
        .arg("/tmp/nonexistent_evc_config_12345.toml")
        .arg("--help")
        .output()
        .expect("failed to run");
    assert!(output.status.success());
}

#[test]
fn test_turns_persist_between_runs() {
    let dir = tempfile::TempDir::new().unwrap();
    let turn = ["--session", "abc123", "turn", "--positive", "0.2", "--negative", "0.6", "--context", "1.1"];

    let first = stdout_json(&run_in(dir.path(), &turn));
    assert_eq!(first["turn"], 1);
    assert_eq!(first["session_id"], "abc123");
    assert!(first["trust"].as_f64().unwrap() < 0.5);
    let dominant = first["dominant_emotion"].as_str().unwrap();
    assert!(dominant == "Fear" || dominant == "Sadness", "dominant was {dominant}");

    let second = stdout_json(&run_in(dir.path(), &turn));
    assert_eq!(second["turn"], 2);

    let peek = stdout_json(&run_in(dir.path(), &["--session", "abc123", "peek"]));
    assert_eq!(peek["turn"], 2);

    let sessions = run_in(dir.path(), &["sessions"]);
    assert!(String::from_utf8_lossy(&sessions.stdout).contains("abc123/assistant"));

    let reset = run_in(dir.path(), &["--session", "abc123", "reset"]);
    assert!(reset.status.success());
    let peek = stdout_json(&run_in(dir.path(), &["--session", "abc123", "peek"]));
    assert_eq!(peek["turn"], 0);
    assert_eq!(peek["trust"], 0.5);
}

#[test]
fn test_malformed_stimulus_is_clamped() {
    let dir = tempfile::TempDir::new().unwrap();
    let output = run_in(
        dir.path(),
        &["turn", "--positive", "NaN", "--negative", "-3", "--context", "99"],
    );
    let state = stdout_json(&output);
    assert_eq!(state["turn"], 1);
    for (_, v) in state["hormones"].as_object().unwrap() {
        let v = v.as_f64().unwrap();
        assert!((0.0..=1.0).contains(&v));
    }
}

#[test]
fn test_peek_context_fragment() {
    let dir = tempfile::TempDir::new().unwrap();
    let output = run_in(dir.path(), &["peek", "--context"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("[EVC STATE] Turn 0"));
}

#[test]
fn test_chat_reads_stdin() {
    use std::io::Write;
    use std::process::Stdio;

    let dir = tempfile::TempDir::new().unwrap();
    let mut child = cli_bin()
        .arg("--db")
        .arg(dir.path().join("state.db"))
        .arg("--config")
        .arg(dir.path().join("missing.toml"))
        .arg("chat")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("failed to spawn");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"0.9 0.0 1.0\nnot numbers\npeek\nquit\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[EVC STATE] Turn 1"));
    assert!(stdout.contains("User mood:"));
    assert!(stdout.contains("Could not parse"));
}

#[test]
fn test_eval_is_deterministic_and_writes_csv() {
    let dir = tempfile::TempDir::new().unwrap();
    let csv = dir.path().join("trace.csv");
    let csv_arg = csv.to_str().unwrap();

    let a = run_in(dir.path(), &["eval", "--turns", "20", "--seed", "7", "--csv", csv_arg]);
    let b = run_in(dir.path(), &["eval", "--turns", "20", "--seed", "7"]);
    assert!(a.status.success() && b.status.success());

    let a_out = String::from_utf8_lossy(&a.stdout);
    let b_out = String::from_utf8_lossy(&b.stdout);
    assert!(a_out.contains("Final trust"));
    assert!(b_out.starts_with(&*a_out.lines().take(20).collect::<Vec<_>>().join("\n")));

    let rows = std::fs::read_to_string(&csv).unwrap();
    assert_eq!(rows.lines().count(), 21);
}
