//! Basic CLI E2E tests.
//!
//! Each test runs the `lapse` binary with HOME pointed at a fresh temporary
//! directory, so configuration and database never touch the real profile.

use std::io::Write;
use std::process::{Command, Stdio};

use tempfile::TempDir;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &TempDir, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_lapse"))
        .args(args)
        .env("HOME", home.path())
        .env_remove("LAPSE_ENV")
        .env_remove("LAPSE_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_json(home: &TempDir, args: &[&str]) -> serde_json::Value {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

#[test]
fn test_status_on_fresh_install() {
    let home = TempDir::new().unwrap();
    let state = run_json(&home, &["timer", "status"]);
    assert_eq!(state["mode"], "focus");
    assert_eq!(state["currentTime"], 1500);
    assert_eq!(state["sessionNumber"], 1);
    assert_eq!(state["isRunning"], false);
}

#[test]
fn test_start_pause_reset() {
    let home = TempDir::new().unwrap();

    let state = run_json(&home, &["timer", "start"]);
    assert_eq!(state["isRunning"], true);
    assert!(state["startTime"].is_number());

    let state = run_json(&home, &["timer", "pause"]);
    assert_eq!(state["isRunning"], false);
    assert_eq!(state["isPaused"], true);
    assert!(state["currentTime"].as_u64().unwrap() <= 1500);

    let state = run_json(&home, &["timer", "reset", "--mode", "long-break"]);
    assert_eq!(state["mode"], "long-break");
    assert_eq!(state["currentTime"], 15 * 60);
    assert_eq!(state["isPaused"], false);
}

#[test]
fn test_expired_session_completes_on_next_status() {
    let home = TempDir::new().unwrap();
    run_json(&home, &["timer", "start", "--seconds", "1"]);
    std::thread::sleep(std::time::Duration::from_millis(2100));

    let state = run_json(&home, &["timer", "status"]);
    assert_eq!(state["mode"], "break");
    assert_eq!(state["sessionNumber"], 2);
    assert_eq!(state["isRunning"], false);
}

#[test]
fn test_settings_set_and_show() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(&home, &["settings", "set", "focusMinutes", "30"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("ok"));

    let settings = run_json(&home, &["settings", "show"]);
    assert_eq!(settings["focusMinutes"], 30);

    let state = run_json(&home, &["timer", "status"]);
    assert_eq!(state["currentTime"], 1800);
}

#[test]
fn test_settings_out_of_range_rejected() {
    let home = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(&home, &["settings", "set", "totalSessions", "11"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_config_get_set() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(&home, &["config", "get", "wake.granularity_secs"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "1");

    let (_, _, code) = run_cli(&home, &["config", "set", "wake.granularity_secs", "60"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(&home, &["config", "get", "wake.granularity_secs"]);
    assert_eq!(stdout.trim(), "60");

    let (_, _, code) = run_cli(&home, &["config", "get", "no.such.key"]);
    assert_ne!(code, 0);
}

#[test]
fn test_config_validate() {
    let home = TempDir::new().unwrap();
    let report = run_json(&home, &["config", "validate"]);
    assert_eq!(report["wakeGranularitySecs"], 1);
    assert!(report["database"].as_str().unwrap().ends_with("lapse.db"));

    let path = report["config"].as_str().unwrap().to_string();
    std::fs::write(&path, "[wake]\ngranularity_secs = 0\n").unwrap();
    let (_, stderr, code) = run_cli(&home, &["config", "validate"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("wake.granularity_secs"));
}

#[test]
fn test_daemon_serves_json_lines() {
    let home = TempDir::new().unwrap();
    let mut child = Command::new(env!("CARGO_BIN_EXE_lapse"))
        .arg("daemon")
        .env("HOME", home.path())
        .env_remove("LAPSE_ENV")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn daemon");

    {
        let stdin = child.stdin.as_mut().unwrap();
        writeln!(stdin, r#"{{"action":"getState"}}"#).unwrap();
        writeln!(stdin, r#"{{"action":"startTimer","currentTime":1500,"state":{{}}}}"#).unwrap();
        writeln!(stdin, "not json").unwrap();
    }
    drop(child.stdin.take());

    let output = child.wait_with_output().unwrap();
    let lines: Vec<serde_json::Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(lines[0]["event"], "recovered");
    assert_eq!(lines[0]["recovery"]["outcome"], "initialized");
    assert!(lines.iter().any(|l| l["mode"] == "focus"));
    assert!(lines.iter().any(|l| l["success"] == true));
    assert!(lines.iter().any(|l| l["event"] == "error"));
}
