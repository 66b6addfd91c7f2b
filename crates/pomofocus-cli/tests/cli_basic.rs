//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own data directory.

use std::process::Command;

use tempfile::TempDir;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(data_dir: &TempDir, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_pomofocus"))
        .args(args)
        .env("POMOFOCUS_DATA_DIR", data_dir.path())
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_json(data_dir: &TempDir, args: &[&str]) -> serde_json::Value {
    let (stdout, stderr, code) = run_cli(data_dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

#[test]
fn test_timer_status_reflects_config() {
    let dir = TempDir::new().unwrap();
    let snapshot = run_json(&dir, &["timer", "status"]);
    assert_eq!(snapshot["mode"], "focus");
    assert_eq!(snapshot["status"], "idle");
    assert_eq!(snapshot["time_remaining_secs"], 1500);

    let (_, _, code) = run_cli(&dir, &["config", "set", "timer.focus_duration", "3000"]);
    assert_eq!(code, 0);
    let snapshot = run_json(&dir, &["timer", "status"]);
    assert_eq!(snapshot["time_remaining_secs"], 3000);
}

#[test]
fn test_config_rejects_out_of_range() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(&dir, &["config", "set", "timer.focus_duration", "30"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("focus_duration"), "stderr: {stderr}");

    let (stdout, _, code) = run_cli(&dir, &["config", "get", "timer.focus_duration"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "1500");
}

#[test]
fn test_config_unknown_key_fails() {
    let dir = TempDir::new().unwrap();
    let (_, _, code) = run_cli(&dir, &["config", "get", "timer.nope"]);
    assert_ne!(code, 0);
}

#[test]
fn test_task_lifecycle() {
    let dir = TempDir::new().unwrap();
    let task = run_json(&dir, &["task", "create", "Write report", "--estimate", "3"]);
    let id = task["id"].as_str().unwrap().to_string();
    assert_eq!(task["estimated_pomodoros"], 3);

    let tasks = run_json(&dir, &["task", "list"]);
    assert_eq!(tasks.as_array().unwrap().len(), 1);

    let done = run_json(&dir, &["task", "done", &id]);
    assert_eq!(done["completed"], true);
    let open = run_json(&dir, &["task", "list"]);
    assert!(open.as_array().unwrap().is_empty());
    let all = run_json(&dir, &["task", "list", "--all"]);
    assert_eq!(all.as_array().unwrap().len(), 1);

    let (_, _, code) = run_cli(&dir, &["task", "delete", &id]);
    assert_eq!(code, 0);
    let (_, _, code) = run_cli(&dir, &["task", "delete", &id]);
    assert_ne!(code, 0);
}

#[test]
fn test_task_activate_sets_config() {
    let dir = TempDir::new().unwrap();
    let task = run_json(&dir, &["task", "create", "Deep work", "--activate"]);
    let (stdout, _, code) = run_cli(&dir, &["config", "get", "active_task"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), task["id"].as_str().unwrap());

    let snapshot = run_json(&dir, &["timer", "status"]);
    assert_eq!(snapshot["active_task_id"], task["id"]);
}

#[test]
fn test_timer_run_rejects_unknown_task() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(&dir, &["timer", "run", "--task", "nope", "--now"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("task not found: nope"), "stderr: {stderr}");
}

#[test]
fn test_config_active_task_must_exist() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(&dir, &["config", "set", "active_task", "nope"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("task not found: nope"), "stderr: {stderr}");
    let (stdout, _, _) = run_cli(&dir, &["config", "get", "active_task"]);
    assert_ne!(stdout.trim(), "nope");

    let task = run_json(&dir, &["task", "create", "Real task"]);
    let id = task["id"].as_str().unwrap();
    let (_, stderr, code) = run_cli(&dir, &["config", "set", "active_task", id]);
    assert_eq!(code, 0, "stderr: {stderr}");
    let (_, _, code) = run_cli(&dir, &["config", "set", "active_task", ""]);
    assert_eq!(code, 0);
}

#[test]
fn test_empty_stats_and_sessions() {
    let dir = TempDir::new().unwrap();
    let today = run_json(&dir, &["stats", "today"]);
    assert_eq!(today["stats"]["total_sessions"], 0);
    assert_eq!(today["daily_goal"], 8);

    for period in ["week", "month", "all"] {
        let stats = run_json(&dir, &["stats", period]);
        assert_eq!(stats["completed_focus_sessions"], 0);
    }

    let sessions = run_json(&dir, &["session", "list"]);
    assert!(sessions.as_array().unwrap().is_empty());
}
