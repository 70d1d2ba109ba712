//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against a throwaway data directory and
//! verify its JSON output.

use std::path::Path;
use std::process::Command;

use serde_json::Value;

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(data_dir: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_mattertime"))
        .args(args)
        .env("MATTERTIME_DATA_DIR", data_dir)
        .env_remove("MATTERTIME_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn run_json(data_dir: &Path, args: &[&str]) -> Value {
    let (code, stdout, stderr) = run_cli(data_dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

fn create_task(data_dir: &Path, title: &str) -> i64 {
    run_json(data_dir, &["task", "create", title])["id"]
        .as_i64()
        .unwrap()
}

#[test]
fn test_task_create_and_get() {
    let dir = tempfile::tempdir().unwrap();
    let task = run_json(
        dir.path(),
        &["task", "create", "Review NDA", "--matter", "ACME-42", "--category", "1"],
    );
    assert_eq!(task["title"], "Review NDA");
    assert_eq!(task["matter"], "ACME-42");
    assert_eq!(task["category_id"], 1);
    assert_eq!(task["status"], "open");
    assert_eq!(task["total_duration"], 0);
    assert_eq!(task["is_running"], false);

    let id = task["id"].as_i64().unwrap().to_string();
    let fetched = run_json(dir.path(), &["task", "get", &id]);
    assert_eq!(fetched, task);
}

#[test]
fn test_task_create_rejects_blank_title() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, stderr) = run_cli(dir.path(), &["task", "create", "   "]);
    assert_eq!(code, 1);
    assert!(stdout.is_empty());
    assert!(stderr.starts_with("error:"), "stderr: {stderr}");
}

#[test]
fn test_task_get_missing_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(dir.path(), &["task", "get", "999"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("999"), "stderr: {stderr}");
}

#[test]
fn test_timer_start_switches_running_task() {
    let dir = tempfile::tempdir().unwrap();
    let a = create_task(dir.path(), "A").to_string();
    let b = create_task(dir.path(), "B").to_string();

    let started = run_json(dir.path(), &["timer", "start", &a]);
    assert_eq!(started["changed"], true);
    assert_eq!(started["task"]["is_running"], true);
    assert!(started["stopped"].is_null());

    let switched = run_json(dir.path(), &["timer", "start", &b]);
    assert_eq!(switched["stopped"]["id"].as_i64().unwrap().to_string(), a);
    assert_eq!(switched["stopped"]["is_running"], false);

    let active = run_json(dir.path(), &["timer", "active"]);
    assert_eq!(active["task"]["id"].as_i64().unwrap().to_string(), b);
    assert!(active["elapsed_secs"].as_u64().is_some());
}

#[test]
fn test_timer_stop_idle_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let id = create_task(dir.path(), "Idle").to_string();
    let stopped = run_json(dir.path(), &["timer", "stop", &id]);
    assert_eq!(stopped["changed"], false);
    assert_eq!(stopped["task"]["total_duration"], 0);
}

#[test]
fn test_timer_complete_then_start_fails() {
    let dir = tempfile::tempdir().unwrap();
    let id = create_task(dir.path(), "Done").to_string();
    run_json(dir.path(), &["timer", "start", &id]);

    let completed = run_json(dir.path(), &["timer", "complete", &id]);
    assert_eq!(completed["task"]["status"], "completed");
    assert_eq!(completed["task"]["is_running"], false);
    assert_eq!(completed["events"][0]["type"], "TimerStopped");

    let (code, _, stderr) = run_cli(dir.path(), &["timer", "start", &id]);
    assert_eq!(code, 1);
    assert!(stderr.contains("completed"), "stderr: {stderr}");

    let sessions = run_json(dir.path(), &["task", "sessions", &id]);
    assert_eq!(sessions.as_array().unwrap().len(), 1);

    let open = run_json(dir.path(), &["task", "list", "--status", "open"]);
    assert!(open.as_array().unwrap().is_empty());
    let done = run_json(dir.path(), &["task", "list", "--status", "completed"]);
    assert_eq!(done.as_array().unwrap().len(), 1);
}

#[test]
fn test_timer_active_without_runner() {
    let dir = tempfile::tempdir().unwrap();
    let active = run_json(dir.path(), &["timer", "active"]);
    assert!(active["task"].is_null());
    assert_eq!(active["elapsed_secs"], 0);
    assert_eq!(active["elapsed"], "0:00:00");
}

#[test]
fn test_user_flag_scopes_tasks() {
    let dir = tempfile::tempdir().unwrap();
    let id = create_task(dir.path(), "Mine").to_string();

    let (code, _, _) = run_cli(dir.path(), &["--user", "2", "task", "get", &id]);
    assert_eq!(code, 1);
    let theirs = run_json(dir.path(), &["task", "list", "--user", "2"]);
    assert!(theirs.as_array().unwrap().is_empty());
}

#[test]
fn test_db_flag_overrides_location() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("other.db");
    let db = db.to_str().unwrap();

    run_json(dir.path(), &["--db", db, "task", "create", "Elsewhere"]);
    assert!(dir.path().join("other.db").exists());
    let default = run_json(dir.path(), &["task", "list"]);
    assert!(default.as_array().unwrap().is_empty());
}

#[test]
fn test_category_list() {
    let dir = tempfile::tempdir().unwrap();
    let categories = run_json(dir.path(), &["category", "list"]);
    let names: Vec<_> = categories
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        ["Contract Review", "Legal Research", "Compliance", "Litigation", "Corporate"]
    );
}

#[test]
fn test_config_get_set_reset() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["config", "get", "display.show_seconds"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "true");

    let (code, _, _) = run_cli(dir.path(), &["config", "set", "display.show_seconds", "false"]);
    assert_eq!(code, 0);
    let active = run_json(dir.path(), &["timer", "active"]);
    assert_eq!(active["elapsed"], "0:00");

    let (code, _, stderr) = run_cli(dir.path(), &["config", "set", "no.such.key", "1"]);
    assert_eq!(code, 1);
    assert!(stderr.starts_with("error:"));

    let (code, _, _) = run_cli(dir.path(), &["config", "reset"]);
    assert_eq!(code, 0);
    let listed = run_json(dir.path(), &["config", "list"]);
    assert_eq!(listed["display"]["show_seconds"], true);
    assert_eq!(listed["user_id"], 1);
}

#[test]
fn test_config_empty_database_path_uses_default() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, _) = run_cli(dir.path(), &["config", "set", "database_path", ""]);
    assert_eq!(code, 0);
    let (_, stdout, _) = run_cli(dir.path(), &["config", "get", "database_path"]);
    assert_eq!(stdout.trim(), "");

    create_task(dir.path(), "Kept");
    let tasks = run_json(dir.path(), &["task", "list"]);
    assert_eq!(tasks.as_array().unwrap().len(), 1);
    assert!(dir.path().join("mattertime.db").exists());
}

#[test]
fn test_config_path_is_inside_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["config", "path"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), dir.path().join("config.toml").display().to_string());
}

#[test]
fn test_config_user_id_applies() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, _) = run_cli(dir.path(), &["config", "set", "user_id", "7"]);
    assert_eq!(code, 0);
    let task = run_json(dir.path(), &["task", "create", "Seven"]);
    assert_eq!(task["user_id"], 7);
}
