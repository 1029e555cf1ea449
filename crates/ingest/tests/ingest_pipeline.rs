use std::fs;
use std::path::PathBuf;

use ingest::{scan_openclaw_home, scan_paths, usage_from_path};
use tempfile::tempdir;

#[test]
fn scan_collects_agents_sessions_and_logs() {
    let dir = tempdir().expect("temp dir");
    let agent_dir = dir.path().join("agents/main/sessions");
    let shared_dir = dir.path().join("sessions");
    let logs_dir = dir.path().join("logs");
    for path in [&agent_dir, &shared_dir, &logs_dir] {
        fs::create_dir_all(path).expect("create log dir");
    }
    fs::write(
        agent_dir.join("a.jsonl"),
        r#"{"model":"claude-sonnet-4-20250514","usage":{"input":1000,"output":200},"timestamp":"2025-01-01T00:00:00Z"}"#,
    )
    .expect("write agent log");
    fs::write(
        shared_dir.join("b.ndjson"),
        r#"{"type":"message","message":{"model":"anthropic/claude-sonnet-4-20250514","usage":{"input_tokens":500,"output_tokens":100}}}"#,
    )
    .expect("write shared log");
    fs::write(
        logs_dir.join("c.jsonl"),
        r#"{"model":"gpt-5.1-codex","usage":{"input":10,"output":20}}"#,
    )
    .expect("write logs log");
    fs::write(logs_dir.join("notes.txt"), "ignored").expect("write notes");

    let result = scan_openclaw_home(dir.path());
    assert_eq!(result.stats.files_scanned, 3);
    assert_eq!(result.stats.records_parsed, 3);
    assert!(result.stats.issues.is_empty());

    let sonnet = &result.usage["anthropic/claude-sonnet-4-20250514"];
    assert_eq!(sonnet.input_tokens, 1500);
    assert_eq!(sonnet.output_tokens, 300);
    assert_eq!(sonnet.session_count, 2);
    assert_eq!(sonnet.aliases.len(), 2);
    assert_eq!(result.usage["openai/gpt-5.1-codex"].output_tokens, 20);
}

#[test]
fn corrupt_lines_are_skipped_without_losing_the_file() {
    let dir = tempdir().expect("temp dir");
    let sessions = dir.path().join("sessions");
    fs::create_dir_all(&sessions).expect("create sessions");
    let body = [
        r#"{"model":"m","usage":{"input":1,"output":1}}"#,
        r#"{"model":"m","usage":{"input":"#,
        "",
        r#"{"event":"heartbeat"}"#,
        r#"{"model":"m","usage":{"input":2,"output":3}}"#,
    ]
    .join("\n");
    fs::write(sessions.join("s.jsonl"), body).expect("write log");

    let result = scan_openclaw_home(dir.path());
    assert_eq!(result.stats.records_parsed, 2);
    assert_eq!(result.stats.lines_skipped, 2);
    assert_eq!(result.usage["m"].input_tokens, 3);
    assert_eq!(result.usage["m"].output_tokens, 4);
}

#[test]
fn invalid_utf8_line_is_skipped_and_later_lines_are_read() {
    let dir = tempdir().expect("temp dir");
    let sessions = dir.path().join("sessions");
    fs::create_dir_all(&sessions).expect("create sessions");

    let mut bytes = Vec::new();
    bytes.extend_from_slice(br#"{"model":"m","usage":{"input":1,"output":5}}"#);
    bytes.push(b'\n');
    bytes.extend_from_slice(&[0xff, 0xfe, b' ', b'g', b'a', b'r', b'b', b'\n']);
    bytes.extend_from_slice(br#"{"model":"m","usage":{"input":100,"output":5}}"#);
    bytes.push(b'\n');
    fs::write(sessions.join("mixed.jsonl"), &bytes).expect("write mixed log");
    fs::write(
        sessions.join("good.jsonl"),
        r#"{"model":"m","usage":{"input":1000,"output":1}}"#,
    )
    .expect("write good log");

    let result = scan_openclaw_home(dir.path());
    assert_eq!(result.stats.files_scanned, 2);
    assert!(result.stats.issues.is_empty());
    assert_eq!(result.stats.lines_skipped, 1);
    assert_eq!(result.stats.records_parsed, 3);
    assert_eq!(result.usage["m"].input_tokens, 1101);

    let single = usage_from_path(&sessions.join("mixed.jsonl")).expect("read mixed log");
    assert_eq!(single["m"].input_tokens, 101);
}

#[test]
fn missing_paths_are_reported_not_fatal() {
    let dir = tempdir().expect("temp dir");
    let good = dir.path().join("good.jsonl");
    fs::write(&good, r#"{"model":"m","usage":{"output":9}}"#).expect("write log");

    let result = scan_paths(&[dir.path().join("missing"), good]);
    assert_eq!(result.stats.issues.len(), 1);
    assert_eq!(result.usage["m"].output_tokens, 9);
}

#[test]
fn plain_logs_need_json_content() {
    let dir = tempdir().expect("temp dir");
    let logs = dir.path().join("logs");
    fs::create_dir_all(&logs).expect("create logs");
    fs::write(logs.join("gateway.log"), "starting gateway\nlistening\n").expect("write text log");
    fs::write(
        logs.join("usage.log"),
        "\n{\"model\":\"m\",\"usage\":{\"input\":4}}\n",
    )
    .expect("write json log");

    let result = scan_paths(&[logs]);
    assert_eq!(result.stats.files_scanned, 2);
    assert_eq!(result.stats.files_skipped, 1);
    assert_eq!(result.usage["m"].input_tokens, 4);
}

#[test]
fn usage_from_path_fails_on_missing_file() {
    let dir = tempdir().expect("temp dir");
    let missing: PathBuf = dir.path().join("nope.jsonl");
    assert!(usage_from_path(&missing).is_err());
}
