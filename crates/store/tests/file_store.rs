use std::fs;
use std::time::{Duration, SystemTime};

use tempfile::tempdir;
use tracker_core::{CriticalLevel, MilestoneState, PendingResponse, TrackingConfig, UsageMap};
use tracker_store::{FileStore, HistoryEntry, Store, StoreError};

#[test]
fn missing_config_is_an_error_until_saved() {
    let dir = tempdir().expect("temp dir");
    let store = FileStore::open(dir.path().join("fresh"));

    assert!(matches!(store.load_config(), Err(StoreError::Missing(_))));
    store
        .save_config(&TrackingConfig::default())
        .expect("save defaults");
    let config = store.load_config().expect("load config");
    assert_eq!(config, TrackingConfig::default());
}

#[test]
fn corrupt_config_is_reported_and_left_alone() {
    let dir = tempdir().expect("temp dir");
    let store = FileStore::open(dir.path());
    fs::write(&store.paths().config_path, "{\"thresholds\": ").expect("write corrupt");

    assert!(matches!(
        store.load_config(),
        Err(StoreError::Corrupt { .. })
    ));
    let raw = fs::read_to_string(&store.paths().config_path).expect("read back");
    assert_eq!(raw, "{\"thresholds\": ");
}

#[test]
fn save_config_preserves_unknown_fields_and_leaves_no_temp_file() {
    let dir = tempdir().expect("temp dir");
    let store = FileStore::open(dir.path());
    fs::write(
        &store.paths().config_path,
        r#"{"thresholds":{"daily_cost_limit":10,"theme":"dark"},"alerts":{"telegram_enabled":true}}"#,
    )
    .expect("write config");

    let mut config = store.load_config().expect("load");
    config.thresholds.set_daily_limit(20.0);
    config.thresholds.critical_fraction = CriticalLevel::Disabled;
    store.save_config(&config).expect("save");

    let raw = fs::read_to_string(&store.paths().config_path).expect("read");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(value["alerts"]["telegram_enabled"], true);
    assert_eq!(value["thresholds"]["theme"], "dark");
    assert_eq!(value["thresholds"]["daily_cost_limit"], 20.0);
    assert_eq!(value["thresholds"]["weekly_cost_limit"], 120.0);
    assert_eq!(value["thresholds"]["monthly_cost_limit"], 600.0);
    assert_eq!(value["thresholds"]["critical_fraction"], "disabled");

    let leftovers = fs::read_dir(dir.path())
        .expect("list")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(leftovers, 0);
}

#[test]
fn state_documents_default_when_missing_or_corrupt() {
    let dir = tempdir().expect("temp dir");
    let store = FileStore::open(dir.path());
    assert_eq!(store.load_milestones().expect("milestones"), MilestoneState::default());
    assert_eq!(store.load_pending().expect("pending"), PendingResponse::default());

    fs::write(&store.paths().milestones_path, "not json").expect("write");
    fs::write(&store.paths().pending_path, "[1,2").expect("write");
    assert_eq!(store.load_milestones().expect("milestones"), MilestoneState::default());
    assert_eq!(store.load_pending().expect("pending"), PendingResponse::default());
}

#[test]
fn state_documents_round_trip_with_legacy_keys() {
    let dir = tempdir().expect("temp dir");
    let store = FileStore::open(dir.path());
    fs::write(
        &store.paths().milestones_path,
        r#"{"last_alert_cost": 7.5, "timestamp": "2025-01-01T10:00:00"}"#,
    )
    .expect("write milestones");
    let state = store.load_milestones().expect("milestones");
    assert_eq!(state.last_alert_cost, 7.5);
    assert_eq!(
        state.last_update_timestamp.as_deref(),
        Some("2025-01-01T10:00:00")
    );

    let pending = PendingResponse {
        awaiting_response: true,
        alert_sent_at: Some("2025-01-01T10:00:00.000Z".to_string()),
    };
    store.save_pending(&pending).expect("save pending");
    assert_eq!(store.load_pending().expect("pending"), pending);
}

#[test]
fn price_table_failures_read_as_empty() {
    let dir = tempdir().expect("temp dir");
    let store = FileStore::open(dir.path());
    assert!(store.load_prices().is_empty());

    fs::write(&store.paths().prices_path, "{oops").expect("write");
    assert!(store.load_prices().is_empty());

    fs::write(
        &store.paths().prices_path,
        r#"{"openai/gpt-5.1-codex":{"input_price_per_1k_tokens":0.5,"output_price_per_1k_tokens":1.5,"note":"x"}}"#,
    )
    .expect("write prices");
    let prices = store.load_prices();
    assert_eq!(prices["openai/gpt-5.1-codex"].output_price_per_1k_tokens, 1.5);
}

#[test]
fn history_appends_one_line_per_entry() {
    let dir = tempdir().expect("temp dir");
    let store = FileStore::open(dir.path().join("nested"));
    let entry = HistoryEntry {
        timestamp: "2025-01-01T00:00:00.000Z".to_string(),
        total_cost: 1.25,
        token_usage: UsageMap::new(),
        costs: Vec::new(),
    };
    store.append_history(&entry).expect("append");
    store.append_history(&entry).expect("append again");

    let raw = fs::read_to_string(&store.paths().history_path).expect("read history");
    let lines = raw.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 2);
    let parsed: HistoryEntry = serde_json::from_str(lines[1]).expect("parse line");
    assert_eq!(parsed, entry);
}

#[test]
fn lock_is_exclusive_and_released_on_drop() {
    let dir = tempdir().expect("temp dir");
    let store = FileStore::open(dir.path());

    let guard = store.lock().expect("first lock");
    assert!(matches!(store.lock(), Err(StoreError::Locked(_))));
    drop(guard);
    assert!(!store.paths().lock_path.exists());
    let _again = store.lock().expect("lock after release");
}

#[test]
fn stale_lock_is_replaced() {
    let dir = tempdir().expect("temp dir");
    let store = FileStore::open(dir.path());
    fs::write(&store.paths().lock_path, "12345\n").expect("write lock");
    let old = SystemTime::now() - Duration::from_secs(10 * 60);
    let file = fs::File::options()
        .write(true)
        .open(&store.paths().lock_path)
        .expect("open lock");
    file.set_modified(old).expect("age lock");
    drop(file);

    let _guard = store.lock().expect("stale lock replaced");
}
