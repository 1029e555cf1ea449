#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tracker_app::{AppConfig, AppState, LogSources};
use tracker_core::{ModelPrice, PriceTable, TrackingConfig};
use tracker_store::MemoryStore;

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, hour, minute, 0)
        .single()
        .expect("valid time")
}

/// `m` costs $1 per 1k tokens both ways.
pub fn prices() -> PriceTable {
    PriceTable::from([(
        "m".to_string(),
        ModelPrice {
            input_price_per_1k_tokens: 1.0,
            output_price_per_1k_tokens: 1.0,
        },
    )])
}

pub fn config_with_daily(daily: f64) -> TrackingConfig {
    let mut config = TrackingConfig::default();
    config.thresholds.set_daily_limit(daily);
    config
}

pub fn log_line(model: &str, input: u64, output: u64) -> String {
    format!(r#"{{"model":"{model}","usage":{{"input":{input},"output":{output}}}}}"#)
}

pub fn write_log(dir: &Path, name: &str, lines: &[String]) {
    fs::write(dir.join(name), lines.join("\n")).expect("write log");
}

/// App state over a memory store, reading logs from `log_dir`.
pub fn memory_state(log_dir: &Path, config: TrackingConfig) -> (AppState, MemoryStore) {
    let store = MemoryStore::with_config(config);
    store.set_prices(prices());
    let app_config = AppConfig::new(
        log_dir.join("data"),
        LogSources::Paths(vec![log_dir.to_path_buf()]),
    );
    let state = AppState::with_store(app_config, Arc::new(store.clone()));
    (state, store)
}
