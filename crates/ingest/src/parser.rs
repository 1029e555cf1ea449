use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tracker_core::{UsageRecord, parse_timestamp};

/// Locations that may carry the model id, in priority order.
const MODEL_PATHS: &[&[&str]] = &[&["model"], &["message", "model"]];

/// Locations that may carry the usage block, in priority order.
const USAGE_PATHS: &[&[&str]] = &[&["usage"], &["message", "usage"]];

const TIMESTAMP_PATHS: &[&[&str]] = &[&["timestamp"], &["ts"], &["message", "timestamp"]];

/// Key aliases for each token counter. The first key with a usable value wins.
const INPUT_KEYS: &[&str] = &["input", "input_tokens"];
const OUTPUT_KEYS: &[&str] = &["output", "output_tokens"];
const CACHE_READ_KEYS: &[&str] = &["cacheRead", "cache_read_input_tokens", "cache_read_tokens"];
const CACHE_WRITE_KEYS: &[&str] = &[
    "cacheWrite",
    "cache_creation_input_tokens",
    "cache_write_tokens",
];

/// Null, blank strings and empty objects count as absent, so lookup falls
/// through to the next location.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}

fn find_value<'a>(value: &'a Value, paths: &[&[&str]]) -> Option<&'a Value> {
    for path in paths {
        let mut current = value;
        let mut ok = true;
        for key in *path {
            if let Some(next) = current.get(*key) {
                current = next;
            } else {
                ok = false;
                break;
            }
        }
        if ok && !is_empty_value(current) {
            return Some(current);
        }
    }
    None
}

fn find_string<'a>(value: &'a Value, paths: &[&[&str]]) -> Option<&'a str> {
    for path in paths {
        if let Some(found) =
            find_value(value, std::slice::from_ref(path)).and_then(Value::as_str)
        {
            return Some(found);
        }
    }
    None
}

fn token_count(value: &Value) -> Option<u64> {
    if let Some(count) = value.as_u64() {
        return Some(count);
    }
    // Some writers emit floats like 12.0; negatives and NaN are treated as absent.
    let float = value.as_f64()?;
    if float.is_finite() && float >= 0.0 {
        Some(float as u64)
    } else {
        None
    }
}

fn first_count(usage: &Value, keys: &[&str]) -> u64 {
    keys.iter()
        .filter_map(|key| usage.get(*key))
        .find_map(token_count)
        .unwrap_or(0)
}

pub(crate) fn normalize_timestamp(raw: &str) -> Option<String> {
    parse_timestamp(raw).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn timestamp_from_value(value: &Value) -> Option<String> {
    match find_value(value, TIMESTAMP_PATHS)? {
        Value::String(raw) => normalize_timestamp(raw).or_else(|| Some(raw.clone())),
        Value::Number(number) => {
            let millis = number.as_i64()?;
            // Epoch seconds are ten digits until 2286; anything longer is millis.
            let millis = if millis.abs() < 10_000_000_000 {
                millis.saturating_mul(1000)
            } else {
                millis
            };
            DateTime::<Utc>::from_timestamp_millis(millis)
                .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        }
        _ => None,
    }
}

pub(crate) fn parse_json_line(line: &str) -> Option<Value> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

/// Extracts a usage record from an already-parsed log entry.
///
/// Entries without a model id or without a non-empty usage object yield `None`. The
/// model and the usage block are looked up at the top level first and then
/// under `message`; an empty value at the top level does not hide a filled
/// one under `message`.
pub fn extract_usage_record_from_value(value: &Value) -> Option<UsageRecord> {
    let model = find_string(value, MODEL_PATHS)?.trim();
    if model.is_empty() {
        return None;
    }
    let usage = find_value(value, USAGE_PATHS)?;
    if !usage.is_object() {
        return None;
    }
    Some(UsageRecord {
        raw_model_id: model.to_string(),
        input_tokens: first_count(usage, INPUT_KEYS),
        output_tokens: first_count(usage, OUTPUT_KEYS),
        cache_read_tokens: first_count(usage, CACHE_READ_KEYS),
        cache_write_tokens: first_count(usage, CACHE_WRITE_KEYS),
        timestamp: timestamp_from_value(value),
    })
}

pub fn extract_usage_record_from_line(line: &str) -> Option<UsageRecord> {
    parse_json_line(line).and_then(|value| extract_usage_record_from_value(&value))
}
