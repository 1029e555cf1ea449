use std::collections::BTreeMap;
use std::fmt::Write;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

pub const WEEKLY_MULTIPLIER: f64 = 6.0;
pub const MONTHLY_MULTIPLIER: f64 = 30.0;

const DEFAULT_DAILY_LIMIT: f64 = 5.0;
const DEFAULT_WARNING_FRACTION: f64 = 0.75;
const DEFAULT_CRITICAL_FRACTION: f64 = 0.95;
const DEFAULT_ALERT_EVERY_DOLLARS: f64 = 5.0;

/// The persisted tracking configuration document.
///
/// Fields this crate does not know about are kept in `extra` so a
/// read-modify-write never drops them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub model_limits: BTreeMap<String, ModelLimit>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_daily_limit")]
    pub daily_cost_limit: f64,
    #[serde(default = "default_weekly_limit")]
    pub weekly_cost_limit: f64,
    #[serde(default = "default_monthly_limit")]
    pub monthly_cost_limit: f64,
    #[serde(default = "default_warning_fraction", alias = "alert_level_warning")]
    pub warning_fraction: f64,
    #[serde(default, alias = "alert_level_critical")]
    pub critical_fraction: CriticalLevel,
    #[serde(default = "default_alert_every_dollars")]
    pub alert_every_dollars: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            daily_cost_limit: default_daily_limit(),
            weekly_cost_limit: default_weekly_limit(),
            monthly_cost_limit: default_monthly_limit(),
            warning_fraction: default_warning_fraction(),
            critical_fraction: CriticalLevel::default(),
            alert_every_dollars: default_alert_every_dollars(),
            extra: Map::new(),
        }
    }
}

impl Thresholds {
    pub fn warning_threshold(&self) -> f64 {
        self.daily_cost_limit * self.warning_fraction
    }

    /// Dollar level of the critical alert, or `None` when critical alerts are disabled.
    pub fn critical_threshold(&self) -> Option<f64> {
        match self.critical_fraction {
            CriticalLevel::Fraction(fraction) => Some(self.daily_cost_limit * fraction),
            CriticalLevel::Disabled => None,
        }
    }

    /// Sets the daily limit and recomputes the weekly and monthly limits from it.
    pub fn set_daily_limit(&mut self, daily: f64) {
        self.daily_cost_limit = daily;
        self.weekly_cost_limit = daily * WEEKLY_MULTIPLIER;
        self.monthly_cost_limit = daily * MONTHLY_MULTIPLIER;
    }
}

fn default_daily_limit() -> f64 {
    DEFAULT_DAILY_LIMIT
}

fn default_weekly_limit() -> f64 {
    DEFAULT_DAILY_LIMIT * WEEKLY_MULTIPLIER
}

fn default_monthly_limit() -> f64 {
    DEFAULT_DAILY_LIMIT * MONTHLY_MULTIPLIER
}

fn default_warning_fraction() -> f64 {
    DEFAULT_WARNING_FRACTION
}

fn default_alert_every_dollars() -> f64 {
    DEFAULT_ALERT_EVERY_DOLLARS
}

/// Critical alert level as a fraction of the daily limit.
///
/// Serialized as a number, or as the string `"disabled"` when unbounded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CriticalLevel {
    Fraction(f64),
    Disabled,
}

impl Default for CriticalLevel {
    fn default() -> Self {
        Self::Fraction(DEFAULT_CRITICAL_FRACTION)
    }
}

impl Serialize for CriticalLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Fraction(value) => serializer.serialize_f64(*value),
            Self::Disabled => serializer.serialize_str("disabled"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCriticalLevel {
    Number(f64),
    Text(String),
    Null(()),
}

impl<'de> Deserialize<'de> for CriticalLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawCriticalLevel::deserialize(deserializer)? {
            RawCriticalLevel::Number(value) if value.is_finite() => Ok(Self::Fraction(value)),
            RawCriticalLevel::Number(_) | RawCriticalLevel::Null(()) => Ok(Self::Disabled),
            RawCriticalLevel::Text(text) => {
                let text = text.trim().to_ascii_lowercase();
                match text.as_str() {
                    "disabled" | "off" | "inf" | "infinity" => Ok(Self::Disabled),
                    other => other
                        .parse::<f64>()
                        .ok()
                        .filter(|value| value.is_finite())
                        .map(Self::Fraction)
                        .ok_or_else(|| {
                            serde::de::Error::custom(format!("invalid critical level: {other}"))
                        }),
                }
            }
        }
    }
}

/// Per-model token cap. Models without `daily_tokens` are uncapped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelLimit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_tokens: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A free-text reply to a limit alert, parsed into a closed set of commands.
#[derive(Debug, Clone, PartialEq)]
pub enum LimitCommand {
    Keep,
    DisableCritical,
    Increase(f64),
    SetAbsolute(f64),
    Invalid { input: String },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LimitError {
    #[error(
        "Invalid input: '{0}'. Please use a number (e.g., '15') or '+5' to increase."
    )]
    InvalidCommand(String),
    #[error("Invalid limit value: {0}. Daily limit must be a positive amount.")]
    InvalidLimitValue(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitOutcome {
    Kept,
    Disabled,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitUpdate {
    pub old_daily: f64,
    pub new_daily: f64,
    pub outcome: LimitOutcome,
}

impl LimitUpdate {
    /// Human-readable confirmation for the presentation layer to relay.
    pub fn confirmation(&self, thresholds: &Thresholds) -> String {
        match self.outcome {
            LimitOutcome::Kept => {
                format!("Keeping current daily limit (${:.2}).", self.old_daily)
            }
            LimitOutcome::Disabled => format!(
                "Critical alerts disabled. Warnings still active.\n(Daily limit remains at ${:.2})",
                self.old_daily
            ),
            LimitOutcome::Updated => {
                let change = self.new_daily - self.old_daily;
                let direction = if change >= 0.0 { "increased" } else { "decreased" };
                let mut out = format!("Limit updated ({direction}, change: ${change:+.2})\n");
                let _ = writeln!(
                    out,
                    "  Daily:   ${:.2} -> ${:.2}",
                    self.old_daily, self.new_daily
                );
                let _ = writeln!(
                    out,
                    "  Weekly:  ${:.2} -> ${:.2}",
                    self.old_daily * WEEKLY_MULTIPLIER,
                    self.new_daily * WEEKLY_MULTIPLIER
                );
                let _ = writeln!(
                    out,
                    "  Monthly: ${:.2} -> ${:.2}",
                    self.old_daily * MONTHLY_MULTIPLIER,
                    self.new_daily * MONTHLY_MULTIPLIER
                );
                let _ = write!(
                    out,
                    "New alert thresholds:\n  Warning at {:.0}%: ${:.2}",
                    thresholds.warning_fraction * 100.0,
                    thresholds.warning_threshold()
                );
                match (thresholds.critical_fraction, thresholds.critical_threshold()) {
                    (CriticalLevel::Fraction(fraction), Some(level)) => {
                        let _ = write!(
                            out,
                            "\n  Critical at {:.0}%: ${level:.2}",
                            fraction * 100.0
                        );
                    }
                    _ => out.push_str("\n  Critical: disabled"),
                }
                out
            }
        }
    }
}

/// Parses a reply. First matching rule wins; input is trimmed and case-folded.
/// Invalid replies carry the trimmed text as typed.
pub fn parse_response(text: &str) -> LimitCommand {
    let trimmed = text.trim();
    let normalized = trimmed.to_lowercase();
    if normalized.is_empty() {
        return LimitCommand::Invalid {
            input: String::new(),
        };
    }
    match normalized.as_str() {
        "keep" | "no" | "skip" => return LimitCommand::Keep,
        "disable" => return LimitCommand::DisableCritical,
        _ => {}
    }
    if let Some(rest) = normalized.strip_prefix('+') {
        return match leading_number(rest.trim_start()) {
            Some(delta) if delta > 0.0 => LimitCommand::Increase(delta),
            _ => LimitCommand::Invalid {
                input: trimmed.to_string(),
            },
        };
    }
    if is_plain_number(&normalized)
        && let Ok(value) = normalized.parse::<f64>()
    {
        return LimitCommand::SetAbsolute(value);
    }
    LimitCommand::Invalid {
        input: trimmed.to_string(),
    }
}

/// Matches `digits[.digits]` as a whole string.
fn is_plain_number(text: &str) -> bool {
    numeric_prefix_len(text) == text.len()
}

fn leading_number(text: &str) -> Option<f64> {
    let len = numeric_prefix_len(text);
    if len == 0 {
        return None;
    }
    text[..len].parse::<f64>().ok().filter(|value| value.is_finite())
}

fn numeric_prefix_len(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut end = 0;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == 0 {
        return 0;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    end
}

/// Applies a command to a copy of `config`.
///
/// On error the input config is untouched and nothing should be persisted.
pub fn apply_command(
    command: &LimitCommand,
    config: &TrackingConfig,
) -> Result<(LimitUpdate, TrackingConfig), LimitError> {
    let current = config.thresholds.daily_cost_limit;
    let mut applied = config.clone();
    let (new_daily, outcome) = match command {
        LimitCommand::Keep => (current, LimitOutcome::Kept),
        LimitCommand::DisableCritical => {
            applied.thresholds.critical_fraction = CriticalLevel::Disabled;
            (current, LimitOutcome::Disabled)
        }
        LimitCommand::Increase(delta) => (current + delta, LimitOutcome::Updated),
        LimitCommand::SetAbsolute(value) => (*value, LimitOutcome::Updated),
        LimitCommand::Invalid { input } => return Err(LimitError::InvalidCommand(input.clone())),
    };
    if outcome == LimitOutcome::Updated {
        if !new_daily.is_finite() || new_daily <= 0.0 {
            return Err(LimitError::InvalidLimitValue(new_daily));
        }
        applied.thresholds.set_daily_limit(new_daily);
    }
    Ok((
        LimitUpdate {
            old_daily: current,
            new_daily,
            outcome,
        },
        applied,
    ))
}

/// Reply instructions attached to alerts that expect a human answer.
pub fn reply_instructions(daily_limit: f64) -> String {
    format!(
        "Would you like to raise the daily limit?\n\
Reply with:\n  \
- a number (e.g. `15` for $15/day)\n  \
- an increase (e.g. `+5` to add $5/day)\n  \
- `keep` to maintain the current limit\n  \
- `disable` to turn off critical alerts\n\
Current setting: ${daily_limit:.2}/day"
    )
}
