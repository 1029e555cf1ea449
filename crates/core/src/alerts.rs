use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::limits::{ModelLimit, Thresholds, TrackingConfig};
use crate::{UsageMap, normalize_model_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Warning,
    Critical,
    Milestone,
    ModelLimitExceeded,
}

impl AlertKind {
    /// Whether this alert invites the human to adjust the daily limit.
    pub fn requests_response(self) -> bool {
        matches!(self, Self::Warning | Self::Critical)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertFigures {
    pub total_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestone: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub message: String,
    pub figures: AlertFigures,
}

/// Cost level at which the last milestone alert fired.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MilestoneState {
    #[serde(default)]
    pub last_alert_cost: f64,
    #[serde(default, alias = "timestamp")]
    pub last_update_timestamp: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MilestoneProgress {
    pub step: f64,
    pub milestones_completed: u64,
    pub next_milestone: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub total_cost: f64,
    pub alerts: Vec<AlertEvent>,
    pub milestone_state: MilestoneState,
    /// True when `milestone_state` differs from the input and must be persisted.
    pub milestone_advanced: bool,
    pub progress: Option<MilestoneProgress>,
}

impl Evaluation {
    pub fn requests_response(&self) -> bool {
        self.alerts.iter().any(|alert| alert.kind.requests_response())
    }
}

pub fn evaluate(
    total_cost: f64,
    usage: &UsageMap,
    config: &TrackingConfig,
    state: &MilestoneState,
    now: DateTime<Utc>,
) -> Evaluation {
    let thresholds = &config.thresholds;
    let mut alerts = Vec::new();
    if let Some(alert) = threshold_alert(total_cost, thresholds) {
        alerts.push(alert);
    }
    let mut milestone_state = state.clone();
    let mut milestone_advanced = false;
    if let Some((alert, next_state)) = milestone_alert(total_cost, thresholds, state, now) {
        alerts.push(alert);
        milestone_state = next_state;
        milestone_advanced = true;
    }
    alerts.extend(model_limit_alerts(usage, &config.model_limits, total_cost));
    Evaluation {
        total_cost,
        alerts,
        milestone_state,
        milestone_advanced,
        progress: milestone_progress(total_cost, thresholds.alert_every_dollars),
    }
}

/// Critical or warning, never both. Stateless: fires on every evaluation above the line.
fn threshold_alert(total_cost: f64, thresholds: &Thresholds) -> Option<AlertEvent> {
    let daily = thresholds.daily_cost_limit;
    if daily.is_nan() || daily <= 0.0 {
        return None;
    }
    let percent = (total_cost / daily) * 100.0;
    let figures = AlertFigures {
        total_cost,
        limit: Some(daily),
        percent: Some(percent),
        ..AlertFigures::default()
    };
    if let Some(critical) = thresholds.critical_threshold()
        && total_cost >= critical
    {
        return Some(AlertEvent {
            kind: AlertKind::Critical,
            message: format!(
                "CRITICAL: Daily cost limit at {percent:.1}% (${total_cost:.2} / ${daily:.2})"
            ),
            figures,
        });
    }
    if total_cost >= thresholds.warning_threshold() {
        return Some(AlertEvent {
            kind: AlertKind::Warning,
            message: format!(
                "WARNING: Daily cost at {percent:.1}% of limit (${total_cost:.2} / ${daily:.2})"
            ),
            figures,
        });
    }
    None
}

fn increments(cost: f64, step: f64) -> u64 {
    if !cost.is_finite() || cost <= 0.0 {
        return 0;
    }
    (cost / step).floor() as u64
}

fn milestone_alert(
    total_cost: f64,
    thresholds: &Thresholds,
    state: &MilestoneState,
    now: DateTime<Utc>,
) -> Option<(AlertEvent, MilestoneState)> {
    let step = thresholds.alert_every_dollars;
    if step.is_nan() || step <= 0.0 {
        return None;
    }
    let last_increment = increments(state.last_alert_cost, step);
    let current_increment = increments(total_cost, step);
    if current_increment <= last_increment {
        return None;
    }
    let level = current_increment as f64 * step;
    let alert = AlertEvent {
        kind: AlertKind::Milestone,
        message: format!("Milestone: ${level:.2} spent (${total_cost:.2} total today)"),
        figures: AlertFigures {
            total_cost,
            milestone: Some(level),
            ..AlertFigures::default()
        },
    };
    let next_state = MilestoneState {
        last_alert_cost: total_cost,
        last_update_timestamp: Some(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
    };
    Some((alert, next_state))
}

fn milestone_progress(total_cost: f64, step: f64) -> Option<MilestoneProgress> {
    if step.is_nan() || step <= 0.0 {
        return None;
    }
    let milestones_completed = increments(total_cost, step);
    Some(MilestoneProgress {
        step,
        milestones_completed,
        next_milestone: (milestones_completed + 1) as f64 * step,
    })
}

fn model_limit_alerts(
    usage: &UsageMap,
    model_limits: &BTreeMap<String, ModelLimit>,
    total_cost: f64,
) -> Vec<AlertEvent> {
    let mut alerts = Vec::new();
    for (model, limit) in model_limits {
        let Some(cap) = limit.daily_tokens else {
            continue;
        };
        let canonical = normalize_model_name(model);
        let tokens = usage
            .get(canonical)
            .map(|model_usage| model_usage.total_tokens())
            .unwrap_or(0);
        if tokens > cap {
            alerts.push(AlertEvent {
                kind: AlertKind::ModelLimitExceeded,
                message: format!("{canonical}: {tokens} tokens exceed limit of {cap}"),
                figures: AlertFigures {
                    total_cost,
                    model: Some(canonical.to_string()),
                    tokens: Some(tokens),
                    token_limit: Some(cap),
                    ..AlertFigures::default()
                },
            });
        }
    }
    alerts
}
