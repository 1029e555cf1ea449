use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{info, warn};
use tracker_core::{Evaluation, MilestoneState, TrackingConfig, evaluate, reply_instructions};
use tracker_store::HistoryEntry;

use crate::error::Result;
use crate::services::usage::{UsageService, UsageSnapshot};
use crate::services::{SharedConfig, SharedStore};

/// Outcome of one alert evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct AlertReport {
    pub evaluation: Evaluation,
    /// Reply prompt to send along with the alerts, when they invite a reply.
    pub reply_prompt: Option<String>,
    /// True when the evaluation opened the pending-response window.
    pub pending_opened: bool,
    /// False when the tracking config could not be read and defaults were used.
    pub config_loaded: bool,
}

/// A full check cycle: scan, price, evaluate.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub snapshot: UsageSnapshot,
    pub alerts: AlertReport,
}

#[derive(Clone)]
pub struct AlertService {
    config: SharedConfig,
    store: SharedStore,
    usage: UsageService,
}

impl AlertService {
    pub(super) fn new(config: SharedConfig, store: SharedStore, usage: UsageService) -> Self {
        Self {
            config,
            store,
            usage,
        }
    }

    pub fn check(&self, now: DateTime<Utc>) -> Result<CheckReport> {
        let snapshot = self.usage.snapshot();
        let alerts = self.evaluate(&snapshot, now)?;
        if self.config.record_history {
            let entry = HistoryEntry {
                timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
                total_cost: snapshot.total_cost(),
                token_usage: snapshot.usage.clone(),
                costs: snapshot.costs.models.clone(),
            };
            // History is a side record; losing a line must not lose the alerts.
            if let Err(err) = self.store.append_history(&entry) {
                warn!(error = %err, "failed to append usage history");
            }
        }
        Ok(CheckReport { snapshot, alerts })
    }

    /// Evaluates thresholds and milestones against persisted state.
    ///
    /// A missing or corrupt tracking config falls back to the defaults so the
    /// cycle still produces alerts. Any alert that invites a reply opens the
    /// pending-response window, and an advanced milestone is persisted after
    /// every other write has succeeded.
    pub fn evaluate(&self, snapshot: &UsageSnapshot, now: DateTime<Utc>) -> Result<AlertReport> {
        let _guard = self.store.lock()?;
        let (config, config_loaded) = match self.store.load_config() {
            Ok(config) => (config, true),
            Err(err) => {
                warn!(error = %err, "tracking config unavailable; evaluating with defaults");
                (TrackingConfig::default(), false)
            }
        };
        let state = self.store.load_milestones()?;
        let evaluation = evaluate(snapshot.total_cost(), &snapshot.usage, &config, &state, now);

        let mut reply_prompt = None;
        let mut pending_opened = false;
        if evaluation.requests_response() {
            let mut pending = self.store.load_pending()?;
            pending.mark_sent(now);
            self.store.save_pending(&pending)?;
            reply_prompt = Some(reply_instructions(config.thresholds.daily_cost_limit));
            pending_opened = true;
        }

        // Saved last: a failed write above leaves the milestone unrecorded so
        // its alert is raised again on the next check.
        if evaluation.milestone_advanced {
            self.store.save_milestones(&evaluation.milestone_state)?;
            info!(
                last_alert_cost = evaluation.milestone_state.last_alert_cost,
                "milestone advanced"
            );
        }

        Ok(AlertReport {
            evaluation,
            reply_prompt,
            pending_opened,
            config_loaded,
        })
    }

    /// Forgets every milestone reached so far.
    pub fn reset_milestones(&self, now: DateTime<Utc>) -> Result<MilestoneState> {
        let _guard = self.store.lock()?;
        let state = MilestoneState {
            last_alert_cost: 0.0,
            last_update_timestamp: Some(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        };
        self.store.save_milestones(&state)?;
        info!("milestones reset");
        Ok(state)
    }
}
