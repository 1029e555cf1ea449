use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};
use tracker_core::{LimitError, LimitUpdate, Thresholds, apply_command, parse_response};

use crate::error::{AppError, Result};
use crate::services::SharedStore;

/// A limit change as it was applied, with the text to relay to the human.
#[derive(Debug, Clone, Serialize)]
pub struct LimitReply {
    pub update: LimitUpdate,
    pub thresholds: Thresholds,
    pub confirmation: String,
    /// False when the command left the config as it was and nothing was written.
    pub saved: bool,
}

#[derive(Debug, Clone)]
pub enum ResponseOutcome {
    /// No alert was awaiting a reply, so the text is not a limit response.
    Ignored,
    Applied(LimitReply),
    /// The reply could not be used. The config was not touched.
    Rejected(LimitError),
}

#[derive(Clone)]
pub struct LimitService {
    store: SharedStore,
}

impl LimitService {
    pub(super) fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Handles free text that may be a reply to a limit alert.
    ///
    /// Text is only interpreted while the pending-response window is open. Any
    /// attempt, accepted or rejected, closes the window.
    pub fn respond(&self, text: &str, now: DateTime<Utc>) -> Result<ResponseOutcome> {
        let _guard = self.store.lock()?;
        let mut pending = self.store.load_pending()?;
        if !pending.is_pending_at(now) {
            debug!("no limit alert awaiting a reply; ignoring text");
            return Ok(ResponseOutcome::Ignored);
        }
        let result = self.apply_locked(text);
        pending.mark_processed();
        self.store.save_pending(&pending)?;
        match result {
            Ok(reply) => Ok(ResponseOutcome::Applied(reply)),
            Err(AppError::Limit(err)) => Ok(ResponseOutcome::Rejected(err)),
            Err(err) => Err(err),
        }
    }

    /// Applies a limit command directly, without consulting the pending window.
    pub fn adjust(&self, text: &str) -> Result<LimitReply> {
        let _guard = self.store.lock()?;
        self.apply_locked(text)
    }

    pub fn current(&self) -> Result<Thresholds> {
        let config = self
            .store
            .load_config()
            .map_err(|err| AppError::ConfigUnavailable(err.to_string()))?;
        Ok(config.thresholds)
    }

    fn apply_locked(&self, text: &str) -> Result<LimitReply> {
        let config = self
            .store
            .load_config()
            .map_err(|err| AppError::ConfigUnavailable(err.to_string()))?;
        let command = parse_response(text);
        let (update, applied) = apply_command(&command, &config)?;
        let saved = applied != config;
        if saved {
            self.store.save_config(&applied)?;
            info!(
                old_daily = update.old_daily,
                new_daily = update.new_daily,
                outcome = ?update.outcome,
                "limit config updated"
            );
        }
        let confirmation = update.confirmation(&applied.thresholds);
        Ok(LimitReply {
            update,
            thresholds: applied.thresholds,
            confirmation,
            saved,
        })
    }
}
