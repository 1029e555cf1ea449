use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracker_core::{PendingResponse, PendingState};

use crate::error::Result;
use crate::services::SharedStore;

#[derive(Debug, Clone, Serialize)]
pub struct PendingStatus {
    pub pending: bool,
    pub awaiting_response: bool,
    pub alert_sent_at: Option<String>,
    pub expires_at: Option<String>,
}

#[derive(Clone)]
pub struct PendingService {
    store: SharedStore,
}

impl PendingService {
    pub(super) fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub fn status(&self, now: DateTime<Utc>) -> Result<PendingStatus> {
        let state = self.store.load_pending()?;
        let expires_at = match state.state_at(now) {
            PendingState::AwaitingResponse { expires_at } => {
                Some(expires_at.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            PendingState::Idle => None,
        };
        Ok(PendingStatus {
            pending: expires_at.is_some(),
            awaiting_response: state.awaiting_response,
            alert_sent_at: state.alert_sent_at,
            expires_at,
        })
    }

    pub fn is_pending(&self, now: DateTime<Utc>) -> Result<bool> {
        Ok(self.store.load_pending()?.is_pending_at(now))
    }

    /// Opens the reply window, for alerts delivered outside `AlertService::check`.
    pub fn mark_sent(&self, now: DateTime<Utc>) -> Result<PendingResponse> {
        let _guard = self.store.lock()?;
        let mut state = self.store.load_pending()?;
        state.mark_sent(now);
        self.store.save_pending(&state)?;
        Ok(state)
    }

    pub fn mark_processed(&self) -> Result<PendingResponse> {
        let _guard = self.store.lock()?;
        let mut state = self.store.load_pending()?;
        state.mark_processed();
        self.store.save_pending(&state)?;
        Ok(state)
    }
}
