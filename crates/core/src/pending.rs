use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::time::parse_timestamp;

/// How long a sent alert keeps free text eligible as a limit response.
pub fn pending_window() -> Duration {
    Duration::hours(1)
}

/// Persisted record of whether an alert is awaiting a reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingResponse {
    #[serde(default)]
    pub awaiting_response: bool,
    #[serde(default, rename = "last_alert_sent", alias = "alert_sent_at")]
    pub alert_sent_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingState {
    Idle,
    AwaitingResponse { expires_at: DateTime<Utc> },
}

impl PendingResponse {
    pub fn state_at(&self, now: DateTime<Utc>) -> PendingState {
        if !self.awaiting_response {
            return PendingState::Idle;
        }
        // A missing, unparsable or future stamp fails open to idle.
        let Some(sent_at) = self.alert_sent_at.as_deref().and_then(parse_timestamp) else {
            return PendingState::Idle;
        };
        if sent_at > now {
            return PendingState::Idle;
        }
        let expires_at = sent_at + pending_window();
        if now < expires_at {
            PendingState::AwaitingResponse { expires_at }
        } else {
            PendingState::Idle
        }
    }

    pub fn is_pending_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.state_at(now), PendingState::AwaitingResponse { .. })
    }

    pub fn mark_sent(&mut self, now: DateTime<Utc>) {
        self.awaiting_response = true;
        self.alert_sent_at = Some(now.to_rfc3339_opts(SecondsFormat::Millis, true));
    }

    pub fn mark_processed(&mut self) {
        self.awaiting_response = false;
    }
}
