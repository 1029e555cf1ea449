//! Persistence for the tracker's configuration and state documents.
//!
//! Services never open files themselves; they go through a [`Store`]. The
//! [`FileStore`] keeps each document as JSON in a data directory, and
//! [`MemoryStore`] holds them in memory for tests.

mod error;
mod file;
mod memory;

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracker_core::{
    CostBreakdown, MilestoneState, PendingResponse, PriceTable, TrackingConfig, UsageMap,
};

pub use error::{Result, StoreError};
pub use file::{FileStore, StorePaths};
pub use memory::MemoryStore;

/// One line of the usage history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub total_cost: f64,
    pub token_usage: UsageMap,
    pub costs: Vec<CostBreakdown>,
}

/// Held for the duration of a read-modify-write. Dropping it releases the lock.
#[derive(Debug)]
pub struct StoreGuard {
    lock_path: Option<PathBuf>,
}

impl StoreGuard {
    pub(crate) fn file(lock_path: PathBuf) -> Self {
        Self {
            lock_path: Some(lock_path),
        }
    }

    pub(crate) fn noop() -> Self {
        Self { lock_path: None }
    }
}

impl Drop for StoreGuard {
    fn drop(&mut self) {
        if let Some(path) = self.lock_path.take()
            && let Err(err) = std::fs::remove_file(&path)
        {
            tracing::warn!(path = %path.display(), error = %err, "failed to release store lock");
        }
    }
}

/// Load/save access to every persisted document.
///
/// `load_config` is strict: a missing or corrupt config is an error. The
/// milestone and pending documents fall back to their defaults when absent
/// or unreadable as JSON, and a broken price table reads as empty.
pub trait Store: Send + Sync {
    fn load_config(&self) -> Result<TrackingConfig>;

    /// Replaces the config document in one step; readers never see a partial write.
    fn save_config(&self, config: &TrackingConfig) -> Result<()>;

    fn load_milestones(&self) -> Result<MilestoneState>;

    fn save_milestones(&self, state: &MilestoneState) -> Result<()>;

    fn load_pending(&self) -> Result<PendingResponse>;

    fn save_pending(&self, state: &PendingResponse) -> Result<()>;

    fn load_prices(&self) -> PriceTable;

    fn append_history(&self, entry: &HistoryEntry) -> Result<()>;

    /// Takes the store-wide lock guarding a read-modify-write.
    fn lock(&self) -> Result<StoreGuard>;

    fn name(&self) -> &str;
}

impl<T: Store + ?Sized> Store for Arc<T> {
    fn load_config(&self) -> Result<TrackingConfig> {
        (**self).load_config()
    }
    fn save_config(&self, config: &TrackingConfig) -> Result<()> {
        (**self).save_config(config)
    }
    fn load_milestones(&self) -> Result<MilestoneState> {
        (**self).load_milestones()
    }
    fn save_milestones(&self, state: &MilestoneState) -> Result<()> {
        (**self).save_milestones(state)
    }
    fn load_pending(&self) -> Result<PendingResponse> {
        (**self).load_pending()
    }
    fn save_pending(&self, state: &PendingResponse) -> Result<()> {
        (**self).save_pending(state)
    }
    fn load_prices(&self) -> PriceTable {
        (**self).load_prices()
    }
    fn append_history(&self, entry: &HistoryEntry) -> Result<()> {
        (**self).append_history(entry)
    }
    fn lock(&self) -> Result<StoreGuard> {
        (**self).lock()
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}
