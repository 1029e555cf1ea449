use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracker_core::{MilestoneState, PendingResponse, PriceTable, TrackingConfig};

use crate::error::Result;
use crate::{HistoryEntry, Store, StoreGuard};

#[derive(Debug, Default)]
struct Documents {
    config: Option<TrackingConfig>,
    milestones: MilestoneState,
    pending: PendingResponse,
    prices: PriceTable,
    history: Vec<HistoryEntry>,
    config_writes: usize,
}

/// In-memory store for tests. Clones share the same documents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Documents>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TrackingConfig) -> Self {
        let store = Self::new();
        store.write().config = Some(config);
        store
    }

    pub fn set_prices(&self, prices: PriceTable) {
        self.write().prices = prices;
    }

    pub fn set_milestones(&self, state: MilestoneState) {
        self.write().milestones = state;
    }

    pub fn set_pending(&self, state: PendingResponse) {
        self.write().pending = state;
    }

    pub fn remove_config(&self) {
        self.write().config = None;
    }

    pub fn config(&self) -> Option<TrackingConfig> {
        self.read().config.clone()
    }

    pub fn milestones(&self) -> MilestoneState {
        self.read().milestones.clone()
    }

    pub fn pending(&self) -> PendingResponse {
        self.read().pending.clone()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.read().history.clone()
    }

    /// Number of successful `save_config` calls.
    pub fn config_writes(&self) -> usize {
        self.read().config_writes
    }

    // A poisoned lock only means another test thread panicked; the data is still usable.
    fn read(&self) -> RwLockReadGuard<'_, Documents> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Documents> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Store for MemoryStore {
    fn load_config(&self) -> Result<TrackingConfig> {
        self.read()
            .config
            .clone()
            .ok_or_else(|| crate::StoreError::Missing("memory://tracking_config".into()))
    }

    fn save_config(&self, config: &TrackingConfig) -> Result<()> {
        let mut documents = self.write();
        documents.config = Some(config.clone());
        documents.config_writes += 1;
        Ok(())
    }

    fn load_milestones(&self) -> Result<MilestoneState> {
        Ok(self.read().milestones.clone())
    }

    fn save_milestones(&self, state: &MilestoneState) -> Result<()> {
        self.write().milestones = state.clone();
        Ok(())
    }

    fn load_pending(&self) -> Result<PendingResponse> {
        Ok(self.read().pending.clone())
    }

    fn save_pending(&self, state: &PendingResponse) -> Result<()> {
        self.write().pending = state.clone();
        Ok(())
    }

    fn load_prices(&self) -> PriceTable {
        self.read().prices.clone()
    }

    fn append_history(&self, entry: &HistoryEntry) -> Result<()> {
        self.write().history.push(entry.clone());
        Ok(())
    }

    fn lock(&self) -> Result<StoreGuard> {
        Ok(StoreGuard::noop())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
