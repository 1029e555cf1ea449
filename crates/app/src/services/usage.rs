use ingest::{IngestStats, scan_openclaw_home, scan_paths};
use serde::Serialize;
use tracing::debug;
use tracker_core::{CostReport, UsageMap, compute_costs};

use crate::app::LogSources;
use crate::services::{SharedConfig, SharedStore};

/// Aggregated usage and its cost at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct UsageSnapshot {
    pub usage: UsageMap,
    pub costs: CostReport,
    pub stats: IngestStats,
}

impl UsageSnapshot {
    pub fn total_cost(&self) -> f64 {
        self.costs.total_cost
    }

    pub fn total_tokens(&self) -> u64 {
        self.usage
            .values()
            .fold(0u64, |sum, usage| sum.saturating_add(usage.total_tokens()))
    }
}

#[derive(Clone)]
pub struct UsageService {
    config: SharedConfig,
    store: SharedStore,
}

impl UsageService {
    pub(super) fn new(config: SharedConfig, store: SharedStore) -> Self {
        Self { config, store }
    }

    /// Scans the logs and prices the result. Never fails: unreadable files are
    /// listed in `stats.issues` and a missing price table prices everything at zero.
    pub fn snapshot(&self) -> UsageSnapshot {
        let scan = match &self.config.log_sources {
            LogSources::Home(home) => scan_openclaw_home(home),
            LogSources::Paths(paths) => scan_paths(paths),
        };
        let prices = self.store.load_prices();
        let costs = compute_costs(&scan.usage, &prices);
        debug!(
            files = scan.stats.files_scanned,
            records = scan.stats.records_parsed,
            models = scan.usage.len(),
            unpriced = costs.unpriced_models.len(),
            "usage snapshot"
        );
        UsageSnapshot {
            usage: scan.usage,
            costs,
            stats: scan.stats,
        }
    }
}
