mod alerts;
mod limits;
mod pending;
mod usage;

use std::sync::Arc;

use tracker_store::Store;

use crate::app::AppConfig;

pub use alerts::{AlertReport, AlertService, CheckReport};
pub use limits::{LimitReply, LimitService, ResponseOutcome};
pub use pending::{PendingService, PendingStatus};
pub use usage::{UsageService, UsageSnapshot};

type SharedConfig = Arc<AppConfig>;
type SharedStore = Arc<dyn Store>;

/// Service registry for app-level operations.
#[derive(Clone)]
pub struct AppServices {
    pub usage: UsageService,
    pub alerts: AlertService,
    pub pending: PendingService,
    pub limits: LimitService,
}

impl AppServices {
    pub fn new(config: &AppConfig, store: SharedStore) -> Self {
        let shared = Arc::new(config.clone());
        let usage = UsageService::new(shared.clone(), store.clone());
        Self {
            alerts: AlertService::new(shared, store.clone(), usage.clone()),
            pending: PendingService::new(store.clone()),
            limits: LimitService::new(store),
            usage,
        }
    }
}
