use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracker_core::TrackingConfig;
use tracker_store::{FileStore, Store, StoreError};

use crate::error::Result;
use crate::services::AppServices;
use crate::startup::{AppPaths, ensure_app_data_dir};

/// Where session logs are read from.
#[derive(Clone, Debug)]
pub enum LogSources {
    /// An OpenClaw home; its `agents/*/sessions`, `sessions` and `logs` dirs are scanned.
    Home(PathBuf),
    /// Explicit files or directories.
    Paths(Vec<PathBuf>),
}

/// Paths and switches needed to run the tracker.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub paths: AppPaths,
    pub log_sources: LogSources,
    /// Append a usage history line on every check.
    pub record_history: bool,
}

impl AppConfig {
    pub fn new(app_data_dir: PathBuf, log_sources: LogSources) -> Self {
        Self {
            paths: AppPaths::new(app_data_dir),
            log_sources,
            record_history: true,
        }
    }
}

/// Application state shared by frontends.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn Store>,
    pub services: AppServices,
}

impl AppState {
    /// State backed by JSON documents in the configured data directory.
    pub fn new(config: AppConfig) -> Self {
        let store: Arc<dyn Store> = Arc::new(FileStore::new(config.paths.store.clone()));
        Self::with_store(config, store)
    }

    pub fn with_store(config: AppConfig, store: Arc<dyn Store>) -> Self {
        let services = AppServices::new(&config, store.clone());
        Self {
            config,
            store,
            services,
        }
    }

    /// Creates the data directory and writes a default tracking config if none exists.
    pub fn initialize(&self) -> Result<bool> {
        ensure_app_data_dir(&self.config.paths)?;
        self.ensure_config()
    }

    /// Returns true when a default config was written.
    pub fn ensure_config(&self) -> Result<bool> {
        let _guard = self.store.lock()?;
        match self.store.load_config() {
            Ok(_) => Ok(false),
            Err(StoreError::Missing(path)) => {
                self.store.save_config(&TrackingConfig::default())?;
                info!(path = %path.display(), "wrote default tracking config");
                Ok(true)
            }
            Err(err) => Err(err.into()),
        }
    }
}
