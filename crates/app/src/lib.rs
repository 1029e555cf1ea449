pub mod app;
pub mod error;
pub mod services;
pub mod startup;

pub use app::{AppConfig, AppState, LogSources};
pub use error::{AppError, Result};
pub use services::{
    AlertReport, AlertService, AppServices, CheckReport, LimitReply, LimitService, PendingService,
    PendingStatus, ResponseOutcome, UsageService, UsageSnapshot,
};
pub use startup::{AppPaths, ensure_app_data_dir};
