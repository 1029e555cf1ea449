use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("store error: {0}")]
    Store(#[from] tracker_store::StoreError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Limit(#[from] tracker_core::LimitError),
    #[error("config unavailable: {0}")]
    ConfigUnavailable(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
