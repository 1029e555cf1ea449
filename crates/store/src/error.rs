use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{} does not exist", .0.display())]
    Missing(PathBuf),
    #[error("{} is corrupt: {message}", .path.display())]
    Corrupt { path: PathBuf, message: String },
    #[error("{} is held by another process", .0.display())]
    Locked(PathBuf),
}

pub type Result<T> = std::result::Result<T, StoreError>;
